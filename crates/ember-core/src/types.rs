//! # EMBER Core Types
//!
//! Fundamental type definitions used across the driver.
//!
//! These types provide:
//! - Strong typing for physical addresses and sizes
//! - Kernel area and team identifiers
//! - Display pipe identifiers and pipe sets
//! - The interrupt handler return protocol

use core::fmt;

use bitflags::bitflags;

/// Page size used for aperture allocations and kernel areas
pub const PAGE_SIZE: u64 = 4096;

// =============================================================================
// PHYSICAL ADDRESS
// =============================================================================

/// Physical memory address (for fixed-function hardware access)
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct PhysAddr(u64);

impl PhysAddr {
    /// Create a new physical address
    #[inline]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Get the raw u64 value
    #[inline]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Check if null
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// Offset by bytes
    #[inline]
    pub const fn offset(self, bytes: u64) -> Self {
        Self(self.0.wrapping_add(bytes))
    }
}

impl fmt::Debug for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PhysAddr(0x{:016x})", self.0)
    }
}

impl fmt::Display for PhysAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016x}", self.0)
    }
}

// =============================================================================
// BYTE SIZE
// =============================================================================

/// Size in bytes with page helpers
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct ByteSize(u64);

impl ByteSize {
    /// Create from bytes
    #[inline]
    pub const fn from_bytes(bytes: u64) -> Self {
        Self(bytes)
    }

    /// Create from kilobytes
    #[inline]
    pub const fn from_kib(kib: u64) -> Self {
        Self(kib * 1024)
    }

    /// Create from a page count
    #[inline]
    pub const fn from_pages(pages: u64) -> Self {
        Self(pages * PAGE_SIZE)
    }

    /// Get bytes
    #[inline]
    pub const fn as_bytes(self) -> u64 {
        self.0
    }

    /// Round up to a whole number of pages
    ///
    /// Saturates at the last whole page below `u64::MAX`; use
    /// [`ByteSize::checked_page_aligned`] for sizes from untrusted callers.
    #[inline]
    pub const fn page_aligned(self) -> Self {
        match self.checked_page_aligned() {
            Some(aligned) => aligned,
            None => Self(u64::MAX & !(PAGE_SIZE - 1)),
        }
    }

    /// Round up to a whole number of pages, `None` if that overflows
    #[inline]
    pub const fn checked_page_aligned(self) -> Option<Self> {
        match self.0.checked_add(PAGE_SIZE - 1) {
            Some(end) => Some(Self(end & !(PAGE_SIZE - 1))),
            None => None,
        }
    }

    /// Number of pages covered
    #[inline]
    pub const fn pages(self) -> u64 {
        self.0.div_ceil(PAGE_SIZE)
    }
}

impl fmt::Debug for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 >= 1024 * 1024 {
            write!(f, "{} MiB", self.0 / (1024 * 1024))
        } else if self.0 >= 1024 {
            write!(f, "{} KiB", self.0 / 1024)
        } else {
            write!(f, "{} B", self.0)
        }
    }
}

// =============================================================================
// KERNEL IDENTIFIERS
// =============================================================================

/// Kernel memory area identifier
///
/// Negative values are kernel error codes and never name a live area.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct AreaId(pub i32);

impl AreaId {
    /// Sentinel for "no area"
    pub const INVALID: Self = Self(-1);

    /// Check if the id names a live area
    #[inline]
    pub const fn is_valid(self) -> bool {
        self.0 >= 0
    }
}

/// Kernel team (process) identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct TeamId(pub i32);

impl TeamId {
    /// The kernel team
    pub const KERNEL: Self = Self(1);
}

// =============================================================================
// DISPLAY PIPES
// =============================================================================

/// A display pipe (timing generator)
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum PipeIndex {
    /// Pipe A
    A = 0,
    /// Pipe B
    B = 1,
    /// Pipe C (Gen7+ non-SoC parts and Cherryview)
    C = 2,
}

impl PipeIndex {
    /// All pipes in hardware order
    pub const ALL: [PipeIndex; 3] = [PipeIndex::A, PipeIndex::B, PipeIndex::C];

    /// Zero-based hardware index
    #[inline]
    pub const fn index(self) -> u32 {
        self as u32
    }

    /// Single-pipe set
    #[inline]
    pub const fn as_set(self) -> PipeSet {
        match self {
            Self::A => PipeSet::A,
            Self::B => PipeSet::B,
            Self::C => PipeSet::C,
        }
    }
}

bitflags! {
    /// Set of display pipes
    ///
    /// The set itself does not know how many pipes the hardware has; callers
    /// restrict it with [`PipeSet::limited_to`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PipeSet: u32 {
        /// Pipe A
        const A = 1 << 0;
        /// Pipe B
        const B = 1 << 1;
        /// Pipe C
        const C = 1 << 2;
        /// Any pipe
        const ANY = Self::A.bits() | Self::B.bits() | Self::C.bits();
    }
}

impl PipeSet {
    /// Check if a pipe is in the set
    #[inline]
    pub const fn has_pipe(self, pipe: PipeIndex) -> bool {
        self.contains(pipe.as_set())
    }

    /// Add a pipe
    #[inline]
    pub fn set_pipe(&mut self, pipe: PipeIndex) {
        self.insert(pipe.as_set());
    }

    /// Remove a pipe
    #[inline]
    pub fn clear_pipe(&mut self, pipe: PipeIndex) {
        self.remove(pipe.as_set());
    }

    /// Restrict the set to the first `count` pipes
    pub fn limited_to(self, count: u32) -> Self {
        let allowed = (1u32 << count.min(3)) - 1;
        Self::from_bits_truncate(self.bits() & allowed)
    }

    /// Iterate the pipes in hardware order
    pub fn pipes(self) -> impl Iterator<Item = PipeIndex> {
        PipeIndex::ALL
            .into_iter()
            .filter(move |pipe| self.has_pipe(*pipe))
    }
}

// =============================================================================
// INTERRUPT RETURN
// =============================================================================

/// Result of an interrupt handler invocation
///
/// Ordered so that merging the results of several sources is `max`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum IrqReturn {
    /// The interrupt was not raised by this device
    Unhandled,
    /// The interrupt was acknowledged
    Handled,
    /// The interrupt was acknowledged and woke threads
    InvokeScheduler,
}

impl IrqReturn {
    /// Merge with another source's result
    #[inline]
    pub fn merge(self, other: Self) -> Self {
        self.max(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec::Vec;

    #[test]
    fn test_pipe_set_ops() {
        let mut set = PipeSet::empty();
        set.set_pipe(PipeIndex::A);
        set.set_pipe(PipeIndex::C);
        assert!(set.has_pipe(PipeIndex::A));
        assert!(!set.has_pipe(PipeIndex::B));
        set.clear_pipe(PipeIndex::A);
        assert_eq!(set, PipeSet::C);
        assert_eq!(PipeSet::ANY.pipes().count(), 3);
    }

    #[test]
    fn test_pipe_set_limit() {
        let limited = PipeSet::ANY.limited_to(2);
        let pipes: Vec<_> = limited.pipes().collect();
        assert_eq!(pipes, [PipeIndex::A, PipeIndex::B]);
    }

    #[test]
    fn test_byte_size_pages() {
        assert_eq!(ByteSize::from_bytes(1).page_aligned().as_bytes(), PAGE_SIZE);
        assert_eq!(ByteSize::from_bytes(PAGE_SIZE + 1).pages(), 2);
        assert_eq!(ByteSize::from_bytes(u64::MAX).pages(), u64::MAX / PAGE_SIZE + 1);
        assert_eq!(ByteSize::from_bytes(u64::MAX - 10).checked_page_aligned(), None);
        assert_eq!(
            ByteSize::from_bytes(3 * PAGE_SIZE).checked_page_aligned(),
            Some(ByteSize::from_bytes(3 * PAGE_SIZE))
        );
        assert_eq!(
            ByteSize::from_bytes(u64::MAX).page_aligned().as_bytes() % PAGE_SIZE,
            0
        );
        assert_eq!(ByteSize::from_pages(16).as_bytes(), 16 * PAGE_SIZE);
    }

    #[test]
    fn test_irq_return_merge() {
        assert_eq!(
            IrqReturn::Unhandled.merge(IrqReturn::Handled),
            IrqReturn::Handled
        );
        assert_eq!(
            IrqReturn::InvokeScheduler.merge(IrqReturn::Handled),
            IrqReturn::InvokeScheduler
        );
    }
}
