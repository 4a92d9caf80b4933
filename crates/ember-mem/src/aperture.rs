//! # Aperture Memory Manager
//!
//! Carves fixed-purpose buffers out of the mapped graphics aperture.
//! Blocks requested with [`AllocationFlags::NEED_PHYSICAL`] are also backed
//! by physically contiguous memory, since fixed-function hardware (overlay,
//! status page, cursor) does not go through the aperture translation.

use core::fmt;

use bitflags::bitflags;
use ember_core::{ByteSize, Error, PhysAddr, Result};
use ember_hal::aperture::{ApertureInfo, ApertureProvider};

use crate::range::{AperRange, RangeAllocator};

bitflags! {
    /// Aperture allocation flags
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AllocationFlags: u32 {
        /// Block needs a physical address valid for fixed-function access
        const NEED_PHYSICAL = 1 << 0;
    }
}

// =============================================================================
// APERTURE BLOCK
// =============================================================================

/// An allocated aperture block
///
/// Not `Clone`: the block is consumed by [`ApertureMemoryManager::free`].
#[derive(PartialEq, Eq)]
#[must_use = "aperture blocks must be returned with ApertureMemoryManager::free"]
pub struct ApertureBlock {
    range: AperRange,
    physical: Option<PhysAddr>,
}

impl ApertureBlock {
    /// Offset within the aperture
    #[inline]
    pub fn offset(&self) -> u64 {
        self.range.start
    }

    /// Size in bytes (page rounded)
    #[inline]
    pub fn size(&self) -> u64 {
        self.range.size()
    }

    /// Physical address, if one was requested
    #[inline]
    pub fn physical(&self) -> Option<PhysAddr> {
        self.physical
    }

    /// Kernel virtual address given the aperture base
    #[inline]
    pub fn address(&self, info: &ApertureInfo) -> usize {
        info.base + self.range.start as usize
    }
}

impl fmt::Debug for ApertureBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApertureBlock")
            .field("offset", &format_args!("0x{:x}", self.range.start))
            .field("size", &ByteSize::from_bytes(self.range.size()))
            .field("physical", &self.physical)
            .finish()
    }
}

// =============================================================================
// MANAGER
// =============================================================================

/// Aperture allocator owning the provider
#[derive(Debug)]
pub struct ApertureMemoryManager<A: ApertureProvider> {
    provider: A,
    info: ApertureInfo,
    ranges: RangeAllocator,
}

impl<A: ApertureProvider> ApertureMemoryManager<A> {
    /// Manage a mapped aperture
    pub fn new(provider: A) -> Self {
        let info = provider.info();
        log::debug!(
            "EMBER: aperture at {} ({:?})",
            info.physical_base,
            ByteSize::from_bytes(info.size)
        );
        Self {
            ranges: RangeAllocator::new(info.size),
            info,
            provider,
        }
    }

    /// Aperture geometry
    #[inline]
    pub fn info(&self) -> ApertureInfo {
        self.info
    }

    /// The provider
    #[inline]
    pub fn provider(&self) -> &A {
        &self.provider
    }

    /// Allocate a block
    ///
    /// `size` is rounded up to whole pages and `alignment` to at least a
    /// page. If physical backing was requested and cannot be bound, the
    /// range is returned to the allocator and the bind error is reported.
    pub fn allocate(
        &mut self,
        size: u64,
        alignment: u64,
        flags: AllocationFlags,
    ) -> Result<ApertureBlock> {
        let size = ByteSize::from_bytes(size)
            .checked_page_aligned()
            .ok_or(Error::InvalidParameter)?;
        let range = self.ranges.allocate(size, alignment)?;

        let physical = if flags.contains(AllocationFlags::NEED_PHYSICAL) {
            match self.provider.bind_physical(range.start, range.size()) {
                Ok(physical) => Some(physical),
                Err(err) => {
                    log::warn!(
                        "EMBER: physical bind of 0x{:x} bytes failed: {}",
                        range.size(),
                        err
                    );
                    self.ranges.free(range)?;
                    return Err(err);
                }
            }
        } else {
            None
        };

        log::trace!(
            "EMBER: aperture block 0x{:x}+0x{:x} (physical: {:?})",
            range.start,
            range.size(),
            physical
        );
        Ok(ApertureBlock { range, physical })
    }

    /// Free a block
    pub fn free(&mut self, block: ApertureBlock) -> Result<()> {
        if block.physical.is_some() {
            self.provider
                .unbind_physical(block.range.start, block.range.size());
        }
        self.ranges.free(block.range)
    }

    /// Free bytes
    pub fn free_space(&self) -> ByteSize {
        self.ranges.free_space()
    }

    /// Allocated bytes
    pub fn allocated(&self) -> ByteSize {
        ByteSize::from_bytes(self.ranges.stats().allocated)
    }

    /// Give the provider back for unmapping
    pub fn release(self) -> A {
        if self.ranges.stats().allocated != 0 {
            log::warn!(
                "EMBER: releasing aperture with {:?} still allocated",
                self.allocated()
            );
        }
        self.provider
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::PAGE_SIZE;
    use ember_hal::testing::MockAperture;

    fn manager() -> ApertureMemoryManager<MockAperture> {
        ApertureMemoryManager::new(MockAperture::new(0xd000_0000, 1024 * PAGE_SIZE))
    }

    #[test]
    fn test_round_trip_no_leak_and_reuse() {
        let mut aperture = manager();
        let before = aperture.free_space();

        let block = aperture.allocate(3 * PAGE_SIZE, 0, AllocationFlags::empty()).unwrap();
        let offset = block.offset();
        assert!(aperture.free_space() < before);
        aperture.free(block).unwrap();
        assert!(aperture.free_space() >= before);

        let again = aperture.allocate(3 * PAGE_SIZE, 0, AllocationFlags::empty()).unwrap();
        assert_eq!(again.offset(), offset);
        aperture.free(again).unwrap();
    }

    #[test]
    fn test_page_rounding() {
        let mut aperture = manager();
        let block = aperture.allocate(100, 0, AllocationFlags::empty()).unwrap();
        assert_eq!(block.size(), PAGE_SIZE);
        assert_eq!(block.physical(), None);
        aperture.free(block).unwrap();
    }

    #[test]
    fn test_physical_binding() {
        let mut aperture = manager();
        let ring = aperture.allocate(16 * PAGE_SIZE, 0, AllocationFlags::empty()).unwrap();
        let status = aperture
            .allocate(PAGE_SIZE, 0, AllocationFlags::NEED_PHYSICAL)
            .unwrap();
        assert_eq!(
            status.physical(),
            Some(PhysAddr::new(0xd000_0000 + status.offset()))
        );
        assert_eq!(aperture.provider().bound().len(), 1);

        aperture.free(status).unwrap();
        assert!(aperture.provider().bound().is_empty());
        aperture.free(ring).unwrap();
        assert_eq!(aperture.allocated().as_bytes(), 0);
    }

    #[test]
    fn test_oversized_request_rejected() {
        let mut aperture = manager();
        let before = aperture.free_space();
        assert_eq!(
            aperture.allocate(u64::MAX - 10, 0, AllocationFlags::empty()),
            Err(Error::InvalidParameter)
        );
        assert_eq!(
            aperture.allocate(u64::MAX & !(PAGE_SIZE - 1), 0, AllocationFlags::empty()),
            Err(Error::OutOfMemory)
        );
        assert_eq!(
            aperture.allocate(PAGE_SIZE, 1 << 63, AllocationFlags::empty()),
            Err(Error::OutOfMemory)
        );
        assert_eq!(aperture.free_space(), before);
    }

    #[test]
    fn test_bind_failure_returns_range() {
        let mut aperture = ApertureMemoryManager::new(
            MockAperture::new(0xd000_0000, 64 * PAGE_SIZE).fail_binds(),
        );
        let before = aperture.free_space();
        let result = aperture.allocate(PAGE_SIZE, 0, AllocationFlags::NEED_PHYSICAL);
        assert_eq!(result, Err(Error::PhysicalBindFailed));
        assert_eq!(aperture.free_space(), before);
    }
}
