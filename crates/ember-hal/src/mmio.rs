//! # Memory-Mapped I/O Operations
//!
//! Register access for Intel display adapters via the register BAR.

use alloc::sync::Arc;
use core::ptr::NonNull;

// =============================================================================
// REGISTER I/O
// =============================================================================

/// 32/16-bit register access over a mapped register space
///
/// Offsets are absolute byte offsets into the mapping. Implementations must
/// tolerate concurrent use from the interrupt handler and attach code;
/// the hardware serializes MMIO on one bus.
pub trait RegisterIo: Send + Sync {
    /// Mapped size in bytes
    fn size(&self) -> u32;

    /// Read a 32-bit register
    fn read32(&self, offset: u32) -> u32;

    /// Write a 32-bit register
    fn write32(&self, offset: u32, value: u32);

    /// Read a 16-bit register
    fn read16(&self, offset: u32) -> u16;

    /// Write a 16-bit register
    fn write16(&self, offset: u32, value: u16);

    /// Read-modify-write: clear `clear`, then set `set`
    fn modify32(&self, offset: u32, clear: u32, set: u32) {
        let value = self.read32(offset);
        self.write32(offset, (value & !clear) | set);
    }
}

impl<T: RegisterIo + ?Sized> RegisterIo for Arc<T> {
    fn size(&self) -> u32 {
        (**self).size()
    }

    fn read32(&self, offset: u32) -> u32 {
        (**self).read32(offset)
    }

    fn write32(&self, offset: u32, value: u32) {
        (**self).write32(offset, value)
    }

    fn read16(&self, offset: u32) -> u16 {
        (**self).read16(offset)
    }

    fn write16(&self, offset: u32, value: u16) {
        (**self).write16(offset, value)
    }
}

// =============================================================================
// MMIO REGION
// =============================================================================

/// Volatile view of a mapped register BAR
#[derive(Debug)]
pub struct MmioRegion {
    base: NonNull<u8>,
    size: u32,
}

impl MmioRegion {
    /// Wrap a mapped register BAR
    ///
    /// # Safety
    /// - `base` must map `size` bytes of device registers
    /// - the mapping must outlive the region
    pub unsafe fn new(base: NonNull<u8>, size: u32) -> Self {
        Self { base, size }
    }

    #[inline]
    fn in_bounds(&self, offset: u32, width: u32) -> bool {
        offset % width == 0 && offset.checked_add(width).is_some_and(|end| end <= self.size)
    }
}

impl RegisterIo for MmioRegion {
    fn size(&self) -> u32 {
        self.size
    }

    fn read32(&self, offset: u32) -> u32 {
        if !self.in_bounds(offset, 4) {
            return 0;
        }
        fence::mmio_read_barrier();
        // SAFETY: offset is aligned and within the mapping (constructor contract)
        unsafe { core::ptr::read_volatile(self.base.as_ptr().add(offset as usize) as *const u32) }
    }

    fn write32(&self, offset: u32, value: u32) {
        if !self.in_bounds(offset, 4) {
            return;
        }
        fence::mmio_write_barrier();
        // SAFETY: offset is aligned and within the mapping (constructor contract)
        unsafe {
            core::ptr::write_volatile(self.base.as_ptr().add(offset as usize) as *mut u32, value)
        }
    }

    fn read16(&self, offset: u32) -> u16 {
        if !self.in_bounds(offset, 2) {
            return 0;
        }
        fence::mmio_read_barrier();
        // SAFETY: see read32
        unsafe { core::ptr::read_volatile(self.base.as_ptr().add(offset as usize) as *const u16) }
    }

    fn write16(&self, offset: u32, value: u16) {
        if !self.in_bounds(offset, 2) {
            return;
        }
        fence::mmio_write_barrier();
        // SAFETY: see write32
        unsafe {
            core::ptr::write_volatile(self.base.as_ptr().add(offset as usize) as *mut u16, value)
        }
    }
}

// SAFETY: MMIO accesses are volatile and serialized by the bus
unsafe impl Send for MmioRegion {}
// SAFETY: see Send
unsafe impl Sync for MmioRegion {}

// =============================================================================
// MMIO UTILS
// =============================================================================

/// Helper to extract fields from register values
pub const fn extract_field(value: u32, low_bit: u8, high_bit: u8) -> u32 {
    let mask = field_mask(low_bit, high_bit);
    (value & mask) >> low_bit
}

/// Helper to insert field into register value
pub const fn insert_field(value: u32, field: u32, low_bit: u8, high_bit: u8) -> u32 {
    let mask = field_mask(low_bit, high_bit);
    (value & !mask) | ((field << low_bit) & mask)
}

const fn field_mask(low_bit: u8, high_bit: u8) -> u32 {
    let width = (high_bit - low_bit + 1) as u32;
    if width >= 32 {
        u32::MAX
    } else {
        ((1u32 << width) - 1) << low_bit
    }
}

// =============================================================================
// MEMORY FENCE OPERATIONS
// =============================================================================

/// Memory barrier types for MMIO
pub mod fence {
    //! Memory barrier operations

    /// Compiler fence (prevents reordering)
    #[inline(always)]
    pub fn compiler() {
        core::sync::atomic::compiler_fence(core::sync::atomic::Ordering::SeqCst);
    }

    /// Memory barrier before MMIO write
    #[inline(always)]
    pub fn mmio_write_barrier() {
        // x86 has a strong memory model, a compiler fence is sufficient
        compiler();
    }

    /// Memory barrier after MMIO read
    #[inline(always)]
    pub fn mmio_read_barrier() {
        compiler();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_extract_insert_field() {
        let strap = 0b10u32 << 29;
        assert_eq!(extract_field(strap, 29, 30), 2);
        assert_eq!(insert_field(0, 3, 29, 30), 3 << 29);
        assert_eq!(extract_field(0xdead_beef, 0, 31), 0xdead_beef);
    }

    #[test]
    fn test_region_bounds() {
        let mut backing = vec![0u32; 4];
        let base = NonNull::new(backing.as_mut_ptr() as *mut u8).unwrap();
        // SAFETY: backing lives until the end of the test
        let region = unsafe { MmioRegion::new(base, 16) };

        region.write32(8, 0x1234_5678);
        assert_eq!(region.read32(8), 0x1234_5678);
        assert_eq!(backing[2], 0x1234_5678);

        region.write32(16, 1);
        assert_eq!(region.read32(16), 0);
        assert_eq!(region.read32(3), 0);

        region.modify32(8, 0xff, 0x1);
        assert_eq!(region.read32(8), 0x1234_5601);
    }
}
