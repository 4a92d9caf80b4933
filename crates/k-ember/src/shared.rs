//! # Shared Region
//!
//! Owner of the kernel area holding [`SharedInfo`]. The area is cloneable
//! into the compositor's team; the kernel side is the only writer.

use core::fmt;
use core::mem::{align_of, size_of};
use core::ptr::NonNull;

use ember_core::{AreaId, ByteSize, Error, Result, SharedInfo};
use ember_hal::AreaMapping;

/// Name of the shared area
pub const SHARED_AREA_NAME: &str = "ember shared info";

/// Size of the shared area (whole pages)
pub const SHARED_AREA_SIZE: usize =
    ByteSize::from_bytes(size_of::<SharedInfo>() as u64).page_aligned().as_bytes() as usize;

/// Typed view of the shared area
pub struct SharedRegion {
    area: AreaMapping,
    info: NonNull<SharedInfo>,
}

// SAFETY: the region exclusively owns the area for its lifetime and hands
// out references only through `&self`/`&mut self`.
unsafe impl Send for SharedRegion {}
// SAFETY: shared access is read-only.
unsafe impl Sync for SharedRegion {}

impl SharedRegion {
    /// Take over a freshly created area and initialize it
    ///
    /// # Safety
    ///
    /// `area.address` must be valid for reads and writes of `area.size`
    /// bytes until the region is dropped or [`SharedRegion::into_area`] is
    /// called, and must not be accessed through any other kernel pointer.
    pub unsafe fn new(area: AreaMapping) -> Result<Self> {
        if area.size < size_of::<SharedInfo>() {
            return Err(Error::InvalidParameter);
        }
        if area.address.as_ptr() as usize % align_of::<SharedInfo>() != 0 {
            return Err(Error::MisalignedAddress);
        }

        let info = area.address.cast::<SharedInfo>();
        // SAFETY: size and alignment checked above, validity is the
        // caller's contract.
        unsafe { info.as_ptr().write(SharedInfo::new()) };
        Ok(Self { area, info })
    }

    /// Area id handed to the compositor
    #[inline]
    pub fn id(&self) -> AreaId {
        self.area.id
    }

    /// Read the shared state
    #[inline]
    pub fn get(&self) -> &SharedInfo {
        // SAFETY: initialized in `new`, exclusively owned.
        unsafe { self.info.as_ref() }
    }

    /// Update the shared state
    #[inline]
    pub fn get_mut(&mut self) -> &mut SharedInfo {
        // SAFETY: initialized in `new`, exclusively owned, `&mut self`.
        unsafe { self.info.as_mut() }
    }

    /// Give the area back for deletion
    pub fn into_area(self) -> AreaMapping {
        self.area
    }
}

impl fmt::Debug for SharedRegion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedRegion")
            .field("id", &self.area.id)
            .field("size", &self.area.size)
            .finish()
    }
}
