//! # Graphics Aperture Provider
//!
//! Contract for the GART/aperture collaborator: it maps the aperture and
//! binds physically contiguous backing for fixed-function buffers. Range
//! bookkeeping inside the aperture lives in `ember-mem`.

use ember_core::{PhysAddr, Result};

/// A mapped graphics aperture
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ApertureInfo {
    /// Kernel virtual base of the mapping
    pub base: usize,
    /// Physical base of the aperture
    pub physical_base: PhysAddr,
    /// Aperture size in bytes
    pub size: u64,
}

/// Graphics aperture provider
pub trait ApertureProvider {
    /// Aperture geometry
    fn info(&self) -> ApertureInfo;

    /// Back `[offset, offset + size)` with physically contiguous memory
    ///
    /// Returns the physical address fixed-function hardware must use.
    fn bind_physical(&mut self, offset: u64, size: u64) -> Result<PhysAddr>;

    /// Release backing bound by [`ApertureProvider::bind_physical`]
    fn unbind_physical(&mut self, offset: u64, size: u64);
}
