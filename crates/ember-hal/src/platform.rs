//! # Platform Abstraction
//!
//! Everything the driver consumes from its host kernel, bundled into one
//! trait so the driver core can be exercised against a recording double.

use alloc::sync::Arc;
use core::ptr::NonNull;

use bitflags::bitflags;
use ember_core::{AreaId, PhysAddr, Result, TeamId};

use crate::aperture::ApertureProvider;
use crate::irq::InterruptHandler;
use crate::mmio::RegisterIo;

bitflags! {
    /// Protection of a kernel area
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct AreaProtection: u32 {
        /// Kernel may read
        const KERNEL_READ = 1 << 0;
        /// Kernel may write
        const KERNEL_WRITE = 1 << 1;
        /// Userland may read
        const USER_READ = 1 << 2;
        /// Userland may write
        const USER_WRITE = 1 << 3;
        /// Area may be cloned into another team
        const CLONEABLE = 1 << 4;
        /// Write-combined caching
        const WRITE_COMBINED = 1 << 5;
    }
}

impl AreaProtection {
    /// Kernel read/write, cloneable by the compositor
    pub const SHARED: Self = Self::KERNEL_READ
        .union(Self::KERNEL_WRITE)
        .union(Self::USER_READ)
        .union(Self::USER_WRITE)
        .union(Self::CLONEABLE);
}

/// A created kernel area
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AreaMapping {
    /// Area id
    pub id: AreaId,
    /// Kernel address of the first byte (8-byte aligned)
    pub address: NonNull<u8>,
    /// Size in bytes
    pub size: usize,
}

/// A PCI base address register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BarInfo {
    /// BAR index
    pub index: u8,
    /// Physical base
    pub physical: PhysAddr,
    /// Size in bytes
    pub size: u64,
}

/// PCI identity and location of the adapter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PciLocation {
    /// Vendor id
    pub vendor_id: u16,
    /// Device id
    pub device_id: u16,
    /// Bus number
    pub bus: u8,
    /// Device number
    pub device: u8,
    /// Function number
    pub function: u8,
}

// =============================================================================
// PLATFORM TRAIT
// =============================================================================

/// Host kernel services consumed by the driver
///
/// Interrupt handler installation, MSI negotiation and area management are
/// only called from attach and detach, never concurrently.
pub trait Platform {
    /// Mapped register space
    type Registers: RegisterIo + 'static;
    /// Mapped graphics aperture
    type Aperture: ApertureProvider;

    /// Get platform name
    fn name(&self) -> &'static str;

    // =========================================================================
    // PCI
    // =========================================================================

    /// Identity of the adapter being attached
    fn pci_location(&self) -> PciLocation;

    /// Device id of the PCH ISA bridge, if one is present
    fn isa_bridge_device_id(&self) -> Option<u16>;

    /// Base address register
    fn bar_info(&self, index: u8) -> Result<BarInfo>;

    /// Power the device up and enable memory decoding and bus mastering
    fn enable_device(&mut self) -> Result<()>;

    // =========================================================================
    // Areas
    // =========================================================================

    /// Create a zero-filled kernel area
    fn create_area(
        &mut self,
        name: &str,
        size: usize,
        protection: AreaProtection,
    ) -> Result<AreaMapping>;

    /// Delete a kernel area
    fn delete_area(&mut self, id: AreaId);

    /// Map a register BAR into a kernel area
    fn map_registers(
        &mut self,
        bar: &BarInfo,
        protection: AreaProtection,
    ) -> Result<(AreaId, Self::Registers)>;

    /// Map the graphics aperture
    fn map_aperture(&mut self) -> Result<Self::Aperture>;

    /// Unmap the graphics aperture
    fn unmap_aperture(&mut self, aperture: Self::Aperture);

    // =========================================================================
    // Interrupts
    // =========================================================================

    /// Raw interrupt pin line from config space
    fn interrupt_line(&self) -> u8;

    /// Number of MSI vectors the device supports
    fn msi_count(&self) -> u8;

    /// Allocate `count` MSI vectors, returning the first
    fn configure_msi(&mut self, count: u8) -> Result<u8>;

    /// Enable message-signaled delivery
    fn enable_msi(&mut self) -> Result<()>;

    /// Disable message-signaled delivery
    fn disable_msi(&mut self);

    /// Release MSI vectors
    fn unconfigure_msi(&mut self);

    /// Dispatch `vector` to `handler`
    ///
    /// The handler may be called as soon as this returns, possibly for an
    /// interrupt raised by another device sharing a pin line.
    fn install_interrupt_handler(
        &mut self,
        vector: u8,
        handler: Arc<dyn InterruptHandler>,
    ) -> Result<()>;

    /// Stop dispatching `vector` and drop the handler
    fn remove_interrupt_handler(&mut self, vector: u8);

    // =========================================================================
    // Misc
    // =========================================================================

    /// Team of the caller attaching the device
    fn current_team(&self) -> TeamId;

    /// EDID block left by the boot loader
    fn boot_edid(&self) -> Option<[u8; 128]>;

    /// Boolean driver setting
    fn setting_bool(&self, key: &str, default: bool) -> bool;
}
