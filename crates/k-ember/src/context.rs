//! # Device Context
//!
//! Everything one attached adapter owns. Created by
//! [`attach`](crate::init::attach) and consumed by
//! [`detach`](crate::init::detach).
//!
//! The interrupt path lives in a shared [`DisplayInterrupts`] that the
//! platform holds a second reference to while the handler is installed.
//! Aperture allocation needs `&mut DeviceContext` and never touches it.

use alloc::sync::Arc;
use core::fmt;

use ember_core::{
    AreaId, DeviceType, IrqReturn, PchVariant, PipeSet, Result, SharedInfo, VBlankChannel,
};
use ember_hal::{
    ApertureInfo, InterruptLine, PciLocation, Platform, RegisterLayout, RegisterWindow,
};
use ember_mem::{AllocationFlags, ApertureBlock, ApertureMemoryManager};

use crate::clock::ClockInfo;
use crate::diag::DiagnosticsSnapshot;
use crate::interrupts::{DisplayInterrupts, InterruptController, InterruptStrategy};
use crate::settings::DriverSettings;
use crate::shared::SharedRegion;

/// Fixed-purpose aperture buffers
///
/// Each is `None` when its allocation failed or the feature is off.
#[derive(Debug, Default)]
pub struct FixedBuffers {
    /// Primary command ring
    pub ring: Option<ApertureBlock>,
    /// Overlay register block
    pub overlay: Option<ApertureBlock>,
    /// Hardware status page
    pub status_page: Option<ApertureBlock>,
    /// Hardware cursor memory
    pub cursor: Option<ApertureBlock>,
}

/// One attached adapter
pub struct DeviceContext<P: Platform> {
    pub(crate) location: PciLocation,
    pub(crate) irq: Arc<DisplayInterrupts<P::Registers>>,
    pub(crate) registers_area: AreaId,
    pub(crate) aperture: ApertureMemoryManager<P::Aperture>,
    pub(crate) shared: SharedRegion,
    pub(crate) interrupts: InterruptController,
    pub(crate) buffers: FixedBuffers,
    pub(crate) clocks: ClockInfo,
    pub(crate) settings: DriverSettings,
    pub(crate) interrupt_status: Result<InterruptLine>,
}

impl<P: Platform> DeviceContext<P> {
    // =========================================================================
    // Interrupt path
    // =========================================================================

    /// Register window over the mapping
    #[inline]
    pub fn registers(&self) -> RegisterWindow<'_, P::Registers> {
        self.irq.registers()
    }

    /// Interrupt handler entry point
    ///
    /// The same path the platform reaches through the registered handler.
    /// Returns [`IrqReturn::Unhandled`] in fake-interrupt mode.
    pub fn handle_interrupt(&self) -> IrqReturn {
        self.irq.handle()
    }

    /// Enable or disable vblank interrupts for `pipes`
    pub fn enable_interrupts(&self, pipes: PipeSet, enable: bool) -> Result<()> {
        self.interrupts.enable_pipes(&self.irq, pipes, enable)
    }

    /// Handler object shared with the platform
    pub fn display_interrupts(&self) -> &Arc<DisplayInterrupts<P::Registers>> {
        &self.irq
    }

    // =========================================================================
    // Aperture
    // =========================================================================

    /// Allocate aperture memory for the compositor
    pub fn allocate_memory(
        &mut self,
        size: u64,
        alignment: u64,
        flags: AllocationFlags,
    ) -> Result<ApertureBlock> {
        self.aperture.allocate(size, alignment, flags)
    }

    /// Return aperture memory
    pub fn free_memory(&mut self, block: ApertureBlock) -> Result<()> {
        self.aperture.free(block)
    }

    /// Aperture geometry
    pub fn aperture_info(&self) -> ApertureInfo {
        self.aperture.info()
    }

    /// Fixed-purpose buffers
    pub fn buffers(&self) -> &FixedBuffers {
        &self.buffers
    }

    /// Check a command ring was allocated
    pub fn has_command_ring(&self) -> bool {
        self.buffers.ring.is_some()
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// PCI identity
    pub fn location(&self) -> PciLocation {
        self.location
    }

    /// Classification
    pub fn device(&self) -> &DeviceType {
        self.irq.device()
    }

    /// PCH variant
    pub fn pch(&self) -> PchVariant {
        self.irq.pch()
    }

    /// Register block layout
    pub fn layout(&self) -> &RegisterLayout {
        self.irq.layout()
    }

    /// Area id of the register mapping
    pub fn registers_area(&self) -> AreaId {
        self.registers_area
    }

    /// State shared with the compositor
    pub fn shared_info(&self) -> &SharedInfo {
        self.shared.get()
    }

    /// Area id of the shared state
    pub fn shared_area(&self) -> AreaId {
        self.shared.id()
    }

    /// Vblank channel
    pub fn channel(&self) -> &Arc<VBlankChannel> {
        self.irq.channel()
    }

    /// Interrupt controller
    pub fn interrupts(&self) -> &InterruptController {
        &self.interrupts
    }

    /// Register generation used for display interrupts
    pub fn interrupt_strategy(&self) -> InterruptStrategy {
        self.irq.strategy()
    }

    /// Line the handler was installed on, or why none was
    pub fn interrupt_status(&self) -> Result<InterruptLine> {
        self.interrupt_status
    }

    /// No interrupt delivery: vblank events are unavailable
    pub fn fake_interrupts(&self) -> bool {
        self.interrupt_status.is_err()
    }

    /// Detected clocks
    pub fn clocks(&self) -> &ClockInfo {
        &self.clocks
    }

    /// Settings read at attach
    pub fn settings(&self) -> DriverSettings {
        self.settings
    }

    /// Diagnostic counters
    pub fn diagnostics(&self) -> DiagnosticsSnapshot {
        self.irq.diagnostics().snapshot()
    }
}

impl<P: Platform> fmt::Debug for DeviceContext<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceContext")
            .field("irq", &self.irq)
            .field("layout", self.irq.layout())
            .field("aperture", &self.aperture.info())
            .field("shared", &self.shared)
            .field("interrupts", &self.interrupts)
            .field("buffers", &self.buffers)
            .field("interrupt_status", &self.interrupt_status)
            .finish_non_exhaustive()
    }
}
