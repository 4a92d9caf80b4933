//! # Interrupt Controller
//!
//! Display interrupt routing for the three register generations.
//!
//! The strategy is selected once from the device classification and never
//! changes afterwards:
//!
//! | Generation | Strategy | Summary register          |
//! |------------|----------|---------------------------|
//! | 2 ..= 7    | Legacy   | IIR / DE_IIR              |
//! | 8 ..= 10   | Gen8     | master IRQ (0x44200)      |
//! | 11 +       | Gen11    | graphics master (0x190010)|
//!
//! The handler side ([`DisplayInterrupts::handle`]) takes `&self`, holds
//! no locks and only touches registers, the vblank channel atomics and the
//! diagnostics counters. The platform reaches it through the
//! [`InterruptHandler`] registered at install time.

mod gen11;
mod gen8;
mod legacy;

use alloc::sync::Arc;
use core::fmt;
use core::sync::atomic::{AtomicBool, Ordering};

use ember_core::device::DeviceType;
use ember_core::{Error, IrqReturn, PchVariant, PipeSet, Result, VBlankChannel};
use ember_hal::{
    InterruptHandler, InterruptLine, Platform, RegisterIo, RegisterLayout, RegisterWindow,
};

use crate::diag::Diagnostics;

// =============================================================================
// HANDLER CONTEXT
// =============================================================================

/// Everything the interrupt path may touch
#[derive(Debug)]
pub struct IrqContext<'a, R: RegisterIo + ?Sized> {
    /// Register access
    pub regs: RegisterWindow<'a, R>,
    /// Device classification
    pub device: &'a DeviceType,
    /// PCH variant
    pub pch: PchVariant,
    /// Vblank notification channel
    pub channel: &'a VBlankChannel,
    /// Diagnostic counters
    pub diag: &'a Diagnostics,
}

impl<R: RegisterIo + ?Sized> IrqContext<'_, R> {
    /// Pipes this device actually has
    #[inline]
    pub(crate) fn present_pipes(&self, pipes: PipeSet) -> PipeSet {
        pipes.limited_to(self.device.pipe_count())
    }
}

// =============================================================================
// STRATEGY
// =============================================================================

/// Register generation used for display interrupts
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptStrategy {
    /// Single identity register (pre-Gen8)
    Legacy,
    /// Master control with per-pipe identity registers (Gen8 to Gen10)
    Gen8,
    /// Graphics master IRQ in front of the Gen8 display engine (Gen11+)
    Gen11,
}

impl InterruptStrategy {
    /// Select the strategy for a device
    pub fn select(device: &DeviceType) -> Self {
        match device.generation() {
            11.. => Self::Gen11,
            8..=10 => Self::Gen8,
            _ => Self::Legacy,
        }
    }

    /// Enable or disable vblank interrupts for `pipes`
    pub fn enable_pipes<R: RegisterIo + ?Sized>(
        self,
        ctx: &IrqContext<'_, R>,
        pipes: PipeSet,
        enable: bool,
    ) {
        match self {
            Self::Legacy => legacy::enable_pipes(ctx, pipes, enable),
            Self::Gen8 | Self::Gen11 => gen8::enable_pipes(ctx, pipes, enable),
        }
    }

    /// Program the hardware for interrupt delivery
    pub fn arm<R: RegisterIo + ?Sized>(self, ctx: &IrqContext<'_, R>) {
        match self {
            Self::Legacy => legacy::arm(ctx),
            Self::Gen8 => gen8::arm(ctx),
            Self::Gen11 => gen11::arm(ctx),
        }
    }

    /// Stop interrupt delivery
    pub fn disarm<R: RegisterIo + ?Sized>(self, ctx: &IrqContext<'_, R>) {
        match self {
            Self::Legacy => legacy::disarm(ctx),
            Self::Gen8 => gen8::disarm(ctx),
            Self::Gen11 => gen11::disarm(ctx),
        }
    }

    /// Acknowledge pending interrupts
    pub fn handle<R: RegisterIo + ?Sized>(self, ctx: &IrqContext<'_, R>) -> IrqReturn {
        match self {
            Self::Legacy => legacy::handle(ctx),
            Self::Gen8 => gen8::handle(ctx),
            Self::Gen11 => gen11::handle(ctx),
        }
    }
}

// =============================================================================
// DISPLAY INTERRUPTS
// =============================================================================

/// The handler object registered with the host kernel
///
/// Owns everything the interrupt path touches, so the platform can call it
/// from any CPU without reaching into the [`DeviceContext`]. It stays inert
/// until [`InterruptController::install`] arms it, which keeps interrupts
/// on a shared pin line from being claimed before the hardware is set up.
///
/// [`DeviceContext`]: crate::context::DeviceContext
pub struct DisplayInterrupts<R: RegisterIo> {
    registers: R,
    layout: RegisterLayout,
    device: DeviceType,
    pch: PchVariant,
    strategy: InterruptStrategy,
    channel: Arc<VBlankChannel>,
    diag: Diagnostics,
    armed: AtomicBool,
}

impl<R: RegisterIo> DisplayInterrupts<R> {
    /// Bundle the interrupt-path state; the strategy follows `device`
    pub fn new(
        registers: R,
        layout: RegisterLayout,
        device: DeviceType,
        pch: PchVariant,
        channel: Arc<VBlankChannel>,
        diag: Diagnostics,
    ) -> Self {
        Self {
            registers,
            layout,
            strategy: InterruptStrategy::select(&device),
            device,
            pch,
            channel,
            diag,
            armed: AtomicBool::new(false),
        }
    }

    /// Handler view of the state
    pub fn context(&self) -> IrqContext<'_, R> {
        IrqContext {
            regs: self.registers(),
            device: &self.device,
            pch: self.pch,
            channel: &self.channel,
            diag: &self.diag,
        }
    }

    /// Register window over the mapping
    #[inline]
    pub fn registers(&self) -> RegisterWindow<'_, R> {
        RegisterWindow::new(&self.registers, &self.layout)
    }

    /// The raw register mapping
    #[inline]
    pub fn io(&self) -> &R {
        &self.registers
    }

    /// Register block layout
    #[inline]
    pub fn layout(&self) -> &RegisterLayout {
        &self.layout
    }

    /// Classification
    #[inline]
    pub fn device(&self) -> &DeviceType {
        &self.device
    }

    /// PCH variant
    #[inline]
    pub fn pch(&self) -> PchVariant {
        self.pch
    }

    /// Selected strategy
    #[inline]
    pub fn strategy(&self) -> InterruptStrategy {
        self.strategy
    }

    /// Vblank channel
    #[inline]
    pub fn channel(&self) -> &Arc<VBlankChannel> {
        &self.channel
    }

    /// Diagnostic counters
    #[inline]
    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diag
    }

    /// Check the hardware is programmed for delivery
    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    /// Acknowledge pending interrupts
    ///
    /// Claims nothing while disarmed.
    pub fn handle(&self) -> IrqReturn {
        if !self.is_armed() {
            return IrqReturn::Unhandled;
        }
        self.strategy.handle(&self.context())
    }

    fn arm(&self) {
        // Claim before enabling so the first edge is not lost
        self.armed.store(true, Ordering::Release);
        self.strategy.arm(&self.context());
    }

    fn disarm(&self) {
        self.strategy.disarm(&self.context());
        self.armed.store(false, Ordering::Release);
    }
}

impl<R: RegisterIo> InterruptHandler for DisplayInterrupts<R> {
    fn handle_interrupt(&self) -> IrqReturn {
        self.handle()
    }
}

impl<R: RegisterIo> fmt::Debug for DisplayInterrupts<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DisplayInterrupts")
            .field("device", &self.device)
            .field("pch", &self.pch)
            .field("strategy", &self.strategy)
            .field("channel", &self.channel.id())
            .field("armed", &self.is_armed())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Installation state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControllerState {
    /// No handler installed
    Uninstalled,
    /// Handler installed on a line
    Installed(InterruptLine),
}

/// Tracks the line the handler is installed on
#[derive(Debug)]
pub struct InterruptController {
    state: ControllerState,
}

impl Default for InterruptController {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptController {
    /// Controller with nothing installed
    pub const fn new() -> Self {
        Self {
            state: ControllerState::Uninstalled,
        }
    }

    /// Current state
    #[inline]
    pub fn state(&self) -> ControllerState {
        self.state
    }

    /// Check a handler is installed
    #[inline]
    pub fn is_installed(&self) -> bool {
        matches!(self.state, ControllerState::Installed(_))
    }

    /// Line the handler is installed on
    pub fn line(&self) -> Option<InterruptLine> {
        match self.state {
            ControllerState::Installed(line) => Some(line),
            ControllerState::Uninstalled => None,
        }
    }

    /// Hand the channel to the caller, pick a line, register `irq` on it
    /// and arm the hardware
    ///
    /// MSI is preferred when the device offers a vector; otherwise the pin
    /// line is used. Without either, [`Error::NoInterruptLine`] is returned
    /// and nothing is left configured.
    pub fn install<P: Platform, R: RegisterIo + 'static>(
        &mut self,
        platform: &mut P,
        irq: &Arc<DisplayInterrupts<R>>,
    ) -> Result<InterruptLine> {
        if self.is_installed() {
            return Err(Error::Busy);
        }

        irq.channel.set_owner(platform.current_team())?;

        let line = negotiate_line(platform)?;
        let handler: Arc<dyn InterruptHandler> = Arc::<DisplayInterrupts<R>>::clone(irq);
        if let Err(err) = platform.install_interrupt_handler(line.vector(), handler) {
            log::error!("EMBER: could not install handler on {}: {}", line, err);
            if line.is_msi() {
                platform.disable_msi();
                platform.unconfigure_msi();
            }
            return Err(err);
        }

        irq.arm();
        self.state = ControllerState::Installed(line);
        log::info!(
            "EMBER: {:?} interrupts on {} ({})",
            irq.strategy,
            line,
            irq.device.name()
        );
        Ok(line)
    }

    /// Disarm and remove the handler; no-op when not installed
    pub fn uninstall<P: Platform, R: RegisterIo>(
        &mut self,
        platform: &mut P,
        irq: &DisplayInterrupts<R>,
    ) {
        let ControllerState::Installed(line) = self.state else {
            return;
        };

        irq.disarm();
        platform.remove_interrupt_handler(line.vector());
        if line.is_msi() {
            platform.disable_msi();
            platform.unconfigure_msi();
        }
        self.state = ControllerState::Uninstalled;
        log::debug!("EMBER: interrupt handler removed from {}", line);
    }

    /// Enable or disable vblank interrupts at runtime
    pub fn enable_pipes<R: RegisterIo>(
        &self,
        irq: &DisplayInterrupts<R>,
        pipes: PipeSet,
        enable: bool,
    ) -> Result<()> {
        if !self.is_installed() {
            return Err(Error::NoInterruptLine);
        }
        irq.strategy.enable_pipes(&irq.context(), pipes, enable);
        Ok(())
    }
}

fn negotiate_line<P: Platform>(platform: &mut P) -> Result<InterruptLine> {
    let pin = InterruptLine::from_pin(platform.interrupt_line());

    if platform.msi_count() >= 1 {
        match platform.configure_msi(1) {
            Ok(vector) => match platform.enable_msi() {
                Ok(()) => return Ok(InterruptLine::Msi(vector)),
                Err(err) => {
                    log::warn!("EMBER: enabling MSI failed: {}", err);
                    platform.unconfigure_msi();
                }
            },
            Err(err) => log::debug!("EMBER: MSI unavailable: {}", err),
        }
    }

    pin.ok_or_else(|| {
        log::error!("EMBER: no interrupt line or MSI vector available");
        Error::NoInterruptLine
    })
}

/// Release the vblank channel for one pipe event
#[inline]
pub(crate) fn signal_vblank<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>) -> IrqReturn {
    ctx.channel.release_from_interrupt()
}

#[cfg(test)]
pub(crate) mod test_support {
    use alloc::sync::Arc;

    use ember_core::device::DeviceType;
    use ember_core::{PchVariant, VBlankChannel};
    use ember_hal::testing::MockRegisters;
    use ember_hal::{RegisterLayout, RegisterWindow};

    use super::IrqContext;
    use crate::diag::Diagnostics;

    /// Registers, layout and channel for driving a strategy by hand
    pub(crate) struct Bench {
        pub regs: MockRegisters,
        pub layout: RegisterLayout,
        pub device: DeviceType,
        pub pch: PchVariant,
        pub channel: Arc<VBlankChannel>,
        pub diag: Diagnostics,
    }

    impl Bench {
        pub fn new(device_id: u16, pch: PchVariant) -> Self {
            let device = DeviceType::lookup(device_id).unwrap();
            Self {
                regs: MockRegisters::new(0x20_0000),
                layout: RegisterLayout::compute(pch.is_present(), &device),
                device,
                pch,
                channel: VBlankChannel::create(),
                diag: Diagnostics::new(),
            }
        }

        pub fn ctx(&self) -> IrqContext<'_, MockRegisters> {
            IrqContext {
                regs: RegisterWindow::new(&self.regs, &self.layout),
                device: &self.device,
                pch: self.pch,
                channel: &self.channel,
                diag: &self.diag,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_core::TeamId;
    use ember_hal::testing::{MockCall, MockPlatform, MockRegisters};

    #[test]
    fn test_strategy_selection() {
        let cases = [
            (0x2a02, InterruptStrategy::Legacy),
            (0x0116, InterruptStrategy::Legacy),
            (0x0416, InterruptStrategy::Legacy),
            (0x22b0, InterruptStrategy::Gen8),
            (0x1616, InterruptStrategy::Gen8),
            (0x5916, InterruptStrategy::Gen8),
            (0x4e55, InterruptStrategy::Gen11),
            (0x9a49, InterruptStrategy::Gen11),
        ];
        for (id, expected) in cases {
            let device = DeviceType::lookup(id).unwrap();
            assert_eq!(InterruptStrategy::select(&device), expected, "0x{:04x}", id);
        }
    }

    fn display(device_id: u16, pch: PchVariant) -> Arc<DisplayInterrupts<MockRegisters>> {
        let device = DeviceType::lookup(device_id).unwrap();
        Arc::new(DisplayInterrupts::new(
            MockRegisters::new(0x20_0000),
            RegisterLayout::compute(pch.is_present(), &device),
            device,
            pch,
            VBlankChannel::create(),
            Diagnostics::new(),
        ))
    }

    #[test]
    fn test_install_prefers_msi() {
        let irq = display(0x0116, PchVariant::Cpt);
        let mut platform = MockPlatform::new(0x0116);
        let mut controller = InterruptController::new();

        let line = controller.install(&mut platform, &irq).unwrap();
        assert_eq!(line, InterruptLine::Msi(40));
        assert_eq!(controller.state(), ControllerState::Installed(line));
        assert_eq!(irq.channel().owner(), TeamId(100));
        assert_eq!(platform.count(&MockCall::InstallHandler(40)), 1);
        assert!(platform.has_handler(40));
        assert!(irq.is_armed());

        assert_eq!(controller.install(&mut platform, &irq), Err(Error::Busy));

        controller.uninstall(&mut platform, &irq);
        assert!(!controller.is_installed());
        assert!(!irq.is_armed());
        assert!(!platform.has_handler(40));
        assert_eq!(Arc::strong_count(&irq), 1);
        assert_eq!(
            &platform.calls()[platform.calls().len() - 3..],
            [
                MockCall::RemoveHandler(40),
                MockCall::DisableMsi,
                MockCall::UnconfigureMsi
            ]
        );
    }

    #[test]
    fn test_installed_handler_serves_platform() {
        let irq = display(0x1616, PchVariant::Lpt);
        let mut platform = MockPlatform::new(0x1616);
        let regs = irq.io();
        let pending = crate::regs::gen8::MASTER_IRQ_CONTROL
            | crate::regs::gen8::de_pipe_irq(ember_core::PipeIndex::A);
        regs.mark_write_one_to_clear(0x44408, !0);

        // pending vblank before anything is armed stays unclaimed
        regs.set(0x44200, pending);
        regs.set(0x44408, crate::regs::gen8::PIPE_VBLANK);
        assert_eq!(irq.handle(), IrqReturn::Unhandled);
        assert!(regs.accesses().is_empty());
        assert_eq!(platform.raise(40), None);

        let mut controller = InterruptController::new();
        controller.install(&mut platform, &irq).unwrap();
        regs.set(0x44200, pending);
        regs.set(0x44408, crate::regs::gen8::PIPE_VBLANK);
        assert_eq!(platform.raise(40), Some(IrqReturn::Handled));
        assert_eq!(regs.get(0x44408), 0);

        controller.uninstall(&mut platform, &irq);
        assert_eq!(platform.raise(40), None);
        assert_eq!(irq.handle(), IrqReturn::Unhandled);
    }

    #[test]
    fn test_install_falls_back_to_pin() {
        let irq = display(0x2a02, PchVariant::None);
        let mut platform = MockPlatform::new(0x2a02).with_msi_vectors(0);
        let mut controller = InterruptController::new();

        let line = controller.install(&mut platform, &irq).unwrap();
        assert_eq!(line, InterruptLine::Pin(11));
        assert_eq!(platform.count(&MockCall::ConfigureMsi(1)), 0);
        assert!(platform.has_handler(11));

        controller.uninstall(&mut platform, &irq);
        assert_eq!(platform.count(&MockCall::DisableMsi), 0);
        assert_eq!(platform.count(&MockCall::RemoveHandler(11)), 1);
    }

    #[test]
    fn test_install_without_line() {
        let irq = display(0x2a02, PchVariant::None);
        let mut platform = MockPlatform::new(0x2a02).with_interrupt_pin(0);
        platform.fail.configure_msi = true;
        let mut controller = InterruptController::new();

        assert_eq!(
            controller.install(&mut platform, &irq),
            Err(Error::NoInterruptLine)
        );
        assert!(!controller.is_installed());
        assert!(irq.io().accesses().is_empty());
        assert_eq!(irq.handle(), IrqReturn::Unhandled);
        assert_eq!(
            controller.enable_pipes(&irq, PipeSet::ANY, true),
            Err(Error::NoInterruptLine)
        );
        assert_eq!(Arc::strong_count(&irq), 1);
    }

    #[test]
    fn test_handler_install_failure_undoes_msi() {
        let irq = display(0x1616, PchVariant::Lpt);
        let mut platform = MockPlatform::new(0x1616);
        platform.fail.install_handler = true;
        let mut controller = InterruptController::new();

        assert_eq!(
            controller.install(&mut platform, &irq),
            Err(Error::HandlerInstallFailed)
        );
        assert_eq!(platform.count(&MockCall::DisableMsi), 1);
        assert_eq!(platform.count(&MockCall::UnconfigureMsi), 1);
        assert!(irq.io().accesses().is_empty());
        assert!(!irq.is_armed());
        assert_eq!(Arc::strong_count(&irq), 1);
    }

    #[test]
    fn test_deleted_channel_refused() {
        let irq = display(0x2a02, PchVariant::None);
        irq.channel().delete();
        let mut platform = MockPlatform::new(0x2a02);
        let mut controller = InterruptController::new();
        assert_eq!(
            controller.install(&mut platform, &irq),
            Err(Error::ChannelOwnership)
        );
        assert!(platform.calls().is_empty());
    }
}
