//! # Power State Controller
//!
//! Chipset clock gating and the SandyBridge/IvyBridge RC6 + render
//! P-state (downclocking) programming sequence.

use ember_core::device::{DeviceType, Group};
use ember_core::{Error, Result};
use ember_hal::{RegisterIo, RegisterWindow};

use crate::regs::{gating, power as regs};

/// RC6 depth permitted; deeper states are never enabled
pub const RC6_DEPTH: u32 = 1;

/// Values read from the capability registers while downclocking
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderPState {
    /// Highest render P-state reported by the hardware
    pub max: u32,
    /// Lowest render P-state reported by the hardware
    pub min: u32,
    /// Requested frequency after clamping into `[min, max]`
    pub requested: u32,
}

/// Clock gating and render power programming
#[derive(Debug)]
pub struct PowerStateController<'a, R: RegisterIo + ?Sized> {
    regs: &'a RegisterWindow<'a, R>,
    device: &'a DeviceType,
}

impl<'a, R: RegisterIo + ?Sized> PowerStateController<'a, R> {
    /// Create a controller
    pub fn new(regs: &'a RegisterWindow<'a, R>, device: &'a DeviceType) -> Self {
        Self { regs, device }
    }

    /// Disable display clock gating where the chipset needs it
    ///
    /// Writes nothing for groups other than SandyBridge, IvyBridge and
    /// ValleyView.
    pub fn enable_clock_gating(&self) {
        match self.device.group() {
            Group::SandyBridge => {
                self.regs
                    .write(gating::PCH_DSPCLK_GATE_D, gating::SNB_DSPCLK_GATE);
                self.regs.write(gating::MI_ARB_STATE, gating::SNB_MI_ARB);
            }
            Group::IvyBridge => {
                self.regs
                    .write(gating::PCH_DSPCLK_GATE_D, gating::IVB_DSPCLK_GATE);
            }
            Group::ValleyView => {
                self.regs
                    .write(gating::VLV_DSPCLK_GATE_D, gating::VLV_DSPCLK_GATE);
            }
            _ => return,
        }
        log::debug!("EMBER: clock gating programmed for {}", self.device.name());
    }

    /// Check whether downclocking may be enabled, touching no register
    pub fn check_downclocking(&self) -> Result<()> {
        let device = self.device;
        if !device.in_group(Group::SandyBridge) && !device.in_group(Group::IvyBridge) {
            return Err(Error::NotSupported);
        }
        if !device.is_mobile() {
            return Err(Error::NotAllowed);
        }
        Ok(())
    }

    /// Enable RC6 and render P-state management
    ///
    /// Refuses with [`Error::NotSupported`] outside SandyBridge/IvyBridge and
    /// with [`Error::NotAllowed`] on non-mobile parts, without any register
    /// access. Otherwise the whole sequence below is issued in order; each
    /// step relies on the previous one having taken effect.
    pub fn enable_downclocking(&self) -> Result<RenderPState> {
        self.check_downclocking()?;
        let r = self.regs;

        // Quiesce
        r.write(regs::RC_STATE, 0);

        let cap = r.read(regs::RP_STATE_CAP);
        let perf = r.read(regs::GT_PERF_STATUS);
        let max = cap & 0xff;
        let min = (cap >> 16) & 0xff;

        r.write(regs::RC_CONTROL, 0);

        // Wake rate limits and evaluation
        r.write(regs::RC1_WAKE_RATE_LIMIT, 1000 << 16);
        r.write(regs::RC6_WAKE_RATE_LIMIT, (40 << 16) | 30);
        r.write(regs::RC6PP_WAKE_RATE_LIMIT, 30);
        r.write(regs::RC_EVALUATION_INTERVAL, 125000);
        r.write(regs::RC_IDLE_HYSTERESIS, 25);
        r.write(regs::RC_SLEEP, 0);

        // Per-depth thresholds
        r.write(regs::RC1E_THRESHOLD, 1000);
        r.write(regs::RC6_THRESHOLD, 50000);
        r.write(regs::RC6P_THRESHOLD, 100000);
        r.write(regs::RC6PP_THRESHOLD, 64000);

        r.write(
            regs::RC_CONTROL,
            rc6_mask(RC6_DEPTH) | regs::rc_ctl_ei_mode(1) | regs::RC_CTL_HW_ENABLE,
        );

        // Turbo request
        r.write(
            regs::RPNSWREQ,
            regs::frequency(10) | regs::offset(0) | regs::AGGRESSIVE_TURBO,
        );
        r.write(regs::RC_VIDEO_FREQ, regs::frequency(12));

        r.write(regs::RP_DOWN_TIMEOUT, 1000000);
        r.write(regs::RP_INTERRUPT_LIMITS, (max << 24) | (min << 16));

        r.write(regs::RP_UP_THRESHOLD, 59400);
        r.write(regs::RP_DOWN_THRESHOLD, 245000);
        r.write(regs::RP_UP_EI, 66000);
        r.write(regs::RP_DOWN_EI, 350000);
        r.write(regs::RP_IDLE_HYSTERESIS, 10);

        r.write(
            regs::RP_CONTROL,
            regs::RP_MEDIA_TURBO
                | regs::RP_MEDIA_HW_NORMAL_MODE
                | regs::RP_MEDIA_IS_GFX
                | regs::RP_ENABLE
                | regs::RP_UP_BUSY_AVG
                | regs::RP_DOWN_IDLE_CONT,
        );

        // Clamp the current level into the reported range
        let mut requested = ((perf >> 8) & 0xff).min(max);
        let mut limits = max << 24;
        if requested <= min {
            requested = min;
            limits |= min << 16;
        }
        r.write(regs::RP_INTERRUPT_LIMITS, limits);
        r.write(
            regs::RPNSWREQ,
            regs::frequency(requested) | regs::offset(0) | regs::AGGRESSIVE_TURBO,
        );

        // Deferred PM interrupts
        r.write(regs::PMIER, regs::PM_DEFERRED_EVENTS);
        r.write(regs::PMIMR, 0);
        r.write(regs::PMINTRMSK, 0);

        log::info!(
            "EMBER: downclocking enabled, render P-state {} in [{}, {}]",
            requested,
            min,
            max
        );
        Ok(RenderPState {
            max,
            min,
            requested,
        })
    }
}

/// RC6 enable bits permitted at a depth
const fn rc6_mask(depth: u32) -> u32 {
    let mut mask = 0;
    if depth >= 1 {
        mask |= regs::RC_CTL_RC6_ENABLE;
    }
    if depth >= 2 {
        mask |= regs::RC_CTL_RC6P_ENABLE;
    }
    if depth >= 3 {
        mask |= regs::RC_CTL_RC6PP_ENABLE;
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;
    use ember_hal::testing::{Access, MockRegisters};
    use ember_hal::RegisterLayout;

    fn run<T>(device_id: u16, f: impl FnOnce(&PowerStateController<'_, MockRegisters>) -> T) -> (T, MockRegisters) {
        let device = DeviceType::lookup(device_id).unwrap();
        let regs = MockRegisters::new(0x20_0000);
        let layout = RegisterLayout::compute(true, &device);
        let result = {
            let window = RegisterWindow::new(&regs, &layout);
            let controller = PowerStateController::new(&window, &device);
            f(&controller)
        };
        (result, regs)
    }

    #[test]
    fn test_refusal_touches_nothing() {
        // SandyBridge desktop
        let (result, regs) = run(0x0102, |c| c.enable_downclocking());
        assert_eq!(result, Err(Error::NotAllowed));
        assert!(regs.accesses().is_empty());

        // Haswell mobile
        let (result, regs) = run(0x0416, |c| c.enable_downclocking());
        assert_eq!(result, Err(Error::NotSupported));
        assert!(regs.accesses().is_empty());
    }

    #[test]
    fn test_downclocking_sequence() {
        let device = DeviceType::lookup(0x0116).unwrap();
        let regs = MockRegisters::new(0x20_0000);
        // min 3, max 17
        regs.set(0x145998, (3 << 16) | 17);
        // current level 12
        regs.set(0x145948, 12 << 8);
        let layout = RegisterLayout::compute(true, &device);
        let window = RegisterWindow::new(&regs, &layout);

        let state = PowerStateController::new(&window, &device)
            .enable_downclocking()
            .unwrap();
        assert_eq!(
            state,
            RenderPState {
                max: 17,
                min: 3,
                requested: 12
            }
        );

        let accesses = regs.accesses();
        assert_eq!(accesses[0], Access::Write(0xa094, 0));
        assert_eq!(accesses[1], Access::Read(0x145998));
        assert_eq!(accesses[2], Access::Read(0x145948));
        assert_eq!(accesses[3], Access::Write(0xa090, 0));
        assert_eq!(
            regs.writes_to(0xa090),
            [0, (1 << 18) | (1 << 27) | (1 << 31)]
        );
        assert_eq!(regs.writes_to(0xa014), [(17 << 24) | (3 << 16), 17 << 24]);
        assert_eq!(regs.writes_to(0xa008), [10 << 25, 12 << 25]);
        assert_eq!(
            *accesses.last().unwrap(),
            Access::Write(0xa168, 0)
        );
    }

    #[test]
    fn test_requested_level_clamped() {
        let device = DeviceType::lookup(0x0166).unwrap();
        let regs = MockRegisters::new(0x20_0000);
        regs.set(0x145998, (6 << 16) | 20);
        regs.set(0x145948, 2 << 8);
        let layout = RegisterLayout::compute(true, &device);
        let window = RegisterWindow::new(&regs, &layout);

        let state = PowerStateController::new(&window, &device)
            .enable_downclocking()
            .unwrap();
        assert_eq!(state.requested, 6);
        assert_eq!(
            regs.writes_to(0xa014).last().copied(),
            Some((20 << 24) | (6 << 16))
        );

        regs.set(0x145948, 40 << 8);
        regs.clear_log();
        let state = PowerStateController::new(&window, &device)
            .enable_downclocking()
            .unwrap();
        assert_eq!(state.requested, 20);
    }

    #[test]
    fn test_clock_gating_groups() {
        let (_, regs) = run(0x0116, |c| c.enable_clock_gating());
        assert_eq!(
            regs.writes(),
            [(0x42020, (1 << 28) | (1 << 7) | (1 << 5)), (0x7408, 0x10)]
        );

        let (_, regs) = run(0x0162, |c| c.enable_clock_gating());
        assert_eq!(regs.writes(), [(0x42020, 1 << 28)]);

        let (_, regs) = run(0x0f30, |c| c.enable_clock_gating());
        assert_eq!(regs.writes(), [(0x186200, 1 << 28)]);

        let (_, regs) = run(0x1916, |c| c.enable_clock_gating());
        assert!(regs.accesses().is_empty());
    }

    #[test]
    fn test_rc6_depth_policy() {
        assert_eq!(rc6_mask(RC6_DEPTH), regs::RC_CTL_RC6_ENABLE);
        assert_eq!(
            rc6_mask(3),
            regs::RC_CTL_RC6_ENABLE | regs::RC_CTL_RC6P_ENABLE | regs::RC_CTL_RC6PP_ENABLE
        );
    }
}
