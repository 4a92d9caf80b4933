//! # Clock Detection
//!
//! Reference/min/max PLL frequencies, CD clock, FDI link frequency and raw
//! clock, computed once at attach and published unchanged afterwards.
//! All frequencies are in kHz.

use ember_core::device::{DeviceType, Family, Group};
use ember_core::shared::PllInfo;
use ember_core::PchVariant;
use ember_hal::mmio::extract_field;
use ember_hal::{RegisterIo, RegisterWindow};

use crate::diag::Diagnostics;
use crate::regs::clock as regs;

/// Reference frequency used when the strap is not a supported encoding
pub const DEFAULT_STRAP_REFERENCE: u32 = 24000;

/// Raw clock used for PCHs whose raw clock derivation is not supported
pub const PLACEHOLDER_RAW_CLOCK: u32 = 24000;

/// Fixed PLL limits `(reference, max, min)`
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PllLimits {
    /// Reference frequency
    pub reference: u32,
    /// Maximum frequency
    pub max: u32,
    /// Minimum frequency
    pub min: u32,
}

impl PllLimits {
    const fn new(reference: u32, max: u32, min: u32) -> Self {
        Self { reference, max, min }
    }
}

/// i830 .. i865
pub const LIMITS_8XX: PllLimits = PllLimits::new(48000, 400000, 20000);
/// i915 .. G45
pub const LIMITS_9XX: PllLimits = PllLimits::new(96000, 400000, 20000);
/// DDI parts up to Gen8
pub const LIMITS_DDI: PllLimits = PllLimits::new(135000, 1350000, 25000);
/// Skylake-style display engines
pub const LIMITS_SKYLAKE: PllLimits = PllLimits::new(24000, 1350000, 25000);
/// Everything else
pub const LIMITS_DEFAULT: PllLimits = PllLimits::new(120000, 400000, 20000);

/// Detected clocks
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ClockInfo {
    /// PLL parameters
    pub pll: PllInfo,
    /// Core display clock, if detected for this group
    pub cd_clock: Option<u32>,
    /// FDI link frequency (0 when not applicable)
    pub fdi_link: u32,
    /// Raw clock (0 when not applicable)
    pub raw_clock: u32,
    /// `raw_clock` is the unsupported-PCH placeholder
    pub raw_clock_is_placeholder: bool,
}

/// Derives clocks from classification and strap/fuse registers
#[derive(Debug)]
pub struct ClockDetector<'a, R: RegisterIo + ?Sized> {
    regs: &'a RegisterWindow<'a, R>,
    device: &'a DeviceType,
    pch: PchVariant,
    diag: &'a Diagnostics,
}

impl<'a, R: RegisterIo + ?Sized> ClockDetector<'a, R> {
    /// Create a detector
    pub fn new(
        regs: &'a RegisterWindow<'a, R>,
        device: &'a DeviceType,
        pch: PchVariant,
        diag: &'a Diagnostics,
    ) -> Self {
        Self {
            regs,
            device,
            pch,
            diag,
        }
    }

    /// Run every detection
    pub fn detect(&self) -> ClockInfo {
        let limits = self.pll_limits();
        let (raw_clock, raw_clock_is_placeholder) = self.raw_clock();
        let info = ClockInfo {
            pll: PllInfo {
                reference_frequency: limits.reference,
                max_frequency: limits.max,
                min_frequency: limits.min,
                divisor_register: regs::PLL_DIVISOR_A0,
            },
            cd_clock: self.cd_clock(),
            fdi_link: self.fdi_link_frequency(),
            raw_clock,
            raw_clock_is_placeholder,
        };
        log::info!(
            "EMBER: reference clock {} kHz, pll {}..{} kHz, cd clock {:?}",
            limits.reference,
            limits.min,
            limits.max,
            info.cd_clock
        );
        info
    }

    /// PLL limits for the device
    ///
    /// Gen9+ parts without a Skylake-style display engine read the reference
    /// from the strap; everything else comes from the fixed table.
    pub fn pll_limits(&self) -> PllLimits {
        let device = self.device;
        if device.generation() >= 9 && !device.is_skylake_style() {
            let strap = extract_field(
                self.regs.read(regs::DSSM),
                regs::DSSM_REF_LOW_BIT,
                regs::DSSM_REF_HIGH_BIT,
            );
            PllLimits {
                reference: self.reference_from_strap(strap),
                ..LIMITS_SKYLAKE
            }
        } else if device.is_skylake_style() {
            LIMITS_SKYLAKE
        } else if device.in_family(Family::I8xx) {
            LIMITS_8XX
        } else if device.in_family(Family::I9xx) {
            LIMITS_9XX
        } else if device.has_ddi() {
            LIMITS_DDI
        } else {
            LIMITS_DEFAULT
        }
    }

    /// Decode the 2-bit reference clock strap
    pub fn reference_from_strap(&self, strap: u32) -> u32 {
        match strap {
            0 => 24000,
            1 => 19200,
            2 => 38400,
            other => {
                self.diag.unknown_strap(other);
                DEFAULT_STRAP_REFERENCE
            }
        }
    }

    /// Core display clock (Haswell and Broadwell only)
    pub fn cd_clock(&self) -> Option<u32> {
        let device = self.device;
        let broadwell = device.in_group(Group::Broadwell);
        if !broadwell && !device.in_group(Group::Haswell) {
            return None;
        }

        let lcpll = self.regs.read(regs::LCPLL_CTL);
        let freq = lcpll & regs::LCPLL_CLK_FREQ_MASK;

        let cd_clock = if lcpll & regs::LCPLL_CD_SOURCE_FCLK != 0 {
            800000
        } else if self.regs.read(regs::FUSE_STRAP) & regs::HSW_CDCLK_LIMIT != 0 {
            450000
        } else if freq == regs::LCPLL_CLK_FREQ_450 {
            450000
        } else if broadwell {
            match freq {
                regs::LCPLL_CLK_FREQ_540_BDW => 540000,
                regs::LCPLL_CLK_FREQ_337_5_BDW => 337500,
                _ => 675000,
            }
        } else if device.is_ult() {
            337500
        } else {
            540000
        };
        Some(cd_clock)
    }

    /// FDI link frequency
    pub fn fdi_link_frequency(&self) -> u32 {
        match self.pch {
            PchVariant::Ibx => {
                let fb = self.regs.read(regs::FDI_PLL_BIOS_0) & regs::FDI_PLL_FB_CLOCK_MASK;
                (fb + 2) * 10000
            }
            PchVariant::Cpt | PchVariant::Ppt | PchVariant::Lpt => 270000,
            _ => 0,
        }
    }

    /// Raw clock and whether it is the placeholder value
    pub fn raw_clock(&self) -> (u32, bool) {
        if !self.pch.is_present() {
            (0, false)
        } else if self.pch >= PchVariant::Cnp {
            log::warn!(
                "EMBER: raw clock for {:?} not supported, using {} kHz",
                self.pch,
                PLACEHOLDER_RAW_CLOCK
            );
            (PLACEHOLDER_RAW_CLOCK, true)
        } else {
            let mhz = self.regs.read(regs::PCH_RAWCLK_FREQ) & regs::RAWCLK_FREQ_MASK;
            (mhz * 1000, false)
        }
    }
}
