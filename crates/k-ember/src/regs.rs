//! # Register Map
//!
//! Display, interrupt, clock and power registers used by the kernel core,
//! named by logical block where the block moves between chip generations.

// =============================================================================
// LEGACY DISPLAY INTERRUPTS (pre-Gen8)
// =============================================================================

/// Legacy interrupt registers and bits
pub mod legacy {
    use ember_hal::layout::Register;

    /// Interrupt enable (no PCH)
    pub const IER: Register = Register::north_shared(0x20a0);
    /// Interrupt identity (no PCH, 16-bit)
    pub const IIR: Register = Register::north_shared(0x20a4);
    /// Interrupt mask (no PCH)
    pub const IMR: Register = Register::north_shared(0x20a8);
    /// Interrupt status (no PCH)
    pub const ISR: Register = Register::north_shared(0x20ac);

    /// Display engine interrupt enable (PCH)
    pub const DE_IER: Register = Register::flat(0x4400c);
    /// Display engine interrupt identity (PCH)
    pub const DE_IIR: Register = Register::flat(0x44008);
    /// Display engine interrupt mask (PCH)
    pub const DE_IMR: Register = Register::flat(0x44004);
    /// Display engine interrupt status (PCH)
    pub const DE_ISR: Register = Register::flat(0x44000);

    /// Pipe A display status
    pub const PIPE_A_STATUS: Register = Register::north_plane_control(0x0024);
    /// Pipe B display status
    pub const PIPE_B_STATUS: Register = Register::north_plane_control(0x1024);

    /// Pipe status: vblank occurred (write one to clear)
    pub const PIPE_VBLANK_STATUS: u32 = 1 << 1;
    /// Pipe status: vblank interrupt enabled
    pub const PIPE_VBLANK_ENABLED: u32 = 1 << 17;

    /// Vblank pipe A without a PCH
    pub const VBLANK_PIPE_A: u32 = 1 << 7;
    /// Vblank pipe B without a PCH
    pub const VBLANK_PIPE_B: u32 = 1 << 5;

    /// Vblank pipe A on Ironlake/SandyBridge
    pub const VBLANK_PIPE_A_SNB: u32 = 1 << 7;
    /// Vblank pipe B on Ironlake/SandyBridge
    pub const VBLANK_PIPE_B_SNB: u32 = 1 << 15;

    /// Vblank pipe A with a later PCH
    pub const PCH_VBLANK_PIPE_A: u32 = 1 << 0;
    /// Vblank pipe B with a later PCH
    pub const PCH_VBLANK_PIPE_B: u32 = 1 << 5;
    /// Vblank pipe C with a later PCH
    pub const PCH_VBLANK_PIPE_C: u32 = 1 << 10;

    /// Series 5 master enable, set on enable only
    pub const GLOBAL_ENABLE_SER5: u32 = 1 << 31;
}

// =============================================================================
// GEN8 DISPLAY ENGINE INTERRUPTS
// =============================================================================

/// Gen8+ display engine interrupt registers and bits
pub mod gen8 {
    use ember_core::PipeIndex;
    use ember_hal::layout::Register;

    /// Master interrupt control / pending summary
    pub const MASTER_IRQ: Register = Register::flat(0x44200);
    /// Master enable bit
    pub const MASTER_IRQ_CONTROL: u32 = 1 << 31;

    /// Pending bit of a pipe in the master register
    pub const fn de_pipe_irq(pipe: PipeIndex) -> u32 {
        1 << (16 + pipe.index())
    }
    /// All pipe pending bits
    pub const DE_PIPE_IRQ_MASK: u32 = 0x7 << 16;
    /// Display port interrupt pending
    pub const DE_PORT_IRQ: u32 = 1 << 20;
    /// Misc display interrupt pending
    pub const DE_MISC_IRQ: u32 = 1 << 22;
    /// South display engine (PCH) interrupt pending
    pub const DE_PCH_IRQ: u32 = 1 << 23;

    const DE_PIPE_BASE: u32 = 0x44400;

    /// Pipe interrupt status
    pub const fn pipe_isr(pipe: PipeIndex) -> Register {
        Register::flat(DE_PIPE_BASE + 0x10 * pipe.index())
    }
    /// Pipe interrupt mask
    pub const fn pipe_imr(pipe: PipeIndex) -> Register {
        Register::flat(DE_PIPE_BASE + 0x10 * pipe.index() + 0x4)
    }
    /// Pipe interrupt identity
    pub const fn pipe_iir(pipe: PipeIndex) -> Register {
        Register::flat(DE_PIPE_BASE + 0x10 * pipe.index() + 0x8)
    }
    /// Pipe interrupt enable
    pub const fn pipe_ier(pipe: PipeIndex) -> Register {
        Register::flat(DE_PIPE_BASE + 0x10 * pipe.index() + 0xc)
    }
    /// Pipe vblank bit
    pub const PIPE_VBLANK: u32 = 1 << 0;

    /// Display port interrupt status
    pub const DE_PORT_ISR: Register = Register::flat(0x44440);
    /// Display port interrupt mask
    pub const DE_PORT_IMR: Register = Register::flat(0x44444);
    /// Display port interrupt identity
    pub const DE_PORT_IIR: Register = Register::flat(0x44448);
    /// Display port interrupt enable
    pub const DE_PORT_IER: Register = Register::flat(0x4444c);

    /// AUX channel A done
    pub const AUX_CHANNEL_A: u32 = 1 << 0;
    /// AUX channel B done
    pub const AUX_CHANNEL_B: u32 = 1 << 25;
    /// AUX channel C done
    pub const AUX_CHANNEL_C: u32 = 1 << 26;
    /// AUX channel D done
    pub const AUX_CHANNEL_D: u32 = 1 << 27;
    /// AUX channel F done
    pub const AUX_CHANNEL_F: u32 = 1 << 28;
    /// AUX channel E done
    pub const AUX_CHANNEL_E: u32 = 1 << 29;

    /// Misc interrupt status
    pub const DE_MISC_ISR: Register = Register::flat(0x44460);
    /// Misc interrupt mask
    pub const DE_MISC_IMR: Register = Register::flat(0x44464);
    /// Misc interrupt identity
    pub const DE_MISC_IIR: Register = Register::flat(0x44468);
    /// Misc interrupt enable
    pub const DE_MISC_IER: Register = Register::flat(0x4446c);
    /// eDP panel self refresh event
    pub const DE_EDP_PSR: u32 = 1 << 19;
}

// =============================================================================
// GEN11 INTERRUPTS
// =============================================================================

/// Gen11+ graphics master and display hotplug registers
pub mod gen11 {
    use ember_hal::layout::Register;

    /// Graphics master interrupt control
    pub const GFX_MSTR_IRQ: Register = Register::flat(0x190010);
    /// Global master enable
    pub const MASTER_IRQ: u32 = 1 << 31;
    /// Display interrupt pending
    pub const DISPLAY_IRQ: u32 = 1 << 16;

    /// Display interrupt control (shares the Gen8 master offset)
    pub const DISPLAY_INT_CTL: Register = Register::flat(0x44200);
    /// Display interrupt enable
    pub const DISPLAY_IRQ_ENABLE: u32 = 1 << 31;

    /// Display hotplug interrupt pending
    pub const DE_HPD_IRQ: u32 = 1 << 21;

    /// Display hotplug interrupt status
    pub const DE_HPD_ISR: Register = Register::flat(0x44470);
    /// Display hotplug interrupt mask
    pub const DE_HPD_IMR: Register = Register::flat(0x44474);
    /// Display hotplug interrupt identity
    pub const DE_HPD_IIR: Register = Register::flat(0x44478);
    /// Display hotplug interrupt enable
    pub const DE_HPD_IER: Register = Register::flat(0x4447c);

    /// Type-C hotplug bits
    pub const DE_TC_HOTPLUG_MASK: u32 = 0x3f << 16;
    /// Thunderbolt hotplug bits
    pub const DE_TBT_HOTPLUG_MASK: u32 = 0x3f;

    /// Type-C hotplug control
    pub const TC_HOTPLUG_CTL: Register = Register::flat(0x44038);
    /// Thunderbolt hotplug control
    pub const TBT_HOTPLUG_CTL: Register = Register::flat(0x44030);
}

// =============================================================================
// SOUTH DISPLAY ENGINE (PCH)
// =============================================================================

/// PCH (south display engine) interrupt and hotplug registers
pub mod sde {
    use ember_hal::layout::Register;

    /// Interrupt status
    pub const ISR: Register = Register::flat(0xc4000);
    /// Interrupt mask
    pub const IMR: Register = Register::flat(0xc4004);
    /// Interrupt identity
    pub const IIR: Register = Register::flat(0xc4008);
    /// Interrupt enable
    pub const IER: Register = Register::flat(0xc400c);

    /// DDI port hotplug control
    pub const SHOTPLUG_CTL_DDI: Register = Register::flat(0xc4030);
    /// Type-C port hotplug control
    pub const SHOTPLUG_CTL_TC: Register = Register::flat(0xc4034);
    /// Hotplug debounce filter
    pub const SHPD_FILTER_CNT: Register = Register::flat(0xc4038);
    /// 500us debounce (ICP through TGP)
    pub const SHPD_FILTER_CNT_500_ADJ: u32 = 0x1d9;

    /// GMBUS done (ICP+)
    pub const GMBUS_ICP: u32 = 1 << 23;
    /// DDI hotplug bits (ICP+)
    pub const DDI_HOTPLUG_MASK_ICP: u32 = 0xf << 16;
    /// Type-C hotplug bits (ICP+)
    pub const TC_HOTPLUG_MASK_ICP: u32 = 0x3f << 24;

    /// Hotplug enable value of one port in a hotplug control register
    pub const fn hotplug_enable(port: u32) -> u32 {
        0x8 << (4 * port)
    }
    /// DDI ports with hotplug control
    pub const DDI_PORTS: u32 = 4;
    /// Type-C ports with hotplug control
    pub const TC_PORTS: u32 = 6;
}

// =============================================================================
// RENDER POWER (Gen6/Gen7 RC6 and RPS)
// =============================================================================

/// Render power state registers and bits
pub mod power {
    use ember_hal::layout::Register;

    /// RC state
    pub const RC_STATE: Register = Register::flat(0xa094);
    /// RP capabilities (MCHBAR mirror)
    pub const RP_STATE_CAP: Register = Register::flat(0x145998);
    /// Current performance status (MCHBAR mirror)
    pub const GT_PERF_STATUS: Register = Register::flat(0x145948);
    /// RC control
    pub const RC_CONTROL: Register = Register::flat(0xa090);
    /// RC1 wake rate limit
    pub const RC1_WAKE_RATE_LIMIT: Register = Register::flat(0xa098);
    /// RC6 wake rate limit
    pub const RC6_WAKE_RATE_LIMIT: Register = Register::flat(0xa09c);
    /// RC6pp wake rate limit
    pub const RC6PP_WAKE_RATE_LIMIT: Register = Register::flat(0xa0a0);
    /// RC evaluation interval
    pub const RC_EVALUATION_INTERVAL: Register = Register::flat(0xa0a8);
    /// RC idle hysteresis
    pub const RC_IDLE_HYSTERESIS: Register = Register::flat(0xa0ac);
    /// RC sleep
    pub const RC_SLEEP: Register = Register::flat(0xa0b0);
    /// RC1e threshold
    pub const RC1E_THRESHOLD: Register = Register::flat(0xa0b4);
    /// RC6 threshold
    pub const RC6_THRESHOLD: Register = Register::flat(0xa0b8);
    /// RC6p threshold
    pub const RC6P_THRESHOLD: Register = Register::flat(0xa0bc);
    /// RC6pp threshold
    pub const RC6PP_THRESHOLD: Register = Register::flat(0xa0c0);

    /// Software frequency request
    pub const RPNSWREQ: Register = Register::flat(0xa008);
    /// Video frequency
    pub const RC_VIDEO_FREQ: Register = Register::flat(0xa00c);
    /// RP down timeout
    pub const RP_DOWN_TIMEOUT: Register = Register::flat(0xa010);
    /// RP interrupt limits
    pub const RP_INTERRUPT_LIMITS: Register = Register::flat(0xa014);
    /// RP control
    pub const RP_CONTROL: Register = Register::flat(0xa024);
    /// RP up threshold
    pub const RP_UP_THRESHOLD: Register = Register::flat(0xa02c);
    /// RP down threshold
    pub const RP_DOWN_THRESHOLD: Register = Register::flat(0xa030);
    /// RP up evaluation interval
    pub const RP_UP_EI: Register = Register::flat(0xa068);
    /// RP down evaluation interval
    pub const RP_DOWN_EI: Register = Register::flat(0xa06c);
    /// RP idle hysteresis
    pub const RP_IDLE_HYSTERESIS: Register = Register::flat(0xa070);

    /// PM interrupt mask (global)
    pub const PMINTRMSK: Register = Register::flat(0xa168);
    /// PM interrupt enable
    pub const PMIER: Register = Register::flat(0x4402c);
    /// PM interrupt mask
    pub const PMIMR: Register = Register::flat(0x44024);

    /// RC control: RC6pp enable
    pub const RC_CTL_RC6PP_ENABLE: u32 = 1 << 16;
    /// RC control: RC6p enable
    pub const RC_CTL_RC6P_ENABLE: u32 = 1 << 17;
    /// RC control: RC6 enable
    pub const RC_CTL_RC6_ENABLE: u32 = 1 << 18;
    /// RC control: hardware control enable
    pub const RC_CTL_HW_ENABLE: u32 = 1 << 31;

    /// RC control: evaluation interval mode
    pub const fn rc_ctl_ei_mode(mode: u32) -> u32 {
        mode << 27
    }

    /// Frequency request field
    pub const fn frequency(value: u32) -> u32 {
        value << 25
    }

    /// Frequency offset field
    pub const fn offset(value: u32) -> u32 {
        value << 19
    }

    /// Aggressive turbo request (encoded as zero)
    pub const AGGRESSIVE_TURBO: u32 = 0;

    /// RP control: media turbo
    pub const RP_MEDIA_TURBO: u32 = 1 << 11;
    /// RP control: media hardware normal mode
    pub const RP_MEDIA_HW_NORMAL_MODE: u32 = 2 << 9;
    /// RP control: media is graphics
    pub const RP_MEDIA_IS_GFX: u32 = 1 << 8;
    /// RP control: enable
    pub const RP_ENABLE: u32 = 1 << 7;
    /// RP control: up on busy average
    pub const RP_UP_BUSY_AVG: u32 = 2 << 3;
    /// RP control: down on continuous idle
    pub const RP_DOWN_IDLE_CONT: u32 = 1 << 0;

    /// PM events serviced by the deferred handler
    pub const PM_DEFERRED_EVENTS: u32 = (1 << 4) | (1 << 5) | (1 << 6);
}

// =============================================================================
// CLOCKS
// =============================================================================

/// Clock and strap registers
pub mod clock {
    use ember_hal::layout::Register;

    /// Display strap state (Gen11+)
    pub const DSSM: Register = Register::flat(0x51004);
    /// Reference clock strap, bits 30:29
    pub const DSSM_REF_LOW_BIT: u8 = 29;
    /// Reference clock strap high bit
    pub const DSSM_REF_HIGH_BIT: u8 = 30;

    /// LCPLL control (Haswell/Broadwell)
    pub const LCPLL_CTL: Register = Register::flat(0x130040);
    /// LCPLL frequency select
    pub const LCPLL_CLK_FREQ_MASK: u32 = 3 << 26;
    /// 450 MHz
    pub const LCPLL_CLK_FREQ_450: u32 = 0;
    /// 540 MHz (Broadwell)
    pub const LCPLL_CLK_FREQ_540_BDW: u32 = 1 << 26;
    /// 337.5 MHz (Broadwell)
    pub const LCPLL_CLK_FREQ_337_5_BDW: u32 = 2 << 26;
    /// CD clock sourced from FCLK
    pub const LCPLL_CD_SOURCE_FCLK: u32 = 1 << 21;

    /// Fuse strap
    pub const FUSE_STRAP: Register = Register::flat(0x42014);
    /// CD clock limited to 450 MHz
    pub const HSW_CDCLK_LIMIT: u32 = 1 << 24;

    /// FDI PLL BIOS setting (Ibex Peak)
    pub const FDI_PLL_BIOS_0: Register = Register::flat(0x46000);
    /// FDI feedback clock field
    pub const FDI_PLL_FB_CLOCK_MASK: u32 = 0xff;

    /// PCH raw clock frequency in MHz
    pub const PCH_RAWCLK_FREQ: Register = Register::south_shared(0x6204);
    /// Raw clock field
    pub const RAWCLK_FREQ_MASK: u32 = 0x3ff;

    /// Pipe A PLL divisor, published to the compositor
    pub const PLL_DIVISOR_A0: u32 = 0x6040;
}

// =============================================================================
// CLOCK GATING
// =============================================================================

/// Clock gating disable registers
pub mod gating {
    use ember_hal::layout::{Register, VLV_DISPLAY_BASE};

    /// Display clock gating disable (PCH split parts)
    pub const PCH_DSPCLK_GATE_D: Register = Register::flat(0x42020);
    /// SandyBridge gating value
    pub const SNB_DSPCLK_GATE: u32 = (1 << 28) | (1 << 7) | (1 << 5);
    /// IvyBridge gating value
    pub const IVB_DSPCLK_GATE: u32 = 1 << 28;

    /// Render clock gating (SandyBridge)
    pub const MI_ARB_STATE: Register = Register::flat(0x7408);
    /// SandyBridge render gating value
    pub const SNB_MI_ARB: u32 = 0x10;

    /// ValleyView display clock gating
    pub const VLV_DSPCLK_GATE_D: Register = Register::flat(VLV_DISPLAY_BASE + 0x6200);
    /// ValleyView gating value
    pub const VLV_DSPCLK_GATE: u32 = 1 << 28;
}

// =============================================================================
// RING
// =============================================================================

/// Primary ring buffer control base
pub const PRIMARY_RING_BUFFER: u32 = 0x2030;
