//! Gen11+ interrupts: a graphics master register in front of the Gen8
//! display engine, plus Type-C/Thunderbolt and south hotplug wiring.

use ember_core::{IrqReturn, PchVariant, PipeSet};
use ember_hal::layout::Register;
use ember_hal::RegisterIo;

use super::{gen8, IrqContext};
use crate::regs::{gen11 as regs, gen8 as de, sde};

/// AUX channel completion bits enabled on the port register
const AUX_CHANNELS: u32 = de::AUX_CHANNEL_A
    | de::AUX_CHANNEL_B
    | de::AUX_CHANNEL_C
    | de::AUX_CHANNEL_D
    | de::AUX_CHANNEL_E
    | de::AUX_CHANNEL_F;

/// South engine sources left unmasked once hotplug is wired
pub(super) const SDE_HOTPLUG_SOURCES: u32 =
    sde::GMBUS_ICP | sde::DDI_HOTPLUG_MASK_ICP | sde::TC_HOTPLUG_MASK_ICP;

/// Clear stale identity, enable `bits` and unmask them, then post the mask
fn enable_source<R: RegisterIo + ?Sized>(
    ctx: &IrqContext<'_, R>,
    iir: Register,
    ier: Register,
    imr: Register,
    bits: u32,
) {
    let _ = ctx.regs.read(iir);
    ctx.regs.write(ier, bits);
    ctx.regs.write(imr, !bits);
    let _ = ctx.regs.read(imr);
}

fn hotplug_enable_bits(ports: u32) -> u32 {
    (0..ports).fold(0, |bits, port| bits | sde::hotplug_enable(port))
}

fn wire_south_hotplug<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>) {
    if ctx.pch <= PchVariant::Tgp {
        ctx.regs
            .write(sde::SHPD_FILTER_CNT, sde::SHPD_FILTER_CNT_500_ADJ);
    }
    ctx.regs
        .write(sde::SHOTPLUG_CTL_DDI, hotplug_enable_bits(sde::DDI_PORTS));
    ctx.regs
        .write(sde::SHOTPLUG_CTL_TC, hotplug_enable_bits(sde::TC_PORTS));

    let _ = ctx.regs.read(sde::ISR);
    ctx.regs.write(sde::IMR, !SDE_HOTPLUG_SOURCES);
    ctx.regs.write(sde::IER, SDE_HOTPLUG_SOURCES);
}

/// Bring up the display engine behind the graphics master
///
/// The graphics master enable is written exactly once, after every
/// display source has been programmed.
pub(super) fn arm<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>) {
    let icp = ctx.pch >= PchVariant::Icp;

    if icp {
        let _ = ctx.regs.read(sde::IIR);
        ctx.regs.write(sde::IER, !0);
        ctx.regs.write(sde::IMR, !sde::GMBUS_ICP);
        let _ = ctx.regs.read(sde::IMR);
    }

    enable_source(
        ctx,
        de::DE_PORT_IIR,
        de::DE_PORT_IER,
        de::DE_PORT_IMR,
        AUX_CHANNELS,
    );
    enable_source(
        ctx,
        de::DE_MISC_IIR,
        de::DE_MISC_IER,
        de::DE_MISC_IMR,
        de::DE_EDP_PSR,
    );

    ctx.regs.write(regs::DE_HPD_IER, !0);
    ctx.regs.write(regs::DE_HPD_IMR, !0);
    ctx.regs.write(regs::TC_HOTPLUG_CTL, 0);
    ctx.regs.write(regs::TBT_HOTPLUG_CTL, 0);

    if icp {
        wire_south_hotplug(ctx);
    }

    ctx.regs.write(regs::DISPLAY_INT_CTL, regs::DISPLAY_IRQ_ENABLE);
    ctx.regs.write(regs::GFX_MSTR_IRQ, regs::MASTER_IRQ);

    gen8::enable_pipes(ctx, PipeSet::ANY, true);
}

pub(super) fn disarm<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>) {
    gen8::enable_pipes(ctx, PipeSet::ANY, false);
    ctx.regs.write(regs::DISPLAY_INT_CTL, 0);
    ctx.regs.write(regs::GFX_MSTR_IRQ, 0);
}

/// Globally disable, service the display engine, globally re-enable
pub(super) fn handle<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>) -> IrqReturn {
    let master = ctx.regs.read(regs::GFX_MSTR_IRQ) & !regs::MASTER_IRQ;
    if master == 0 {
        ctx.diag.spurious();
        return IrqReturn::Unhandled;
    }

    ctx.regs.write(regs::GFX_MSTR_IRQ, 0);

    let mut result = IrqReturn::Handled;
    if master & regs::DISPLAY_IRQ != 0 {
        let pending = ctx.regs.read(regs::DISPLAY_INT_CTL) & !regs::DISPLAY_IRQ_ENABLE;
        ctx.regs.write(regs::DISPLAY_INT_CTL, 0);
        if pending != 0 {
            result = gen8::handle_display(ctx, pending);
        }
        ctx.regs.write(regs::DISPLAY_INT_CTL, regs::DISPLAY_IRQ_ENABLE);
    }

    ctx.regs.write(regs::GFX_MSTR_IRQ, regs::MASTER_IRQ);
    result
}
