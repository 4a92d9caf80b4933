//! Gen8 to Gen10 display engine interrupts.
//!
//! The master register summarizes pending sources; each pipe has its own
//! ISR/IMR/IIR/IER quartet. Port, misc, hotplug and PCH sources are only
//! acknowledged so they do not keep the line asserted.

use ember_core::{IrqReturn, PchVariant, PipeSet};
use ember_hal::RegisterIo;

use super::{signal_vblank, IrqContext};
use crate::regs::{gen11, gen8 as regs, sde};

pub(super) fn enable_pipes<R: RegisterIo + ?Sized>(
    ctx: &IrqContext<'_, R>,
    pipes: PipeSet,
    enable: bool,
) {
    let value = if enable { regs::PIPE_VBLANK } else { 0 };
    for pipe in ctx.present_pipes(pipes).pipes() {
        ctx.regs.write(regs::pipe_iir(pipe), !0);
        ctx.regs.write(regs::pipe_ier(pipe), value);
        ctx.regs.write(regs::pipe_imr(pipe), !value);
    }
}

pub(super) fn arm<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>) {
    ctx.regs.write(regs::MASTER_IRQ, regs::MASTER_IRQ_CONTROL);
    enable_pipes(ctx, PipeSet::ANY, true);
}

pub(super) fn disarm<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>) {
    enable_pipes(ctx, PipeSet::ANY, false);
    ctx.regs.write(regs::MASTER_IRQ, 0);
}

pub(super) fn handle<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>) -> IrqReturn {
    let pending = ctx.regs.read(regs::MASTER_IRQ) & !regs::MASTER_IRQ_CONTROL;
    if pending == 0 {
        ctx.diag.spurious();
        return IrqReturn::Unhandled;
    }

    ctx.regs.write(regs::MASTER_IRQ, 0);
    let result = handle_display(ctx, pending);
    ctx.regs.write(regs::MASTER_IRQ, regs::MASTER_IRQ_CONTROL);
    result
}

/// Read an identity register and write the set bits back
fn ack<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>, iir: ember_hal::Register) -> u32 {
    let value = ctx.regs.read(iir);
    if value != 0 {
        ctx.regs.write(iir, value);
    }
    value
}

/// Service a display engine pending summary
///
/// Shared with the Gen11 path, which passes the pending bits of the display
/// interrupt control register.
pub(super) fn handle_display<R: RegisterIo + ?Sized>(
    ctx: &IrqContext<'_, R>,
    pending: u32,
) -> IrqReturn {
    let mut result = IrqReturn::Handled;
    let mut leftover = pending;

    for pipe in ctx.present_pipes(PipeSet::ANY).pipes() {
        let bit = regs::de_pipe_irq(pipe);
        if pending & bit == 0 {
            continue;
        }
        leftover &= !bit;

        let identity = ack(ctx, regs::pipe_iir(pipe));
        if identity & regs::PIPE_VBLANK != 0 {
            result = result.merge(signal_vblank(ctx));
        }
        if identity & !regs::PIPE_VBLANK != 0 {
            ctx.diag.unhandled_pipe(pipe.index(), identity);
        }
    }

    if pending & regs::DE_PORT_IRQ != 0 {
        leftover &= !regs::DE_PORT_IRQ;
        ack(ctx, regs::DE_PORT_IIR);
    }

    if pending & regs::DE_MISC_IRQ != 0 {
        leftover &= !regs::DE_MISC_IRQ;
        ack(ctx, regs::DE_MISC_IIR);
    }

    if ctx.device.generation() >= 11 && pending & gen11::DE_HPD_IRQ != 0 {
        leftover &= !gen11::DE_HPD_IRQ;
        ack(ctx, gen11::DE_HPD_IIR);
    }

    if ctx.pch.is_present() && pending & regs::DE_PCH_IRQ != 0 {
        leftover &= !regs::DE_PCH_IRQ;
        let identity = ctx.regs.read(sde::IIR);
        if ctx.pch >= PchVariant::Icp {
            // Hotplug status bits in the control registers are write-one-to-clear
            ack_hotplug_control(ctx);
        }
        if identity != 0 {
            ctx.regs.write(sde::IIR, identity);
        }
    }

    if leftover != 0 {
        ctx.diag.unhandled_bits("display engine", leftover);
    }
    result
}

fn ack_hotplug_control<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>) {
    let ddi = ctx.regs.read(sde::SHOTPLUG_CTL_DDI);
    ctx.regs.write(sde::SHOTPLUG_CTL_DDI, ddi);
    let tc = ctx.regs.read(sde::SHOTPLUG_CTL_TC);
    ctx.regs.write(sde::SHOTPLUG_CTL_TC, tc);
}
