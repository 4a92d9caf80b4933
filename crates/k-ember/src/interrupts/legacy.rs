//! Pre-Gen8 display interrupts: one identity/enable/mask register set,
//! in the north shared block without a PCH and in the display engine with
//! one.

use ember_core::device::{Family, Group};
use ember_core::{IrqReturn, PipeIndex, PipeSet};
use ember_hal::layout::Register;
use ember_hal::RegisterIo;

use super::{signal_vblank, IrqContext};
use crate::regs::legacy as regs;

/// Acknowledge passes before giving up on a stuck identity register
pub(super) const MAX_ACK_PASSES: usize = 8;

/// Identity bit of a pipe's vblank event, 0 if the pipe cannot signal
pub(super) fn pipe_bit<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>, pipe: PipeIndex) -> u32 {
    let snb_class =
        ctx.device.in_group(Group::Ironlake) || ctx.device.in_group(Group::SandyBridge);

    match (ctx.pch.is_present(), snb_class, pipe) {
        (true, true, PipeIndex::A) => regs::VBLANK_PIPE_A_SNB,
        (true, true, PipeIndex::B) => regs::VBLANK_PIPE_B_SNB,
        (true, true, PipeIndex::C) => 0,
        (true, false, PipeIndex::A) => regs::PCH_VBLANK_PIPE_A,
        (true, false, PipeIndex::B) => regs::PCH_VBLANK_PIPE_B,
        (true, false, PipeIndex::C) => regs::PCH_VBLANK_PIPE_C,
        (false, _, PipeIndex::A) => regs::VBLANK_PIPE_A,
        (false, _, PipeIndex::B) => regs::VBLANK_PIPE_B,
        (false, _, PipeIndex::C) => 0,
    }
}

/// Union of the vblank bits of `pipes`
pub(super) fn pipe_mask<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>, pipes: PipeSet) -> u32 {
    ctx.present_pipes(pipes)
        .pipes()
        .fold(0, |mask, pipe| mask | pipe_bit(ctx, pipe))
}

struct Registers {
    identity: Register,
    enable: Register,
    mask: Register,
}

fn registers(has_pch: bool) -> Registers {
    if has_pch {
        Registers {
            identity: regs::DE_IIR,
            enable: regs::DE_IER,
            mask: regs::DE_IMR,
        }
    } else {
        Registers {
            identity: regs::IIR,
            enable: regs::IER,
            mask: regs::IMR,
        }
    }
}

fn read_identity<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>, identity: Register) -> u32 {
    if ctx.pch.is_present() {
        ctx.regs.read(identity)
    } else {
        u32::from(ctx.regs.read16(identity))
    }
}

fn write_identity<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>, identity: Register, value: u32) {
    if ctx.pch.is_present() {
        ctx.regs.write(identity, value);
    } else {
        ctx.regs.write16(identity, value as u16);
    }
}

fn pipe_status(pipe: PipeIndex) -> Option<Register> {
    match pipe {
        PipeIndex::A => Some(regs::PIPE_A_STATUS),
        PipeIndex::B => Some(regs::PIPE_B_STATUS),
        PipeIndex::C => None,
    }
}

pub(super) fn enable_pipes<R: RegisterIo + ?Sized>(
    ctx: &IrqContext<'_, R>,
    pipes: PipeSet,
    enable: bool,
) {
    let has_pch = ctx.pch.is_present();
    let r = registers(has_pch);

    let mut mask = pipe_mask(ctx, pipes);
    if enable && has_pch && ctx.device.in_family(Family::Series5) {
        mask |= regs::GLOBAL_ENABLE_SER5;
    }

    write_identity(ctx, r.identity, !0);
    if enable {
        ctx.regs.write(r.enable, mask);
        ctx.regs.write(r.mask, !mask);
    } else {
        ctx.regs.write(r.enable, 0);
        ctx.regs.write(r.mask, !0);
    }
}

pub(super) fn arm<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>) {
    if !ctx.pch.is_present() {
        for pipe in ctx.present_pipes(PipeSet::ANY).pipes() {
            if let Some(status) = pipe_status(pipe) {
                ctx.regs
                    .write(status, regs::PIPE_VBLANK_STATUS | regs::PIPE_VBLANK_ENABLED);
            }
        }
    }
    enable_pipes(ctx, PipeSet::ANY, true);
}

pub(super) fn disarm<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>) {
    enable_pipes(ctx, PipeSet::ANY, false);
}

/// Acknowledge until the identity register reads clear
///
/// Without a PCH a pipe's status register has to be cleared before its
/// identity bit, otherwise the identity bit is raised again immediately.
pub(super) fn handle<R: RegisterIo + ?Sized>(ctx: &IrqContext<'_, R>) -> IrqReturn {
    let has_pch = ctx.pch.is_present();
    let r = registers(has_pch);

    let mut identity = read_identity(ctx, r.identity);
    if identity == 0 {
        ctx.diag.spurious();
        return IrqReturn::Unhandled;
    }

    let known = pipe_mask(ctx, PipeSet::ANY) | regs::GLOBAL_ENABLE_SER5;
    let mut result = IrqReturn::Handled;
    let mut reported = false;

    for _ in 0..MAX_ACK_PASSES {
        for pipe in ctx.present_pipes(PipeSet::ANY).pipes() {
            let bit = pipe_bit(ctx, pipe);
            if bit == 0 || identity & bit == 0 {
                continue;
            }
            result = result.merge(signal_vblank(ctx));
            if !has_pch {
                if let Some(status) = pipe_status(pipe) {
                    ctx.regs
                        .write(status, regs::PIPE_VBLANK_STATUS | regs::PIPE_VBLANK_ENABLED);
                }
            }
        }

        let unknown = identity & !known;
        if unknown != 0 && !reported {
            ctx.diag.unhandled_bits("display", unknown);
            reported = true;
        }

        write_identity(ctx, r.identity, identity);
        identity = read_identity(ctx, r.identity);
        if identity == 0 {
            return result;
        }
    }

    ctx.diag.legacy_overrun(identity);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interrupts::test_support::Bench;
    use ember_core::PchVariant;
    use ember_hal::testing::Access;

    #[test]
    fn test_mask_readback_without_pch() {
        let bench = Bench::new(0x2a02, PchVariant::None);
        enable_pipes(&bench.ctx(), PipeSet::ANY, true);

        let expected = regs::VBLANK_PIPE_A | regs::VBLANK_PIPE_B;
        assert_eq!(bench.regs.get(0x20a8), !expected);
        assert_eq!(bench.regs.get(0x20a0), expected);
        // identity cleared first, 16 bits wide
        assert_eq!(bench.regs.accesses()[0], Access::Write(0x20a4, 0xffff));
    }

    #[test]
    fn test_mask_readback_with_pch() {
        // SandyBridge: SNB bit positions plus the Series 5 global bit
        let snb = Bench::new(0x0116, PchVariant::Cpt);
        enable_pipes(&snb.ctx(), PipeSet::ANY, true);
        let expected =
            regs::VBLANK_PIPE_A_SNB | regs::VBLANK_PIPE_B_SNB | regs::GLOBAL_ENABLE_SER5;
        assert_eq!(snb.regs.get(0x44004), !expected);
        assert_eq!(snb.regs.get(0x4400c), expected);
        assert_eq!(snb.regs.accesses()[0], Access::Write(0x44008, !0));

        // IvyBridge: later PCH positions, three pipes
        let ivb = Bench::new(0x0166, PchVariant::Ppt);
        enable_pipes(&ivb.ctx(), PipeSet::B | PipeSet::C, true);
        let expected = regs::PCH_VBLANK_PIPE_B | regs::PCH_VBLANK_PIPE_C | regs::GLOBAL_ENABLE_SER5;
        assert_eq!(ivb.regs.get(0x44004), !expected);
    }

    #[test]
    fn test_disable_masks_everything() {
        let bench = Bench::new(0x0166, PchVariant::Ppt);
        enable_pipes(&bench.ctx(), PipeSet::ANY, false);
        assert_eq!(bench.regs.get(0x4400c), 0);
        assert_eq!(bench.regs.get(0x44004), !0);
    }

    #[test]
    fn test_pipe_c_dropped_on_two_pipe_parts() {
        let bench = Bench::new(0x2a02, PchVariant::None);
        assert_eq!(pipe_mask(&bench.ctx(), PipeSet::C), 0);
    }

    #[test]
    fn test_status_cleared_before_identity() {
        let bench = Bench::new(0x2a02, PchVariant::None);
        bench.regs.mark_write_one_to_clear(0x20a4, 0xffff);
        bench.regs.set(0x20a4, regs::VBLANK_PIPE_A);

        let result = handle(&bench.ctx());
        assert_eq!(result, IrqReturn::Handled);
        assert_eq!(bench.regs.get(0x20a4), 0);

        let writes = bench.regs.writes();
        let status = writes.iter().position(|w| w.0 == 0x70024).unwrap();
        let identity = writes.iter().position(|w| w.0 == 0x20a4).unwrap();
        assert!(status < identity);
        assert_eq!(
            writes[status].1,
            regs::PIPE_VBLANK_STATUS | regs::PIPE_VBLANK_ENABLED
        );
        // pipe B was not pending
        assert!(!writes.iter().any(|w| w.0 == 0x71024));
    }

    #[test]
    fn test_spurious_and_unknown_bits() {
        let bench = Bench::new(0x0116, PchVariant::Cpt);
        assert_eq!(handle(&bench.ctx()), IrqReturn::Unhandled);
        assert_eq!(bench.diag.snapshot().spurious, 1);

        bench.regs.mark_write_one_to_clear(0x44008, !0);
        bench.regs.set(0x44008, regs::VBLANK_PIPE_B_SNB | (1 << 3));
        assert_eq!(handle(&bench.ctx()), IrqReturn::Handled);
        assert_eq!(bench.regs.get(0x44008), 0);
        assert_eq!(bench.diag.snapshot().unhandled_bits, 1);
    }

    #[test]
    fn test_stuck_identity_bounded() {
        let bench = Bench::new(0x2a02, PchVariant::None);
        // not write-one-to-clear: the write stores the same value back
        bench.regs.set(0x20a4, regs::VBLANK_PIPE_B);

        assert_eq!(handle(&bench.ctx()), IrqReturn::Handled);
        assert_eq!(bench.regs.writes_to(0x20a4).len(), MAX_ACK_PASSES);
        assert_eq!(bench.diag.snapshot().legacy_overrun, 1);
    }

    #[test]
    fn test_waiter_woken() {
        use std::thread;

        let bench = Bench::new(0x2a02, PchVariant::None);
        bench.regs.mark_write_one_to_clear(0x20a4, 0xffff);

        let channel = bench.channel.clone();
        let waiter = thread::spawn(move || channel.acquire());
        while bench.channel.waiters() == 0 {
            thread::yield_now();
        }

        bench.regs.set(0x20a4, regs::VBLANK_PIPE_A);
        assert_eq!(handle(&bench.ctx()), IrqReturn::InvokeScheduler);
        assert_eq!(waiter.join().unwrap(), Ok(()));
        assert_eq!(bench.channel.count(), 0);
    }
}
