//! # Vblank Channel
//!
//! Single-producer (interrupt handler), multi-consumer (compositor threads)
//! notification channel for vertical blank events.
//!
//! The channel is a counting primitive whose count starts at zero. A
//! negative count means `-count` consumers are blocked waiting. The
//! interrupt side only ever releases the consumers that are waiting at the
//! time of the event, so vblanks nobody waits for are dropped instead of
//! accumulating.

use alloc::sync::Arc;
use core::sync::atomic::{AtomicBool, AtomicI32, AtomicU32, Ordering};

use crate::error::{Error, Result};
use crate::types::{IrqReturn, TeamId};

static NEXT_CHANNEL_ID: AtomicI32 = AtomicI32::new(1);

// =============================================================================
// CHANNEL ID
// =============================================================================

/// Kernel-visible channel identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct ChannelId(pub i32);

impl ChannelId {
    /// Published when the channel is gone
    pub const INVALID: Self = Self(-1);

    /// Raw id
    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }
}

// =============================================================================
// VBLANK CHANNEL
// =============================================================================

/// Interrupt-to-thread vblank notification channel
#[derive(Debug)]
pub struct VBlankChannel {
    id: ChannelId,
    /// Available units, or `-waiters` when negative
    count: AtomicI32,
    /// Wakeups handed to blocked consumers but not yet taken
    granted: AtomicU32,
    owner: AtomicI32,
    deleted: AtomicBool,
}

impl VBlankChannel {
    /// Create a channel with a zero count, owned by the kernel
    pub fn create() -> Arc<Self> {
        let id = NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed);
        Arc::new(Self {
            id: ChannelId(id),
            count: AtomicI32::new(0),
            granted: AtomicU32::new(0),
            owner: AtomicI32::new(TeamId::KERNEL.0),
            deleted: AtomicBool::new(false),
        })
    }

    /// Channel id, [`ChannelId::INVALID`] once deleted
    pub fn id(&self) -> ChannelId {
        if self.is_valid() {
            self.id
        } else {
            ChannelId::INVALID
        }
    }

    /// Check the channel has not been deleted
    #[inline]
    pub fn is_valid(&self) -> bool {
        !self.deleted.load(Ordering::Acquire)
    }

    /// Current count (negative: number of blocked consumers)
    #[inline]
    pub fn count(&self) -> i32 {
        self.count.load(Ordering::Acquire)
    }

    /// Number of consumers currently blocked
    #[inline]
    pub fn waiters(&self) -> u32 {
        let count = self.count();
        if count < 0 {
            count.unsigned_abs()
        } else {
            0
        }
    }

    /// Team allowed to wait on the channel
    pub fn owner(&self) -> TeamId {
        TeamId(self.owner.load(Ordering::Acquire))
    }

    /// Transfer ownership to a consumer team
    pub fn set_owner(&self, team: TeamId) -> Result<()> {
        if !self.is_valid() || team.0 < 0 {
            return Err(Error::ChannelOwnership);
        }
        self.owner.store(team.0, Ordering::Release);
        Ok(())
    }

    // =========================================================================
    // Producer side
    // =========================================================================

    /// Release `n` units, waking at most `n` blocked consumers
    pub fn release(&self, n: u32) {
        if n == 0 {
            return;
        }
        let n = n.min(i32::MAX as u32) as i32;
        let previous = self.count.fetch_add(n, Ordering::AcqRel);
        if previous < 0 {
            let wake = previous.unsigned_abs().min(n as u32);
            self.granted.fetch_add(wake, Ordering::AcqRel);
        }
    }

    /// Interrupt-context release
    ///
    /// Releases exactly the consumers waiting right now and asks for a
    /// reschedule, or does nothing when nobody waits. Never blocks.
    pub fn release_from_interrupt(&self) -> IrqReturn {
        let count = self.count.load(Ordering::Acquire);
        if count < 0 {
            self.release(count.unsigned_abs());
            IrqReturn::InvokeScheduler
        } else {
            IrqReturn::Handled
        }
    }

    // =========================================================================
    // Consumer side
    // =========================================================================

    /// Take one unit without blocking
    pub fn try_acquire(&self) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        while current > 0 {
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    /// Wait for the next release
    ///
    /// Spins until a wakeup is granted. Returns [`Error::ChannelDeleted`] if
    /// the channel is deleted before or while waiting.
    pub fn acquire(&self) -> Result<()> {
        if !self.is_valid() {
            return Err(Error::ChannelDeleted);
        }
        if self.count.fetch_sub(1, Ordering::AcqRel) > 0 {
            return Ok(());
        }
        loop {
            if self.take_grant() {
                return Ok(());
            }
            if !self.is_valid() {
                return Err(Error::ChannelDeleted);
            }
            core::hint::spin_loop();
            #[cfg(any(test, feature = "std"))]
            std::thread::yield_now();
        }
    }

    fn take_grant(&self) -> bool {
        let mut granted = self.granted.load(Ordering::Acquire);
        while granted > 0 {
            match self.granted.compare_exchange_weak(
                granted,
                granted - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => granted = actual,
            }
        }
        false
    }

    /// Delete the channel; blocked consumers return [`Error::ChannelDeleted`]
    pub fn delete(&self) {
        if !self.deleted.swap(true, Ordering::AcqRel) {
            log::debug!("EMBER: vblank channel {} deleted", self.id.0);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::vec::Vec;

    fn wait_for_waiters(channel: &VBlankChannel, n: u32) {
        while channel.waiters() != n {
            thread::yield_now();
        }
    }

    #[test]
    fn test_release_without_waiters_is_noop() {
        let channel = VBlankChannel::create();
        assert_eq!(channel.release_from_interrupt(), IrqReturn::Handled);
        assert_eq!(channel.count(), 0);
        assert_eq!(channel.release_from_interrupt(), IrqReturn::Handled);
        assert_eq!(channel.count(), 0);
        assert!(!channel.try_acquire());
    }

    #[test]
    fn test_release_wakes_exactly_the_waiters() {
        let channel = VBlankChannel::create();
        let handles: Vec<_> = (0..3)
            .map(|_| {
                let channel = Arc::clone(&channel);
                thread::spawn(move || channel.acquire())
            })
            .collect();

        wait_for_waiters(&channel, 3);
        assert_eq!(channel.count(), -3);
        assert_eq!(channel.release_from_interrupt(), IrqReturn::InvokeScheduler);

        for handle in handles {
            assert_eq!(handle.join().unwrap(), Ok(()));
        }
        assert_eq!(channel.count(), 0);
        assert_eq!(channel.release_from_interrupt(), IrqReturn::Handled);
        assert_eq!(channel.count(), 0);
    }

    #[test]
    fn test_plain_release_then_acquire() {
        let channel = VBlankChannel::create();
        channel.release(2);
        assert!(channel.try_acquire());
        assert_eq!(channel.acquire(), Ok(()));
        assert!(!channel.try_acquire());
    }

    #[test]
    fn test_delete_wakes_waiters() {
        let channel = VBlankChannel::create();
        let waiter = {
            let channel = Arc::clone(&channel);
            thread::spawn(move || channel.acquire())
        };
        wait_for_waiters(&channel, 1);
        channel.delete();
        assert_eq!(waiter.join().unwrap(), Err(Error::ChannelDeleted));
        assert_eq!(channel.id(), ChannelId::INVALID);
        assert_eq!(channel.acquire(), Err(Error::ChannelDeleted));
    }

    #[test]
    fn test_owner_transfer() {
        let channel = VBlankChannel::create();
        assert_eq!(channel.owner(), TeamId::KERNEL);
        channel.set_owner(TeamId(42)).unwrap();
        assert_eq!(channel.owner(), TeamId(42));
        channel.delete();
        assert_eq!(channel.set_owner(TeamId(43)), Err(Error::ChannelOwnership));
    }
}
