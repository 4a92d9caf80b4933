//! # Diagnostics
//!
//! Counters for hardware states the driver does not recognize. Everything
//! here is safe to call from the interrupt handler.

use core::sync::atomic::{AtomicU32, Ordering};

/// Interrupt-safe diagnostic counters
#[derive(Debug, Default)]
pub struct Diagnostics {
    unknown_strap: AtomicU32,
    unhandled_bits: AtomicU32,
    unhandled_pipe: AtomicU32,
    spurious: AtomicU32,
    legacy_overrun: AtomicU32,
}

/// Point-in-time copy of [`Diagnostics`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DiagnosticsSnapshot {
    /// Unsupported reference clock strap encodings seen
    pub unknown_strap: u32,
    /// Interrupt summaries with bits left after handling
    pub unhandled_bits: u32,
    /// Pipe interrupts that were not vblank
    pub unhandled_pipe: u32,
    /// Interrupts raised while nothing was pending
    pub spurious: u32,
    /// Legacy acknowledge loops that hit the iteration bound
    pub legacy_overrun: u32,
}

impl Diagnostics {
    /// Fresh counters
    pub const fn new() -> Self {
        Self {
            unknown_strap: AtomicU32::new(0),
            unhandled_bits: AtomicU32::new(0),
            unhandled_pipe: AtomicU32::new(0),
            spurious: AtomicU32::new(0),
            legacy_overrun: AtomicU32::new(0),
        }
    }

    /// Unsupported reference clock strap
    pub fn unknown_strap(&self, value: u32) {
        self.unknown_strap.fetch_add(1, Ordering::Relaxed);
        log::warn!("EMBER: unsupported reference clock strap {}, using 24 MHz", value);
    }

    /// Bits left in an interrupt summary after handling
    pub fn unhandled_bits(&self, source: &'static str, bits: u32) {
        self.unhandled_bits.fetch_add(1, Ordering::Relaxed);
        log::warn!("EMBER: unhandled {} interrupt bits 0x{:08x}", source, bits);
    }

    /// Pipe interrupt other than vblank
    pub fn unhandled_pipe(&self, pipe: u32, identity: u32) {
        self.unhandled_pipe.fetch_add(1, Ordering::Relaxed);
        log::warn!(
            "EMBER: unhandled interrupt on pipe {} (identity 0x{:08x})",
            pipe,
            identity
        );
    }

    /// Nothing pending
    pub fn spurious(&self) {
        self.spurious.fetch_add(1, Ordering::Relaxed);
    }

    /// Legacy acknowledge loop bound reached
    pub fn legacy_overrun(&self, identity: u32) {
        self.legacy_overrun.fetch_add(1, Ordering::Relaxed);
        log::warn!("EMBER: interrupt identity 0x{:08x} still pending", identity);
    }

    /// Copy the counters
    pub fn snapshot(&self) -> DiagnosticsSnapshot {
        DiagnosticsSnapshot {
            unknown_strap: self.unknown_strap.load(Ordering::Relaxed),
            unhandled_bits: self.unhandled_bits.load(Ordering::Relaxed),
            unhandled_pipe: self.unhandled_pipe.load(Ordering::Relaxed),
            spurious: self.spurious.load(Ordering::Relaxed),
            legacy_overrun: self.legacy_overrun.load(Ordering::Relaxed),
        }
    }
}
