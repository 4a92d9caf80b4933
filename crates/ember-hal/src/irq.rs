//! # Interrupt Lines
//!
//! Selection between the PCI pin line and a message-signaled vector, and the
//! handler object the host kernel dispatches a vector to.

use core::fmt;

use ember_core::IrqReturn;

/// Pin values the PCI layer reports for "no line routed"
const NO_LINE: [u8; 2] = [0, 0xff];

/// The interrupt source a handler is installed on
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InterruptLine {
    /// Legacy (shared) pin interrupt
    Pin(u8),
    /// Message-signaled interrupt vector
    Msi(u8),
}

impl InterruptLine {
    /// Usable pin line from the raw config value
    pub fn from_pin(raw: u8) -> Option<Self> {
        if NO_LINE.contains(&raw) {
            None
        } else {
            Some(Self::Pin(raw))
        }
    }

    /// Vector the handler is keyed by
    #[inline]
    pub const fn vector(self) -> u8 {
        match self {
            Self::Pin(v) | Self::Msi(v) => v,
        }
    }

    /// Check for MSI
    #[inline]
    pub const fn is_msi(self) -> bool {
        matches!(self, Self::Msi(_))
    }
}

impl fmt::Display for InterruptLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pin(v) => write!(f, "irq {}", v),
            Self::Msi(v) => write!(f, "msi vector {}", v),
        }
    }
}

/// Interrupt handler registered with the host kernel
///
/// Called from interrupt context: implementations must not block or
/// allocate.
pub trait InterruptHandler: Send + Sync {
    /// Service the device, reporting whether it raised the interrupt
    fn handle_interrupt(&self) -> IrqReturn;
}
