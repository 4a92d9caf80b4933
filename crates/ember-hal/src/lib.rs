//! # EMBER Hardware Abstraction Layer
//!
//! Register access and the contracts the driver consumes from its host
//! kernel.
//!
//! - [`mmio`]: the [`RegisterIo`] trait and the volatile MMIO region
//! - [`layout`]: logical register blocks and the bounds-checked window
//! - [`platform`]: kernel areas, PCI, interrupts, boot items and settings
//! - [`aperture`]: the graphics aperture provider contract
//! - [`irq`]: interrupt line selection and the handler contract
//! - `testing`: recording doubles for all of the above (feature `testing`)

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

// =============================================================================
// MODULE EXPORTS
// =============================================================================

pub mod aperture;
pub mod irq;
pub mod layout;
pub mod mmio;
pub mod platform;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use aperture::{ApertureInfo, ApertureProvider};
pub use irq::{InterruptHandler, InterruptLine};
pub use layout::{Register, RegisterBlock, RegisterLayout, RegisterWindow};
pub use mmio::{MmioRegion, RegisterIo};
pub use platform::{AreaMapping, AreaProtection, BarInfo, PciLocation, Platform};
