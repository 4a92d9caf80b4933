//! # EMBER Core
//!
//! Foundational types shared by every layer of the EMBER driver.
//!
//! Nothing in this crate touches hardware. It provides the vocabulary the
//! other crates speak:
//!
//! - the error taxonomy used across bring-up and the interrupt path
//! - strongly typed addresses, area/team identifiers and pipe sets
//! - the hardware classification every dispatch decision is based on
//! - the byte-stable layout shared with the privileged compositor
//! - the vblank channel bridging interrupt context to waiting threads
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      ember-core                             │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────┐  │
//! │  │   Device    │  │   Types     │  │     Error           │  │
//! │  │ (DeviceType,│  │ (PhysAddr,  │  │   Handling          │  │
//! │  │ PchVariant) │  │  PipeSet)   │  │                     │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────┘  │
//! │  ┌──────────────────────────┐  ┌─────────────────────────┐  │
//! │  │  SharedInfo (wire ABI)   │  │  VBlankChannel (sync)   │  │
//! │  └──────────────────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────┘
//! ```

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

pub mod device;
pub mod error;
pub mod shared;
pub mod sync;
pub mod types;

// Re-exports for convenience
pub use device::{DeviceType, Family, Group, PchVariant};
pub use error::{Error, Result};
pub use shared::SharedInfo;
pub use sync::{ChannelId, VBlankChannel};
pub use types::*;
