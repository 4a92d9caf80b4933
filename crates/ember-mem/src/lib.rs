//! # EMBER Memory Management
//!
//! Graphics aperture bookkeeping for fixed-purpose buffers.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      EMBER Aperture Memory                      │
//! │                                                                 │
//! │  ┌───────────────────────────────────────────────────────────┐  │
//! │  │               ApertureMemoryManager                       │  │
//! │  │   (ring buffer, overlay, status page, cursor blocks)      │  │
//! │  └───────────────────────────────────────────────────────────┘  │
//! │                 │                           │                   │
//! │  ┌──────────────┴───────────┐  ┌────────────┴───────────────┐   │
//! │  │      RangeAllocator      │  │      ApertureProvider      │   │
//! │  │   (first fit, merging)   │  │  (physical backing, GART)  │   │
//! │  └──────────────────────────┘  └────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The allocation table is only touched from attach, runtime ioctls and
//! detach, never from the interrupt handler, so it carries no lock.

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod aperture;
pub mod range;

// Re-exports
pub use aperture::{AllocationFlags, ApertureBlock, ApertureMemoryManager};
pub use range::{AperRange, RangeAllocator};
