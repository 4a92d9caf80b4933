//! # EMBER Kernel Core
//!
//! Bring-up, interrupt routing, clock detection and power programming for
//! Intel integrated display adapters.
//!
//! ## Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │                         DeviceContext                             │
//! │                                                                   │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐     │
//! │  │  Interrupt   │    │    Clock     │    │   Power State    │     │
//! │  │  Controller  │    │   Detector   │    │   Controller     │     │
//! │  │ (Leg/G8/G11) │    │ (PLL/CD/FDI) │    │ (gating, RC6)    │     │
//! │  └──────┬───────┘    └──────┬───────┘    └────────┬─────────┘     │
//! │         │                   │                     │               │
//! │  ┌──────▼───────────────────▼─────────────────────▼─────────┐     │
//! │  │              RegisterWindow (ember-hal)                  │     │
//! │  └──────────────────────────────────────────────────────────┘     │
//! │                                                                   │
//! │  ┌──────────────┐    ┌──────────────┐    ┌──────────────────┐     │
//! │  │ SharedRegion │    │ VBlank       │    │ Aperture memory  │     │
//! │  │ (compositor) │    │ channel      │    │ (ember-mem)      │     │
//! │  └──────────────┘    └──────────────┘    └──────────────────┘     │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Lifecycle
//!
//! 1. [`attach`] classifies the device, maps it and publishes the shared state
//! 2. The host kernel calls the [`DisplayInterrupts`] handler registered on
//!    the negotiated line
//! 3. The compositor allocates aperture memory and toggles pipe interrupts
//! 4. [`detach`] releases everything in reverse order

#![no_std]
#![deny(unsafe_op_in_unsafe_fn)]
#![warn(missing_docs)]
#![warn(clippy::all)]

extern crate alloc;

#[cfg(any(test, feature = "std"))]
extern crate std;

pub mod clock;
pub mod context;
pub mod diag;
pub mod init;
pub mod interrupts;
pub mod power;
pub mod regs;
pub mod settings;
pub mod shared;

// Re-exports
pub use clock::{ClockDetector, ClockInfo};
pub use context::{DeviceContext, FixedBuffers};
pub use diag::{Diagnostics, DiagnosticsSnapshot};
pub use init::{attach, detach};
pub use interrupts::{
    ControllerState, DisplayInterrupts, InterruptController, InterruptStrategy, IrqContext,
};
pub use power::{PowerStateController, RenderPState};
pub use settings::DriverSettings;
pub use shared::SharedRegion;
