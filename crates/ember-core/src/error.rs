//! # EMBER Error Handling
//!
//! Error types for the display adapter core.
//!
//! Error handling in EMBER follows these principles:
//! - Errors are typed and categorized by subsystem
//! - No panics in production code paths
//! - Errors are `no_std` compatible

use core::fmt;

// =============================================================================
// RESULT TYPE
// =============================================================================

/// EMBER Result type alias
pub type Result<T> = core::result::Result<T, Error>;

// =============================================================================
// ERROR ENUM
// =============================================================================

/// EMBER unified error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    // =========================================================================
    // Generic Errors
    // =========================================================================
    /// Invalid parameter provided
    InvalidParameter,
    /// Resource not found
    NotFound,
    /// Operation not supported on this chipset group
    NotSupported,
    /// Operation not allowed for this SKU
    NotAllowed,
    /// Resource is busy
    Busy,

    // =========================================================================
    // Hardware Errors
    // =========================================================================
    /// Device id is not in the classification table
    UnsupportedDevice,
    /// Graphics aperture could not be mapped
    ApertureMapFailed,
    /// Register BAR could not be mapped
    MmioMapFailed,
    /// Kernel area could not be created
    AreaCreateFailed,

    // =========================================================================
    // Memory Errors
    // =========================================================================
    /// No free range large enough in the aperture
    OutOfMemory,
    /// Address or alignment not aligned to a page
    MisalignedAddress,
    /// Physically contiguous backing could not be bound
    PhysicalBindFailed,

    // =========================================================================
    // Interrupt Errors
    // =========================================================================
    /// Neither a pin line nor an MSI vector is available
    NoInterruptLine,
    /// MSI negotiation failed
    MsiFailed,
    /// Kernel refused the interrupt handler
    HandlerInstallFailed,
    /// The vblank channel was deleted while waiting
    ChannelDeleted,
    /// Ownership of the vblank channel could not be transferred
    ChannelOwnership,
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Generic
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::NotFound => write!(f, "resource not found"),
            Self::NotSupported => write!(f, "operation not supported"),
            Self::NotAllowed => write!(f, "operation not allowed"),
            Self::Busy => write!(f, "resource busy"),

            // Hardware
            Self::UnsupportedDevice => write!(f, "unsupported device"),
            Self::ApertureMapFailed => write!(f, "aperture mapping failed"),
            Self::MmioMapFailed => write!(f, "MMIO mapping failed"),
            Self::AreaCreateFailed => write!(f, "area creation failed"),

            // Memory
            Self::OutOfMemory => write!(f, "out of aperture memory"),
            Self::MisalignedAddress => write!(f, "misaligned address"),
            Self::PhysicalBindFailed => write!(f, "physical bind failed"),

            // Interrupt
            Self::NoInterruptLine => write!(f, "no interrupt line available"),
            Self::MsiFailed => write!(f, "MSI configuration failed"),
            Self::HandlerInstallFailed => write!(f, "interrupt handler install failed"),
            Self::ChannelDeleted => write!(f, "vblank channel deleted"),
            Self::ChannelOwnership => write!(f, "vblank channel ownership transfer failed"),
        }
    }
}

impl Error {
    /// Check if the error aborts device attach
    pub const fn is_fatal_at_init(&self) -> bool {
        matches!(
            self,
            Self::ApertureMapFailed | Self::MmioMapFailed | Self::AreaCreateFailed
        )
    }

    /// Check if the error is a refusal with no side effects
    pub const fn is_refusal(&self) -> bool {
        matches!(self, Self::NotSupported | Self::NotAllowed)
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::string::ToString;

    #[test]
    fn test_display() {
        assert_eq!(Error::NotAllowed.to_string(), "operation not allowed");
        assert_eq!(
            Error::NoInterruptLine.to_string(),
            "no interrupt line available"
        );
    }

    #[test]
    fn test_messages_distinct() {
        let all = [
            Error::InvalidParameter,
            Error::NotFound,
            Error::NotSupported,
            Error::NotAllowed,
            Error::Busy,
            Error::UnsupportedDevice,
            Error::ApertureMapFailed,
            Error::MmioMapFailed,
            Error::AreaCreateFailed,
            Error::OutOfMemory,
            Error::MisalignedAddress,
            Error::PhysicalBindFailed,
            Error::NoInterruptLine,
            Error::MsiFailed,
            Error::HandlerInstallFailed,
            Error::ChannelDeleted,
            Error::ChannelOwnership,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert_ne!(a.to_string(), b.to_string());
            }
        }
    }

    #[test]
    fn test_categories() {
        assert!(Error::MmioMapFailed.is_fatal_at_init());
        assert!(!Error::OutOfMemory.is_fatal_at_init());
        assert!(Error::NotSupported.is_refusal());
        assert!(!Error::MsiFailed.is_refusal());
    }
}
