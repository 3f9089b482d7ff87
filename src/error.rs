//! # Radio Error Handling
//!
//! This module defines the RadioError enum, which represents the different
//! error types that can occur in the rfm69-station crate.

use thiserror::Error;

/// Represents the different error types that can occur while driving the radio.
#[derive(Debug, Error)]
pub enum RadioError {
    /// Indicates an error on the SPI register bus.
    #[error("SPI bus error: {0}")]
    Spi(String),

    /// Indicates an error on the GPIO lines (reset or interrupt).
    #[error("GPIO error: {0}")]
    Gpio(String),

    /// Indicates an out-of-range or inconsistent configuration value.
    /// Rejected synchronously at the call that introduced it, never clamped.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Indicates the chip failed to reach a ready/sync state during
    /// initialization. Fatal to construction.
    #[error("Radio initialization failed: {0}")]
    InitFailed(String),

    /// Indicates a bounded wait elapsed without the hardware condition.
    #[error("Timeout waiting for: {0}")]
    Timeout(String),
}

impl From<crate::hal::HalError> for RadioError {
    fn from(err: crate::hal::HalError) -> Self {
        match err {
            crate::hal::HalError::Spi(msg) => RadioError::Spi(msg),
            crate::hal::HalError::Gpio(msg) => RadioError::Gpio(msg),
        }
    }
}
