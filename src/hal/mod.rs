//! # Hardware Abstraction Layer for the Register Bus
//!
//! This module defines the [`RegisterBus`] trait the driver core talks
//! through, with a Raspberry Pi SPI implementation and a mock used by the
//! integration tests.

use thiserror::Error;

/// Errors that can occur during bus operations
#[derive(Debug, Error)]
pub enum HalError {
    #[error("SPI transfer failed: {0}")]
    Spi(String),

    #[error("GPIO operation failed: {0}")]
    Gpio(String),
}

/// Serialized byte-level access to the chip's register file and FIFO.
///
/// One transaction per call; the caller provides exclusion across calls.
/// Failures are fatal to the operation that issued them.
pub trait RegisterBus: Send {
    /// Read a single register.
    fn read_register(&mut self, addr: u8) -> Result<u8, HalError>;

    /// Write a single register.
    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError>;

    /// Full-duplex exchange of `buf` in place. `buf[0]` carries the register
    /// address with the write bit (0x80) set or clear; used for FIFO bursts
    /// and the AES key load.
    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), HalError>;
}

pub mod mock;

#[cfg(feature = "raspberry-pi")]
pub mod raspberry_pi;

pub use mock::{MockBus, MockEndpoint, MockMedium};

#[cfg(feature = "raspberry-pi")]
pub use raspberry_pi::{InterruptLine, ResetLine, SpiBus};
