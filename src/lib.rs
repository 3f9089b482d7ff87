//! # rfm69-station
//!
//! Driver and packet protocol engine for the HopeRF RFM69/RFM69HCW
//! sub-GHz transceiver on Linux hosts, with first-class Raspberry Pi
//! support.
//!
//! ## Features
//!
//! - Full initialization: hard reset, sync handshake, per-band register
//!   configuration, hardware AES, PA/OCP setup for high-power variants
//! - Addressed, broadcast and acknowledged transmission with CSMA channel
//!   assessment and automatic retries
//! - Interrupt-driven reception into a thread-safe packet queue, with
//!   optional automatic acknowledgements and promiscuous mode
//! - Listen-mode duty-cycle planning and high-speed burst wake-up of
//!   duty-cycled peers
//! - Temperature readout, RC oscillator calibration and frequency tuning
//!
//! ## Example
//!
//! ```no_run
//! # #[cfg(feature = "raspberry-pi")]
//! # fn main() -> Result<(), rfm69_station::RadioError> {
//! use rfm69_station::{Radio, RadioConfig, SendOpts};
//!
//! let mut radio = Radio::open(RadioConfig {
//!     node_id: 1,
//!     network_id: 100,
//!     ..RadioConfig::default()
//! })?;
//!
//! radio.send(2, b"Banana", SendOpts::default())?;
//! if let Some(packet) = radio.get_packet(true, None) {
//!     println!("{} said {}", packet.sender_id, packet.payload_string());
//! }
//! # Ok(()) }
//! # #[cfg(not(feature = "raspberry-pi"))]
//! # fn main() {}
//! ```
//!
//! The driver core is generic over the [`hal::RegisterBus`] trait; the
//! `raspberry-pi` feature provides the SPI/GPIO implementation and
//! [`hal::MockMedium`] provides a linked pair of in-memory chips for
//! testing without hardware.

pub mod config;
pub mod error;
pub mod hal;
pub mod logging;
pub mod radio;
pub mod registers;

pub use config::{FrequencyBand, RadioConfig};
pub use error::RadioError;
pub use radio::{Mode, Packet, Radio, SendOpts, SendOutcome};
