//! # Radio Configuration
//!
//! Construction-time options for a [`Radio`](crate::radio::Radio) and the
//! static per-band register table written during initialization.

use serde::{Deserialize, Serialize};

use crate::registers::*;

/// Frequency band of the RFM69 module variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FrequencyBand {
    /// 315 MHz
    Mhz315,
    /// 433 MHz
    Mhz433,
    /// 868 MHz
    Mhz868,
    /// 915 MHz
    Mhz915,
}

impl FrequencyBand {
    /// FRF register triplet (MSB, MID, LSB) for the band center frequency.
    pub fn frf(self) -> (u8, u8, u8) {
        match self {
            FrequencyBand::Mhz315 => (0x4E, 0xC0, 0x00),
            FrequencyBand::Mhz433 => (0x6C, 0x40, 0x00),
            FrequencyBand::Mhz868 => (0xD9, 0x00, 0x00),
            FrequencyBand::Mhz915 => (0xE4, 0xC0, 0x00),
        }
    }
}

/// Configuration for the radio driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RadioConfig {
    /// Frequency band of the attached module
    pub band: FrequencyBand,
    /// Node ID of this device
    pub node_id: u8,
    /// Network ID (sync word byte 2), 1..=254
    pub network_id: u8,
    /// Automatically reply to ack-requesting frames
    pub auto_acknowledge: bool,
    /// Module is a high-power variant (RFM69HW/HCW)
    pub high_power: bool,
    /// Accept frames regardless of destination address
    pub promiscuous: bool,
    /// Optional 16-byte hardware AES key
    pub encryption_key: Option<[u8; 16]>,
    /// Transmit power as a percentage, 0..=100
    pub power_percent: u8,
    /// SPI bus number (0 or 1)
    pub spi_bus: u8,
    /// SPI slave-select number
    pub spi_device: u8,
    /// BCM GPIO number of the interrupt line (DIO0)
    pub interrupt_pin: u8,
    /// BCM GPIO number of the reset line, if wired
    pub reset_pin: Option<u8>,
}

impl Default for RadioConfig {
    fn default() -> Self {
        Self {
            band: FrequencyBand::Mhz433,
            node_id: 1,
            network_id: 100,
            auto_acknowledge: true,
            high_power: true,
            promiscuous: false,
            encryption_key: None,
            power_percent: 70,
            spi_bus: 0,
            spi_device: 0,
            interrupt_pin: 24,
            reset_pin: Some(5),
        }
    }
}

/// Register values written during initialization for a given band and
/// network id: packet mode, FSK at 55555 bps with 50 kHz deviation,
/// variable-length frames with CRC, two sync bytes.
pub fn band_register_table(band: FrequencyBand, network_id: u8) -> Vec<(u8, u8)> {
    let (frf_msb, frf_mid, frf_lsb) = band.frf();
    vec![
        // Sequencer on, listen off, standby
        (REG_OPMODE, RF_OPMODE_STANDBY),
        // Packet mode, FSK, no shaping
        (REG_DATAMODUL, 0x00),
        // 55555 bps
        (REG_BITRATEMSB, 0x02),
        (REG_BITRATELSB, 0x40),
        // 50 kHz deviation
        (REG_FDEVMSB, 0x03),
        (REG_FDEVLSB, 0x33),
        (REG_FRFMSB, frf_msb),
        (REG_FRFMID, frf_mid),
        (REG_FRFLSB, frf_lsb),
        // Channel filter bandwidth 10.4 kHz
        (REG_RXBW, 0x42),
        // DIO0 payload-ready in RX
        (REG_DIOMAPPING1, RF_DIOMAPPING1_DIO0_01),
        // ClkOut off
        (REG_DIOMAPPING2, 0x07),
        // Writing the overrun bit flushes the FIFO
        (REG_IRQFLAGS2, RF_IRQFLAGS2_FIFOOVERRUN),
        (REG_RSSITHRESH, 220),
        // Sync on, two bytes
        (REG_SYNCCONFIG, 0x88),
        (REG_SYNCVALUE1, 0x2D),
        (REG_SYNCVALUE2, network_id),
        (
            REG_PACKETCONFIG1,
            RF_PACKET1_FORMAT_VARIABLE | RF_PACKET1_CRC_ON,
        ),
        (REG_PAYLOADLENGTH, FIFO_SIZE as u8),
        // TX starts as soon as the FIFO is non-empty
        (REG_FIFOTHRESH, 0x8F),
        (
            REG_PACKETCONFIG2,
            RF_PACKET2_RXRESTARTDELAY_2BITS | RF_PACKET2_AUTORXRESTART_ON | RF_PACKET2_AES_OFF,
        ),
        // Continuous DAGC with low-beta offset
        (REG_TESTDAGC, 0x30),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_table_carries_network_id() {
        let table = band_register_table(FrequencyBand::Mhz868, 42);
        let sync2 = table
            .iter()
            .find(|(addr, _)| *addr == REG_SYNCVALUE2)
            .expect("sync word byte 2 present");
        assert_eq!(sync2.1, 42);
    }

    #[test]
    fn band_frf_triplets_differ() {
        assert_ne!(
            FrequencyBand::Mhz433.frf(),
            FrequencyBand::Mhz868.frf()
        );
        assert_eq!(FrequencyBand::Mhz915.frf().0, 0xE4);
    }

    #[test]
    fn config_deserializes_from_json() {
        let json = r#"{
            "band": "Mhz868",
            "node_id": 7,
            "network_id": 100,
            "auto_acknowledge": true,
            "high_power": false,
            "promiscuous": false,
            "encryption_key": null,
            "power_percent": 50,
            "spi_bus": 0,
            "spi_device": 0,
            "interrupt_pin": 24,
            "reset_pin": 5
        }"#;
        let config: RadioConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.band, FrequencyBand::Mhz868);
        assert_eq!(config.node_id, 7);
        assert_eq!(config.reset_pin, Some(5));
    }
}
