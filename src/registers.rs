//! # RFM69 Register Definitions and Constants
//!
//! Register addresses, bit field definitions and protocol constants for the
//! HopeRF RFM69/RFM69HCW transceiver, based on the RFM69 datasheet.
//!
//! ## Register Map
//!
//! - 0x00-0x0F: Basic configuration (FIFO, operation mode, data modulation)
//! - 0x10-0x2F: RF settings (frequency, power, bandwidth, RSSI)
//! - 0x30-0x3F: Packet configuration and addressing
//! - 0x40-0x4F: AES encryption and temperature sensor

// =============================================================================
// Register Addresses
// =============================================================================

/// FIFO read/write access register
pub const REG_FIFO: u8 = 0x00;

/// Operating mode and sequencer control
pub const REG_OPMODE: u8 = 0x01;

/// Data processing mode and modulation scheme
pub const REG_DATAMODUL: u8 = 0x02;

/// Bit rate setting (MSB)
pub const REG_BITRATEMSB: u8 = 0x03;

/// Bit rate setting (LSB)
pub const REG_BITRATELSB: u8 = 0x04;

/// Frequency deviation setting (MSB)
pub const REG_FDEVMSB: u8 = 0x05;

/// Frequency deviation setting (LSB)
pub const REG_FDEVLSB: u8 = 0x06;

/// RF carrier frequency setting (MSB)
pub const REG_FRFMSB: u8 = 0x07;

/// RF carrier frequency setting (MID)
pub const REG_FRFMID: u8 = 0x08;

/// RF carrier frequency setting (LSB)
pub const REG_FRFLSB: u8 = 0x09;

/// RC oscillator settings
pub const REG_OSC1: u8 = 0x0A;

/// Listen mode resolution and criteria settings
pub const REG_LISTEN1: u8 = 0x0D;

/// Listen mode idle coefficient
pub const REG_LISTEN2: u8 = 0x0E;

/// Listen mode RX coefficient
pub const REG_LISTEN3: u8 = 0x0F;

/// Chip version (read-only)
pub const REG_VERSION: u8 = 0x10;

/// PA selection and output power control
pub const REG_PALEVEL: u8 = 0x11;

/// Over current protection control
pub const REG_OCP: u8 = 0x13;

/// LNA settings
pub const REG_LNA: u8 = 0x18;

/// Channel filter bandwidth control
pub const REG_RXBW: u8 = 0x19;

/// RSSI measurement control
pub const REG_RSSICONFIG: u8 = 0x23;

/// RSSI value, -dBm * 2 (read-only)
pub const REG_RSSIVALUE: u8 = 0x24;

/// Mapping of pins DIO0 to DIO3
pub const REG_DIOMAPPING1: u8 = 0x25;

/// Mapping of pins DIO4 and DIO5, ClkOut frequency
pub const REG_DIOMAPPING2: u8 = 0x26;

/// Status register: mode ready, PLL lock, RSSI, timeout
pub const REG_IRQFLAGS1: u8 = 0x27;

/// Status register: FIFO handling flags, packet sent, payload ready
pub const REG_IRQFLAGS2: u8 = 0x28;

/// RSSI trigger level for RSSI interrupt
pub const REG_RSSITHRESH: u8 = 0x29;

/// Sync word recognition control
pub const REG_SYNCCONFIG: u8 = 0x2E;

/// Sync word byte 1
pub const REG_SYNCVALUE1: u8 = 0x2F;

/// Sync word byte 2 (carries the network id)
pub const REG_SYNCVALUE2: u8 = 0x30;

/// Packet mode settings
pub const REG_PACKETCONFIG1: u8 = 0x37;

/// Payload length ceiling in variable-length mode
pub const REG_PAYLOADLENGTH: u8 = 0x38;

/// Node address
pub const REG_NODEADRS: u8 = 0x39;

/// FIFO threshold, TX start condition
pub const REG_FIFOTHRESH: u8 = 0x3C;

/// Packet mode settings
pub const REG_PACKETCONFIG2: u8 = 0x3D;

/// First of 16 AES encryption key registers (0x3E..=0x4D)
pub const REG_AESKEY1: u8 = 0x3E;

/// Temperature sensor control
pub const REG_TEMP1: u8 = 0x4E;

/// Temperature sensor value
pub const REG_TEMP2: u8 = 0x4F;

/// PA boost test register 1 (high-power variants)
pub const REG_TESTPA1: u8 = 0x5A;

/// PA boost test register 2 (high-power variants)
pub const REG_TESTPA2: u8 = 0x5C;

/// Test register for continuous DAGC
pub const REG_TESTDAGC: u8 = 0x6F;

// =============================================================================
// Operating Mode Bits (REG_OPMODE, mask 0x1C)
// =============================================================================

pub const RF_OPMODE_SLEEP: u8 = 0x00;
pub const RF_OPMODE_STANDBY: u8 = 0x04;
pub const RF_OPMODE_SYNTHESIZER: u8 = 0x08;
pub const RF_OPMODE_TRANSMITTER: u8 = 0x0C;
pub const RF_OPMODE_RECEIVER: u8 = 0x10;

/// Bits of REG_OPMODE preserved across a mode change.
pub const RF_OPMODE_MASK: u8 = 0xE3;

// =============================================================================
// IRQ Flag Definitions
// =============================================================================

/// IRQ flags in REG_IRQFLAGS1
pub const RF_IRQFLAGS1_MODEREADY: u8 = 0x80;
pub const RF_IRQFLAGS1_RXREADY: u8 = 0x40;
pub const RF_IRQFLAGS1_TXREADY: u8 = 0x20;
pub const RF_IRQFLAGS1_PLLLOCK: u8 = 0x10;
pub const RF_IRQFLAGS1_RSSI: u8 = 0x08;

/// IRQ flags in REG_IRQFLAGS2
pub const RF_IRQFLAGS2_FIFOFULL: u8 = 0x80;
pub const RF_IRQFLAGS2_FIFONOTEMPTY: u8 = 0x40;
pub const RF_IRQFLAGS2_FIFOLEVEL: u8 = 0x20;
pub const RF_IRQFLAGS2_FIFOOVERRUN: u8 = 0x10;
pub const RF_IRQFLAGS2_PACKETSENT: u8 = 0x08;
pub const RF_IRQFLAGS2_PAYLOADREADY: u8 = 0x04;
pub const RF_IRQFLAGS2_CRCOK: u8 = 0x02;

/// View over REG_IRQFLAGS1.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IrqFlags1(u8);

impl From<u8> for IrqFlags1 {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

impl IrqFlags1 {
    /// Requested operating mode is reached and stable.
    pub fn mode_ready(self) -> bool {
        self.0 & RF_IRQFLAGS1_MODEREADY != 0
    }
}

/// View over REG_IRQFLAGS2.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct IrqFlags2(u8);

impl From<u8> for IrqFlags2 {
    fn from(raw: u8) -> Self {
        Self(raw)
    }
}

impl IrqFlags2 {
    /// A complete frame with valid CRC sits in the FIFO.
    pub fn payload_ready(self) -> bool {
        self.0 & RF_IRQFLAGS2_PAYLOADREADY != 0
    }

    /// The FIFO has been fully clocked out over the air.
    pub fn packet_sent(self) -> bool {
        self.0 & RF_IRQFLAGS2_PACKETSENT != 0
    }

    /// At least one byte remains in the FIFO.
    pub fn fifo_not_empty(self) -> bool {
        self.0 & RF_IRQFLAGS2_FIFONOTEMPTY != 0
    }
}

// =============================================================================
// Bit Field Constants
// =============================================================================

/// Packet configuration 1 flags
pub const RF_PACKET1_FORMAT_VARIABLE: u8 = 0x80;
pub const RF_PACKET1_DCFREE_WHITENING: u8 = 0x40;
pub const RF_PACKET1_CRC_ON: u8 = 0x10;
pub const RF_PACKET1_CRCAUTOCLEAR_ON: u8 = 0x00;

/// Packet configuration 2 flags
pub const RF_PACKET2_RXRESTARTDELAY_2BITS: u8 = 0x10;
pub const RF_PACKET2_RXRESTART: u8 = 0x04;
pub const RF_PACKET2_AUTORXRESTART_ON: u8 = 0x02;
pub const RF_PACKET2_AES_ON: u8 = 0x01;
pub const RF_PACKET2_AES_OFF: u8 = 0x00;

/// PA level flags
pub const RF_PALEVEL_PA0_ON: u8 = 0x80;
pub const RF_PALEVEL_PA1_ON: u8 = 0x40;
pub const RF_PALEVEL_PA2_ON: u8 = 0x20;
pub const RF_PALEVEL_OUTPUT_MASK: u8 = 0x1F;

/// Over current protection
pub const RF_OCP_ON: u8 = 0x1A;
pub const RF_OCP_OFF: u8 = 0x0F;

/// PA boost values for REG_TESTPA1/REG_TESTPA2 (high-power variants only)
pub const RF_TESTPA1_BOOST: u8 = 0x5D;
pub const RF_TESTPA1_NORMAL: u8 = 0x55;
pub const RF_TESTPA2_BOOST: u8 = 0x7C;
pub const RF_TESTPA2_NORMAL: u8 = 0x70;

/// RSSI measurement control flags
pub const RF_RSSI_START: u8 = 0x01;
pub const RF_RSSI_DONE: u8 = 0x02;

/// RC oscillator calibration flags
pub const RF_OSC1_RCCAL_START: u8 = 0x80;
pub const RF_OSC1_RCCAL_DONE: u8 = 0x40;

/// Temperature sensor control flags
pub const RF_TEMP1_MEAS_START: u8 = 0x08;
pub const RF_TEMP1_MEAS_RUNNING: u8 = 0x04;

/// DIO0 mapping: packet-sent in TX
pub const RF_DIOMAPPING1_DIO0_00: u8 = 0x00;
/// DIO0 mapping: payload-ready in RX
pub const RF_DIOMAPPING1_DIO0_01: u8 = 0x40;

/// LNA gain select: automatic, set by the internal AGC loop
pub const RF_LNA_GAINSELECT_AUTO: u8 = 0x00;

/// 200 kbps bitrate (listen-mode high-speed burst)
pub const RF_BITRATEMSB_200000: u8 = 0x00;
pub const RF_BITRATELSB_200000: u8 = 0xA0;

/// 100 kHz frequency deviation (listen-mode high-speed burst)
pub const RF_FDEVMSB_100000: u8 = 0x06;
pub const RF_FDEVLSB_100000: u8 = 0x66;

/// RXBW settings for the high-speed burst profile
pub const RF_RXBW_DCCFREQ_000: u8 = 0x00;
pub const RF_RXBW_MANT_20: u8 = 0x08;
pub const RF_RXBW_EXP_0: u8 = 0x00;

// =============================================================================
// Listen Mode Resolutions (REG_LISTEN1 fields)
// =============================================================================

/// RX phase resolution codes, fastest to slowest
pub const RF_LISTEN1_RESOL_RX_64: u8 = 0x10;
pub const RF_LISTEN1_RESOL_RX_4100: u8 = 0x20;
pub const RF_LISTEN1_RESOL_RX_262000: u8 = 0x30;

/// Idle phase resolution codes, fastest to slowest
pub const RF_LISTEN1_RESOL_IDLE_64: u8 = 0x40;
pub const RF_LISTEN1_RESOL_IDLE_4100: u8 = 0x80;
pub const RF_LISTEN1_RESOL_IDLE_262000: u8 = 0xC0;

// =============================================================================
// Protocol Constants
// =============================================================================

/// Reserved broadcast node address
pub const BROADCAST_ADDR: u8 = 255;

/// Hardware FIFO size in bytes; also the ceiling for the on-wire length byte
pub const FIFO_SIZE: usize = 66;

/// Frame header bytes after the length byte: to, from, ctrl
pub const HEADER_LEN: usize = 3;

/// Maximum payload bytes per frame
pub const MAX_PAYLOAD_LEN: usize = 61;

/// CTL byte: this frame is an acknowledgement
pub const CTL_SENDACK: u8 = 0x80;

/// CTL byte: the sender requests an acknowledgement
pub const CTL_REQACK: u8 = 0x40;

/// Channel-busy RSSI threshold for the CSMA gate, in dBm
pub const CSMA_LIMIT_DBM: i16 = -90;

/// Wall-clock budget for the CSMA gate, in milliseconds
pub const CSMA_LIMIT_MS: u64 = 1_000;

/// Upper bound on the transmit-complete wait, in milliseconds
pub const TX_LIMIT_MS: u64 = 1_000;

/// Budget for each sync-byte handshake during reset, in seconds
pub const SYNC_TIMEOUT_S: u64 = 15;

/// RF frequency synthesizer step (32 MHz / 2^19), Hz per LSB
pub const FSTEP: f64 = 61.035_156_25;

/// Coarse temperature correction added to the raw sensor reading
pub const COURSE_TEMP_COEF: i16 = -90;

/// Default listen-mode RX phase duration in microseconds
pub const DEFAULT_LISTEN_RX_US: u64 = 256;

/// Default listen-mode idle phase duration in microseconds
pub const DEFAULT_LISTEN_IDLE_US: u64 = 1_000_000;
