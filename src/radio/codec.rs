//! # Frame Codec
//!
//! Builds outgoing frames and parses FIFO bytes into [`Packet`]s.
//!
//! On-wire layout: `[length][to][from][ctrl][payload...]` where `length`
//! counts the three header bytes after it plus the payload. `ctrl` bit 7
//! marks an acknowledgement frame, bit 6 requests one. The length byte is
//! capped at the 66-byte FIFO ceiling; oversize payloads are silently
//! truncated, and an implausible received length byte is clamped before any
//! FIFO read is derived from it.

use std::time::SystemTime;

use crate::registers::{CTL_REQACK, CTL_SENDACK, FIFO_SIZE, HEADER_LEN, MAX_PAYLOAD_LEN};

/// A received data frame, created by the receive path and handed to
/// consumers through the packet queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    /// Destination node id of the frame (may be the broadcast address)
    pub receiver_id: u8,
    /// Originating node id
    pub sender_id: u8,
    /// Signal strength sampled at reception, dBm
    pub rssi: i16,
    /// Frame payload, 0..=61 bytes
    pub payload: Vec<u8>,
    /// Host time at which the frame was decoded
    pub received_at: SystemTime,
}

impl Packet {
    pub fn new(receiver_id: u8, sender_id: u8, rssi: i16, payload: Vec<u8>) -> Self {
        Self {
            receiver_id,
            sender_id,
            rssi,
            payload,
            received_at: SystemTime::now(),
        }
    }

    /// Payload interpreted as UTF-8, with invalid sequences replaced.
    pub fn payload_string(&self) -> String {
        String::from_utf8_lossy(&self.payload).into_owned()
    }
}

/// Decoded frame header: the three bytes following the length byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    pub to: u8,
    pub from: u8,
    pub ctl: u8,
}

impl FrameHeader {
    pub fn is_ack(self) -> bool {
        self.ctl & CTL_SENDACK != 0
    }

    pub fn ack_requested(self) -> bool {
        self.ctl & CTL_REQACK != 0
    }
}

/// Control byte for an outgoing frame. The ACK bit wins over the request
/// bit; a frame is never both.
pub fn ctl_byte(send_ack: bool, request_ack: bool) -> u8 {
    if send_ack {
        CTL_SENDACK
    } else if request_ack {
        CTL_REQACK
    } else {
        0
    }
}

/// Encode a frame, truncating the payload to [`MAX_PAYLOAD_LEN`] bytes.
/// The returned buffer starts at the length byte; the bus layer prepends
/// the FIFO address.
pub fn encode(to: u8, from: u8, payload: &[u8], ctl: u8) -> Vec<u8> {
    let payload = &payload[..payload.len().min(MAX_PAYLOAD_LEN)];
    let mut frame = Vec::with_capacity(1 + HEADER_LEN + payload.len());
    frame.push((payload.len() + HEADER_LEN) as u8);
    frame.push(to);
    frame.push(from);
    frame.push(ctl);
    frame.extend_from_slice(payload);
    frame
}

/// Payload byte count implied by a received length byte, clamped so a
/// corrupted value can never induce an over-large or negative FIFO read.
pub fn payload_len(length_byte: u8) -> usize {
    let clamped = (length_byte as usize).min(FIFO_SIZE);
    clamped.saturating_sub(HEADER_LEN)
}

/// Parse the three header bytes that follow the length byte.
pub fn decode_header(to: u8, from: u8, ctl: u8) -> FrameHeader {
    FrameHeader { to, from, ctl }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_lays_out_header_then_payload() {
        let frame = encode(2, 1, b"Banana", ctl_byte(false, true));
        assert_eq!(frame[0], 6 + 3);
        assert_eq!(frame[1], 2);
        assert_eq!(frame[2], 1);
        assert_eq!(frame[3], CTL_REQACK);
        assert_eq!(&frame[4..], b"Banana");
    }

    #[test]
    fn encode_truncates_to_prefix() {
        let long = vec![0xAB; MAX_PAYLOAD_LEN + 10];
        let frame = encode(2, 1, &long, 0);
        assert_eq!(frame[0] as usize, MAX_PAYLOAD_LEN + HEADER_LEN);
        assert_eq!(frame.len(), 1 + HEADER_LEN + MAX_PAYLOAD_LEN);
        assert_eq!(&frame[4..], &long[..MAX_PAYLOAD_LEN]);
    }

    #[test]
    fn ack_bit_wins_over_request_bit() {
        assert_eq!(ctl_byte(true, true), CTL_SENDACK);
        assert_eq!(ctl_byte(false, false), 0);
    }

    #[test]
    fn corrupt_length_byte_is_clamped() {
        assert_eq!(payload_len(255), FIFO_SIZE - HEADER_LEN);
        assert_eq!(payload_len(66), 63);
        assert_eq!(payload_len(9), 6);
        // Below the header size nothing is readable
        assert_eq!(payload_len(2), 0);
        assert_eq!(payload_len(0), 0);
    }

    #[test]
    fn header_classification() {
        assert!(decode_header(1, 2, CTL_SENDACK).is_ack());
        assert!(decode_header(1, 2, CTL_REQACK).ack_requested());
        let plain = decode_header(1, 2, 0);
        assert!(!plain.is_ack() && !plain.ack_requested());
    }
}
