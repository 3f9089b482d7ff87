//! # Frame Codec Tests
//!
//! Property tests over the on-wire frame layout: header placement, the
//! length-byte arithmetic, and payload truncation at the FIFO ceiling.

use proptest::prelude::*;

use rfm69_station::radio::codec::{ctl_byte, decode_header, encode, payload_len};
use rfm69_station::registers::{CTL_REQACK, CTL_SENDACK, HEADER_LEN, MAX_PAYLOAD_LEN};

proptest! {
    /// Any payload within the FIFO limit travels unchanged, and the length
    /// byte accounts for exactly the header plus the payload.
    #[test]
    fn frame_survives_encode_and_parse(
        to in 0u8..=255,
        from in 0u8..=255,
        send_ack: bool,
        request_ack: bool,
        payload in proptest::collection::vec(any::<u8>(), 0..=MAX_PAYLOAD_LEN),
    ) {
        let frame = encode(to, from, &payload, ctl_byte(send_ack, request_ack));

        prop_assert_eq!(frame.len(), 1 + HEADER_LEN + payload.len());
        prop_assert_eq!(payload_len(frame[0]), payload.len());

        let header = decode_header(frame[1], frame[2], frame[3]);
        prop_assert_eq!(header.to, to);
        prop_assert_eq!(header.from, from);
        prop_assert_eq!(header.is_ack(), send_ack);
        // An ack frame never also requests one
        prop_assert_eq!(header.ack_requested(), request_ack && !send_ack);
        prop_assert_eq!(&frame[4..], payload.as_slice());
    }

    /// Oversize payloads are cut to the 61-byte prefix and the length byte
    /// reflects the cut, never the original.
    #[test]
    fn oversize_payload_is_truncated(
        payload in proptest::collection::vec(any::<u8>(), MAX_PAYLOAD_LEN + 1..=200),
    ) {
        let frame = encode(7, 1, &payload, 0);

        prop_assert_eq!(frame[0] as usize, MAX_PAYLOAD_LEN + HEADER_LEN);
        prop_assert_eq!(frame.len(), 1 + HEADER_LEN + MAX_PAYLOAD_LEN);
        prop_assert_eq!(&frame[4..], &payload[..MAX_PAYLOAD_LEN]);
    }

    /// A corrupted length byte can never drive a FIFO read past the
    /// hardware ceiling.
    #[test]
    fn parsed_payload_length_is_bounded(length_byte: u8) {
        prop_assert!(payload_len(length_byte) <= 66 - HEADER_LEN);
    }
}

#[test]
fn control_bits_are_the_documented_ones() {
    assert_eq!(ctl_byte(true, false), CTL_SENDACK);
    assert_eq!(ctl_byte(false, true), CTL_REQACK);
    assert_eq!(ctl_byte(false, false), 0);
}
