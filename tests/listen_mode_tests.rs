//! # Listen Mode Tests
//!
//! Duty-cycle quantization through the public API, and the high-speed burst
//! transmission inspected at the mock chip: frame layout, countdown stamps,
//! and restoration of the normal configuration afterwards.

use rfm69_station::hal::MockBus;
use rfm69_station::registers::{REG_SYNCVALUE1, REG_SYNCVALUE2};
use rfm69_station::{Mode, Radio, RadioConfig};

fn test_config(node_id: u8) -> RadioConfig {
    RadioConfig {
        node_id,
        reset_pin: None,
        ..RadioConfig::default()
    }
}

#[test]
fn default_duty_cycle_is_a_quarter_millisecond_per_second() {
    let (bus, _irq) = MockBus::standalone();
    let radio = Radio::with_bus(bus, test_config(1)).expect("radio init");

    let (rx, idle) = radio.listen_mode_get_durations();
    assert_eq!(rx, 256);
    // One second quantizes to 244 ticks of 4.1 ms
    assert_eq!(idle, 1_000_400);
}

#[test]
fn requested_durations_are_quantized_to_the_grid() {
    let (bus, _irq) = MockBus::standalone();
    let radio = Radio::with_bus(bus, test_config(1)).expect("radio init");

    let realized = radio.listen_mode_set_durations(256, 10_000).unwrap();
    assert_eq!(realized, (256, 9_984));
    assert_eq!(radio.listen_mode_get_durations(), (256, 9_984));

    // 50 ms overflows the fast resolution and lands on the 4.1 ms grid
    let realized = radio.listen_mode_set_durations(50_000, 10_000).unwrap();
    assert_eq!(realized, (49_200, 9_984));
}

#[test]
fn out_of_range_duration_is_rejected_and_keeps_the_old_cycle() {
    let (bus, _irq) = MockBus::standalone();
    let radio = Radio::with_bus(bus, test_config(1)).expect("radio init");

    let before = radio.listen_mode_get_durations();
    // 100 s cannot be expressed even at the slowest resolution
    assert!(radio.listen_mode_set_durations(256, 100_000_000).is_err());
    assert!(radio.listen_mode_set_durations(100_000_000, 1_000).is_err());
    assert_eq!(radio.listen_mode_get_durations(), before);
}

#[test]
fn burst_repeats_the_frame_with_a_countdown() {
    let (bus, _irq) = MockBus::standalone();
    let chip = bus.chip_handle();
    let mut radio = Radio::with_bus(bus, test_config(1)).expect("radio init");

    // Keep the cycle short so the burst finishes quickly
    radio.listen_mode_set_durations(256, 10_000).expect("durations");
    radio.listen_mode_send_burst(9, b"wake").expect("burst");

    let transmitted = chip.lock().unwrap().transmitted.clone();
    assert!(!transmitted.is_empty());

    let first = &transmitted[0];
    // [length][to][from][remaining lo][remaining hi][payload]
    assert_eq!(first[0] as usize, b"wake".len() + 4);
    assert_eq!(first[1], 9);
    assert_eq!(first[2], 1);
    // The cycle is 10 240 µs, so the countdown starts at 10 ms
    assert_eq!(first[3], 10);
    assert_eq!(first[4], 0);
    assert_eq!(&first[5..], b"wake");

    // Countdown stamps never increase across the burst
    let stamps: Vec<u16> = transmitted
        .iter()
        .map(|frame| frame[3] as u16 | (frame[4] as u16) << 8)
        .collect();
    assert!(stamps.windows(2).all(|pair| pair[1] <= pair[0]));
}

#[test]
fn burst_restores_the_normal_configuration() {
    let (bus, _irq) = MockBus::standalone();
    let chip = bus.chip_handle();
    let mut radio = Radio::with_bus(bus, test_config(1)).expect("radio init");

    radio.listen_mode_set_durations(256, 10_000).expect("durations");
    radio.listen_mode_send_burst(9, b"wake").expect("burst");

    // Back to receiving on the network sync word, not the burst one
    assert_eq!(radio.mode(), Mode::Receive);
    let regs = chip.lock().unwrap().regs;
    assert_eq!(regs[REG_SYNCVALUE1 as usize], 0x2D);
    assert_eq!(regs[REG_SYNCVALUE2 as usize], 100);
}
