//! # Listen Mode Duty Cycle
//!
//! Quantizes requested RX/idle phase durations onto the chip's listen-mode
//! timing grid. Each phase is expressed as a resolution (64 µs, 4.1 ms or
//! 262 ms per tick) and an 8-bit coefficient; the realized duration is their
//! product. The realized cycle length also paces burst transmissions toward
//! duty-cycled receivers.

use crate::registers::*;

const RX_RESOLUTIONS: [u8; 3] = [
    RF_LISTEN1_RESOL_RX_64,
    RF_LISTEN1_RESOL_RX_4100,
    RF_LISTEN1_RESOL_RX_262000,
];

const IDLE_RESOLUTIONS: [u8; 3] = [
    RF_LISTEN1_RESOL_IDLE_64,
    RF_LISTEN1_RESOL_IDLE_4100,
    RF_LISTEN1_RESOL_IDLE_262000,
];

/// Tick length in microseconds for a resolution code.
fn resolution_us(code: u8) -> u64 {
    match code {
        RF_LISTEN1_RESOL_RX_64 | RF_LISTEN1_RESOL_IDLE_64 => 64,
        RF_LISTEN1_RESOL_RX_4100 | RF_LISTEN1_RESOL_IDLE_4100 => 4_100,
        RF_LISTEN1_RESOL_RX_262000 | RF_LISTEN1_RESOL_IDLE_262000 => 262_000,
        _ => 0,
    }
}

/// Nearest coefficient for `duration_us` at the given resolution. Rounds to
/// whichever neighboring multiple lands closer to the request.
fn nearest_coef(code: u8, duration_us: u64) -> u64 {
    let tick = resolution_us(code);
    let floor = duration_us / tick;
    let below = duration_us - floor * tick;
    let above = (floor + 1) * tick - duration_us;
    if above < below {
        floor + 1
    } else {
        floor
    }
}

/// First resolution, fastest tick first, whose nearest coefficient fits in
/// eight bits. A zero coefficient is an acceptable quantization of a very
/// short request.
fn choose(resolutions: &[u8; 3], duration_us: u64) -> Option<(u8, u8)> {
    resolutions.iter().find_map(|&code| {
        let coef = nearest_coef(code, duration_us);
        (coef <= 255).then(|| (code, coef as u8))
    })
}

/// One quantized listen phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Phase {
    code: u8,
    coef: u8,
}

impl Phase {
    fn duration_us(self) -> u64 {
        resolution_us(self.code) * self.coef as u64
    }
}

/// Holds the current RX/idle quantization. Not internally synchronized; the
/// radio serializes access.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListenScheduler {
    rx: Phase,
    idle: Phase,
}

impl ListenScheduler {
    /// Starts at the default duty cycle: 256 µs receiving out of roughly
    /// every second.
    pub fn new() -> Self {
        let mut scheduler = Self {
            rx: Phase { code: RF_LISTEN1_RESOL_RX_64, coef: 0 },
            idle: Phase { code: RF_LISTEN1_RESOL_IDLE_64, coef: 0 },
        };
        // The defaults always quantize
        scheduler
            .set_durations(DEFAULT_LISTEN_RX_US, DEFAULT_LISTEN_IDLE_US)
            .unwrap_or((0, 0));
        scheduler
    }

    /// Quantize and adopt a new duty cycle. Returns the realized durations,
    /// which may differ slightly from the request. When either phase cannot
    /// be expressed on the timing grid, nothing changes and `None` is
    /// returned.
    pub fn set_durations(&mut self, rx_us: u64, idle_us: u64) -> Option<(u64, u64)> {
        let (rx_code, rx_coef) = choose(&RX_RESOLUTIONS, rx_us)?;
        let (idle_code, idle_coef) = choose(&IDLE_RESOLUTIONS, idle_us)?;
        self.rx = Phase { code: rx_code, coef: rx_coef };
        self.idle = Phase { code: idle_code, coef: idle_coef };
        Some(self.durations())
    }

    /// Realized (rx, idle) durations in microseconds.
    pub fn durations(&self) -> (u64, u64) {
        (self.rx.duration_us(), self.idle.duration_us())
    }

    /// Realized full cycle length in microseconds.
    pub fn cycle_us(&self) -> u64 {
        self.rx.duration_us() + self.idle.duration_us()
    }
}

impl Default for ListenScheduler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_realize_near_the_requested_cycle() {
        let scheduler = ListenScheduler::new();
        let (rx, idle) = scheduler.durations();
        // 256 µs is exactly 4 ticks of 64 µs
        assert_eq!(rx, 256);
        // 1 s rounds to 244 ticks of 4.1 ms
        assert_eq!(idle, 1_000_400);
        assert_eq!(scheduler.cycle_us(), 1_000_656);
    }

    #[test]
    fn rounding_picks_the_closer_multiple() {
        // 100 µs sits between 64 and 128; 128 is closer
        assert_eq!(nearest_coef(RF_LISTEN1_RESOL_RX_64, 100), 2);
        // 90 µs is closer to 64
        assert_eq!(nearest_coef(RF_LISTEN1_RESOL_RX_64, 90), 1);
    }

    #[test]
    fn overly_long_request_is_rejected_without_change() {
        let mut scheduler = ListenScheduler::new();
        let before = scheduler.durations();
        // 100 s exceeds 255 ticks of even the slowest resolution
        assert!(scheduler.set_durations(256, 100_000_000).is_none());
        assert_eq!(scheduler.durations(), before);
    }

    #[test]
    fn rx_rejection_leaves_idle_untouched() {
        let mut scheduler = ListenScheduler::new();
        let before = scheduler.durations();
        assert!(scheduler.set_durations(100_000_000, 1_000).is_none());
        assert_eq!(scheduler.durations(), before);
    }

    #[test]
    fn slower_resolution_engaged_when_fast_one_overflows() {
        let mut scheduler = ListenScheduler::new();
        // 50 ms needs 781 ticks of 64 µs, so 4.1 ms resolution carries it
        let (rx, _idle) = scheduler.set_durations(50_000, 1_000_000).unwrap();
        assert_eq!(rx, 12 * 4_100);
    }

    #[test]
    fn tiny_request_quantizes_to_zero() {
        let mut scheduler = ListenScheduler::new();
        let (rx, _idle) = scheduler.set_durations(10, 1_000_000).unwrap();
        assert_eq!(rx, 0);
    }
}
