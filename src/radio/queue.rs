//! # Packet Queue and ACK Tracker
//!
//! The two channels through which the interrupt context hands decoded data
//! to application threads. Both pair a mutex-guarded collection with a
//! condition variable so consumers can block with or without a deadline.

use std::collections::{HashSet, VecDeque};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::radio::codec::Packet;

/// Thread-safe FIFO of received packets.
///
/// Unbounded: sustained reception without consumption grows memory without
/// limit. Capacity policy is deliberately left to the consumer.
#[derive(Default)]
pub struct PacketQueue {
    packets: Mutex<VecDeque<Packet>>,
    available: Condvar,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a packet and wake blocked consumers.
    pub fn push(&self, packet: Packet) {
        let mut packets = self.packets.lock().unwrap();
        packets.push_back(packet);
        self.available.notify_all();
    }

    /// Pop the oldest packet. With `block`, waits up to `timeout` (or
    /// indefinitely if `None`) for one to arrive.
    pub fn pop(&self, block: bool, timeout: Option<Duration>) -> Option<Packet> {
        let mut packets = self.packets.lock().unwrap();
        if let Some(packet) = packets.pop_front() {
            return Some(packet);
        }
        if !block {
            return None;
        }
        match timeout {
            None => {
                while packets.is_empty() {
                    packets = self.available.wait(packets).unwrap();
                }
                packets.pop_front()
            }
            Some(timeout) => {
                let (mut packets, _) = self
                    .available
                    .wait_timeout_while(packets, timeout, |q| q.is_empty())
                    .unwrap();
                packets.pop_front()
            }
        }
    }

    /// Atomically drain everything buffered, oldest first.
    pub fn drain(&self) -> Vec<Packet> {
        let mut packets = self.packets.lock().unwrap();
        packets.drain(..).collect()
    }

    pub fn len(&self) -> usize {
        self.packets.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Thread-safe set of pending ACK arrivals keyed by sender id.
///
/// Recording is idempotent: duplicate ACKs from the same sender before
/// consumption coalesce into one marker. This is not per-send accounting;
/// it is the simplest correct semantics for a single-outstanding-request
/// protocol.
#[derive(Default)]
pub struct AckTracker {
    pending: Mutex<HashSet<u8>>,
    arrived: Condvar,
}

impl AckTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark an ACK from `sender` as pending and wake waiters.
    pub fn record(&self, sender: u8) {
        let mut pending = self.pending.lock().unwrap();
        pending.insert(sender);
        self.arrived.notify_all();
    }

    /// Wait until an ACK from `sender` is pending, consuming the marker.
    /// Returns whether one was observed within the deadline.
    pub fn wait_for(&self, sender: u8, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut pending = self.pending.lock().unwrap();
        loop {
            if pending.remove(&sender) {
                return true;
            }
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            let (guard, result) = self.arrived.wait_timeout(pending, remaining).unwrap();
            pending = guard;
            if result.timed_out() && !pending.contains(&sender) {
                return false;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn packet(sender: u8, payload: &[u8]) -> Packet {
        Packet::new(1, sender, -60, payload.to_vec())
    }

    #[test]
    fn queue_is_fifo() {
        let queue = PacketQueue::new();
        queue.push(packet(2, b"first"));
        queue.push(packet(3, b"second"));

        assert_eq!(queue.len(), 2);
        assert_eq!(queue.pop(false, None).unwrap().payload, b"first");
        assert_eq!(queue.pop(false, None).unwrap().payload, b"second");
        assert!(queue.pop(false, None).is_none());
    }

    #[test]
    fn drain_empties_in_order() {
        let queue = PacketQueue::new();
        queue.push(packet(2, b"a"));
        queue.push(packet(2, b"b"));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].payload, b"a");
        assert!(queue.is_empty());
    }

    #[test]
    fn blocking_pop_times_out_when_empty() {
        let queue = PacketQueue::new();
        let start = Instant::now();
        assert!(queue.pop(true, Some(Duration::from_millis(50))).is_none());
        assert!(start.elapsed() >= Duration::from_millis(50));
    }

    #[test]
    fn blocking_pop_wakes_on_push() {
        let queue = Arc::new(PacketQueue::new());
        let producer = Arc::clone(&queue);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            producer.push(packet(9, b"late"));
        });

        let got = queue.pop(true, Some(Duration::from_secs(2)));
        handle.join().unwrap();
        assert_eq!(got.unwrap().sender_id, 9);
    }

    #[test]
    fn ack_recorded_then_waited_succeeds_immediately() {
        let tracker = AckTracker::new();
        tracker.record(7);
        assert!(tracker.wait_for(7, Duration::from_millis(10)));
    }

    #[test]
    fn ack_marker_is_consumed_exactly_once() {
        let tracker = AckTracker::new();
        tracker.record(7);
        assert!(tracker.wait_for(7, Duration::from_millis(10)));
        // Marker gone: a second wait on the same record times out
        assert!(!tracker.wait_for(7, Duration::from_millis(10)));
    }

    #[test]
    fn duplicate_acks_coalesce() {
        let tracker = AckTracker::new();
        tracker.record(7);
        tracker.record(7);
        assert!(tracker.wait_for(7, Duration::from_millis(10)));
        assert!(!tracker.wait_for(7, Duration::from_millis(10)));
    }

    #[test]
    fn wait_wakes_on_concurrent_record() {
        let tracker = Arc::new(AckTracker::new());
        let recorder = Arc::clone(&tracker);
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            recorder.record(4);
        });

        assert!(tracker.wait_for(4, Duration::from_secs(2)));
        handle.join().unwrap();
    }

    #[test]
    fn wait_for_other_sender_times_out() {
        let tracker = AckTracker::new();
        tracker.record(7);
        assert!(!tracker.wait_for(8, Duration::from_millis(10)));
        // The unrelated marker is untouched
        assert!(tracker.wait_for(7, Duration::from_millis(10)));
    }
}
