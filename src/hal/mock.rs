//! Mock register bus for testing
//!
//! Simulates the RFM69 register file and FIFO without hardware, so the
//! protocol engine can be exercised end to end. Two mock chips can be linked
//! over a shared "air": writing the transmit opmode on one side delivers the
//! FIFO contents into the peer's FIFO (when the peer is receiving) and raises
//! payload-ready there. Interrupt edges are modelled as `mpsc` notifications;
//! the harness forwards each one to `Radio::on_interrupt`.

use std::collections::VecDeque;
use std::sync::mpsc::{channel, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::hal::{HalError, RegisterBus};
use crate::registers::*;

/// Raw RSSI register default: 230 reads back as -115 dBm, a quiet channel.
const QUIET_RSSI_RAW: u8 = 230;

/// Simulated chip state behind one mock bus.
pub struct ChipState {
    pub regs: [u8; 0x80],
    pub fifo: VecDeque<u8>,
    pub rssi_raw: u8,
    /// Frames clocked out over the air, newest last.
    pub transmitted: Vec<Vec<u8>>,
    irq_flags2: u8,
}

impl ChipState {
    fn new() -> Self {
        Self {
            regs: [0; 0x80],
            fifo: VecDeque::new(),
            rssi_raw: QUIET_RSSI_RAW,
            transmitted: Vec::new(),
            irq_flags2: 0,
        }
    }

    fn opmode_bits(&self) -> u8 {
        self.regs[REG_OPMODE as usize] & 0x1C
    }
}

struct Peer {
    chip: Arc<Mutex<ChipState>>,
    irq: Sender<()>,
}

/// Mock implementation of [`RegisterBus`].
pub struct MockBus {
    chip: Arc<Mutex<ChipState>>,
    irq: Sender<()>,
    peer: Option<Peer>,
}

impl MockBus {
    /// A lone chip with no air link; interrupt edges still arrive on the
    /// returned receiver (e.g. after a transmission completes).
    pub fn standalone() -> (Self, Receiver<()>) {
        let (tx, rx) = channel();
        (
            Self {
                chip: Arc::new(Mutex::new(ChipState::new())),
                irq: tx,
                peer: None,
            },
            rx,
        )
    }

    /// Shared handle onto the chip state, for inspection and RSSI control.
    pub fn chip_handle(&self) -> Arc<Mutex<ChipState>> {
        Arc::clone(&self.chip)
    }

    fn write_reg_locked(chip: &mut ChipState, addr: u8, value: u8) {
        if addr == REG_IRQFLAGS2 {
            // Writing the overrun bit flushes the FIFO
            if value & RF_IRQFLAGS2_FIFOOVERRUN != 0 {
                chip.fifo.clear();
                chip.irq_flags2 &= !RF_IRQFLAGS2_PAYLOADREADY;
            }
            return;
        }
        if addr == REG_PACKETCONFIG2 && value & RF_PACKET2_RXRESTART != 0 {
            // The restart strobe discards any pending payload and self-clears
            chip.fifo.clear();
            chip.irq_flags2 &= !RF_IRQFLAGS2_PAYLOADREADY;
            chip.regs[addr as usize] = value & !RF_PACKET2_RXRESTART;
            return;
        }
        chip.regs[addr as usize] = value;
    }

    fn read_reg_locked(chip: &mut ChipState, addr: u8) -> u8 {
        match addr {
            REG_FIFO => {
                let byte = chip.fifo.pop_front().unwrap_or(0);
                if chip.fifo.is_empty() {
                    chip.irq_flags2 &= !RF_IRQFLAGS2_PAYLOADREADY;
                }
                byte
            }
            REG_IRQFLAGS1 => RF_IRQFLAGS1_MODEREADY,
            REG_IRQFLAGS2 => {
                let mut flags = chip.irq_flags2;
                if !chip.fifo.is_empty() {
                    flags |= RF_IRQFLAGS2_FIFONOTEMPTY;
                }
                flags
            }
            REG_RSSICONFIG => RF_RSSI_DONE,
            REG_RSSIVALUE => chip.rssi_raw,
            REG_OSC1 => RF_OSC1_RCCAL_DONE,
            REG_TEMP1 => 0,
            _ => chip.regs[addr as usize],
        }
    }

    /// Handle a mode write; transmit transitions clock the FIFO out over the
    /// air. Never holds both chip locks at once.
    fn write_opmode(&mut self, value: u8) {
        let frame = {
            let mut chip = self.chip.lock().unwrap();
            let was_tx = chip.opmode_bits() == RF_OPMODE_TRANSMITTER;
            chip.regs[REG_OPMODE as usize] = value;
            let now_tx = chip.opmode_bits() == RF_OPMODE_TRANSMITTER;
            // TX start condition is a non-empty FIFO
            if now_tx && !was_tx && !chip.fifo.is_empty() {
                Some(chip.fifo.drain(..).collect())
            } else {
                if !now_tx {
                    chip.irq_flags2 &= !RF_IRQFLAGS2_PACKETSENT;
                }
                None
            }
        };

        if let Some(frame) = frame {
            self.clock_out(frame);
        }
    }

    /// One frame leaves the antenna: record it, raise packet-sent here, and
    /// land it in the peer's FIFO when the peer is listening. Never holds
    /// both chip locks at once.
    fn clock_out(&self, frame: Vec<u8>) {
        {
            let mut chip = self.chip.lock().unwrap();
            chip.irq_flags2 |= RF_IRQFLAGS2_PACKETSENT;
            chip.transmitted.push(frame.clone());
        }
        // Packet-sent edge on this side
        let _ = self.irq.send(());

        if let Some(peer) = &self.peer {
            let delivered = {
                let mut chip = peer.chip.lock().unwrap();
                if chip.opmode_bits() == RF_OPMODE_RECEIVER {
                    chip.fifo.clear();
                    chip.fifo.extend(frame.iter());
                    chip.irq_flags2 |= RF_IRQFLAGS2_PAYLOADREADY;
                    true
                } else {
                    false
                }
            };
            if delivered {
                let _ = peer.irq.send(());
            }
        }
    }
}

impl RegisterBus for MockBus {
    fn read_register(&mut self, addr: u8) -> Result<u8, HalError> {
        let mut chip = self.chip.lock().unwrap();
        Ok(Self::read_reg_locked(&mut chip, addr & 0x7F))
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError> {
        let addr = addr & 0x7F;
        if addr == REG_OPMODE {
            self.write_opmode(value);
            return Ok(());
        }
        let mut chip = self.chip.lock().unwrap();
        Self::write_reg_locked(&mut chip, addr, value);
        Ok(())
    }

    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), HalError> {
        if buf.is_empty() {
            return Ok(());
        }
        let write = buf[0] & 0x80 != 0;
        let addr = buf[0] & 0x7F;
        if write && addr == REG_FIFO {
            // While transmitting, FIFO writes are clocked straight out (the
            // TX start condition is a non-empty FIFO); otherwise they queue.
            let frame = {
                let mut chip = self.chip.lock().unwrap();
                if chip.opmode_bits() == RF_OPMODE_TRANSMITTER {
                    Some(buf[1..].to_vec())
                } else {
                    for &byte in &buf[1..] {
                        chip.fifo.push_back(byte);
                    }
                    None
                }
            };
            if let Some(frame) = frame {
                self.clock_out(frame);
            }
            return Ok(());
        }
        let mut chip = self.chip.lock().unwrap();
        if write {
            // Burst writes auto-increment outside the FIFO
            for (i, &byte) in buf[1..].iter().enumerate() {
                Self::write_reg_locked(&mut chip, addr + i as u8, byte);
            }
        } else {
            for i in 1..buf.len() {
                let reg = if addr == REG_FIFO { addr } else { addr + (i - 1) as u8 };
                buf[i] = Self::read_reg_locked(&mut chip, reg);
            }
        }
        Ok(())
    }
}

/// One side of a linked mock pair: the bus plus its interrupt edges.
pub struct MockEndpoint {
    pub bus: MockBus,
    pub interrupts: Receiver<()>,
}

/// Factory for linked mock chips sharing one air.
pub struct MockMedium;

impl MockMedium {
    /// Two chips wired to each other: transmissions on one side land in the
    /// other's FIFO whenever that side is in receive mode.
    pub fn linked_pair() -> (MockEndpoint, MockEndpoint) {
        let chip_a = Arc::new(Mutex::new(ChipState::new()));
        let chip_b = Arc::new(Mutex::new(ChipState::new()));
        let (irq_a_tx, irq_a_rx) = channel();
        let (irq_b_tx, irq_b_rx) = channel();

        let bus_a = MockBus {
            chip: Arc::clone(&chip_a),
            irq: irq_a_tx.clone(),
            peer: Some(Peer {
                chip: Arc::clone(&chip_b),
                irq: irq_b_tx.clone(),
            }),
        };
        let bus_b = MockBus {
            chip: chip_b,
            irq: irq_b_tx,
            peer: Some(Peer {
                chip: chip_a,
                irq: irq_a_tx,
            }),
        };

        (
            MockEndpoint {
                bus: bus_a,
                interrupts: irq_a_rx,
            },
            MockEndpoint {
                bus: bus_b,
                interrupts: irq_b_rx,
            },
        )
    }
}
