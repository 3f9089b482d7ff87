//! # RFM69 Driver Core
//!
//! Ties the register bus, mode controller, frame codec and packet queue into
//! the full transceiver: initialization and reset handshake, CSMA-gated
//! transmission with retries and acknowledgements, the interrupt-driven
//! receive path, and listen-mode burst wake-up for duty-cycled peers.
//!
//! The driver is generic over [`RegisterBus`], so the same engine runs
//! against the Raspberry Pi SPI bus or the in-memory mock.

pub mod codec;
pub mod listen;
pub mod mode;
pub mod queue;

use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use crate::config::{band_register_table, FrequencyBand, RadioConfig};
use crate::error::RadioError;
use crate::hal::RegisterBus;
use crate::registers::*;

pub use codec::Packet;
pub use mode::Mode;

use listen::ListenScheduler;
use mode::ModeController;
use queue::{AckTracker, PacketQueue};

/// Options for [`Radio::send`].
#[derive(Debug, Clone, Copy)]
pub struct SendOpts {
    /// Number of transmission attempts. More than one attempt implies an
    /// acknowledgement is required.
    pub attempts: u8,
    /// How long to wait for an acknowledgement after each attempt.
    pub wait_ms: u64,
    /// Require an acknowledgement before reporting success.
    pub require_ack: bool,
}

impl Default for SendOpts {
    fn default() -> Self {
        Self {
            attempts: 3,
            wait_ms: 50,
            require_ack: true,
        }
    }
}

/// Result of a [`Radio::send`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// The recipient acknowledged the frame.
    Acknowledged,
    /// All attempts elapsed without an acknowledgement.
    NoAck,
    /// The frame went out without requesting an acknowledgement.
    AckNotRequested,
}

struct Shared<B: RegisterBus> {
    bus: Mutex<B>,
    modes: ModeController,
    queue: PacketQueue,
    acks: AckTracker,
    listen: Mutex<ListenScheduler>,
    /// Transmit-complete latch, set by the interrupt handler once the FIFO
    /// has been clocked out. Its mutex doubles as the protocol gate: senders
    /// hold it from the channel check through the completion wait, so the
    /// interrupt receive path and an application-thread transmission can
    /// never interleave on the chip.
    tx_gate: Mutex<bool>,
    tx_signal: Condvar,
    band: FrequencyBand,
    node_id: u8,
    network_id: AtomicU8,
    auto_acknowledge: bool,
    high_power: bool,
    promiscuous: AtomicBool,
    /// PA output level, 0..=31
    power_level: AtomicU8,
    encryption_key: Option<[u8; 16]>,
}

/// RFM69 transceiver driver.
///
/// Construct with [`Radio::open`] on a Raspberry Pi or [`Radio::with_bus`]
/// over any [`RegisterBus`]. The radio starts out receiving; dropping it
/// powers the module down.
pub struct Radio<B: RegisterBus> {
    shared: Arc<Shared<B>>,
    #[cfg(feature = "raspberry-pi")]
    irq_line: Option<crate::hal::InterruptLine>,
    #[cfg(feature = "raspberry-pi")]
    interrupt_pin: u8,
    closed: bool,
}

#[cfg(feature = "raspberry-pi")]
impl Radio<crate::hal::SpiBus> {
    /// Open the radio on the Raspberry Pi SPI/GPIO pins named in `config`:
    /// hard reset if a reset pin is wired, full initialization, then
    /// rising-edge interrupt dispatch from DIO0.
    pub fn open(config: RadioConfig) -> Result<Self, RadioError> {
        if let Some(pin) = config.reset_pin {
            crate::hal::ResetLine::open(pin)?.pulse();
        }
        let bus = crate::hal::SpiBus::open(config.spi_bus, config.spi_device)?;
        let mut radio = Self::with_bus(bus, config)?;
        radio.attach_interrupt()?;
        // an edge raised before attachment would stay latched; re-arm
        radio.begin_receive()?;
        Ok(radio)
    }
}

impl<B: RegisterBus + 'static> Radio<B> {
    #[cfg(feature = "raspberry-pi")]
    fn attach_interrupt(&mut self) -> Result<(), RadioError> {
        let mut line = crate::hal::InterruptLine::open(self.interrupt_pin)?;
        let handler = self.interrupt_handler();
        line.attach(move || handler())?;
        self.irq_line = Some(line);
        Ok(())
    }

    /// Bring up the radio over an already-open register bus. Performs the
    /// sync handshake, writes the band configuration, applies encryption and
    /// power settings, calibrates, and starts receiving.
    pub fn with_bus(bus: B, config: RadioConfig) -> Result<Self, RadioError> {
        if !(1..=254).contains(&config.network_id) {
            return Err(RadioError::Config(format!(
                "network id {} out of range 1..=254",
                config.network_id
            )));
        }
        if config.power_percent > 100 {
            return Err(RadioError::Config(format!(
                "power percentage {} exceeds 100",
                config.power_percent
            )));
        }

        let shared = Arc::new(Shared {
            bus: Mutex::new(bus),
            modes: ModeController::new(config.high_power),
            queue: PacketQueue::new(),
            acks: AckTracker::new(),
            listen: Mutex::new(ListenScheduler::new()),
            tx_gate: Mutex::new(false),
            tx_signal: Condvar::new(),
            band: config.band,
            node_id: config.node_id,
            network_id: AtomicU8::new(config.network_id),
            auto_acknowledge: config.auto_acknowledge,
            high_power: config.high_power,
            promiscuous: AtomicBool::new(config.promiscuous),
            power_level: AtomicU8::new(0),
            encryption_key: config.encryption_key,
        });

        shared.initialize()?;
        shared.apply_encryption()?;
        shared.set_power_percent(config.power_percent)?;
        shared.read_temperature(0)?;
        shared.calibrate_rc_oscillator()?;
        shared.begin_receive()?;
        info!(
            "radio up: node {} on network {} ({:?})",
            config.node_id, config.network_id, config.band
        );

        Ok(Self {
            shared,
            #[cfg(feature = "raspberry-pi")]
            irq_line: None,
            #[cfg(feature = "raspberry-pi")]
            interrupt_pin: config.interrupt_pin,
            closed: false,
        })
    }

    /// A callback suitable for wiring to an interrupt line; each invocation
    /// services one DIO0 rising edge.
    pub fn interrupt_handler(&self) -> impl Fn() + Send + 'static {
        let shared = Arc::clone(&self.shared);
        move || shared.on_interrupt()
    }

    /// Service a DIO0 rising edge directly.
    pub fn on_interrupt(&self) {
        self.shared.on_interrupt();
    }

    /// Send `payload` to node `to`, retrying per `opts`. With more than one
    /// attempt an acknowledgement is both requested and required. A zero
    /// attempt count is treated as one.
    pub fn send(&self, to: u8, payload: &[u8], opts: SendOpts) -> Result<SendOutcome, RadioError> {
        let attempts = opts.attempts.max(1);
        let require_ack = opts.require_ack || attempts > 1;

        for _ in 0..attempts {
            self.shared.transmit(to, payload, require_ack)?;
            if !require_ack {
                return Ok(SendOutcome::AckNotRequested);
            }
            if self
                .shared
                .acks
                .wait_for(to, Duration::from_millis(opts.wait_ms))
            {
                return Ok(SendOutcome::Acknowledged);
            }
        }
        Ok(SendOutcome::NoAck)
    }

    /// Send `payload` to every node on the network: one attempt, no
    /// acknowledgement.
    pub fn broadcast(&self, payload: &[u8]) -> Result<SendOutcome, RadioError> {
        self.send(
            BROADCAST_ADDR,
            payload,
            SendOpts {
                attempts: 1,
                require_ack: false,
                ..SendOpts::default()
            },
        )
    }

    /// Send an acknowledgement frame to node `to`.
    pub fn send_ack(&self, to: u8, payload: &[u8]) -> Result<(), RadioError> {
        self.shared.send_ack(to, payload)
    }

    /// Switch the module to receive mode.
    pub fn begin_receive(&self) -> Result<(), RadioError> {
        self.shared.begin_receive()
    }

    /// Pop the oldest received packet. With `block`, waits up to `timeout`
    /// (or indefinitely if `None`) for one to arrive.
    pub fn get_packet(&self, block: bool, timeout: Option<Duration>) -> Option<Packet> {
        self.shared.queue.pop(block, timeout)
    }

    /// Drain every buffered packet, oldest first.
    pub fn get_all_packets(&self) -> Vec<Packet> {
        self.shared.queue.drain()
    }

    pub fn has_received_packet(&self) -> bool {
        !self.shared.queue.is_empty()
    }

    pub fn num_packets(&self) -> usize {
        self.shared.queue.len()
    }

    pub fn node_id(&self) -> u8 {
        self.shared.node_id
    }

    pub fn network_id(&self) -> u8 {
        self.shared.network_id.load(Ordering::Relaxed)
    }

    pub fn mode(&self) -> Mode {
        self.shared.modes.current()
    }

    /// Move to a new network id (sync word byte 2), 1..=254.
    pub fn set_network(&self, network_id: u8) -> Result<(), RadioError> {
        if !(1..=254).contains(&network_id) {
            return Err(RadioError::Config(format!(
                "network id {network_id} out of range 1..=254"
            )));
        }
        self.shared
            .bus
            .lock()
            .unwrap()
            .write_register(REG_SYNCVALUE2, network_id)?;
        self.shared.network_id.store(network_id, Ordering::Relaxed);
        Ok(())
    }

    /// Set the transmit power as a percentage of the PA range, 0..=100.
    pub fn set_power_level(&self, percent: u8) -> Result<(), RadioError> {
        self.shared.set_power_percent(percent)
    }

    /// Accept frames regardless of their destination address.
    pub fn set_promiscuous(&self, on: bool) {
        self.shared.promiscuous.store(on, Ordering::Relaxed);
    }

    /// Put the module into sleep mode.
    pub fn sleep(&self) -> Result<(), RadioError> {
        self.shared.modes.set_mode(&self.shared.bus, Mode::Sleep)
    }

    /// Read the temperature of the CMOS die in centigrade. `cal_factor`
    /// adds a user-supplied slope correction.
    pub fn read_temperature(&self, cal_factor: i16) -> Result<i16, RadioError> {
        self.shared.read_temperature(cal_factor)
    }

    /// Recalibrate the internal RC oscillator, for use across wide
    /// temperature variations.
    pub fn calibrate_rc_oscillator(&self) -> Result<(), RadioError> {
        self.shared.calibrate_rc_oscillator()
    }

    /// Tune the carrier to `frequency_hz`, quantized to the synthesizer
    /// step.
    pub fn set_frequency_hz(&self, frequency_hz: u32) -> Result<(), RadioError> {
        let frf = (frequency_hz as f64 / FSTEP).round() as u32;
        let mut bus = self.shared.bus.lock().unwrap();
        bus.write_register(REG_FRFMSB, (frf >> 16) as u8)?;
        bus.write_register(REG_FRFMID, (frf >> 8) as u8)?;
        bus.write_register(REG_FRFLSB, frf as u8)?;
        Ok(())
    }

    /// The currently tuned carrier frequency in Hertz.
    pub fn frequency_hz(&self) -> Result<u32, RadioError> {
        let mut bus = self.shared.bus.lock().unwrap();
        let frf = ((bus.read_register(REG_FRFMSB)? as u32) << 16)
            | ((bus.read_register(REG_FRFMID)? as u32) << 8)
            | bus.read_register(REG_FRFLSB)? as u32;
        Ok((frf as f64 * FSTEP).round() as u32)
    }

    /// Dump the configuration register file as (address, value) pairs.
    pub fn read_registers(&self) -> Result<Vec<(u8, u8)>, RadioError> {
        let mut bus = self.shared.bus.lock().unwrap();
        let mut registers = Vec::with_capacity(0x4F);
        for addr in 0x01..0x50u8 {
            registers.push((addr, bus.read_register(addr)?));
        }
        Ok(registers)
    }

    /// Set the listen-mode duty cycle. Durations are quantized onto the
    /// chip's timing grid and the realized values returned. A phase that
    /// cannot be expressed on the grid is a `Config` error and the previous
    /// cycle stays in force.
    pub fn listen_mode_set_durations(
        &self,
        rx_us: u64,
        idle_us: u64,
    ) -> Result<(u64, u64), RadioError> {
        self.shared
            .listen
            .lock()
            .unwrap()
            .set_durations(rx_us, idle_us)
            .ok_or_else(|| {
                RadioError::Config(format!(
                    "listen durations rx={rx_us}us idle={idle_us}us not representable"
                ))
            })
    }

    /// The realized (rx, idle) listen-mode durations in microseconds.
    pub fn listen_mode_get_durations(&self) -> (u64, u64) {
        self.shared.listen.lock().unwrap().durations()
    }

    /// Wake duty-cycled listeners by repeating `payload` at high speed for
    /// one full listen cycle, then restore the normal configuration and
    /// resume receiving. Interrupt dispatch pauses for the duration.
    pub fn listen_mode_send_burst(&mut self, to: u8, payload: &[u8]) -> Result<(), RadioError> {
        #[cfg(feature = "raspberry-pi")]
        let reattach = match self.irq_line.take() {
            Some(mut line) => {
                line.detach()?;
                true
            }
            None => false,
        };
        let result = self.shared.listen_send_burst(to, payload);
        #[cfg(feature = "raspberry-pi")]
        if reattach {
            self.attach_interrupt()?;
        }
        result
    }

}

impl<B: RegisterBus> Radio<B> {
    /// Power the module down: stop interrupt dispatch, drop the PA
    /// configuration, and enter sleep. Teardown is best-effort; faults are
    /// logged, and each step runs regardless of the ones before it. Called
    /// automatically on drop.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        #[cfg(feature = "raspberry-pi")]
        if let Some(line) = &mut self.irq_line {
            if let Err(err) = line.detach() {
                warn!("interrupt teardown failed: {err}");
            }
        }
        if let Err(err) = self.shared.apply_pa_config(false) {
            warn!("power amplifier teardown failed: {err}");
        }
        if let Err(err) = self.shared.modes.set_mode(&self.shared.bus, Mode::Sleep) {
            warn!("radio sleep failed: {err}");
        }
        info!("radio shut down");
    }
}

impl<B: RegisterBus> Drop for Radio<B> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<B: RegisterBus> Shared<B> {
    // ---- initialization ----

    fn initialize(&self) -> Result<(), RadioError> {
        self.sync_handshake(0xAA)?;
        self.sync_handshake(0x55)?;
        {
            let mut bus = self.bus.lock().unwrap();
            let network_id = self.network_id.load(Ordering::Relaxed);
            for (addr, value) in band_register_table(self.band, network_id) {
                bus.write_register(addr, value)?;
            }
        }
        self.apply_pa_config(self.high_power)?;
        self.wait_mode_ready()?;
        self.bus
            .lock()
            .unwrap()
            .write_register(REG_NODEADRS, self.node_id)?;
        Ok(())
    }

    /// Echo-check a sync byte to prove the chip is alive on the bus.
    fn sync_handshake(&self, value: u8) -> Result<(), RadioError> {
        let deadline = Instant::now() + Duration::from_secs(SYNC_TIMEOUT_S);
        let mut bus = self.bus.lock().unwrap();
        loop {
            bus.write_register(REG_SYNCVALUE1, value)?;
            if bus.read_register(REG_SYNCVALUE1)? == value {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(RadioError::InitFailed(format!(
                    "no response to sync byte 0x{value:02X}"
                )));
            }
        }
    }

    fn wait_mode_ready(&self) -> Result<(), RadioError> {
        loop {
            let flags: IrqFlags1 = {
                let mut bus = self.bus.lock().unwrap();
                bus.read_register(REG_IRQFLAGS1)?.into()
            };
            if flags.mode_ready() {
                return Ok(());
            }
        }
    }

    /// OCP and PA stage selection. High-power variants run PA1+PA2 with
    /// over-current protection off; standard modules run PA0 at the stored
    /// output level.
    fn apply_pa_config(&self, high_power: bool) -> Result<(), RadioError> {
        let mut bus = self.bus.lock().unwrap();
        if high_power {
            bus.write_register(REG_OCP, RF_OCP_OFF)?;
            let pa = bus.read_register(REG_PALEVEL)?;
            bus.write_register(
                REG_PALEVEL,
                (pa & RF_PALEVEL_OUTPUT_MASK) | RF_PALEVEL_PA1_ON | RF_PALEVEL_PA2_ON,
            )?;
        } else {
            bus.write_register(REG_OCP, RF_OCP_ON)?;
            bus.write_register(
                REG_PALEVEL,
                RF_PALEVEL_PA0_ON | self.power_level.load(Ordering::Relaxed),
            )?;
        }
        Ok(())
    }

    fn apply_encryption(&self) -> Result<(), RadioError> {
        self.modes.set_mode(&self.bus, Mode::Standby)?;
        let mut bus = self.bus.lock().unwrap();
        let aes = if let Some(key) = &self.encryption_key {
            let mut buf = Vec::with_capacity(17);
            buf.push(REG_AESKEY1 | 0x80);
            buf.extend_from_slice(key);
            bus.transfer(&mut buf)?;
            RF_PACKET2_AES_ON
        } else {
            RF_PACKET2_AES_OFF
        };
        let pc2 = bus.read_register(REG_PACKETCONFIG2)?;
        bus.write_register(REG_PACKETCONFIG2, (pc2 & 0xFE) | aes)?;
        Ok(())
    }

    fn set_power_percent(&self, percent: u8) -> Result<(), RadioError> {
        if percent > 100 {
            return Err(RadioError::Config(format!(
                "power percentage {percent} exceeds 100"
            )));
        }
        let level = ((31 * percent as u16 + 50) / 100) as u8;
        self.power_level.store(level, Ordering::Relaxed);
        let mut bus = self.bus.lock().unwrap();
        let pa = bus.read_register(REG_PALEVEL)?;
        bus.write_register(REG_PALEVEL, (pa & 0xE0) | level)?;
        Ok(())
    }

    // ---- transmit path ----

    /// CSMA-gated single transmission. Holds the protocol gate throughout,
    /// so an in-flight receive path drains its frame before the chip is
    /// touched here.
    fn transmit(&self, to: u8, payload: &[u8], request_ack: bool) -> Result<(), RadioError> {
        let gate = self.tx_gate.lock().unwrap();
        {
            // restart RX so a stale pending payload cannot wedge the channel check
            let mut bus = self.bus.lock().unwrap();
            let pc2 = bus.read_register(REG_PACKETCONFIG2)?;
            bus.write_register(REG_PACKETCONFIG2, (pc2 & 0xFB) | RF_PACKET2_RXRESTART)?;
        }
        self.wait_channel_clear()?;
        self.send_frame(gate, to, payload, request_ack, false)
    }

    fn send_ack(&self, to: u8, payload: &[u8]) -> Result<(), RadioError> {
        let gate = self.tx_gate.lock().unwrap();
        self.wait_channel_clear()?;
        self.send_frame(gate, to, payload, false, true)
    }

    /// Poll the CSMA gate until the channel is clear, for at most the CSMA
    /// budget. On budget exhaustion the transmission proceeds anyway.
    fn wait_channel_clear(&self) -> Result<(), RadioError> {
        let deadline = Instant::now() + Duration::from_millis(CSMA_LIMIT_MS);
        while !self.can_send()? {
            if Instant::now() >= deadline {
                debug!("channel busy past the CSMA budget, transmitting anyway");
                break;
            }
        }
        Ok(())
    }

    /// Channel-clear assessment. From standby the channel is taken as free
    /// and the receiver is started; while receiving, a quiet RSSI clears the
    /// way and drops to standby.
    fn can_send(&self) -> Result<bool, RadioError> {
        match self.modes.current() {
            Mode::Standby => {
                self.begin_receive()?;
                Ok(true)
            }
            Mode::Receive if self.read_rssi(false)? < CSMA_LIMIT_DBM => {
                self.modes.set_mode(&self.bus, Mode::Standby)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    fn send_frame(
        &self,
        mut gate: MutexGuard<'_, bool>,
        to: u8,
        payload: &[u8],
        request_ack: bool,
        send_ack: bool,
    ) -> Result<(), RadioError> {
        // receiver off while the FIFO is filled
        self.modes.set_mode(&self.bus, Mode::Standby)?;
        self.wait_mode_ready()?;
        self.bus
            .lock()
            .unwrap()
            .write_register(REG_DIOMAPPING1, RF_DIOMAPPING1_DIO0_00)?;

        let frame = codec::encode(to, self.node_id, payload, codec::ctl_byte(send_ack, request_ack));
        debug!("tx to {to}: {}", hex::encode(&frame));
        let mut buf = Vec::with_capacity(frame.len() + 1);
        buf.push(REG_FIFO | 0x80);
        buf.extend_from_slice(&frame);
        self.bus.lock().unwrap().transfer(&mut buf)?;

        // Arm the completion latch before entering transmit so the interrupt
        // cannot be missed, then wait out the packet-sent edge. The wait
        // releases the gate, which is what lets the handler signal.
        *gate = false;
        self.modes.set_mode(&self.bus, Mode::Transmit)?;
        let deadline = Instant::now() + Duration::from_millis(TX_LIMIT_MS);
        while !*gate {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                warn!("transmit completion not signalled within budget");
                break;
            };
            let (guard, _) = self.tx_signal.wait_timeout(gate, remaining).unwrap();
            gate = guard;
        }
        drop(gate);

        self.modes.set_mode(&self.bus, Mode::Receive)
    }

    fn read_rssi(&self, force_trigger: bool) -> Result<i16, RadioError> {
        let mut bus = self.bus.lock().unwrap();
        if force_trigger {
            bus.write_register(REG_RSSICONFIG, RF_RSSI_START)?;
            while bus.read_register(REG_RSSICONFIG)? & RF_RSSI_DONE == 0 {}
        }
        let raw = bus.read_register(REG_RSSIVALUE)?;
        Ok(-(raw as i16) >> 1)
    }

    // ---- receive path ----

    fn begin_receive(&self) -> Result<(), RadioError> {
        {
            let mut bus = self.bus.lock().unwrap();
            let flags2: IrqFlags2 = bus.read_register(REG_IRQFLAGS2)?.into();
            if flags2.payload_ready() {
                // restart RX to shed the stale payload
                let pc2 = bus.read_register(REG_PACKETCONFIG2)?;
                bus.write_register(REG_PACKETCONFIG2, (pc2 & 0xFB) | RF_PACKET2_RXRESTART)?;
            }
            // DIO0 is payload-ready while receiving
            bus.write_register(REG_DIOMAPPING1, RF_DIOMAPPING1_DIO0_01)?;
        }
        self.modes.set_mode(&self.bus, Mode::Receive)
    }

    /// Service one DIO0 rising edge. Wakes the transmit waiter on a
    /// packet-sent flag, then pulls a ready payload out of the FIFO. Never
    /// propagates errors to the dispatch thread.
    fn on_interrupt(&self) {
        let mut gate = self.tx_gate.lock().unwrap();
        let flags2: IrqFlags2 = match self.bus.lock().unwrap().read_register(REG_IRQFLAGS2) {
            Ok(raw) => raw.into(),
            Err(err) => {
                warn!("interrupt status read failed: {err}");
                return;
            }
        };
        if flags2.packet_sent() {
            *gate = true;
            self.tx_signal.notify_all();
        }
        if self.modes.current() != Mode::Receive || !flags2.payload_ready() {
            return;
        }
        if let Err(err) = self.receive_frame(gate) {
            warn!("receive path failed: {err}");
            if let Err(err) = self.begin_receive() {
                warn!("receiver restart failed: {err}");
            }
        }
    }

    fn receive_frame(&self, gate: MutexGuard<'_, bool>) -> Result<(), RadioError> {
        self.modes.set_mode(&self.bus, Mode::Standby)?;
        let mut header = [REG_FIFO, 0, 0, 0, 0];
        self.bus.lock().unwrap().transfer(&mut header)?;
        let data_len = codec::payload_len(header[1]);
        let frame = codec::decode_header(header[2], header[3], header[4]);

        let accepted = self.promiscuous.load(Ordering::Relaxed)
            || frame.to == self.node_id
            || frame.to == BROADCAST_ADDR;
        if !accepted {
            debug!("ignoring frame addressed to {}", frame.to);
            drop(gate);
            return self.begin_receive();
        }

        let mut buf = vec![0u8; data_len + 1];
        buf[0] = REG_FIFO;
        self.bus.lock().unwrap().transfer(&mut buf)?;
        let payload = buf[1..].to_vec();
        let rssi = self.read_rssi(false)?;

        // Only the addressed recipient answers an ack request
        let reply = frame.ack_requested() && !frame.is_ack() && frame.to == self.node_id;

        if frame.is_ack() {
            debug!("ack from {}", frame.from);
            self.acks.record(frame.from);
        } else {
            debug!(
                "rx from {} at {rssi} dBm: {}",
                frame.from,
                hex::encode(&payload)
            );
            self.queue
                .push(Packet::new(frame.to, frame.from, rssi, payload));
        }

        drop(gate);
        if reply && self.auto_acknowledge {
            self.send_ack(frame.from, &[])?;
        }
        self.begin_receive()
    }

    // ---- housekeeping ----

    fn read_temperature(&self, cal_factor: i16) -> Result<i16, RadioError> {
        self.modes.set_mode(&self.bus, Mode::Standby)?;
        let mut bus = self.bus.lock().unwrap();
        bus.write_register(REG_TEMP1, RF_TEMP1_MEAS_START)?;
        while bus.read_register(REG_TEMP1)? & RF_TEMP1_MEAS_RUNNING != 0 {}
        let raw = bus.read_register(REG_TEMP2)?;
        // Complement corrects the slope: rising temperature, rising value
        Ok(raw as i16 + 1 + COURSE_TEMP_COEF + cal_factor)
    }

    fn calibrate_rc_oscillator(&self) -> Result<(), RadioError> {
        let mut bus = self.bus.lock().unwrap();
        bus.write_register(REG_OSC1, RF_OSC1_RCCAL_START)?;
        while bus.read_register(REG_OSC1)? & RF_OSC1_RCCAL_DONE == 0 {}
        Ok(())
    }

    // ---- listen-mode burst ----

    /// Repeat a wake-up frame at high speed for one full listen cycle.
    /// Every frame carries the milliseconds remaining in the burst so a
    /// waking listener knows how long to stay up.
    fn listen_send_burst(&self, to: u8, payload: &[u8]) -> Result<(), RadioError> {
        let payload = &payload[..payload.len().min(MAX_PAYLOAD_LEN)];
        self.modes.set_mode(&self.bus, Mode::Standby)?;
        {
            let mut bus = self.bus.lock().unwrap();
            bus.write_register(
                REG_PACKETCONFIG1,
                RF_PACKET1_FORMAT_VARIABLE | RF_PACKET1_DCFREE_WHITENING | RF_PACKET1_CRC_ON,
            )?;
            bus.write_register(REG_PACKETCONFIG2, RF_PACKET2_AUTORXRESTART_ON | RF_PACKET2_AES_OFF)?;
            // burst sync word, distinct from the network sync
            bus.write_register(REG_SYNCVALUE1, 0x5A)?;
            bus.write_register(REG_SYNCVALUE2, 0x5A)?;
            // high-speed profile: 200 kbps, 100 kHz deviation, wide filter
            bus.write_register(REG_BITRATEMSB, RF_BITRATEMSB_200000)?;
            bus.write_register(REG_BITRATELSB, RF_BITRATELSB_200000)?;
            bus.write_register(REG_FDEVMSB, RF_FDEVMSB_100000)?;
            bus.write_register(REG_FDEVLSB, RF_FDEVLSB_100000)?;
            bus.write_register(
                REG_RXBW,
                RF_RXBW_DCCFREQ_000 | RF_RXBW_MANT_20 | RF_RXBW_EXP_0,
            )?;
            // hop one MSB step up; the LSB write latches the new frequency
            let frf = bus.read_register(REG_FRFMSB)?;
            bus.write_register(REG_FRFMSB, frf.wrapping_add(1))?;
            let lsb = bus.read_register(REG_FRFLSB)?;
            bus.write_register(REG_FRFLSB, lsb)?;
        }

        let cycle_ms = self.listen.lock().unwrap().cycle_us() / 1_000;
        self.modes.set_mode(&self.bus, Mode::Transmit)?;
        let start = Instant::now();
        let mut remaining = cycle_ms as i64;
        while remaining > 0 {
            let stamp = remaining as u16;
            let mut buf = Vec::with_capacity(payload.len() + 6);
            buf.push(REG_FIFO | 0x80);
            buf.push((payload.len() + 4) as u8);
            buf.push(to);
            buf.push(self.node_id);
            buf.push((stamp & 0xFF) as u8);
            buf.push((stamp >> 8) as u8);
            buf.extend_from_slice(payload);
            self.bus.lock().unwrap().transfer(&mut buf)?;

            // previous frame must clear the FIFO before the next refill
            loop {
                let flags2: IrqFlags2 = {
                    let mut bus = self.bus.lock().unwrap();
                    bus.read_register(REG_IRQFLAGS2)?.into()
                };
                if !flags2.fifo_not_empty() {
                    break;
                }
            }
            remaining = cycle_ms as i64 - start.elapsed().as_millis() as i64;
        }

        self.modes.set_mode(&self.bus, Mode::Standby)?;
        self.reinitialize()?;
        self.begin_receive()
    }

    /// Full reconfiguration after the burst profile trashed the normal one.
    fn reinitialize(&self) -> Result<(), RadioError> {
        self.initialize()?;
        self.apply_encryption()?;
        let mut bus = self.bus.lock().unwrap();
        let lna = bus.read_register(REG_LNA)?;
        bus.write_register(REG_LNA, (lna & !0x03) | RF_LNA_GAINSELECT_AUTO)?;
        Ok(())
    }
}
