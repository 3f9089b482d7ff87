//! # Operating Mode Controller
//!
//! The single point of mode transition for the chip. Every transition is a
//! read-modify-write of `REG_OPMODE` performed under the controller's guard;
//! no other component touches the mode-selection register. Entering Transmit
//! or Receive on a high-power variant additionally toggles the PA boost test
//! registers.

use std::sync::Mutex;

use log::debug;

use crate::error::RadioError;
use crate::hal::RegisterBus;
use crate::registers::*;

/// Chip operating mode. Exactly one is active at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Sleep,
    Standby,
    Synthesizer,
    Receive,
    Transmit,
}

impl Mode {
    fn opmode_bits(self) -> u8 {
        match self {
            Mode::Sleep => RF_OPMODE_SLEEP,
            Mode::Standby => RF_OPMODE_STANDBY,
            Mode::Synthesizer => RF_OPMODE_SYNTHESIZER,
            Mode::Receive => RF_OPMODE_RECEIVER,
            Mode::Transmit => RF_OPMODE_TRANSMITTER,
        }
    }
}

/// Owns the mode state machine. The guard is held for the duration of one
/// transition only, and no controller method re-enters another while holding
/// it, so interrupt-context transitions serialize against application
/// threads without any risk of self-deadlock.
pub struct ModeController {
    current: Mutex<Mode>,
    high_power: bool,
}

impl ModeController {
    /// The chip comes up in standby after the configuration table is written.
    pub fn new(high_power: bool) -> Self {
        Self {
            current: Mutex::new(Mode::Standby),
            high_power,
        }
    }

    pub fn current(&self) -> Mode {
        *self.current.lock().unwrap()
    }

    /// Transition to `target`. No-op when already there. Leaving Sleep polls
    /// the ModeReady flag before the transition counts as complete; the
    /// datasheet bounds that latency, so the poll carries no deadline.
    pub fn set_mode<B: RegisterBus>(
        &self,
        bus: &Mutex<B>,
        target: Mode,
    ) -> Result<(), RadioError> {
        let mut current = self.current.lock().unwrap();
        if *current == target {
            return Ok(());
        }

        {
            let mut bus = bus.lock().unwrap();
            let opmode = bus.read_register(REG_OPMODE)?;
            bus.write_register(REG_OPMODE, (opmode & RF_OPMODE_MASK) | target.opmode_bits())?;
        }

        if self.high_power {
            // PA boost only while actually transmitting
            match target {
                Mode::Transmit => self.write_pa_boost(bus, true)?,
                Mode::Receive => self.write_pa_boost(bus, false)?,
                _ => {}
            }
        }

        if *current == Mode::Sleep {
            // The FIFO is not usable until the chip reports the new mode
            loop {
                let flags: IrqFlags1 = {
                    let mut bus = bus.lock().unwrap();
                    bus.read_register(REG_IRQFLAGS1)?.into()
                };
                if flags.mode_ready() {
                    break;
                }
            }
        }

        *current = target;
        debug!("mode set to {target:?}");
        Ok(())
    }

    fn write_pa_boost<B: RegisterBus>(
        &self,
        bus: &Mutex<B>,
        boost: bool,
    ) -> Result<(), RadioError> {
        let (pa1, pa2) = if boost {
            (RF_TESTPA1_BOOST, RF_TESTPA2_BOOST)
        } else {
            (RF_TESTPA1_NORMAL, RF_TESTPA2_NORMAL)
        };
        let mut bus = bus.lock().unwrap();
        bus.write_register(REG_TESTPA1, pa1)?;
        bus.write_register(REG_TESTPA2, pa2)?;
        Ok(())
    }
}
