//! # Raspberry Pi Bus Implementation
//!
//! SPI register access and GPIO control (reset pulse, rising-edge interrupt
//! registration) for an RFM69 module wired to a Raspberry Pi, built on the
//! `rppal` crate.
//!
//! ## Pinout
//!
//! The module sits on one of the hardware SPI buses; DIO0 is wired to a free
//! BCM GPIO as the interrupt line and the reset pin, if connected, to
//! another. All pin numbers use BCM GPIO numbering.

use std::thread;
use std::time::Duration;

use log::info;
use rppal::gpio::{Gpio, InputPin, Level, OutputPin, Trigger};
use rppal::spi::{Bus, Mode, SlaveSelect, Spi};

use crate::hal::{HalError, RegisterBus};

/// SPI clock rate used for register access
const SPI_CLOCK_HZ: u32 = 4_000_000;

/// SPI-backed register bus.
pub struct SpiBus {
    spi: Spi,
}

impl SpiBus {
    /// Open the given SPI bus/slave-select pair at 4 MHz, mode 0.
    pub fn open(spi_bus: u8, spi_device: u8) -> Result<Self, HalError> {
        let bus = match spi_bus {
            0 => Bus::Spi0,
            1 => Bus::Spi1,
            other => {
                return Err(HalError::Spi(format!(
                    "invalid SPI bus {other}, only 0 and 1 are supported"
                )))
            }
        };
        let slave_select = match spi_device {
            0 => SlaveSelect::Ss0,
            1 => SlaveSelect::Ss1,
            2 => SlaveSelect::Ss2,
            other => {
                return Err(HalError::Spi(format!(
                    "invalid SPI device {other}, only 0..=2 are supported"
                )))
            }
        };
        let spi = Spi::new(bus, slave_select, SPI_CLOCK_HZ, Mode::Mode0)
            .map_err(|e| HalError::Spi(format!("failed to open SPI{spi_bus}.{spi_device}: {e}")))?;
        info!("SPI{spi_bus}.{spi_device} opened at {} Hz", SPI_CLOCK_HZ);
        Ok(Self { spi })
    }
}

impl RegisterBus for SpiBus {
    fn read_register(&mut self, addr: u8) -> Result<u8, HalError> {
        let tx = [addr & 0x7F, 0];
        let mut rx = [0u8; 2];
        self.spi
            .transfer(&mut rx, &tx)
            .map_err(|e| HalError::Spi(format!("read register 0x{addr:02X} failed: {e}")))?;
        Ok(rx[1])
    }

    fn write_register(&mut self, addr: u8, value: u8) -> Result<(), HalError> {
        let tx = [addr | 0x80, value];
        self.spi
            .write(&tx)
            .map_err(|e| HalError::Spi(format!("write register 0x{addr:02X} failed: {e}")))?;
        Ok(())
    }

    fn transfer(&mut self, buf: &mut [u8]) -> Result<(), HalError> {
        let tx = buf.to_vec();
        self.spi
            .transfer(buf, &tx)
            .map_err(|e| HalError::Spi(format!("burst transfer failed: {e}")))?;
        Ok(())
    }
}

/// Active-high reset line of the module.
pub struct ResetLine {
    pin: OutputPin,
}

impl ResetLine {
    pub fn open(bcm_pin: u8) -> Result<Self, HalError> {
        let gpio = Gpio::new().map_err(|e| HalError::Gpio(format!("GPIO init failed: {e}")))?;
        let pin = gpio
            .get(bcm_pin)
            .map_err(|e| HalError::Gpio(format!("failed to get reset pin {bcm_pin}: {e}")))?
            .into_output();
        Ok(Self { pin })
    }

    /// Hard-reset pulse per the datasheet: 300 ms high, 300 ms low.
    pub fn pulse(&mut self) {
        self.pin.set_high();
        thread::sleep(Duration::from_millis(300));
        self.pin.set_low();
        thread::sleep(Duration::from_millis(300));
    }
}

/// The DIO0 interrupt line. Registers a callback on each rising edge.
pub struct InterruptLine {
    pin: InputPin,
    bcm_pin: u8,
}

impl InterruptLine {
    pub fn open(bcm_pin: u8) -> Result<Self, HalError> {
        let gpio = Gpio::new().map_err(|e| HalError::Gpio(format!("GPIO init failed: {e}")))?;
        let pin = gpio
            .get(bcm_pin)
            .map_err(|e| HalError::Gpio(format!("failed to get interrupt pin {bcm_pin}: {e}")))?
            .into_input();
        Ok(Self { pin, bcm_pin })
    }

    /// Invoke `callback` on every rising edge until [`detach`](Self::detach).
    pub fn attach<F>(&mut self, mut callback: F) -> Result<(), HalError>
    where
        F: FnMut() + Send + 'static,
    {
        info!("interrupt handling attached on GPIO {}", self.bcm_pin);
        self.pin
            .set_async_interrupt(Trigger::RisingEdge, move |_level: Level| callback())
            .map_err(|e| HalError::Gpio(format!("failed to set interrupt: {e}")))
    }

    /// Stop edge detection; no callback runs after this returns.
    pub fn detach(&mut self) -> Result<(), HalError> {
        self.pin
            .clear_async_interrupt()
            .map_err(|e| HalError::Gpio(format!("failed to clear interrupt: {e}")))
    }
}
