//! Motor channel driven by two Raspberry Pi GPIO lines through `rppal`.
//!
//! Each [`GpioMotor`] owns the two input lines of one H-bridge channel,
//! addressed by BCM pin number:
//!
//! | command  | line A | line B |
//! |----------|--------|--------|
//! | forward  | high   | low    |
//! | backward | low    | high   |
//! | stop     | low    | low    |
//!
//! Lines are claimed as low outputs when the motor is opened, so the motor
//! starts stopped.

use rover_types::RoverError;
use rppal::gpio::{Gpio, OutputPin};
use tracing::{debug, instrument};

use crate::motor::Motor;

/// A digital output an H-bridge input is wired to.
pub trait OutputLine: Send + Sync {
    fn set_high(&mut self);
    fn set_low(&mut self);
}

impl OutputLine for OutputPin {
    fn set_high(&mut self) {
        OutputPin::set_high(self);
    }

    fn set_low(&mut self) {
        OutputPin::set_low(self);
    }
}

/// One H-bridge motor channel on two output lines.
#[derive(Debug)]
pub struct HBridgeMotor<L> {
    id: String,
    line_a: L,
    line_b: L,
}

/// An H-bridge channel on real GPIO pins.
pub type GpioMotor = HBridgeMotor<OutputPin>;

impl GpioMotor {
    /// Claim BCM pins `line_a` and `line_b` as low outputs.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] if the GPIO peripheral is not
    /// available or a pin cannot be claimed.
    pub fn open(id: impl Into<String>, line_a: u8, line_b: u8) -> Result<Box<Self>, RoverError> {
        let id = id.into();
        let gpio = Gpio::new().map_err(|e| RoverError::hardware(&id, format!("gpio unavailable: {e}")))?;
        let claim = |pin: u8| {
            gpio.get(pin)
                .map(|p| p.into_output_low())
                .map_err(|e| RoverError::hardware(&id, format!("gpio{pin}: {e}")))
        };
        let (a, b) = (claim(line_a)?, claim(line_b)?);
        debug!(motor = %id, line_a, line_b, "gpio lines claimed as outputs");
        Ok(Self::new(id, a, b))
    }
}

impl<L: OutputLine> HBridgeMotor<L> {
    /// Wrap two lines and drive both low.
    pub fn new(id: impl Into<String>, mut line_a: L, mut line_b: L) -> Box<Self> {
        line_a.set_low();
        line_b.set_low();
        Box::new(Self {
            id: id.into(),
            line_a,
            line_b,
        })
    }

    #[instrument(level = "debug", skip(self), fields(motor = %self.id))]
    fn set_lines(&mut self, a: bool, b: bool) {
        // Release before engaging so both lines are never high together.
        if !a {
            self.line_a.set_low();
        }
        if !b {
            self.line_b.set_low();
        }
        if a {
            self.line_a.set_high();
        }
        if b {
            self.line_b.set_high();
        }
    }
}

impl<L: OutputLine> Motor for HBridgeMotor<L> {
    fn id(&self) -> &str {
        &self.id
    }

    fn forward(&mut self) -> Result<(), RoverError> {
        self.set_lines(true, false);
        Ok(())
    }

    fn backward(&mut self) -> Result<(), RoverError> {
        self.set_lines(false, true);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), RoverError> {
        self.set_lines(false, false);
        Ok(())
    }
}
