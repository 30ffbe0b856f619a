//! Generic `Motor` trait for a single on/off motor channel.
//!
//! Drivers implement this trait and are handed to a
//! [`MotorPair`][crate::motor_pair::MotorPair].  Nothing above the HAL knows
//! whether a motor is a GPIO-driven H-bridge or a simulation.

use rover_types::{MotorState, RoverError};

/// One motor channel with binary direction control (no speed control).
pub trait Motor: Send + Sync {
    /// Stable identifier for this motor, e.g. `"left_motor"`.
    fn id(&self) -> &str;

    /// Drive the motor forward.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] if the command cannot be applied.
    fn forward(&mut self) -> Result<(), RoverError>;

    /// Drive the motor backward.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] if the command cannot be applied.
    fn backward(&mut self) -> Result<(), RoverError>;

    /// Stop the motor.
    ///
    /// # Errors
    ///
    /// Returns [`RoverError::HardwareFault`] if the command cannot be applied.
    fn stop(&mut self) -> Result<(), RoverError>;

    /// Issue exactly one of `forward`, `backward` or `stop` for `state`.
    fn drive(&mut self, state: MotorState) -> Result<(), RoverError> {
        match state {
            MotorState::Stopped => self.stop(),
            MotorState::DrivingForward => self.forward(),
            MotorState::DrivingBackward => self.backward(),
        }
    }
}
