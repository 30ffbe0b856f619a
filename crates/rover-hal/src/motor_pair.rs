//! [`MotorPair`] – the two motors of a differential drive.
//!
//! The pair holds no state of its own.  Applying a
//! [`DriveState`] issues one call per motor; the physical motors are the only
//! place the current state lives.

use rover_types::{DriveState, RoverError};
use tracing::debug;

use crate::motor::Motor;

/// Left and right motor of a differential-drive vehicle.
pub struct MotorPair {
    left: Box<dyn Motor>,
    right: Box<dyn Motor>,
}

impl MotorPair {
    /// Take ownership of the two motor drivers.
    pub fn new(left: Box<dyn Motor>, right: Box<dyn Motor>) -> Self {
        Self { left, right }
    }

    /// Drive each motor to its target in `state`.
    ///
    /// Both motors are always commanded, even if the first call fails, so a
    /// fault on one side never leaves the other side in its previous state.
    ///
    /// # Errors
    ///
    /// Returns the first [`RoverError::HardwareFault`] reported by either
    /// motor, after both calls were issued.
    pub fn apply(&mut self, state: DriveState) -> Result<(), RoverError> {
        debug!(left = ?state.left, right = ?state.right, "applying drive state");
        let left = self.left.drive(state.left);
        let right = self.right.drive(state.right);
        left.and(right)
    }

    /// Stop both motors.
    ///
    /// # Errors
    ///
    /// Same as [`apply`][Self::apply].
    pub fn stop_all(&mut self) -> Result<(), RoverError> {
        self.apply(DriveState::STOPPED)
    }

    /// Identifiers of the left and right motors.
    pub fn ids(&self) -> (&str, &str) {
        (self.left.id(), self.right.id())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::SimMotor;
    use rover_types::MotorState;

    struct BrokenMotor;

    impl Motor for BrokenMotor {
        fn id(&self) -> &str {
            "broken"
        }
        fn forward(&mut self) -> Result<(), RoverError> {
            Err(RoverError::hardware("broken", "stuck"))
        }
        fn backward(&mut self) -> Result<(), RoverError> {
            Err(RoverError::hardware("broken", "stuck"))
        }
        fn stop(&mut self) -> Result<(), RoverError> {
            Err(RoverError::hardware("broken", "stuck"))
        }
    }

    #[test]
    fn apply_drives_each_motor_once() {
        let left = SimMotor::new("left_motor");
        let right = SimMotor::new("right_motor");
        let (left_probe, right_probe) = (left.probe(), right.probe());
        let mut pair = MotorPair::new(left, right);

        pair.apply(DriveState::new(MotorState::Stopped, MotorState::DrivingForward))
            .unwrap();

        assert_eq!(left_probe.state(), MotorState::Stopped);
        assert_eq!(right_probe.state(), MotorState::DrivingForward);
        assert_eq!(left_probe.commands(), 1);
        assert_eq!(right_probe.commands(), 1);
    }

    #[test]
    fn failing_left_motor_still_commands_right() {
        let right = SimMotor::new("right_motor");
        let right_probe = right.probe();
        let mut pair = MotorPair::new(Box::new(BrokenMotor), right);

        let result = pair.apply(DriveState::new(
            MotorState::DrivingForward,
            MotorState::DrivingBackward,
        ));

        assert!(matches!(result, Err(RoverError::HardwareFault { .. })));
        assert_eq!(right_probe.state(), MotorState::DrivingBackward);
        assert_eq!(right_probe.commands(), 1);
    }

    #[test]
    fn stop_all_stops_both() {
        let left = SimMotor::new("left_motor");
        let right = SimMotor::new("right_motor");
        let (left_probe, right_probe) = (left.probe(), right.probe());
        let mut pair = MotorPair::new(left, right);

        pair.apply(DriveState::new(
            MotorState::DrivingBackward,
            MotorState::DrivingBackward,
        ))
        .unwrap();
        pair.stop_all().unwrap();

        assert_eq!(left_probe.state(), MotorState::Stopped);
        assert_eq!(right_probe.state(), MotorState::Stopped);
        assert_eq!(pair.ids(), ("left_motor", "right_motor"));
    }
}
