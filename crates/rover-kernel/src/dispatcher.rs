//! [`Dispatcher`] – token → actuation.
//!
//! The dispatcher holds no memory of earlier commands.  Each call classifies
//! one token, looks it up in the [`CommandTable`] and either drives the
//! [`MotorPair`] or asks the [`ShutdownAction`] to power the host off.
//!
//! Nothing is reported back to the sender: an unknown token is dropped, and a
//! hardware fault is logged and then forgotten.  The remote has no feedback
//! channel to receive either.
//!
//! # Example
//!
//! ```
//! use rover_hal::{MotorPair, SimMotor, SimPowerOff};
//! use rover_kernel::{DispatchOutcome, Dispatcher};
//! use rover_types::{CommandId, MotorState};
//!
//! let left = SimMotor::new("left_motor");
//! let right = SimMotor::new("right_motor");
//! let probe = left.probe();
//! let mut dispatcher = Dispatcher::new(
//!     MotorPair::new(left, right),
//!     Box::new(SimPowerOff::new()),
//! );
//!
//! assert_eq!(dispatcher.dispatch("forward"), DispatchOutcome::Drove(CommandId::Forward));
//! assert_eq!(probe.state(), MotorState::DrivingForward);
//! assert_eq!(dispatcher.dispatch("bogus"), DispatchOutcome::Ignored);
//! ```

use rover_hal::{MotorPair, ShutdownAction};
use rover_types::CommandId;
use tracing::{debug, error, info, instrument, warn};

use crate::command_table::{Action, COMMAND_TABLE, CommandTable};

/// What a single [`Dispatcher::dispatch`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// The motors were commanded for this id (even if a motor then faulted).
    Drove(CommandId),
    /// A host power-off was requested.
    ShutdownRequested,
    /// The token matched no command.
    Ignored,
}

/// Applies command tokens to a [`MotorPair`].
pub struct Dispatcher {
    motors: MotorPair,
    power: Box<dyn ShutdownAction>,
    table: &'static CommandTable,
}

impl Dispatcher {
    /// Build a dispatcher over the vehicle's [`COMMAND_TABLE`].
    pub fn new(motors: MotorPair, power: Box<dyn ShutdownAction>) -> Self {
        Self {
            motors,
            power,
            table: &COMMAND_TABLE,
        }
    }

    /// Classify `token` and act on it.
    #[instrument(level = "debug", skip(self))]
    pub fn dispatch(&mut self, token: &str) -> DispatchOutcome {
        let Some(id) = CommandId::parse_token(token) else {
            debug!("token matches no command; dropped");
            return DispatchOutcome::Ignored;
        };

        match self.table.lookup(id) {
            Action::Drive(state) => {
                info!(command = %id, left = ?state.left, right = ?state.right, "drive");
                if let Err(e) = self.motors.apply(state) {
                    error!(command = %id, error = %e, "actuation failed");
                }
                DispatchOutcome::Drove(id)
            }
            Action::Shutdown => {
                warn!("shutdown command received");
                if let Err(e) = self.power.power_off() {
                    error!(error = %e, "power-off failed; vehicle keeps running");
                }
                DispatchOutcome::ShutdownRequested
            }
        }
    }

    /// Stop both motors, e.g. before the process exits.
    pub fn stop_motors(&mut self) {
        if let Err(e) = self.motors.stop_all() {
            error!(error = %e, "failed to stop motors");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rover_hal::{Motor, SimMotor, SimMotorProbe, SimPowerOff};
    use rover_types::{MotorState, RoverError};

    struct Rig {
        dispatcher: Dispatcher,
        left: SimMotorProbe,
        right: SimMotorProbe,
        power: SimPowerOff,
    }

    fn rig() -> Rig {
        let left = SimMotor::new("left_motor");
        let right = SimMotor::new("right_motor");
        let power = SimPowerOff::new();
        Rig {
            left: left.probe(),
            right: right.probe(),
            power: power.clone(),
            dispatcher: Dispatcher::new(MotorPair::new(left, right), Box::new(power)),
        }
    }

    #[test]
    fn every_command_name_drives_exactly_its_table_row() {
        for id in CommandId::ALL.into_iter().filter(|id| !id.is_shutdown()) {
            let mut rig = rig();
            let Action::Drive(expected) = COMMAND_TABLE.lookup(id) else {
                unreachable!()
            };

            let outcome = rig.dispatcher.dispatch(&id.name().to_uppercase());

            assert_eq!(outcome, DispatchOutcome::Drove(id));
            assert_eq!(rig.left.state(), expected.left, "{id} left");
            assert_eq!(rig.right.state(), expected.right, "{id} right");
            assert_eq!(rig.left.commands(), 1, "{id} left call count");
            assert_eq!(rig.right.commands(), 1, "{id} right call count");
            assert_eq!(rig.power.requests(), 0);
        }
    }

    #[test]
    fn numeric_codes_match_names() {
        let mut rig = rig();
        assert_eq!(rig.dispatcher.dispatch("1"), DispatchOutcome::Drove(CommandId::Forward));
        assert_eq!(rig.left.state(), MotorState::DrivingForward);
        assert_eq!(rig.right.state(), MotorState::DrivingForward);

        assert_eq!(rig.dispatcher.dispatch("2"), DispatchOutcome::Drove(CommandId::TurnLeft));
        assert_eq!(rig.left.state(), MotorState::Stopped);
        assert_eq!(rig.right.state(), MotorState::DrivingForward);
    }

    #[test]
    fn unknown_tokens_touch_nothing() {
        let mut rig = rig();
        for token in ["bogus", "", "42", "-1", "Forward!", "shut down"] {
            assert_eq!(rig.dispatcher.dispatch(token), DispatchOutcome::Ignored, "{token:?}");
        }
        assert_eq!(rig.left.commands(), 0);
        assert_eq!(rig.right.commands(), 0);
        assert_eq!(rig.power.requests(), 0);
    }

    #[test]
    fn shutdown_powers_off_without_touching_motors() {
        let mut rig = rig();
        rig.dispatcher.dispatch("Forward");

        assert_eq!(rig.dispatcher.dispatch("ShutDown"), DispatchOutcome::ShutdownRequested);

        assert_eq!(rig.power.requests(), 1);
        assert_eq!(rig.left.commands(), 1);
        assert_eq!(rig.right.commands(), 1);
        assert_eq!(rig.left.state(), MotorState::DrivingForward);
    }

    #[test]
    fn shutdown_code_nine_powers_off() {
        let mut rig = rig();
        assert_eq!(rig.dispatcher.dispatch("9"), DispatchOutcome::ShutdownRequested);
        assert_eq!(rig.power.requests(), 1);
        assert_eq!(rig.left.commands(), 0);
    }

    #[test]
    fn repeated_command_is_idempotent() {
        let mut rig = rig();
        rig.dispatcher.dispatch("Backward");
        rig.dispatcher.dispatch("backward");
        assert_eq!(rig.left.state(), MotorState::DrivingBackward);
        assert_eq!(rig.right.state(), MotorState::DrivingBackward);
        assert_eq!(rig.left.commands(), 2);
    }

    struct FaultyMotor;

    impl Motor for FaultyMotor {
        fn id(&self) -> &str {
            "faulty"
        }
        fn forward(&mut self) -> Result<(), RoverError> {
            Err(RoverError::hardware("faulty", "driver offline"))
        }
        fn backward(&mut self) -> Result<(), RoverError> {
            Err(RoverError::hardware("faulty", "driver offline"))
        }
        fn stop(&mut self) -> Result<(), RoverError> {
            Err(RoverError::hardware("faulty", "driver offline"))
        }
    }

    struct FailingPowerOff;

    impl ShutdownAction for FailingPowerOff {
        fn power_off(&self) -> Result<(), RoverError> {
            Err(RoverError::Shutdown("permission denied".into()))
        }
    }

    #[test]
    fn hardware_fault_is_logged_and_dispatch_continues() {
        let right = SimMotor::new("right_motor");
        let probe = right.probe();
        let mut dispatcher =
            Dispatcher::new(MotorPair::new(Box::new(FaultyMotor), right), Box::new(FailingPowerOff));

        assert_eq!(dispatcher.dispatch("forward"), DispatchOutcome::Drove(CommandId::Forward));
        assert_eq!(probe.state(), MotorState::DrivingForward);
        assert_eq!(dispatcher.dispatch("shutdown"), DispatchOutcome::ShutdownRequested);
        assert_eq!(dispatcher.dispatch("stop"), DispatchOutcome::Drove(CommandId::Stop));
        assert_eq!(probe.state(), MotorState::Stopped);
    }

    #[test]
    fn stop_motors_stops_both() {
        let mut rig = rig();
        rig.dispatcher.dispatch("PivotRight");
        rig.dispatcher.stop_motors();
        assert_eq!(rig.left.state(), MotorState::Stopped);
        assert_eq!(rig.right.state(), MotorState::Stopped);
    }
}
