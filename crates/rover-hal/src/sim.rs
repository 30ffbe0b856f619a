//! In-process simulation drivers for running the rover without hardware.
//!
//! [`SimMotor`] and [`SimPowerOff`] record what they were asked to do and
//! always succeed.  Each hands out a cloneable probe so the recorded state can
//! still be read after the driver itself has been boxed and moved into a
//! [`MotorPair`][crate::motor_pair::MotorPair] or a dispatcher.
//!
//! # Example
//!
//! ```rust
//! use rover_hal::{Motor, SimMotor};
//! use rover_types::MotorState;
//!
//! let mut motor = SimMotor::new("left_motor");
//! let probe = motor.probe();
//!
//! motor.forward().expect("sim motor never fails");
//! assert_eq!(probe.state(), MotorState::DrivingForward);
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};

use rover_types::{MotorState, RoverError};
use tracing::{info, warn};

use crate::motor::Motor;
use crate::power::ShutdownAction;

// ────────────────────────────────────────────────────────────────────────────
// Simulated motor
// ────────────────────────────────────────────────────────────────────────────

/// A simulated motor channel.  Records the most recent state and the number of
/// commands it received.
pub struct SimMotor {
    id: String,
    probe: SimMotorProbe,
}

impl SimMotor {
    /// Create a new simulated motor with the given identifier.
    pub fn new(id: impl Into<String>) -> Box<Self> {
        Box::new(Self {
            id: id.into(),
            probe: SimMotorProbe::default(),
        })
    }

    /// A handle that observes this motor after it has been moved.
    pub fn probe(&self) -> SimMotorProbe {
        self.probe.clone()
    }

    fn record(&self, state: MotorState) -> Result<(), RoverError> {
        self.probe.state.store(encode(state), Ordering::SeqCst);
        self.probe.commands.fetch_add(1, Ordering::SeqCst);
        info!(motor = %self.id, state = ?state, "sim motor");
        Ok(())
    }
}

impl Motor for SimMotor {
    fn id(&self) -> &str {
        &self.id
    }

    fn forward(&mut self) -> Result<(), RoverError> {
        self.record(MotorState::DrivingForward)
    }

    fn backward(&mut self) -> Result<(), RoverError> {
        self.record(MotorState::DrivingBackward)
    }

    fn stop(&mut self) -> Result<(), RoverError> {
        self.record(MotorState::Stopped)
    }
}

/// Shared view of a [`SimMotor`]'s recorded state.
#[derive(Clone, Default, Debug)]
pub struct SimMotorProbe {
    state: Arc<AtomicU8>,
    commands: Arc<AtomicUsize>,
}

impl SimMotorProbe {
    /// State set by the most recent command ([`MotorState::Stopped`] before
    /// any command).
    pub fn state(&self) -> MotorState {
        decode(self.state.load(Ordering::SeqCst))
    }

    /// Total number of `forward`/`backward`/`stop` calls received.
    pub fn commands(&self) -> usize {
        self.commands.load(Ordering::SeqCst)
    }
}

fn encode(state: MotorState) -> u8 {
    match state {
        MotorState::Stopped => 0,
        MotorState::DrivingForward => 1,
        MotorState::DrivingBackward => 2,
    }
}

fn decode(raw: u8) -> MotorState {
    match raw {
        1 => MotorState::DrivingForward,
        2 => MotorState::DrivingBackward,
        _ => MotorState::Stopped,
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Simulated power switch
// ────────────────────────────────────────────────────────────────────────────

/// A power-off action that only counts requests.  The host keeps running.
#[derive(Clone, Default, Debug)]
pub struct SimPowerOff {
    requests: Arc<AtomicUsize>,
}

impl SimPowerOff {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of power-off requests received so far.  Clones share the count.
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl ShutdownAction for SimPowerOff {
    fn power_off(&self) -> Result<(), RoverError> {
        self.requests.fetch_add(1, Ordering::SeqCst);
        warn!("power-off requested; simulated host keeps running");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sim_motor_records_state_and_count() {
        let mut motor = SimMotor::new("test");
        let probe = motor.probe();
        assert_eq!(probe.state(), MotorState::Stopped);
        assert_eq!(probe.commands(), 0);

        motor.backward().unwrap();
        assert_eq!(probe.state(), MotorState::DrivingBackward);
        motor.stop().unwrap();
        assert_eq!(probe.state(), MotorState::Stopped);
        assert_eq!(probe.commands(), 2);
        assert_eq!(motor.id(), "test");
    }

    #[test]
    fn sim_power_off_counts_requests_across_clones() {
        let power = SimPowerOff::new();
        let observer = power.clone();
        power.power_off().unwrap();
        power.power_off().unwrap();
        assert_eq!(observer.requests(), 2);
    }
}
