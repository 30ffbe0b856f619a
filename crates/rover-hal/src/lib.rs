//! `rover-hal` – Hardware Abstraction Layer
//!
//! Everything above this crate talks to motors and to the host's power switch
//! through traits, so the physical drivers can be swapped for simulated ones
//! without touching dispatch or connection logic.
//!
//! # Modules
//!
//! - [`motor`] – the [`Motor`] trait: one H-bridge channel that can drive
//!   forward, backward, or stop.
//! - [`motor_pair`] – [`MotorPair`]: the left/right pair of a differential
//!   drive, applying a [`DriveState`][rover_types::DriveState] as two
//!   independent motor calls.
//! - [`gpio`] – [`GpioMotor`]: a motor channel wired to two Raspberry Pi
//!   GPIO pins.
//! - [`sim`] – [`SimMotor`] and [`SimPowerOff`]: in-process stand-ins that
//!   record what they were asked to do.
//! - [`power`] – the [`ShutdownAction`] trait and [`HostPowerOff`], which runs
//!   the host's halt command and never waits for it.

pub mod gpio;
pub mod motor;
pub mod motor_pair;
pub mod power;
pub mod sim;

pub use gpio::{GpioMotor, HBridgeMotor, OutputLine};
pub use motor::Motor;
pub use motor_pair::MotorPair;
pub use power::{DEFAULT_HALT_COMMAND, HostPowerOff, ShutdownAction};
pub use sim::{SimMotor, SimMotorProbe, SimPowerOff};
