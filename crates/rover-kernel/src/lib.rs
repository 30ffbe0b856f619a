//! `rover-kernel` – Command Dispatch
//!
//! Turns loosely-typed command tokens into motor actuation.  It does not know
//! where tokens come from; the connection layer hands them over one at a time.
//!
//! # Modules
//!
//! - [`command_table`] – [`CommandTable`][command_table::CommandTable]: the
//!   fixed, declarative mapping from every
//!   [`CommandId`][rover_types::CommandId] to either a
//!   [`DriveState`][rover_types::DriveState] or the terminal shutdown action.
//! - [`dispatcher`] – [`Dispatcher`][dispatcher::Dispatcher]: parses a token,
//!   looks it up in the table and drives the
//!   [`MotorPair`][rover_hal::MotorPair] or requests a host power-off.
//!   Unknown tokens are dropped without a trace on the wire.

pub mod command_table;
pub mod dispatcher;

pub use command_table::{Action, COMMAND_TABLE, CommandTable};
pub use dispatcher::{DispatchOutcome, Dispatcher};
