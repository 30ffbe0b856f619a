//! `rover-runtime` – process-level wiring.
//!
//! # Modules
//!
//! - [`rover`] – [`Rover`][rover::Rover]: feeds relay tokens into the
//!   dispatcher until shutdown, then stops the motors.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: console
//!   logging plus optional OTLP span export.

pub mod rover;
pub mod telemetry;

pub use rover::Rover;
pub use telemetry::{LogFormat, TracerProviderGuard, init_tracing};
