//! Shared vocabulary of the rover stack: command identifiers, motor and drive
//! states, the connection lifecycle, and the workspace-wide error type.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Raw inbound payload received from the relay before classification.
pub type CommandToken = String;

/// Closed set of commands the vehicle understands.
///
/// The discriminant is the numeric wire code operators send (`"1"` drives
/// forward).  Any token that matches neither a name nor a code maps to no
/// command at all; there is no fallback variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommandId {
    Stop = 0,
    Forward = 1,
    TurnLeft = 2,
    TurnRight = 3,
    LeftBackward = 4,
    RightBackward = 5,
    Backward = 6,
    PivotLeft = 7,
    PivotRight = 8,
    Shutdown = 9,
}

impl CommandId {
    /// Every command, ordered by wire code.
    pub const ALL: [CommandId; 10] = [
        CommandId::Stop,
        CommandId::Forward,
        CommandId::TurnLeft,
        CommandId::TurnRight,
        CommandId::LeftBackward,
        CommandId::RightBackward,
        CommandId::Backward,
        CommandId::PivotLeft,
        CommandId::PivotRight,
        CommandId::Shutdown,
    ];

    /// Numeric wire code of this command.
    pub fn code(self) -> u8 {
        self as u8
    }

    /// Resolve a numeric wire code.
    pub fn from_code(code: u8) -> Option<Self> {
        Self::ALL.get(usize::from(code)).copied()
    }

    /// Canonical name, as logged and as accepted on the wire.
    pub fn name(self) -> &'static str {
        match self {
            CommandId::Stop => "Stop",
            CommandId::Forward => "Forward",
            CommandId::TurnLeft => "TurnLeft",
            CommandId::TurnRight => "TurnRight",
            CommandId::LeftBackward => "LeftBackward",
            CommandId::RightBackward => "RightBackward",
            CommandId::Backward => "Backward",
            CommandId::PivotLeft => "PivotLeft",
            CommandId::PivotRight => "PivotRight",
            CommandId::Shutdown => "Shutdown",
        }
    }

    /// Older operator panels send these names instead of the canonical ones.
    fn legacy_name(self) -> Option<&'static str> {
        match self {
            CommandId::TurnLeft => Some("LeftForward"),
            CommandId::TurnRight => Some("RightForward"),
            CommandId::PivotLeft => Some("SharpLeft"),
            CommandId::PivotRight => Some("SharpRight"),
            _ => None,
        }
    }

    /// Case-insensitive exact match against canonical and legacy names.
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|id| {
            id.name().eq_ignore_ascii_case(name)
                || id
                    .legacy_name()
                    .is_some_and(|legacy| legacy.eq_ignore_ascii_case(name))
        })
    }

    /// Classify an inbound token.
    ///
    /// Surrounding whitespace is ignored.  ASCII digits behind an optional
    /// `+` or `-` are read as an integer wire code (`-0` is `0`); anything
    /// else must match a name.
    pub fn parse_token(token: &str) -> Option<Self> {
        let token = token.trim();
        let digits = token.strip_prefix(['+', '-']).unwrap_or(token);
        if digits.is_empty() {
            return None;
        }
        if digits.bytes().all(|b| b.is_ascii_digit()) {
            return token
                .parse::<i32>()
                .ok()
                .and_then(|code| u8::try_from(code).ok())
                .and_then(Self::from_code);
        }
        Self::from_name(token)
    }

    /// `true` for the terminal power-off command.
    pub fn is_shutdown(self) -> bool {
        matches!(self, CommandId::Shutdown)
    }
}

impl fmt::Display for CommandId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// State of a single motor channel.  Transitions are instantaneous.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum MotorState {
    #[default]
    Stopped,
    DrivingForward,
    DrivingBackward,
}

/// Target states for the left and right motors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct DriveState {
    pub left: MotorState,
    pub right: MotorState,
}

impl DriveState {
    pub const fn new(left: MotorState, right: MotorState) -> Self {
        Self { left, right }
    }

    /// Both motors stopped.
    pub const STOPPED: DriveState = DriveState::new(MotorState::Stopped, MotorState::Stopped);
}

/// Lifecycle of the relay connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => f.write_str("disconnected"),
            ConnectionState::Connecting => f.write_str("connecting"),
            ConnectionState::Connected => f.write_str("connected"),
        }
    }
}

/// Workspace-wide error type covering configuration, relay connectivity,
/// wire protocol and hardware failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RoverError {
    #[error("Configuration Error: {0}")]
    Config(String),

    #[error("Connection Error: {0}")]
    Connection(String),

    #[error("Handshake Rejected: {0}")]
    Handshake(String),

    #[error("Protocol Error: {0}")]
    Protocol(String),

    #[error("Hardware Fault on {component}: {details}")]
    HardwareFault { component: String, details: String },

    #[error("Shutdown Failed: {0}")]
    Shutdown(String),
}

impl RoverError {
    /// Convenience constructor for [`RoverError::HardwareFault`].
    pub fn hardware(component: impl Into<String>, details: impl fmt::Display) -> Self {
        RoverError::HardwareFault {
            component: component.into(),
            details: details.to_string(),
        }
    }
}
