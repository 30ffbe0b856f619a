//! SignalR JSON hub protocol, the subset a listening client needs.
//!
//! Every record is a JSON object terminated by the ASCII record separator
//! `0x1E`; one WebSocket frame may carry several records.  After the
//! WebSocket opens the client sends a handshake request and the server answers
//! with an empty object (or an `error`).  From then on records carry a numeric
//! `type`:
//!
//! | type | message | handled as |
//! |---|---|---|
//! | 1 | Invocation | command token when `target` matches |
//! | 6 | Ping | keep-alive, ignored |
//! | 7 | Close | end of stream |
//! | other | stream items, completions, … | ignored |

use rover_types::{CommandToken, RoverError};
use serde::Deserialize;
use serde_json::{Value, json};

/// Terminates every record on the wire.
pub const RECORD_SEPARATOR: char = '\u{1e}';

/// Hub method the relay broadcasts commands on.
pub const DEFAULT_HUB_METHOD: &str = "newMessage";

const INVOCATION: u8 = 1;
const PING: u8 = 6;
const CLOSE: u8 = 7;

/// A decoded hub record.
#[derive(Debug, Clone, PartialEq)]
pub enum HubMessage {
    Invocation { target: String, arguments: Vec<Value> },
    Ping,
    Close { error: Option<String>, allow_reconnect: bool },
    /// A message type a listening client has no use for.
    Other(u8),
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMessage {
    #[serde(rename = "type")]
    kind: u8,
    #[serde(default)]
    target: Option<String>,
    #[serde(default)]
    arguments: Vec<Value>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    allow_reconnect: bool,
}

#[derive(Deserialize)]
struct HandshakeResponse {
    #[serde(default)]
    error: Option<String>,
}

fn terminate(value: Value) -> String {
    let mut record = value.to_string();
    record.push(RECORD_SEPARATOR);
    record
}

/// The client's opening record: JSON protocol, version 1.
pub fn handshake_request() -> String {
    terminate(json!({ "protocol": "json", "version": 1 }))
}

/// A keep-alive record.
pub fn ping_record() -> String {
    terminate(json!({ "type": PING }))
}

/// Split a frame into its non-empty records, separators removed.
pub fn split_records(frame: &str) -> impl Iterator<Item = &str> {
    frame
        .split(RECORD_SEPARATOR)
        .filter(|record| !record.trim().is_empty())
}

/// Check the server's handshake answer.
///
/// # Errors
///
/// [`RoverError::Handshake`] when the server reports an error, and
/// [`RoverError::Protocol`] when the record is not valid JSON.
pub fn parse_handshake_response(record: &str) -> Result<(), RoverError> {
    let response: HandshakeResponse = serde_json::from_str(record)
        .map_err(|e| RoverError::Protocol(format!("bad handshake response: {e}")))?;
    match response.error {
        Some(error) => Err(RoverError::Handshake(error)),
        None => Ok(()),
    }
}

/// Decode one record (without its separator).
///
/// # Errors
///
/// [`RoverError::Protocol`] when the record is not a hub message.
pub fn parse_message(record: &str) -> Result<HubMessage, RoverError> {
    let raw: RawMessage = serde_json::from_str(record)
        .map_err(|e| RoverError::Protocol(format!("bad hub record: {e}")))?;
    Ok(match raw.kind {
        INVOCATION => HubMessage::Invocation {
            target: raw
                .target
                .ok_or_else(|| RoverError::Protocol("invocation without target".into()))?,
            arguments: raw.arguments,
        },
        PING => HubMessage::Ping,
        CLOSE => HubMessage::Close {
            error: raw.error,
            allow_reconnect: raw.allow_reconnect,
        },
        other => HubMessage::Other(other),
    })
}

/// Extract the command token from an invocation of `method`.
///
/// Method names compare case-insensitively, as SignalR does.  The first
/// argument is the token; a number is accepted and rendered as text.
pub fn command_token(message: &HubMessage, method: &str) -> Option<CommandToken> {
    let HubMessage::Invocation { target, arguments } = message else {
        return None;
    };
    if !target.eq_ignore_ascii_case(method) {
        return None;
    }
    match arguments.first()? {
        Value::String(token) => Some(token.clone()),
        Value::Number(code) => Some(code.to_string()),
        _ => None,
    }
}
