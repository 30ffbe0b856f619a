//! `rover-middleware` – the link to the command relay.
//!
//! Opens and keeps a connection to a SignalR relay and turns its invocations
//! into command tokens.  The crate does not know what a token means; it only
//! delivers them, in order, to a [`TokenSink`].
//!
//! # Modules
//!
//! - [`hub_protocol`] – SignalR JSON hub protocol records.
//! - [`negotiate`] – HTTP negotiation and WebSocket URL construction.
//! - [`transport`] – [`RelayTransport`] / [`CommandStream`] seams and the
//!   SignalR implementation.
//! - [`connection`] – [`ConnectionManager`]: start retries, reconnect policy
//!   and token delivery.

pub mod connection;
pub mod hub_protocol;
pub mod negotiate;
pub mod transport;

pub use connection::{Closure, ConnectionConfig, ConnectionManager, MIN_RETRY_DELAY, ReconnectPolicy, TokenSink};
pub use hub_protocol::DEFAULT_HUB_METHOD;
pub use transport::{CommandStream, HubSettings, RelayTransport, SignalRStream, SignalRTransport};
