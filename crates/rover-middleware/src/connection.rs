//! [`ConnectionManager`] – connection lifecycle towards the relay.
//!
//! - **Start:** attempts repeat every `retry_interval` until one succeeds.
//!   Nothing can be controlled without a relay, so there is no limit.
//! - **Closure:** after a random jitter in `[0, jitter_max)` one reconnect
//!   attempt is made.  If it fails the manager settles in
//!   [`ConnectionState::Disconnected`] and [`ConnectionManager::run`]
//!   returns.  [`ReconnectPolicy::Persistent`] keeps retrying with
//!   exponential backoff instead.
//!
//! Tokens are delivered to the [`TokenSink`] on the manager's own task, one
//! at a time, in arrival order.  Closure handling runs on the same task, so it
//! never overlaps a delivery.

use std::fmt;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rover_types::{CommandToken, ConnectionState, RoverError};
use tokio::sync::watch;
use tokio::time::sleep;
use tracing::{error, info, warn};
use url::Url;

use crate::transport::{CommandStream, RelayTransport};

/// Floor for every retry and backoff delay, so a zero setting cannot spin.
pub const MIN_RETRY_DELAY: Duration = Duration::from_millis(100);

/// Receives command tokens in arrival order.
pub trait TokenSink: Send {
    fn deliver(&mut self, token: CommandToken);
}

impl<F> TokenSink for F
where
    F: FnMut(CommandToken) + Send,
{
    fn deliver(&mut self, token: CommandToken) {
        self(token)
    }
}

/// What happens after an established connection is lost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReconnectPolicy {
    /// One jittered attempt, then stay disconnected.
    #[default]
    SingleAttempt,
    /// Keep trying, doubling the delay from `initial` up to `max`.
    Persistent { initial: Duration, max: Duration },
}

/// Timing and policy of a [`ConnectionManager`].
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub endpoint: Url,
    pub retry_interval: Duration,
    pub jitter_max: Duration,
    pub policy: ReconnectPolicy,
}

impl ConnectionConfig {
    /// Defaults: 5 s start retry, up to 5 s reconnect jitter, one attempt.
    pub fn new(endpoint: Url) -> Self {
        Self {
            endpoint,
            retry_interval: Duration::from_secs(5),
            jitter_max: Duration::from_secs(5),
            policy: ReconnectPolicy::SingleAttempt,
        }
    }
}

/// Why a connection ended.
#[derive(Debug)]
pub enum Closure {
    /// The relay closed the connection.
    Remote,
    /// The connection failed.
    Failed(RoverError),
}

impl fmt::Display for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Remote => f.write_str("closed by relay"),
            Self::Failed(e) => write!(f, "{e}"),
        }
    }
}

/// Owns the relay connection and its state.
pub struct ConnectionManager<T> {
    transport: T,
    config: ConnectionConfig,
    state: watch::Sender<ConnectionState>,
    rng: StdRng,
}

impl<T: RelayTransport> ConnectionManager<T> {
    pub fn new(transport: T, config: ConnectionConfig) -> Self {
        Self {
            transport,
            config,
            state: watch::Sender::new(ConnectionState::Disconnected),
            rng: StdRng::from_entropy(),
        }
    }

    /// Fix the jitter sequence.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// Watch state transitions.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    fn set_state(&self, state: ConnectionState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            info!(from = %previous, to = %state, "connection state changed");
        }
    }

    async fn attempt(&mut self) -> Result<Box<dyn CommandStream>, RoverError> {
        self.set_state(ConnectionState::Connecting);
        let stream = self.transport.open(&self.config.endpoint).await?;
        self.set_state(ConnectionState::Connected);
        Ok(stream)
    }

    /// Connect, retrying every `retry_interval` until an attempt succeeds.
    pub async fn connect(&mut self) -> Box<dyn CommandStream> {
        let retry = self.config.retry_interval.max(MIN_RETRY_DELAY);
        let mut attempts: u64 = 0;
        loop {
            attempts += 1;
            match self.attempt().await {
                Ok(stream) => return stream,
                Err(e) => {
                    warn!(
                        attempt = attempts,
                        error = %e,
                        retry_in_ms = retry.as_millis() as u64,
                        "relay connection failed"
                    );
                    sleep(retry).await;
                }
            }
        }
    }

    fn jitter(&mut self) -> Duration {
        let max = u64::try_from(self.config.jitter_max.as_nanos()).unwrap_or(u64::MAX);
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_nanos(self.rng.gen_range(0..max))
    }

    /// Handle the loss of an established connection.
    ///
    /// Returns the replacement stream, or `None` when the manager has given
    /// up and stays [`ConnectionState::Disconnected`].
    pub async fn on_closed(&mut self, reason: Closure) -> Option<Box<dyn CommandStream>> {
        warn!(reason = %reason, "relay connection lost");
        self.set_state(ConnectionState::Disconnected);

        let delay = self.jitter();
        info!(delay_ms = delay.as_millis() as u64, "reconnecting after jitter");
        sleep(delay).await;

        match self.attempt().await {
            Ok(stream) => Some(stream),
            Err(e) => match self.config.policy {
                ReconnectPolicy::SingleAttempt => {
                    error!(error = %e, "reconnect failed; staying disconnected");
                    self.set_state(ConnectionState::Disconnected);
                    None
                }
                ReconnectPolicy::Persistent { initial, max } => {
                    warn!(error = %e, "reconnect failed; backing off");
                    Some(self.reconnect_with_backoff(initial, max).await)
                }
            },
        }
    }

    async fn reconnect_with_backoff(&mut self, initial: Duration, max: Duration) -> Box<dyn CommandStream> {
        let mut backoff = initial.min(max).max(MIN_RETRY_DELAY);
        loop {
            let delay = backoff + self.jitter();
            info!(delay_ms = delay.as_millis() as u64, "next reconnect attempt scheduled");
            sleep(delay).await;
            match self.attempt().await {
                Ok(stream) => return stream,
                Err(e) => {
                    warn!(error = %e, "reconnect failed");
                    backoff = backoff.saturating_mul(2).min(max).max(MIN_RETRY_DELAY);
                }
            }
        }
    }

    /// Connect, then deliver every token to `sink` for as long as a
    /// connection can be kept up.
    pub async fn run<S: TokenSink>(&mut self, sink: &mut S) {
        let mut stream = self.connect().await;
        loop {
            let reason = pump(stream.as_mut(), sink).await;
            match self.on_closed(reason).await {
                Some(next) => stream = next,
                None => return,
            }
        }
    }
}

async fn pump<S: TokenSink>(stream: &mut dyn CommandStream, sink: &mut S) -> Closure {
    loop {
        match stream.next_token().await {
            Ok(Some(token)) => sink.deliver(token),
            Ok(None) => return Closure::Remote,
            Err(e) => return Closure::Failed(e),
        }
    }
}
