//! Relay transports.
//!
//! A [`RelayTransport`] opens one connection to the relay and hands back a
//! [`CommandStream`] that yields command tokens until the connection ends.
//! The [`ConnectionManager`][crate::connection::ConnectionManager] owns the
//! retry logic; transports only know how to open a single connection.
//!
//! - [`SignalRTransport`] – SignalR JSON hub protocol over a WebSocket.

use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use rover_types::{CommandToken, RoverError};
use tokio::net::TcpStream;
use tokio::time::{Instant, MissedTickBehavior, interval_at, sleep_until, timeout};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::{debug, info, warn};
use url::Url;

use crate::hub_protocol::{self, DEFAULT_HUB_METHOD, HubMessage};
use crate::negotiate;

/// Live connection to the relay.
#[async_trait]
pub trait CommandStream: Send {
    /// Wait for the next command token.
    ///
    /// `Ok(None)` means the relay closed the connection in an orderly way.
    ///
    /// # Errors
    ///
    /// Any [`RoverError`] ends the connection; the stream must not be polled
    /// again afterwards.
    async fn next_token(&mut self) -> Result<Option<CommandToken>, RoverError>;
}

/// Opens connections to the relay.
#[async_trait]
pub trait RelayTransport: Send + Sync {
    /// Open one connection to `endpoint`.
    ///
    /// # Errors
    ///
    /// Returns the reason the connection could not be established.
    async fn open(&self, endpoint: &Url) -> Result<Box<dyn CommandStream>, RoverError>;
}

/// Hub-level settings of a [`SignalRTransport`].
#[derive(Debug, Clone)]
pub struct HubSettings {
    /// Invocation target that carries command tokens.
    pub method: String,
    /// How often the client sends a ping record.
    pub keep_alive_interval: Duration,
    /// Silence after which the server is considered gone.
    pub server_timeout: Duration,
    /// Limit for the WebSocket upgrade plus the hub handshake.
    pub handshake_timeout: Duration,
}

impl Default for HubSettings {
    fn default() -> Self {
        Self {
            method: DEFAULT_HUB_METHOD.to_string(),
            keep_alive_interval: Duration::from_secs(15),
            server_timeout: Duration::from_secs(30),
            handshake_timeout: Duration::from_secs(15),
        }
    }
}

/// SignalR client transport.
#[derive(Debug, Clone)]
pub struct SignalRTransport {
    http: reqwest::Client,
    settings: HubSettings,
}

impl SignalRTransport {
    pub fn new(settings: HubSettings) -> Self {
        Self {
            http: reqwest::Client::new(),
            settings,
        }
    }

    pub fn settings(&self) -> &HubSettings {
        &self.settings
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

#[async_trait]
impl RelayTransport for SignalRTransport {
    async fn open(&self, endpoint: &Url) -> Result<Box<dyn CommandStream>, RoverError> {
        let ws_url = negotiate::negotiate(&self.http, endpoint).await?;
        let limit = self.settings.handshake_timeout;

        let (ws, _response) = timeout(limit, connect_async(ws_url.as_str()))
            .await
            .map_err(|_| RoverError::Connection(format!("no WebSocket upgrade within {limit:?}")))?
            .map_err(|e| RoverError::Connection(format!("WebSocket connect to {endpoint}: {e}")))?;
        let (mut ws_tx, mut ws_rx) = ws.split();

        ws_tx
            .send(Message::Text(hub_protocol::handshake_request().into()))
            .await
            .map_err(|e| RoverError::Connection(format!("sending handshake: {e}")))?;

        let pending = timeout(limit, read_handshake(&mut ws_rx))
            .await
            .map_err(|_| RoverError::Handshake(format!("no handshake response within {limit:?}")))??;

        info!(endpoint = %endpoint, method = %self.settings.method, "relay connection established");
        Ok(Box::new(SignalRStream::new(ws_tx, ws_rx, pending, &self.settings)))
    }
}

/// Read frames until the handshake response arrives.  Records that follow it
/// in the same frame are returned for normal processing.
async fn read_handshake(ws_rx: &mut SplitStream<WsStream>) -> Result<VecDeque<String>, RoverError> {
    loop {
        match ws_rx.next().await {
            Some(Ok(Message::Text(text))) => {
                let mut records = hub_protocol::split_records(text.as_str());
                let Some(first) = records.next() else {
                    continue;
                };
                hub_protocol::parse_handshake_response(first)?;
                return Ok(records.map(str::to_owned).collect());
            }
            Some(Ok(Message::Close(frame))) => {
                return Err(RoverError::Handshake(format!(
                    "relay closed during handshake: {frame:?}"
                )));
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => return Err(RoverError::Connection(format!("during handshake: {e}"))),
            None => return Err(RoverError::Handshake("relay hung up during handshake".into())),
        }
    }
}

/// A handshaken SignalR connection.
pub struct SignalRStream {
    ws_tx: SplitSink<WsStream, Message>,
    ws_rx: SplitStream<WsStream>,
    pending: VecDeque<String>,
    method: String,
    keep_alive: tokio::time::Interval,
    server_timeout: Duration,
    last_heard: Instant,
}

impl SignalRStream {
    fn new(
        ws_tx: SplitSink<WsStream, Message>,
        ws_rx: SplitStream<WsStream>,
        pending: VecDeque<String>,
        settings: &HubSettings,
    ) -> Self {
        let now = Instant::now();
        let mut keep_alive = interval_at(now + settings.keep_alive_interval, settings.keep_alive_interval);
        keep_alive.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ws_tx,
            ws_rx,
            pending,
            method: settings.method.clone(),
            keep_alive,
            server_timeout: settings.server_timeout,
            last_heard: now,
        }
    }

    /// Drain buffered records.  `Some(Ok(None))` is an orderly close.
    fn take_pending(&mut self) -> Option<Result<Option<CommandToken>, RoverError>> {
        while let Some(record) = self.pending.pop_front() {
            match hub_protocol::parse_message(&record) {
                Ok(HubMessage::Close { error, allow_reconnect }) => {
                    match error {
                        Some(error) => warn!(%error, allow_reconnect, "relay closed the hub connection"),
                        None => info!("relay closed the hub connection"),
                    }
                    return Some(Ok(None));
                }
                Ok(message) => {
                    if let Some(token) = hub_protocol::command_token(&message, &self.method) {
                        return Some(Ok(Some(token)));
                    }
                    debug!(?message, "hub message ignored");
                }
                Err(e) => warn!(error = %e, "malformed hub record dropped"),
            }
        }
        None
    }
}

#[async_trait]
impl CommandStream for SignalRStream {
    async fn next_token(&mut self) -> Result<Option<CommandToken>, RoverError> {
        loop {
            if let Some(outcome) = self.take_pending() {
                return outcome;
            }

            let deadline = self.last_heard + self.server_timeout;
            tokio::select! {
                msg = self.ws_rx.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            self.last_heard = Instant::now();
                            self.pending
                                .extend(hub_protocol::split_records(text.as_str()).map(str::to_owned));
                        }
                        Some(Ok(Message::Close(frame))) => {
                            debug!(?frame, "WebSocket closed by relay");
                            return Ok(None);
                        }
                        Some(Ok(_)) => self.last_heard = Instant::now(),
                        Some(Err(e)) => return Err(RoverError::Connection(e.to_string())),
                        None => return Ok(None),
                    }
                }
                _ = self.keep_alive.tick() => {
                    self.ws_tx
                        .send(Message::Text(hub_protocol::ping_record().into()))
                        .await
                        .map_err(|e| RoverError::Connection(format!("sending keep-alive: {e}")))?;
                }
                () = sleep_until(deadline) => {
                    return Err(RoverError::Connection(format!(
                        "server timeout: nothing heard for {:?}",
                        self.server_timeout
                    )));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;
    use tokio_tungstenite::accept_async;

    fn quick_settings() -> HubSettings {
        HubSettings {
            keep_alive_interval: Duration::from_millis(50),
            server_timeout: Duration::from_millis(300),
            handshake_timeout: Duration::from_secs(5),
            ..HubSettings::default()
        }
    }

    /// Accept one client, check its handshake, then send `frames` and
    /// optionally hold the socket open silently.
    async fn relay(frames: Vec<String>, hold_open: bool) -> (Url, tokio::task::JoinHandle<()>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let Some(Ok(Message::Text(handshake))) = ws.next().await else {
                panic!("expected handshake");
            };
            assert!(handshake.as_str().contains(r#""protocol":"json""#));
            for frame in frames {
                ws.send(Message::Text(frame.into())).await.unwrap();
            }
            if hold_open {
                tokio::time::sleep(Duration::from_secs(5)).await;
            } else {
                ws.close(None).await.ok();
            }
        });
        (Url::parse(&format!("ws://{addr}/hub")).unwrap(), handle)
    }

    #[tokio::test]
    async fn tokens_arrive_in_order_across_frames() {
        let frames = vec![
            "{}\u{1e}{\"type\":1,\"target\":\"newMessage\",\"arguments\":[\"Forward\"]}\u{1e}".to_string(),
            "{\"type\":6}\u{1e}{\"type\":1,\"target\":\"status\",\"arguments\":[\"Backward\"]}\u{1e}{\"type\":1,\"target\":\"newMessage\",\"arguments\":[\"ShutDown\"]}\u{1e}".to_string(),
            "{\"type\":7}\u{1e}".to_string(),
        ];
        let (url, server) = relay(frames, false).await;

        let transport = SignalRTransport::new(quick_settings());
        let mut stream = transport.open(&url).await.unwrap();

        assert_eq!(stream.next_token().await.unwrap().as_deref(), Some("Forward"));
        assert_eq!(stream.next_token().await.unwrap().as_deref(), Some("ShutDown"));
        assert_eq!(stream.next_token().await.unwrap(), None);
        server.await.unwrap();
    }

    #[tokio::test]
    async fn handshake_error_fails_open() {
        let frames = vec!["{\"error\":\"Requested protocol 'json' is not available.\"}\u{1e}".to_string()];
        let (url, _server) = relay(frames, true).await;

        let transport = SignalRTransport::new(quick_settings());
        let result = transport.open(&url).await;
        assert!(matches!(result, Err(RoverError::Handshake(_))));
    }

    #[tokio::test]
    async fn silent_relay_hits_server_timeout() {
        let (url, _server) = relay(vec!["{}\u{1e}".to_string()], true).await;

        let transport = SignalRTransport::new(quick_settings());
        let mut stream = transport.open(&url).await.unwrap();

        let result = stream.next_token().await;
        assert!(matches!(result, Err(RoverError::Connection(msg)) if msg.contains("server timeout")));
    }

    #[tokio::test]
    async fn pings_flow_both_ways_while_idle() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Answers the handshake, pings every 100 ms and counts client pings.
        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let mut ws = accept_async(stream).await.unwrap();
            let _handshake = ws.next().await;
            ws.send(Message::Text("{}\u{1e}".into())).await.unwrap();

            let mut pings_heard = 0;
            let mut own_pings = tokio::time::interval(Duration::from_millis(100));
            let done = tokio::time::sleep(Duration::from_millis(600));
            tokio::pin!(done);
            loop {
                tokio::select! {
                    msg = ws.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            pings_heard += hub_protocol::split_records(text.as_str())
                                .filter(|record| record.contains(r#""type":6"#))
                                .count();
                        }
                        Some(Ok(_)) => {}
                        _ => break,
                    },
                    _ = own_pings.tick() => {
                        ws.send(Message::Text(hub_protocol::ping_record().into())).await.unwrap();
                    }
                    () = &mut done => break,
                }
            }
            pings_heard
        });

        let transport = SignalRTransport::new(quick_settings());
        let url = Url::parse(&format!("ws://{addr}/hub")).unwrap();
        let mut stream = transport.open(&url).await.unwrap();

        // Longer than the 300 ms server timeout: relay pings keep the link alive.
        let idle = tokio::time::timeout(Duration::from_millis(500), stream.next_token()).await;
        assert!(idle.is_err(), "stream ended while the relay was pinging: {idle:?}");

        // One ping per 50 ms keep-alive interval over the 500 ms wait.
        let pings_heard = server.await.unwrap();
        assert!(pings_heard >= 7, "relay heard only {pings_heard} pings");
        drop(stream);
    }

    #[tokio::test]
    async fn refused_connection_fails_open() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = SignalRTransport::new(quick_settings());
        let url = Url::parse(&format!("ws://{addr}/hub")).unwrap();
        assert!(matches!(transport.open(&url).await, Err(RoverError::Connection(_))));
    }
}
