//! SignalR connection negotiation.
//!
//! An `http(s)://` relay URL is first negotiated: the client POSTs to
//! `{url}/negotiate?negotiateVersion=1` and the server either redirects it to
//! another service (a new URL plus a bearer token, as Azure SignalR does) or
//! hands out a connection token.  The WebSocket URL is then the negotiated
//! URL with its scheme switched to `ws(s)` and `id` / `access_token` appended.
//!
//! `ws(s)://` URLs skip negotiation and are dialled as given.

use rover_types::RoverError;
use serde::Deserialize;
use tracing::debug;
use url::Url;

/// Redirect hops followed before giving up.
pub const MAX_REDIRECTS: usize = 100;

/// Body of a negotiate response.  Only the fields a WebSocket client reads.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiateResponse {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub connection_id: Option<String>,
    #[serde(default)]
    pub connection_token: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Where a negotiate response points next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NegotiateStep {
    /// Negotiate again against `url`, presenting `access_token`.
    Redirect {
        url: Url,
        access_token: Option<String>,
    },
    /// Negotiation is done; connect with this connection token.
    Ready { connection_token: Option<String> },
}

/// Whether `endpoint` can be dialled without negotiating first.
pub fn is_websocket(endpoint: &Url) -> bool {
    matches!(endpoint.scheme(), "ws" | "wss")
}

/// `{base}/negotiate?negotiateVersion=1`, keeping `base`'s own query.
pub fn negotiate_url(base: &Url) -> Url {
    let mut url = base.clone();
    let path = format!("{}/negotiate", base.path().trim_end_matches('/'));
    url.set_path(&path);
    url.query_pairs_mut().append_pair("negotiateVersion", "1");
    url
}

/// The WebSocket URL for a negotiated connection.
///
/// # Errors
///
/// [`RoverError::Config`] when `base` is not an `http(s)` or `ws(s)` URL.
pub fn websocket_url(
    base: &Url,
    connection_token: Option<&str>,
    access_token: Option<&str>,
) -> Result<Url, RoverError> {
    let mut url = base.clone();
    let scheme = match base.scheme() {
        "http" | "ws" => "ws",
        "https" | "wss" => "wss",
        other => {
            return Err(RoverError::Config(format!(
                "unsupported relay URL scheme `{other}`"
            )));
        }
    };
    url.set_scheme(scheme)
        .map_err(|()| RoverError::Config(format!("cannot switch {base} to {scheme}")))?;
    // `query_pairs_mut` leaves a bare `?` behind, so only open it to append.
    if connection_token.is_some() || access_token.is_some() {
        let mut query = url.query_pairs_mut();
        if let Some(token) = connection_token {
            query.append_pair("id", token);
        }
        if let Some(token) = access_token {
            query.append_pair("access_token", token);
        }
    }
    Ok(url)
}

/// Decide what a negotiate response asks for.
///
/// # Errors
///
/// [`RoverError::Handshake`] when the server reports an error, and
/// [`RoverError::Protocol`] when a redirect URL does not parse.
pub fn interpret(response: NegotiateResponse) -> Result<NegotiateStep, RoverError> {
    if let Some(error) = response.error {
        return Err(RoverError::Handshake(format!("negotiate rejected: {error}")));
    }
    if let Some(redirect) = response.url {
        let url = Url::parse(&redirect)
            .map_err(|e| RoverError::Protocol(format!("bad redirect URL {redirect:?}: {e}")))?;
        return Ok(NegotiateStep::Redirect {
            url,
            access_token: response.access_token,
        });
    }
    Ok(NegotiateStep::Ready {
        connection_token: response.connection_token.or(response.connection_id),
    })
}

/// Negotiate against `endpoint` and return the URL to open the WebSocket on.
///
/// # Errors
///
/// [`RoverError::Connection`] when the server cannot be reached,
/// [`RoverError::Handshake`] when it refuses the negotiation or redirects
/// too often, and [`RoverError::Protocol`] on an unreadable response.
pub async fn negotiate(http: &reqwest::Client, endpoint: &Url) -> Result<Url, RoverError> {
    if is_websocket(endpoint) {
        return Ok(endpoint.clone());
    }

    let mut base = endpoint.clone();
    let mut access_token: Option<String> = None;

    for _ in 0..=MAX_REDIRECTS {
        let target = negotiate_url(&base);
        debug!(url = %target, "negotiating");

        let mut request = http.post(target.as_str());
        if let Some(token) = &access_token {
            request = request.bearer_auth(token);
        }
        let response = request
            .send()
            .await
            .map_err(|e| RoverError::Connection(format!("negotiate with {base}: {e}")))?
            .error_for_status()
            .map_err(|e| RoverError::Handshake(format!("negotiate with {base}: {e}")))?
            .json::<NegotiateResponse>()
            .await
            .map_err(|e| RoverError::Protocol(format!("negotiate response from {base}: {e}")))?;

        match interpret(response)? {
            NegotiateStep::Redirect { url, access_token: token } => {
                debug!(to = %url, "negotiate redirected");
                base = url;
                access_token = token;
            }
            NegotiateStep::Ready { connection_token } => {
                return websocket_url(&base, connection_token.as_deref(), access_token.as_deref());
            }
        }
    }

    Err(RoverError::Handshake(format!(
        "negotiate redirect limit of {MAX_REDIRECTS} exceeded"
    )))
}
