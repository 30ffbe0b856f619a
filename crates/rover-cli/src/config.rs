//! Configuration – reads/writes `~/.rover/config.toml`.
//!
//! Every field has a default, so an absent file or a partial one is fine.
//! Environment variables override the file and command-line arguments
//! override both.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use rover_hal::DEFAULT_HALT_COMMAND;
use rover_middleware::{ConnectionConfig, DEFAULT_HUB_METHOD, HubSettings, ReconnectPolicy};
use rover_types::RoverError;
use url::Url;

/// Which motor driver to build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    #[default]
    Gpio,
    Sim,
}

impl std::str::FromStr for Driver {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gpio" => Ok(Self::Gpio),
            "sim" => Ok(Self::Sim),
            other => Err(format!("unknown driver `{other}`")),
        }
    }
}

/// What to do after a failed post-closure reconnect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReconnectMode {
    #[default]
    Single,
    Persistent,
}

impl std::str::FromStr for ReconnectMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "single" => Ok(Self::Single),
            "persistent" => Ok(Self::Persistent),
            other => Err(format!("unknown reconnect mode `{other}`")),
        }
    }
}

/// `[relay]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay URL; `http(s)` is negotiated, `ws(s)` is dialled directly.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub url: String,
    pub hub_method: String,
    pub connect_retry_secs: u64,
    pub reconnect_jitter_max_secs: u64,
    pub reconnect: ReconnectMode,
    pub backoff_initial_secs: u64,
    pub backoff_max_secs: u64,
    pub keep_alive_secs: u64,
    pub server_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            hub_method: DEFAULT_HUB_METHOD.to_string(),
            connect_retry_secs: 5,
            reconnect_jitter_max_secs: 5,
            reconnect: ReconnectMode::Single,
            backoff_initial_secs: 1,
            backoff_max_secs: 60,
            keep_alive_secs: 15,
            server_timeout_secs: 30,
        }
    }
}

/// `[motors]` section.  Pins are the BCM numbers `[line_a, line_b]` of each
/// H-bridge channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MotorConfig {
    pub driver: Driver,
    pub left_pins: [u8; 2],
    pub right_pins: [u8; 2],
}

impl Default for MotorConfig {
    fn default() -> Self {
        Self {
            driver: Driver::Gpio,
            left_pins: [26, 21],
            right_pins: [20, 19],
        }
    }
}

/// `[shutdown]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ShutdownConfig {
    /// Program followed by its arguments.
    pub command: Vec<String>,
}

impl Default for ShutdownConfig {
    fn default() -> Self {
        Self {
            command: DEFAULT_HALT_COMMAND.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Persisted configuration stored in `~/.rover/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoverConfig {
    pub relay: RelayConfig,
    pub motors: MotorConfig,
    pub shutdown: ShutdownConfig,
}

impl RoverConfig {
    /// Pick the relay URL: `cli`, else the configured one (which already
    /// carries any `SIGNALR_URL` override).
    ///
    /// # Errors
    ///
    /// [`RoverError::Config`] when no URL is given or it does not parse as an
    /// `http`, `https`, `ws` or `wss` URL.
    pub fn relay_url(&self, cli: Option<&str>) -> Result<Url, RoverError> {
        let raw = cli
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .or_else(|| Some(self.relay.url.trim()).filter(|s| !s.is_empty()))
            .ok_or_else(|| {
                RoverError::Config(
                    "no relay URL: pass one as an argument, set SIGNALR_URL, or set relay.url in the config file"
                        .into(),
                )
            })?;
        let url = Url::parse(raw).map_err(|e| RoverError::Config(format!("invalid relay URL `{raw}`: {e}")))?;
        match url.scheme() {
            "http" | "https" | "ws" | "wss" => Ok(url),
            other => Err(RoverError::Config(format!(
                "relay URL `{raw}` has unsupported scheme `{other}`"
            ))),
        }
    }

    /// Reject settings that cannot drive a vehicle.
    ///
    /// # Errors
    ///
    /// [`RoverError::Config`] describing the first problem found.
    pub fn validate(&self) -> Result<(), RoverError> {
        if self.relay.hub_method.trim().is_empty() {
            return Err(RoverError::Config("relay.hub_method must not be empty".into()));
        }
        if self.shutdown.command.is_empty() {
            return Err(RoverError::Config("shutdown.command must not be empty".into()));
        }
        for (name, secs) in [
            ("relay.connect_retry_secs", self.relay.connect_retry_secs),
            ("relay.backoff_initial_secs", self.relay.backoff_initial_secs),
        ] {
            if secs == 0 {
                return Err(RoverError::Config(format!("{name} must be at least 1")));
            }
        }
        if self.relay.backoff_max_secs < self.relay.backoff_initial_secs {
            return Err(RoverError::Config(
                "relay.backoff_max_secs must not be below relay.backoff_initial_secs".into(),
            ));
        }
        if self.relay.keep_alive_secs == 0 || self.relay.server_timeout_secs <= self.relay.keep_alive_secs {
            return Err(RoverError::Config(
                "relay.server_timeout_secs must exceed a non-zero relay.keep_alive_secs".into(),
            ));
        }
        if self.motors.driver == Driver::Gpio {
            let [a, b] = self.motors.left_pins;
            let [c, d] = self.motors.right_pins;
            let pins = [a, b, c, d];
            for (i, pin) in pins.iter().enumerate() {
                if pins[i + 1..].contains(pin) {
                    return Err(RoverError::Config(format!("gpio line {pin} is assigned twice")));
                }
            }
        }
        Ok(())
    }

    pub fn connection_config(&self, endpoint: Url) -> ConnectionConfig {
        let relay = &self.relay;
        ConnectionConfig {
            endpoint,
            retry_interval: Duration::from_secs(relay.connect_retry_secs),
            jitter_max: Duration::from_secs(relay.reconnect_jitter_max_secs),
            policy: match relay.reconnect {
                ReconnectMode::Single => ReconnectPolicy::SingleAttempt,
                ReconnectMode::Persistent => ReconnectPolicy::Persistent {
                    initial: Duration::from_secs(relay.backoff_initial_secs),
                    max: Duration::from_secs(relay.backoff_max_secs),
                },
            },
        }
    }

    pub fn hub_settings(&self) -> HubSettings {
        HubSettings {
            method: self.relay.hub_method.clone(),
            keep_alive_interval: Duration::from_secs(self.relay.keep_alive_secs),
            server_timeout: Duration::from_secs(self.relay.server_timeout_secs),
            ..HubSettings::default()
        }
    }
}

/// Return the path to `~/.rover/config.toml`.
pub fn config_path() -> PathBuf {
    config_path_for_home(
        &std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string()),
    )
}

pub(crate) fn config_path_for_home(home: &str) -> PathBuf {
    PathBuf::from(home).join(".rover").join("config.toml")
}

/// Load `path` if it exists, fall back to defaults, then apply environment
/// overrides.
pub fn load(path: &Path) -> Result<RoverConfig, RoverError> {
    let mut cfg = load_from(path)?.unwrap_or_default();
    apply_env_overrides(&mut cfg);
    Ok(cfg)
}

/// Read the file as written.  Returns `None` if it does not exist.
pub(crate) fn load_from(path: &Path) -> Result<Option<RoverConfig>, RoverError> {
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(path)
        .map_err(|e| RoverError::Config(format!("failed to read {}: {e}", path.display())))?;
    let cfg = toml::from_str(&raw)
        .map_err(|e| RoverError::Config(format!("failed to parse {}: {e}", path.display())))?;
    Ok(Some(cfg))
}

/// Apply environment overrides to `cfg`.  Unparseable values are ignored.
///
/// | Variable | Config field |
/// |---|---|
/// | `SIGNALR_URL` | `relay.url` |
/// | `ROVER_HUB_METHOD` | `relay.hub_method` |
/// | `ROVER_RECONNECT` | `relay.reconnect` |
/// | `ROVER_DRIVER` | `motors.driver` |
pub fn apply_env_overrides(cfg: &mut RoverConfig) {
    if let Ok(v) = std::env::var("SIGNALR_URL")
        && !v.trim().is_empty()
    {
        cfg.relay.url = v;
    }
    if let Ok(v) = std::env::var("ROVER_HUB_METHOD")
        && !v.trim().is_empty()
    {
        cfg.relay.hub_method = v;
    }
    if let Ok(v) = std::env::var("ROVER_RECONNECT")
        && let Ok(mode) = v.parse()
    {
        cfg.relay.reconnect = mode;
    }
    if let Ok(v) = std::env::var("ROVER_DRIVER")
        && let Ok(driver) = v.parse()
    {
        cfg.motors.driver = driver;
    }
}

/// Save the config, creating its directory if necessary.
pub fn save_to(cfg: &RoverConfig, path: &Path) -> Result<(), RoverError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| RoverError::Config(format!("failed to create config directory: {e}")))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            fs::set_permissions(parent, fs::Permissions::from_mode(0o700))
                .map_err(|e| RoverError::Config(format!("failed to set config directory permissions: {e}")))?;
        }
    }
    let raw = toml::to_string_pretty(cfg)
        .map_err(|e| RoverError::Config(format!("failed to serialize config: {e}")))?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)
            .and_then(|mut f| {
                use std::io::Write;
                f.write_all(raw.as_bytes())
            })
            .map_err(|e| RoverError::Config(format!("failed to write {}: {e}", path.display())))?;
    }
    #[cfg(not(unix))]
    fs::write(path, raw).map_err(|e| RoverError::Config(format!("failed to write {}: {e}", path.display())))?;
    Ok(())
}
