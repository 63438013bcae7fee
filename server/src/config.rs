use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::info;

use crate::engine::validation::{
    DEFAULT_MAX_CHANNEL_USERS, MAX_CHANNEL_LENGTH, MAX_USERNAME_LENGTH, MIN_CHANNEL_LENGTH,
    MIN_USERNAME_LENGTH,
};
use crate::error::ConfigError;

/// Top-level server configuration, loaded from relay.toml.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    pub server: ServerSection,
    pub limits: LimitsSection,
    pub timeouts: TimeoutsSection,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServerSection {
    pub host: String,
    pub port: u16,
    /// Flat-file state snapshot (channels, passwords, block list) loaded at startup.
    pub state_file: Option<String>,
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 4444,
            state_file: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsSection {
    pub max_channel_users: usize,
    pub min_username_length: usize,
    pub max_username_length: usize,
    pub min_channel_length: usize,
    pub max_channel_length: usize,
}

impl Default for LimitsSection {
    fn default() -> Self {
        Self {
            max_channel_users: DEFAULT_MAX_CHANNEL_USERS,
            min_username_length: MIN_USERNAME_LENGTH,
            max_username_length: MAX_USERNAME_LENGTH,
            min_channel_length: MIN_CHANNEL_LENGTH,
            max_channel_length: MAX_CHANNEL_LENGTH,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimeoutsSection {
    /// Receive timeout while waiting for the handshake payload.
    pub handshake_ms: u64,
    /// Receive timeout once joined; bounds how long the relay loop waits on one member.
    pub poll_ms: u64,
    /// Upper bound on a single outgoing frame.
    pub send_ms: u64,
}

impl Default for TimeoutsSection {
    fn default() -> Self {
        Self {
            handshake_ms: 5000,
            poll_ms: 50,
            send_ms: 5000,
        }
    }
}

impl ServerConfig {
    /// Load config from a TOML file. Falls back to defaults if the file doesn't exist.
    /// Environment variables override TOML values.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let mut config = if Path::new(path).exists() {
            let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
                path: path.to_string(),
                source,
            })?;
            toml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_string(),
                source,
            })?
        } else {
            info!("No config file found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply `RELAY_*` environment variables. Called by `load`, and again by
    /// the binary after a state file has supplied its endpoint.
    pub fn apply_env_overrides(&mut self) {
        if let Ok(v) = std::env::var("RELAY_HOST") {
            self.server.host = v;
        }
        if let Ok(v) = std::env::var("RELAY_PORT")
            && let Ok(port) = v.parse()
        {
            self.server.port = port;
        }
        if let Ok(v) = std::env::var("RELAY_STATE_FILE") {
            self.server.state_file = Some(v);
        }
        if let Ok(v) = std::env::var("RELAY_MAX_CHANNEL_USERS")
            && let Ok(n) = v.parse()
        {
            self.limits.max_channel_users = n;
        }
        if let Ok(v) = std::env::var("RELAY_HANDSHAKE_MS")
            && let Ok(ms) = v.parse()
        {
            self.timeouts.handshake_ms = ms;
        }
        if let Ok(v) = std::env::var("RELAY_POLL_MS")
            && let Ok(ms) = v.parse()
        {
            self.timeouts.poll_ms = ms;
        }
        if let Ok(v) = std::env::var("RELAY_SEND_MS")
            && let Ok(ms) = v.parse()
        {
            self.timeouts.send_ms = ms;
        }
    }

    /// Listening endpoint as `host:port`.
    pub fn address(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Convert into the settings the relay engine runs with.
    pub fn to_settings(&self) -> RelaySettings {
        RelaySettings {
            host: self.server.host.clone(),
            port: self.server.port,
            limits: self.limits.clone(),
            handshake_timeout: Duration::from_millis(self.timeouts.handshake_ms),
            poll_timeout: Duration::from_millis(self.timeouts.poll_ms),
            send_timeout: Duration::from_millis(self.timeouts.send_ms),
        }
    }
}

/// Runtime knobs consumed by the handshake and relay loops.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub host: String,
    pub port: u16,
    pub limits: LimitsSection,
    pub handshake_timeout: Duration,
    pub poll_timeout: Duration,
    pub send_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        ServerConfig::default().to_settings()
    }
}
