//! Flat-file server state: listening endpoint, channels with passwords, and
//! the block list.
//!
//! ```text
//! Host:localhost
//! Port:4444
//! Channel:lobby<<>>
//! Channel:staff<<>>hunter2
//! Blocked:mallory
//! ```

use std::path::Path;

use tracing::warn;

use crate::engine::notices::FIELD_DELIMITER;
use crate::error::ConfigError;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateSnapshot {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub channels: Vec<ChannelEntry>,
    pub blocked: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelEntry {
    pub name: String,
    /// Empty means open.
    pub password: String,
}

impl StateSnapshot {
    /// Parse snapshot text. Unknown keys and blank lines are ignored.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let mut snapshot = Self::default();

        for (idx, line) in text.lines().enumerate() {
            let Some((key, value)) = line.split_once(':') else {
                continue;
            };
            match key {
                "Host" => snapshot.host = Some(value.trim().to_string()),
                "Port" => {
                    let value = value.trim();
                    let port = value
                        .parse::<u16>()
                        .ok()
                        .filter(|p| *p > 0)
                        .ok_or_else(|| ConfigError::InvalidPort {
                            line: idx + 1,
                            value: value.to_string(),
                        })?;
                    snapshot.port = Some(port);
                }
                "Channel" => {
                    let value = value.trim();
                    let (name, password) = value
                        .split_once(FIELD_DELIMITER)
                        .unwrap_or((value, ""));
                    snapshot.channels.push(ChannelEntry {
                        name: name.to_string(),
                        password: password.to_string(),
                    });
                }
                "Blocked" => {
                    let username = value.trim();
                    if !username.is_empty() {
                        snapshot.blocked.push(username.to_string());
                    }
                }
                other => {
                    warn!(line = idx + 1, key = %other, "ignoring unknown state entry");
                }
            }
        }

        Ok(snapshot)
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        if let Some(host) = &self.host {
            out.push_str(&format!("Host:{host}\n"));
        }
        if let Some(port) = self.port {
            out.push_str(&format!("Port:{port}\n"));
        }
        for ch in &self.channels {
            out.push_str(&format!(
                "Channel:{}{}{}\n",
                ch.name, FIELD_DELIMITER, ch.password
            ));
        }
        for user in &self.blocked {
            out.push_str(&format!("Blocked:{user}\n"));
        }
        out
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::parse(&text)
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let path = path.as_ref();
        std::fs::write(path, self.render()).map_err(|source| ConfigError::Write {
            path: path.display().to_string(),
            source,
        })
    }
}
