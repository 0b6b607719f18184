//! Configuration system.
//!
//! Holds everything the client needs to reach a server. Values come from
//! CLI flags or a JSON string (file IO left to the app); unspecified fields
//! fall back to the protocol defaults.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

/// Which transport binding to speak.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    Tcp,
    Udp,
}

impl FromStr for TransportKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tcp" => Ok(TransportKind::Tcp),
            "udp" => Ok(TransportKind::Udp),
            other => Err(format!("unknown transport {other:?}, expected tcp or udp")),
        }
    }
}

impl fmt::Display for TransportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TransportKind::Tcp => "tcp",
            TransportKind::Udp => "udp",
        })
    }
}

/// Client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Transport binding.
    pub transport: TransportKind,
    /// Server hostname or address.
    pub server_host: String,
    /// Server port.
    #[serde(default = "default_port")]
    pub port: u16,
    /// How long to wait for a confirmation before retransmitting
    /// (datagram binding only).
    #[serde(default = "default_confirm_timeout_ms")]
    pub confirm_timeout_ms: u64,
    /// Maximum wire transmissions per logical message
    /// (datagram binding only).
    #[serde(default = "default_max_retries")]
    pub max_retries: u8,
}

fn default_port() -> u16 {
    4567
}

fn default_confirm_timeout_ms() -> u64 {
    250
}

fn default_max_retries() -> u8 {
    3
}

impl ClientConfig {
    /// Builds a config with protocol defaults for everything optional.
    pub fn new(transport: TransportKind, server_host: impl Into<String>) -> Self {
        Self {
            transport,
            server_host: server_host.into(),
            port: default_port(),
            confirm_timeout_ms: default_confirm_timeout_ms(),
            max_retries: default_max_retries(),
        }
    }

    /// Parses config from JSON.
    pub fn from_json_str(s: &str) -> serde_json::Result<Self> {
        serde_json::from_str(s)
    }

    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(self.confirm_timeout_ms)
    }
}
