//! Client library.
//!
//! The binary wires user input, the session core, and one of the two
//! transport runners together. Everything that changes session state lives
//! in [`session::Session`]; the runners do I/O and feed it events.

use std::net::SocketAddr;

use anyhow::Context;
use chat_shared::config::ClientConfig;

pub mod input;
pub mod output;
pub mod queue;
pub mod reliability;
pub mod session;
pub mod tcp;
pub mod udp;

/// How a finished session ended, for the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    /// True when the session reached its end state without a protocol
    /// violation or transport failure.
    pub clean: bool,
}

/// Resolves the configured server endpoint, hostname or literal address.
pub async fn resolve_server(cfg: &ClientConfig) -> anyhow::Result<SocketAddr> {
    tokio::net::lookup_host((cfg.server_host.as_str(), cfg.port))
        .await
        .with_context(|| format!("resolve {}", cfg.server_host))?
        .next()
        .ok_or_else(|| anyhow::anyhow!("no addresses found for {}", cfg.server_host))
}
