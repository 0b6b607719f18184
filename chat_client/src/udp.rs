//! Datagram (UDP) transport runner.
//!
//! Wraps the socket around the session's stop-and-wait state: the head of
//! the queue goes out once, retransmits on the confirmation timer, and the
//! queue advances only when the matching CONFIRM arrives. Every inbound
//! non-CONFIRM datagram with a readable header is acknowledged before
//! anything else happens to it — before dedup drops it and before its
//! payload is even decoded.
//!
//! The server answers from a dynamically allocated port; the peer address
//! follows whatever endpoint spoke to us last.

use std::net::SocketAddr;

use anyhow::Context;
use chat_shared::config::ClientConfig;
use chat_shared::datagram;
use chat_shared::msg::{Message, WireError};
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, watch};
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::session::Session;
use crate::{input, output, resolve_server, RunSummary};

pub async fn run(
    cfg: &ClientConfig,
    mut input_rx: mpsc::Receiver<String>,
    mut stop: watch::Receiver<bool>,
) -> anyhow::Result<RunSummary> {
    let server = resolve_server(cfg).await?;
    let bind_addr: SocketAddr = if server.is_ipv4() {
        "0.0.0.0:0".parse().context("bind address")?
    } else {
        "[::]:0".parse().context("bind address")?
    };
    let socket = UdpSocket::bind(bind_addr).await.context("udp bind")?;
    info!(server = %server, timeout_ms = cfg.confirm_timeout_ms, retries = cfg.max_retries, "starting session");

    let mut peer = server;
    let mut session = Session::new_udp(cfg.confirm_timeout(), cfg.max_retries);
    let mut buf = vec![0u8; 64 * 1024];
    let mut input_open = true;
    let mut stop_seen = false;

    loop {
        if let Some(out) = session.take_sendable() {
            let wire = datagram::encode(out.msg_id, &out.msg);
            socket.send_to(&wire, peer).await.context("udp send")?;
            debug!(kind = %out.msg.kind(), msg_id = out.msg_id, "sent");
            session.track_transmission(&out, wire, Instant::now());
        }
        for effect in session.drain_effects() {
            output::apply(&effect);
        }
        if session.finished() {
            break;
        }

        let deadline = session.udp_deadline();
        tokio::select! {
            _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() => {
                if let Some(wire) = session.on_retransmit_timeout(Instant::now()) {
                    socket.send_to(&wire, peer).await.context("udp send")?;
                }
            }
            received = socket.recv_from(&mut buf) => {
                let (n, from) = received.context("udp recv")?;
                if from != peer {
                    debug!(%from, "server endpoint moved");
                    peer = from;
                }
                handle_datagram(&mut session, &socket, peer, &buf[..n]).await?;
            }
            line = input_rx.recv(), if input_open => match line {
                Some(line) => input::dispatch(&mut session, &line),
                None => {
                    debug!("end of user input");
                    input_open = false;
                    session.request_shutdown();
                }
            },
            changed = stop.changed(), if !stop_seen => {
                stop_seen = true;
                // A dropped sender is not an interrupt.
                if changed.is_ok() {
                    debug!("interrupt requested");
                    session.request_shutdown();
                }
            }
        }
    }

    Ok(RunSummary {
        clean: !session.failed(),
    })
}

async fn handle_datagram(
    session: &mut Session,
    socket: &UdpSocket,
    peer: SocketAddr,
    payload: &[u8],
) -> anyhow::Result<()> {
    let Some((ty, msg_id)) = datagram::peek_header(payload) else {
        warn!(len = payload.len(), "datagram without a readable header");
        session.on_wire_error(&WireError::Truncated);
        return Ok(());
    };
    if ty == datagram::TYPE_CONFIRM {
        session.on_confirm(msg_id);
        return Ok(());
    }

    // Acknowledge on the header alone, before dedup, decoding, or any
    // session processing; broken payloads and duplicates are confirmed too,
    // so the peer stops retransmitting.
    let confirm = datagram::encode(0, &Message::Confirm { ref_id: msg_id });
    socket
        .send_to(&confirm, peer)
        .await
        .context("udp send confirm")?;

    if !session.register_inbound(msg_id) {
        debug!(msg_id, "duplicate datagram dropped");
        return Ok(());
    }
    match datagram::decode(payload) {
        Ok((_, msg)) => session.on_message(msg),
        Err(e) => {
            warn!(error = %e, "undecodable datagram");
            session.on_wire_error(&e);
        }
    }
    Ok(())
}
