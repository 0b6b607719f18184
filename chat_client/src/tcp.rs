//! Stream (TCP) transport runner.
//!
//! One task owns the socket and the session. Reads, user input, shutdown
//! requests, and the auth-silence timer meet in a single `select!` loop, so
//! every suspension point observes the stop request and nothing blocks
//! indefinitely.

use std::time::Duration;

use anyhow::Context;
use chat_shared::config::ClientConfig;
use chat_shared::fsm::State;
use chat_shared::stream::{self, LineBuffer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::session::Session;
use crate::{input, output, resolve_server, RunSummary};

/// Silence budget while authentication awaits its answer.
const REPLY_SILENCE: Duration = Duration::from_secs(1);

pub async fn run(
    cfg: &ClientConfig,
    mut input_rx: mpsc::Receiver<String>,
    mut stop: watch::Receiver<bool>,
) -> anyhow::Result<RunSummary> {
    let addr = resolve_server(cfg).await?;
    info!(server = %addr, "connecting");
    let stream = TcpStream::connect(addr).await.context("tcp connect")?;
    let (mut rd, mut wr) = stream.into_split();

    let mut session = Session::new_tcp();
    let mut lines = LineBuffer::new();
    let mut buf = vec![0u8; 2048];
    let mut input_open = true;
    let mut stop_seen = false;

    loop {
        while let Some(out) = session.take_sendable() {
            let frame = stream::encode(&out.msg);
            wr.write_all(frame.as_bytes()).await.context("tcp write")?;
            debug!(kind = %out.msg.kind(), "sent");
            session.note_sent(&out);
        }
        for effect in session.drain_effects() {
            output::apply(&effect);
        }
        if session.finished() {
            break;
        }

        tokio::select! {
            line = input_rx.recv(), if input_open => match line {
                Some(line) => input::dispatch(&mut session, &line),
                None => {
                    debug!("end of user input");
                    input_open = false;
                    session.request_shutdown();
                }
            },
            read = rd.read(&mut buf) => {
                let n = read.context("tcp read")?;
                if n == 0 {
                    // Unexpected disconnect: nothing more may be sent.
                    session.on_disconnect();
                    continue;
                }
                lines.extend(&buf[..n]);
                drain_lines(&mut session, &mut lines);
            }
            changed = stop.changed(), if !stop_seen => {
                stop_seen = true;
                // A dropped sender is not an interrupt.
                if changed.is_ok() {
                    debug!("interrupt requested");
                    session.request_shutdown();
                }
            }
            _ = tokio::time::sleep(REPLY_SILENCE),
                    if session.awaiting_reply() && session.state() == State::Auth => {
                session.reply_timeout();
            }
        }
    }

    let _ = wr.shutdown().await;
    Ok(RunSummary {
        clean: !session.failed(),
    })
}

/// Feeds every complete line to the session, keeping the partial tail.
fn drain_lines(session: &mut Session, lines: &mut LineBuffer) {
    loop {
        match lines.next_line() {
            Ok(Some(line)) => match stream::decode(&line) {
                Ok(msg) => session.on_message(msg),
                Err(e) => session.on_wire_error(&e),
            },
            Ok(None) => break,
            Err(e) => {
                session.on_wire_error(&e);
                break;
            }
        }
    }
}
