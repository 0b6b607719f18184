//! Standalone client binary.
//!
//! Usage:
//!   chat-client -t <tcp|udp> -s <host> [-p <port>] [-d <ms>] [-r <count>]
//!
//! The client connects, authenticates with `/auth`, and relays chat lines
//! until EOF, interrupt, or the server ends the session.
//!
//! Commands:
//!   /auth <username> <secret> <display-name>
//!   /join <channel>
//!   /rename <display-name>    local only
//!   /help

use std::io::BufRead;
use std::process::ExitCode;

use chat_client::{output, tcp, udp, RunSummary};
use chat_shared::config::{ClientConfig, TransportKind};
use tokio::sync::{mpsc, watch};
use tracing::info;

enum CliAction {
    Run(ClientConfig),
    Help,
}

fn flag_value<'a>(args: &'a [String], at: usize, flag: &str) -> Result<&'a str, String> {
    args.get(at + 1)
        .map(String::as_str)
        .ok_or_else(|| format!("missing value for {flag}"))
}

fn parse_args(args: &[String]) -> Result<CliAction, String> {
    let mut transport = None;
    let mut host = None;
    let mut port = None;
    let mut timeout_ms = None;
    let mut retries = None;

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "-h" => return Ok(CliAction::Help),
            "-t" => {
                transport = Some(flag_value(args, i, "-t")?.parse::<TransportKind>()?);
                i += 2;
            }
            "-s" => {
                host = Some(flag_value(args, i, "-s")?.to_string());
                i += 2;
            }
            "-p" => {
                let value = flag_value(args, i, "-p")?;
                port = Some(
                    value
                        .parse::<u16>()
                        .map_err(|_| format!("invalid port {value:?}"))?,
                );
                i += 2;
            }
            "-d" => {
                let value = flag_value(args, i, "-d")?;
                timeout_ms = Some(
                    value
                        .parse::<u64>()
                        .map_err(|_| format!("invalid timeout {value:?}"))?,
                );
                i += 2;
            }
            "-r" => {
                let value = flag_value(args, i, "-r")?;
                retries = Some(
                    value
                        .parse::<u8>()
                        .map_err(|_| format!("invalid retry count {value:?}"))?,
                );
                i += 2;
            }
            other => return Err(format!("unknown flag {other:?}")),
        }
    }

    let transport = transport.ok_or_else(|| "missing required flag -t".to_string())?;
    let host = host.ok_or_else(|| "missing required flag -s".to_string())?;

    let mut cfg = ClientConfig::new(transport, host);
    if let Some(port) = port {
        cfg.port = port;
    }
    if let Some(timeout_ms) = timeout_ms {
        cfg.confirm_timeout_ms = timeout_ms;
    }
    if let Some(retries) = retries {
        cfg.max_retries = retries;
    }
    Ok(CliAction::Run(cfg))
}

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let cfg = match parse_args(&args) {
        Ok(CliAction::Help) => {
            output::print_usage();
            return ExitCode::SUCCESS;
        }
        Ok(CliAction::Run(cfg)) => cfg,
        Err(e) => {
            output::local_err(&e);
            return ExitCode::FAILURE;
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .init();

    info!(transport = %cfg.transport, server = %cfg.server_host, port = cfg.port, "starting client");

    // Stdin is read on a plain thread; dropping the sender reports EOF.
    let (input_tx, input_rx) = mpsc::channel::<String>(32);
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        let mut lines = stdin.lock();
        loop {
            let mut line = String::new();
            match lines.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {
                    if input_tx.blocking_send(line).is_err() {
                        break;
                    }
                }
            }
        }
    });

    let (stop_tx, stop_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = stop_tx.send(true);
        }
    });

    let result = match cfg.transport {
        TransportKind::Tcp => tcp::run(&cfg, input_rx, stop_rx).await,
        TransportKind::Udp => udp::run(&cfg, input_rx, stop_rx).await,
    };

    match result {
        Ok(RunSummary { clean: true }) => ExitCode::SUCCESS,
        Ok(RunSummary { clean: false }) => ExitCode::FAILURE,
        Err(e) => {
            output::local_err(&format!("{e:#}"));
            ExitCode::FAILURE
        }
    }
}
