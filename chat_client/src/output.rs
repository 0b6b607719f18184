//! User-visible output.
//!
//! Four line shapes, one message per line: chat messages go to stdout,
//! everything else to stderr. Formatting is split from printing so the
//! shapes can be asserted on.

use std::io::Write;

use crate::session::Effect;

pub fn format_chat(from: &str, content: &str) -> String {
    format!("{from}: {content}")
}

pub fn format_reply(ok: bool, content: &str) -> String {
    if ok {
        format!("Success: {content}")
    } else {
        format!("Failure: {content}")
    }
}

pub fn format_peer_err(from: &str, content: &str) -> String {
    format!("ERR FROM {from}: {content}")
}

pub fn format_local_err(text: &str) -> String {
    format!("ERR: {text}")
}

pub fn chat(from: &str, content: &str) {
    println!("{}", format_chat(from, content));
    let _ = std::io::stdout().flush();
}

pub fn reply(ok: bool, content: &str) {
    eprintln!("{}", format_reply(ok, content));
}

pub fn peer_err(from: &str, content: &str) {
    eprintln!("{}", format_peer_err(from, content));
}

pub fn local_err(text: &str) {
    eprintln!("{}", format_local_err(text));
}

/// Renders one session effect.
pub fn apply(effect: &Effect) {
    match effect {
        Effect::Chat { from, content } => chat(from, content),
        Effect::Reply { ok, content } => reply(*ok, content),
        Effect::PeerError { from, content } => peer_err(from, content),
        Effect::LocalError(text) => local_err(text),
    }
}

pub fn print_command_help() {
    println!("Commands:");
    println!("  /auth <username> <secret> <display-name>   authenticate to the server");
    println!("  /join <channel>                            join a channel");
    println!("  /rename <display-name>                     change the local display name");
    println!("  /help                                      show this help");
    println!("Any other input is sent as a chat message.");
}

pub fn print_usage() {
    println!("Chat client for the IPK24-CHAT protocol.");
    println!();
    println!("Usage: chat-client -t <tcp|udp> -s <host> [-p <port>] [-d <ms>] [-r <count>]");
    println!("  -t   transport binding, tcp or udp");
    println!("  -s   server hostname or address");
    println!("  -p   server port (default 4567)");
    println!("  -d   confirmation timeout in milliseconds, UDP only (default 250)");
    println!("  -r   maximum transmissions per message, UDP only (default 3)");
    println!("  -h   print this help and exit");
}
