//! Line-oriented user input.
//!
//! Lines starting with `/` are commands; anything else is chat content.
//! Parsing is pure; [`dispatch`] applies a parsed line to the session.

use crate::output;
use crate::session::Session;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Auth {
        username: String,
        secret: String,
        display_name: String,
    },
    Join {
        channel_id: String,
    },
    Rename {
        display_name: String,
    },
    Help,
    Say(String),
}

/// Parses one input line. `Ok(None)` means there is nothing to do (an empty
/// line); `Err` carries a message for the user.
pub fn parse(line: &str) -> Result<Option<Command>, String> {
    let trimmed = line.trim_end_matches(&['\r', '\n'][..]);
    if trimmed.trim().is_empty() {
        return Ok(None);
    }
    if !trimmed.starts_with('/') {
        return Ok(Some(Command::Say(trimmed.to_string())));
    }

    let words: Vec<&str> = trimmed.split(' ').filter(|w| !w.is_empty()).collect();
    match (words[0], words.len()) {
        ("/auth", 4) => Ok(Some(Command::Auth {
            username: words[1].to_string(),
            secret: words[2].to_string(),
            display_name: words[3].to_string(),
        })),
        ("/join", 2) => Ok(Some(Command::Join {
            channel_id: words[1].to_string(),
        })),
        ("/rename", 2) => Ok(Some(Command::Rename {
            display_name: words[1].to_string(),
        })),
        ("/help", 1) => Ok(Some(Command::Help)),
        _ => Err(format!(
            "unknown command or wrong number of arguments: {}",
            words[0]
        )),
    }
}

/// Applies one raw input line to the session.
pub fn dispatch(session: &mut Session, line: &str) {
    match parse(line) {
        Ok(None) => {}
        Ok(Some(Command::Auth {
            username,
            secret,
            display_name,
        })) => session.user_auth(&username, &secret, &display_name),
        Ok(Some(Command::Join { channel_id })) => session.user_join(&channel_id),
        Ok(Some(Command::Rename { display_name })) => session.user_rename(&display_name),
        Ok(Some(Command::Help)) => output::print_command_help(),
        Ok(Some(Command::Say(content))) => session.user_msg(&content),
        Err(e) => output::local_err(&e),
    }
}
