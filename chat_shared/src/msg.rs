//! Message model.
//!
//! The protocol exchanges seven message kinds. Each variant carries exactly
//! the fields defined for its kind; field values are checked against the
//! protocol grammar both when the client builds a message and when a codec
//! decodes one.

use std::fmt;

use thiserror::Error;

/// Maximum length of a username, in bytes.
pub const USERNAME_MAX: usize = 20;
/// Maximum length of a channel identifier, in bytes.
pub const CHANNEL_ID_MAX: usize = 20;
/// Maximum length of a secret, in bytes.
pub const SECRET_MAX: usize = 128;
/// Maximum length of a display name, in bytes.
pub const DISPLAY_NAME_MAX: usize = 20;
/// Maximum length of message content, in bytes.
pub const CONTENT_MAX: usize = 1400;

/// Message kind tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Kind {
    Confirm,
    Reply,
    Auth,
    Join,
    Msg,
    Err,
    Bye,
}

impl Kind {
    pub fn as_str(self) -> &'static str {
        match self {
            Kind::Confirm => "CONFIRM",
            Kind::Reply => "REPLY",
            Kind::Auth => "AUTH",
            Kind::Join => "JOIN",
            Kind::Msg => "MSG",
            Kind::Err => "ERR",
            Kind::Bye => "BYE",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Acknowledges receipt of the message with identifier `ref_id`
    /// (datagram transport only).
    Confirm { ref_id: u16 },
    /// Server answer to an AUTH or JOIN request. The text encoding carries
    /// no reference identifier; FIFO binding supplies it there.
    Reply {
        result: bool,
        ref_id: u16,
        content: String,
    },
    Auth {
        username: String,
        display_name: String,
        secret: String,
    },
    Join {
        channel_id: String,
        display_name: String,
    },
    Msg {
        display_name: String,
        content: String,
    },
    Err {
        display_name: String,
        content: String,
    },
    Bye,
}

/// A field value outside the protocol grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidField {
    #[error("username must be 1-{USERNAME_MAX} characters of [A-Za-z0-9-]")]
    Username,
    #[error("channel id must be 1-{CHANNEL_ID_MAX} characters of [A-Za-z0-9-.]")]
    ChannelId,
    #[error("secret must be 1-{SECRET_MAX} characters of [A-Za-z0-9-]")]
    Secret,
    #[error("display name must be 1-{DISPLAY_NAME_MAX} printable characters without spaces")]
    DisplayName,
    #[error("message content must be 1-{CONTENT_MAX} printable characters")]
    Content,
}

/// A frame or datagram that does not parse as a message.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("unknown message verb {0:?}")]
    UnknownVerb(String),
    #[error("malformed {0} message")]
    Malformed(Kind),
    #[error("truncated datagram")]
    Truncated,
    #[error("unknown message type 0x{0:02x}")]
    UnknownType(u8),
    #[error("message is not valid text")]
    NotText,
    #[error("oversized frame without a terminator")]
    Oversized,
    #[error("{0}")]
    Field(#[from] InvalidField),
}

fn checked(value: &str, max: usize, allowed: impl Fn(u8) -> bool) -> bool {
    !value.is_empty() && value.len() <= max && value.bytes().all(allowed)
}

fn is_alnum_dash(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-'
}

pub fn validate_username(value: &str) -> Result<(), InvalidField> {
    checked(value, USERNAME_MAX, is_alnum_dash)
        .then_some(())
        .ok_or(InvalidField::Username)
}

pub fn validate_channel_id(value: &str) -> Result<(), InvalidField> {
    checked(value, CHANNEL_ID_MAX, |b| is_alnum_dash(b) || b == b'.')
        .then_some(())
        .ok_or(InvalidField::ChannelId)
}

pub fn validate_secret(value: &str) -> Result<(), InvalidField> {
    checked(value, SECRET_MAX, is_alnum_dash)
        .then_some(())
        .ok_or(InvalidField::Secret)
}

/// Printable ASCII without space (0x21-0x7E).
pub fn validate_display_name(value: &str) -> Result<(), InvalidField> {
    checked(value, DISPLAY_NAME_MAX, |b| (0x21..=0x7e).contains(&b))
        .then_some(())
        .ok_or(InvalidField::DisplayName)
}

/// Printable ASCII including space (0x20-0x7E).
pub fn validate_content(value: &str) -> Result<(), InvalidField> {
    checked(value, CONTENT_MAX, |b| (0x20..=0x7e).contains(&b))
        .then_some(())
        .ok_or(InvalidField::Content)
}

impl Message {
    pub fn kind(&self) -> Kind {
        match self {
            Message::Confirm { .. } => Kind::Confirm,
            Message::Reply { .. } => Kind::Reply,
            Message::Auth { .. } => Kind::Auth,
            Message::Join { .. } => Kind::Join,
            Message::Msg { .. } => Kind::Msg,
            Message::Err { .. } => Kind::Err,
            Message::Bye => Kind::Bye,
        }
    }

    /// Checks every field against the protocol grammar.
    pub fn validate(&self) -> Result<(), InvalidField> {
        match self {
            Message::Confirm { .. } | Message::Bye => Ok(()),
            Message::Reply { content, .. } => validate_content(content),
            Message::Auth {
                username,
                display_name,
                secret,
            } => {
                validate_username(username)?;
                validate_display_name(display_name)?;
                validate_secret(secret)
            }
            Message::Join {
                channel_id,
                display_name,
            } => {
                validate_channel_id(channel_id)?;
                validate_display_name(display_name)
            }
            Message::Msg {
                display_name,
                content,
            }
            | Message::Err {
                display_name,
                content,
            } => {
                validate_display_name(display_name)?;
                validate_content(content)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn username_boundaries() {
        assert!(validate_username("alice").is_ok());
        assert!(validate_username(&"a".repeat(USERNAME_MAX)).is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username(&"a".repeat(USERNAME_MAX + 1)).is_err());
        assert!(validate_username("al ice").is_err());
        assert!(validate_username("al.ice").is_err());
        assert!(validate_username("al-ice").is_ok());
    }

    #[test]
    fn channel_id_allows_dot() {
        assert!(validate_channel_id("general.cz").is_ok());
        assert!(validate_channel_id("general/cz").is_err());
    }

    #[test]
    fn display_name_rejects_space_and_controls() {
        assert!(validate_display_name("Al!ce_42").is_ok());
        assert!(validate_display_name("Al ice").is_err());
        assert!(validate_display_name("Al\tice").is_err());
        assert!(validate_display_name("Ali\u{10}ce").is_err());
    }

    #[test]
    fn content_allows_space_but_not_controls() {
        assert!(validate_content("hello there").is_ok());
        assert!(validate_content(&"x".repeat(CONTENT_MAX)).is_ok());
        assert!(validate_content(&"x".repeat(CONTENT_MAX + 1)).is_err());
        assert!(validate_content("line\nbreak").is_err());
        assert!(validate_content("").is_err());
    }

    #[test]
    fn non_ascii_is_rejected_everywhere() {
        assert!(validate_username("ali\u{e9}").is_err());
        assert!(validate_display_name("Ali\u{e9}").is_err());
        assert!(validate_content("caf\u{e9}").is_err());
    }

    #[test]
    fn message_validate_covers_all_fields() {
        let msg = Message::Auth {
            username: "alice".into(),
            display_name: "Al".into(),
            secret: "s3cret".into(),
        };
        assert!(msg.validate().is_ok());

        let msg = Message::Auth {
            username: "alice".into(),
            display_name: "A l".into(),
            secret: "s3cret".into(),
        };
        assert_eq!(msg.validate(), Err(InvalidField::DisplayName));

        assert!(Message::Bye.validate().is_ok());
        assert!(Message::Confirm { ref_id: 9 }.validate().is_ok());
    }
}
