//! Text codec for the stream (TCP) binding.
//!
//! Each message is a single line terminated by CRLF. Command tokens are
//! matched case-insensitively on decode and emitted in canonical uppercase
//! on encode. Free-text trailing fields are the whitespace-joined remainder
//! of the line.
//!
//! [`LineBuffer`] handles the framing contract: a read may deliver zero, one
//! or several complete lines plus a partial tail, and the tail must survive
//! until the next read.

use crate::msg::{Message, WireError};

/// Upper bound on an accumulated line, terminator included. The longest
/// legal frame (`MSG FROM` + display name + ` IS ` + content + CRLF) stays
/// well below this.
pub const MAX_LINE: usize = 2048;

/// Encodes a message as a CRLF-terminated line.
pub fn encode(msg: &Message) -> String {
    match msg {
        Message::Auth {
            username,
            display_name,
            secret,
        } => format!("AUTH {username} AS {display_name} USING {secret}\r\n"),
        Message::Join {
            channel_id,
            display_name,
        } => format!("JOIN {channel_id} AS {display_name}\r\n"),
        Message::Msg {
            display_name,
            content,
        } => format!("MSG FROM {display_name} IS {content}\r\n"),
        Message::Err {
            display_name,
            content,
        } => format!("ERR FROM {display_name} IS {content}\r\n"),
        Message::Reply {
            result, content, ..
        } => {
            let verdict = if *result { "OK" } else { "NOK" };
            format!("REPLY {verdict} IS {content}\r\n")
        }
        Message::Bye => "BYE\r\n".to_string(),
        // The text binding has no acknowledgement frame; the reliable byte
        // stream plays that role.
        Message::Confirm { .. } => String::new(),
    }
}

fn keyword(word: &str, expected: &str) -> bool {
    word.eq_ignore_ascii_case(expected)
}

fn rest(words: &[&str], from: usize) -> String {
    words[from..].join(" ")
}

/// Decodes one line (without its CRLF terminator).
pub fn decode(line: &str) -> Result<Message, WireError> {
    let words: Vec<&str> = line.split_whitespace().collect();
    let verb = *words.first().ok_or_else(|| WireError::UnknownVerb(String::new()))?;

    let msg = if keyword(verb, "AUTH") {
        if words.len() != 6 || !keyword(words[2], "AS") || !keyword(words[4], "USING") {
            return Err(WireError::Malformed(crate::msg::Kind::Auth));
        }
        Message::Auth {
            username: words[1].to_string(),
            display_name: words[3].to_string(),
            secret: words[5].to_string(),
        }
    } else if keyword(verb, "JOIN") {
        if words.len() != 4 || !keyword(words[2], "AS") {
            return Err(WireError::Malformed(crate::msg::Kind::Join));
        }
        Message::Join {
            channel_id: words[1].to_string(),
            display_name: words[3].to_string(),
        }
    } else if keyword(verb, "MSG") || keyword(verb, "ERR") {
        if words.len() < 5 || !keyword(words[1], "FROM") || !keyword(words[3], "IS") {
            return Err(WireError::Malformed(if keyword(verb, "MSG") {
                crate::msg::Kind::Msg
            } else {
                crate::msg::Kind::Err
            }));
        }
        let display_name = words[2].to_string();
        let content = rest(&words, 4);
        if keyword(verb, "MSG") {
            Message::Msg {
                display_name,
                content,
            }
        } else {
            Message::Err {
                display_name,
                content,
            }
        }
    } else if keyword(verb, "REPLY") {
        if words.len() < 4 || !keyword(words[2], "IS") {
            return Err(WireError::Malformed(crate::msg::Kind::Reply));
        }
        let result = if keyword(words[1], "OK") {
            true
        } else if keyword(words[1], "NOK") {
            false
        } else {
            return Err(WireError::Malformed(crate::msg::Kind::Reply));
        };
        Message::Reply {
            result,
            ref_id: 0,
            content: rest(&words, 3),
        }
    } else if keyword(verb, "BYE") {
        if words.len() != 1 {
            return Err(WireError::Malformed(crate::msg::Kind::Bye));
        }
        Message::Bye
    } else {
        return Err(WireError::UnknownVerb(verb.to_string()));
    };

    msg.validate()?;
    Ok(msg)
}

/// Accumulates stream bytes and yields complete CRLF-terminated lines.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends freshly received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Takes the next complete line, terminator stripped.
    ///
    /// Returns `Ok(None)` when only a partial line is buffered. A buffer that
    /// outgrows [`MAX_LINE`] without a terminator is a protocol violation.
    pub fn next_line(&mut self) -> Result<Option<String>, WireError> {
        match self.buf.windows(2).position(|w| w == b"\r\n") {
            Some(at) => {
                let line = self.buf[..at].to_vec();
                self.buf.drain(..at + 2);
                let line = String::from_utf8(line).map_err(|_| WireError::NotText)?;
                Ok(Some(line))
            }
            None if self.buf.len() > MAX_LINE => Err(WireError::Oversized),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::msg::Kind;

    #[test]
    fn encodes_canonical_lines() {
        let auth = Message::Auth {
            username: "alice".into(),
            display_name: "Al".into(),
            secret: "s3cret".into(),
        };
        assert_eq!(encode(&auth), "AUTH alice AS Al USING s3cret\r\n");

        let join = Message::Join {
            channel_id: "general".into(),
            display_name: "Al".into(),
        };
        assert_eq!(encode(&join), "JOIN general AS Al\r\n");

        let msg = Message::Msg {
            display_name: "Al".into(),
            content: "hello there".into(),
        };
        assert_eq!(encode(&msg), "MSG FROM Al IS hello there\r\n");

        assert_eq!(encode(&Message::Bye), "BYE\r\n");
    }

    #[test]
    fn decodes_case_insensitive_verbs() {
        assert_eq!(
            decode("reply ok is Welcome").unwrap(),
            Message::Reply {
                result: true,
                ref_id: 0,
                content: "Welcome".into(),
            }
        );
        assert_eq!(
            decode("MSG from Bob IS hi").unwrap(),
            Message::Msg {
                display_name: "Bob".into(),
                content: "hi".into(),
            }
        );
    }

    #[test]
    fn reply_nok_decodes_as_failure() {
        assert_eq!(
            decode("REPLY NOK IS bad credentials").unwrap(),
            Message::Reply {
                result: false,
                ref_id: 0,
                content: "bad credentials".into(),
            }
        );
    }

    #[test]
    fn rejects_unknown_verbs_and_broken_prefixes() {
        assert!(matches!(decode("HELLO world"), Err(WireError::UnknownVerb(_))));
        assert!(matches!(decode(""), Err(WireError::UnknownVerb(_))));
        assert_eq!(
            decode("AUTH alice WITH Al USING x"),
            Err(WireError::Malformed(Kind::Auth))
        );
        assert_eq!(decode("MSG FROM Bob hi"), Err(WireError::Malformed(Kind::Msg)));
        assert_eq!(decode("REPLY MAYBE IS x"), Err(WireError::Malformed(Kind::Reply)));
        assert_eq!(decode("BYE now"), Err(WireError::Malformed(Kind::Bye)));
    }

    #[test]
    fn decoded_fields_are_validated() {
        // Display name with a prohibited character arrives on the wire.
        assert!(matches!(
            decode("MSG FROM B\u{1}b IS hi"),
            Err(WireError::Field(_))
        ));
        // Overlong username.
        let line = format!("AUTH {} AS Al USING x", "a".repeat(21));
        assert!(matches!(decode(&line), Err(WireError::Field(_))));
    }

    #[test]
    fn round_trips_canonical_messages() {
        let samples = [
            "AUTH alice AS Al USING s3cret\r\n",
            "JOIN general AS Al\r\n",
            "MSG FROM Al IS hi there\r\n",
            "ERR FROM srv IS boom\r\n",
            "REPLY OK IS Welcome\r\n",
            "REPLY NOK IS nope\r\n",
            "BYE\r\n",
        ];
        for line in samples {
            let msg = decode(line.trim_end_matches("\r\n")).unwrap();
            assert_eq!(encode(&msg), line);
        }
    }

    #[test]
    fn line_buffer_splits_coalesced_reads() {
        let mut lb = LineBuffer::new();
        lb.extend(b"REPLY OK IS Welcome\r\nMSG FROM Bob IS hi\r\nBY");
        assert_eq!(lb.next_line().unwrap().as_deref(), Some("REPLY OK IS Welcome"));
        assert_eq!(lb.next_line().unwrap().as_deref(), Some("MSG FROM Bob IS hi"));
        assert_eq!(lb.next_line().unwrap(), None);
        lb.extend(b"E\r\n");
        assert_eq!(lb.next_line().unwrap().as_deref(), Some("BYE"));
        assert_eq!(lb.next_line().unwrap(), None);
    }

    #[test]
    fn line_buffer_keeps_partial_tail_across_reads() {
        let mut lb = LineBuffer::new();
        lb.extend(b"MSG FROM Bob IS he");
        assert_eq!(lb.next_line().unwrap(), None);
        lb.extend(b"llo\r\n");
        assert_eq!(lb.next_line().unwrap().as_deref(), Some("MSG FROM Bob IS hello"));
    }

    #[test]
    fn line_buffer_rejects_unterminated_flood() {
        let mut lb = LineBuffer::new();
        lb.extend(&vec![b'x'; MAX_LINE + 1]);
        assert_eq!(lb.next_line(), Err(WireError::Oversized));
    }
}
