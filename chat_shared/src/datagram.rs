//! Binary codec for the datagram (UDP) binding.
//!
//! Layout: a one-byte type tag, a 16-bit message identifier in network byte
//! order, then the kind-specific payload. String fields carry no length
//! prefix and end with a single NUL byte. CONFIRM has no payload of its own;
//! its reference travels in the header identifier slot.
//!
//! Encoding is byte-for-byte deterministic; decoding rejects truncated
//! datagrams, missing terminators, trailing garbage, and any field outside
//! the grammar.

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::msg::{Kind, Message, WireError};

pub const TYPE_CONFIRM: u8 = 0x00;
pub const TYPE_REPLY: u8 = 0x01;
pub const TYPE_AUTH: u8 = 0x02;
pub const TYPE_JOIN: u8 = 0x03;
pub const TYPE_MSG: u8 = 0x04;
pub const TYPE_ERR: u8 = 0xFE;
pub const TYPE_BYE: u8 = 0xFF;

fn put_str(buf: &mut BytesMut, value: &str) {
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
}

/// Encodes a message into a datagram stamped with `msg_id`.
///
/// CONFIRM ignores `msg_id`: its header slot carries the reference instead.
pub fn encode(msg_id: u16, msg: &Message) -> Bytes {
    let mut buf = BytesMut::with_capacity(64);
    match msg {
        Message::Confirm { ref_id } => {
            buf.put_u8(TYPE_CONFIRM);
            buf.put_u16(*ref_id);
        }
        Message::Reply {
            result,
            ref_id,
            content,
        } => {
            buf.put_u8(TYPE_REPLY);
            buf.put_u16(msg_id);
            buf.put_u8(u8::from(*result));
            buf.put_u16(*ref_id);
            put_str(&mut buf, content);
        }
        Message::Auth {
            username,
            display_name,
            secret,
        } => {
            buf.put_u8(TYPE_AUTH);
            buf.put_u16(msg_id);
            put_str(&mut buf, username);
            put_str(&mut buf, display_name);
            put_str(&mut buf, secret);
        }
        Message::Join {
            channel_id,
            display_name,
        } => {
            buf.put_u8(TYPE_JOIN);
            buf.put_u16(msg_id);
            put_str(&mut buf, channel_id);
            put_str(&mut buf, display_name);
        }
        Message::Msg {
            display_name,
            content,
        } => {
            buf.put_u8(TYPE_MSG);
            buf.put_u16(msg_id);
            put_str(&mut buf, display_name);
            put_str(&mut buf, content);
        }
        Message::Err {
            display_name,
            content,
        } => {
            buf.put_u8(TYPE_ERR);
            buf.put_u16(msg_id);
            put_str(&mut buf, display_name);
            put_str(&mut buf, content);
        }
        Message::Bye => {
            buf.put_u8(TYPE_BYE);
            buf.put_u16(msg_id);
        }
    }
    buf.freeze()
}

/// Reads just the `(type, msg_id)` header, without touching the payload.
/// Acknowledgements are keyed on the header alone, so the receive path must
/// be able to read it even when the rest of the datagram does not decode.
/// Returns `None` for datagrams shorter than the header.
pub fn peek_header(payload: &[u8]) -> Option<(u8, u16)> {
    if payload.len() < 3 {
        return None;
    }
    Some((payload[0], u16::from_be_bytes([payload[1], payload[2]])))
}

fn take_str(rest: &mut &[u8], kind: Kind) -> Result<String, WireError> {
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or(WireError::Malformed(kind))?;
    let value = std::str::from_utf8(&rest[..nul])
        .map_err(|_| WireError::NotText)?
        .to_string();
    *rest = &rest[nul + 1..];
    Ok(value)
}

/// Decodes a datagram into `(msg_id, message)`.
pub fn decode(datagram: &[u8]) -> Result<(u16, Message), WireError> {
    if datagram.len() < 3 {
        return Err(WireError::Truncated);
    }
    let mut rest = datagram;
    let ty = rest.get_u8();
    let msg_id = rest.get_u16();

    let msg = match ty {
        TYPE_CONFIRM => Message::Confirm { ref_id: msg_id },
        TYPE_REPLY => {
            if rest.len() < 3 {
                return Err(WireError::Truncated);
            }
            let result = match rest.get_u8() {
                0 => false,
                1 => true,
                _ => return Err(WireError::Malformed(Kind::Reply)),
            };
            let ref_id = rest.get_u16();
            Message::Reply {
                result,
                ref_id,
                content: take_str(&mut rest, Kind::Reply)?,
            }
        }
        TYPE_AUTH => Message::Auth {
            username: take_str(&mut rest, Kind::Auth)?,
            display_name: take_str(&mut rest, Kind::Auth)?,
            secret: take_str(&mut rest, Kind::Auth)?,
        },
        TYPE_JOIN => Message::Join {
            channel_id: take_str(&mut rest, Kind::Join)?,
            display_name: take_str(&mut rest, Kind::Join)?,
        },
        TYPE_MSG => Message::Msg {
            display_name: take_str(&mut rest, Kind::Msg)?,
            content: take_str(&mut rest, Kind::Msg)?,
        },
        TYPE_ERR => Message::Err {
            display_name: take_str(&mut rest, Kind::Err)?,
            content: take_str(&mut rest, Kind::Err)?,
        },
        TYPE_BYE => Message::Bye,
        other => return Err(WireError::UnknownType(other)),
    };

    if !rest.is_empty() {
        return Err(WireError::Malformed(msg.kind()));
    }
    msg.validate()?;
    Ok((msg_id, msg))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_encodes_to_known_bytes() {
        let msg = Message::Auth {
            username: "al".into(),
            display_name: "Al".into(),
            secret: "pw".into(),
        };
        let wire = encode(0x0102, &msg);
        assert_eq!(
            wire.as_ref(),
            &[0x02, 0x01, 0x02, b'a', b'l', 0, b'A', b'l', 0, b'p', b'w', 0][..]
        );
    }

    #[test]
    fn confirm_reference_travels_in_the_header_slot() {
        let wire = encode(0xDEAD, &Message::Confirm { ref_id: 7 });
        assert_eq!(wire.as_ref(), &[0x00, 0x00, 0x07][..]);
        assert_eq!(decode(&wire).unwrap(), (7, Message::Confirm { ref_id: 7 }));
    }

    #[test]
    fn identifiers_use_network_byte_order() {
        let wire = encode(0xABCD, &Message::Bye);
        assert_eq!(wire.as_ref(), &[0xFF, 0xAB, 0xCD][..]);
        let (msg_id, msg) = decode(&wire).unwrap();
        assert_eq!(msg_id, 0xABCD);
        assert_eq!(msg, Message::Bye);
    }

    #[test]
    fn reply_round_trips() {
        let msg = Message::Reply {
            result: true,
            ref_id: 3,
            content: "Welcome".into(),
        };
        let wire = encode(12, &msg);
        assert_eq!(decode(&wire).unwrap(), (12, msg));
    }

    #[test]
    fn every_kind_round_trips() {
        let samples = [
            Message::Confirm { ref_id: 42 },
            Message::Reply {
                result: false,
                ref_id: 9,
                content: "denied".into(),
            },
            Message::Auth {
                username: "alice".into(),
                display_name: "Al".into(),
                secret: "s3cret".into(),
            },
            Message::Join {
                channel_id: "general.cz".into(),
                display_name: "Al".into(),
            },
            Message::Msg {
                display_name: "Bob".into(),
                content: "hello there".into(),
            },
            Message::Err {
                display_name: "srv".into(),
                content: "boom".into(),
            },
            Message::Bye,
        ];
        for msg in samples {
            let expected_id = if msg.kind() == Kind::Confirm { 42 } else { 5 };
            let wire = encode(5, &msg);
            let (got_id, got) = decode(&wire).unwrap();
            assert_eq!(got_id, expected_id);
            assert_eq!(got, msg);
            // Deterministic output.
            assert_eq!(wire, encode(5, &got));
        }
    }

    #[test]
    fn header_peek_ignores_payload_validity() {
        assert_eq!(peek_header(&[0x04, 0x01, 0x02]), Some((0x04, 0x0102)));
        // Broken payloads still expose their header.
        let no_terminator = &[0x04, 0x00, 0x09, b'B', b'o', b'b'];
        assert_eq!(peek_header(no_terminator), Some((0x04, 9)));
        assert!(decode(no_terminator).is_err());
        // Anything shorter than the header has none.
        assert_eq!(peek_header(&[]), None);
        assert_eq!(peek_header(&[0x04, 0x00]), None);
    }

    #[test]
    fn truncated_datagrams_are_rejected() {
        assert_eq!(decode(&[]), Err(WireError::Truncated));
        assert_eq!(decode(&[0x04, 0x00]), Err(WireError::Truncated));
        // REPLY needs result and reference past the header.
        assert_eq!(decode(&[0x01, 0x00, 0x01, 0x01, 0x00]), Err(WireError::Truncated));
    }

    #[test]
    fn missing_nul_terminator_is_malformed() {
        let wire = &[0x04, 0x00, 0x01, b'B', b'o', b'b', 0, b'h', b'i'];
        assert_eq!(decode(wire), Err(WireError::Malformed(Kind::Msg)));
    }

    #[test]
    fn trailing_bytes_are_malformed() {
        let mut wire = encode(1, &Message::Bye).to_vec();
        wire.push(0);
        assert_eq!(decode(&wire), Err(WireError::Malformed(Kind::Bye)));
    }

    #[test]
    fn unknown_type_and_bad_reply_result_are_rejected() {
        assert_eq!(decode(&[0x42, 0x00, 0x01]), Err(WireError::UnknownType(0x42)));
        assert_eq!(
            decode(&[0x01, 0x00, 0x01, 0x02, 0x00, 0x00, b'x', 0]),
            Err(WireError::Malformed(Kind::Reply))
        );
    }

    #[test]
    fn decoded_fields_are_validated() {
        // Display name containing a space.
        let wire = &[0x04, 0x00, 0x01, b'B', b' ', b'b', 0, b'h', b'i', 0];
        assert!(matches!(decode(wire), Err(WireError::Field(_))));
    }
}
