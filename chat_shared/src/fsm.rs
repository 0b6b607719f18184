//! Session state machine.
//!
//! The same machine drives both transport bindings; only the moment a
//! transition fires differs (the datagram binding ties some transitions to
//! confirmations). States gate which message kinds may leave the client.

use std::fmt;

use crate::msg::Kind;

/// Lifecycle state of a client session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Connected, nothing sent yet.
    Start,
    /// AUTH issued, authentication not yet positively answered.
    Auth,
    /// Authenticated; chat traffic flows.
    Open,
    /// A protocol violation was detected; draining ERR and BYE.
    Error,
    /// Terminal. Absorbing: everything inbound is ignored.
    End,
}

impl State {
    /// Outbound legality. A second AUTH is allowed while still
    /// authenticating (the server may have answered the first negatively).
    pub fn allows_send(self, kind: Kind) -> bool {
        match kind {
            Kind::Auth => matches!(self, State::Start | State::Auth),
            Kind::Join | Kind::Msg => self == State::Open,
            Kind::Err => self == State::Error,
            Kind::Bye => self != State::End,
            // Acknowledgements bypass the queue entirely.
            Kind::Confirm => true,
            // Server-originated; the client never sends one.
            Kind::Reply => false,
        }
    }

    pub fn is_terminal(self) -> bool {
        self == State::End
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            State::Start => "start",
            State::Auth => "auth",
            State::Open => "open",
            State::Error => "error",
            State::End => "end",
        };
        f.write_str(name)
    }
}
