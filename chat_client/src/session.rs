//! Session core.
//!
//! All session state lives here: the FSM state, the display name, the send
//! queue with its awaiting-REPLY gate, and (datagram binding only) the
//! stop-and-wait reliability state. The transport runners do I/O and route
//! every event through this type; processing an event yields [`Effect`]s
//! for the runner to render.
//!
//! Keeping the transitions in one owned value is what breaks the cyclic
//! coupling between the receive path, the scheduler, and session teardown.

use bytes::Bytes;
use chat_shared::fsm::State;
use chat_shared::msg::{self, Kind, Message, WireError};
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::queue::{Outbound, SendQueue};
use crate::reliability::{ConfirmVerdict, StopAndWait, TimeoutVerdict};

/// A user-visible consequence of processing an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// `<display>: <content>` on stdout.
    Chat { from: String, content: String },
    /// `Success:` / `Failure:` rendering of a REPLY, on stderr.
    Reply { ok: bool, content: String },
    /// `ERR FROM <display>: <content>` on stderr.
    PeerError { from: String, content: String },
    /// `ERR: <text>` on stderr.
    LocalError(String),
}

pub struct Session {
    state: State,
    display_name: String,
    queue: SendQueue,
    /// Identifier of the AUTH or JOIN whose REPLY is outstanding. Zero for
    /// the stream binding, where replies bind FIFO instead.
    awaiting: Option<u16>,
    /// Present for the datagram binding only.
    reliability: Option<StopAndWait>,
    effects: Vec<Effect>,
    failed: bool,
}

impl Session {
    pub fn new_tcp() -> Self {
        Self::new(None)
    }

    pub fn new_udp(timeout: std::time::Duration, retries: u8) -> Self {
        Self::new(Some(StopAndWait::new(timeout, retries)))
    }

    fn new(reliability: Option<StopAndWait>) -> Self {
        Self {
            state: State::Start,
            display_name: String::new(),
            queue: SendQueue::new(),
            awaiting: None,
            reliability,
            effects: Vec::new(),
            failed: false,
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// True once the session has reached its terminal state.
    pub fn finished(&self) -> bool {
        self.state.is_terminal()
    }

    /// True when the session ended after a violation or transport failure.
    pub fn failed(&self) -> bool {
        self.failed
    }

    pub fn awaiting_reply(&self) -> bool {
        self.awaiting.is_some()
    }

    /// Hands the accumulated effects to the runner.
    pub fn drain_effects(&mut self) -> Vec<Effect> {
        std::mem::take(&mut self.effects)
    }

    fn is_udp(&self) -> bool {
        self.reliability.is_some()
    }

    fn local_err(&mut self, text: impl Into<String>) {
        self.effects.push(Effect::LocalError(text.into()));
    }

    fn stamped(&mut self, msg: Message) -> Outbound {
        let msg_id = self.reliability.as_mut().map_or(0, StopAndWait::stamp);
        Outbound { msg_id, msg }
    }

    fn enqueue(&mut self, msg: Message) {
        let out = self.stamped(msg);
        if !self.queue.push(out) {
            self.local_err("client is shutting down");
        }
    }

    // ---- user operations -------------------------------------------------

    pub fn user_auth(&mut self, username: &str, secret: &str, display_name: &str) {
        if !self.state.allows_send(Kind::Auth) {
            self.local_err(format!("cannot send AUTH in the {} state", self.state));
            return;
        }
        let fields = msg::validate_username(username)
            .and_then(|()| msg::validate_secret(secret))
            .and_then(|()| msg::validate_display_name(display_name));
        if let Err(e) = fields {
            self.local_err(e.to_string());
            return;
        }
        self.display_name = display_name.to_string();
        self.state = State::Auth;
        self.enqueue(Message::Auth {
            username: username.to_string(),
            display_name: display_name.to_string(),
            secret: secret.to_string(),
        });
    }

    pub fn user_join(&mut self, channel_id: &str) {
        if !self.state.allows_send(Kind::Join) {
            self.local_err(format!("cannot send JOIN in the {} state", self.state));
            return;
        }
        if let Err(e) = msg::validate_channel_id(channel_id) {
            self.local_err(e.to_string());
            return;
        }
        self.enqueue(Message::Join {
            channel_id: channel_id.to_string(),
            display_name: self.display_name.clone(),
        });
    }

    pub fn user_msg(&mut self, content: &str) {
        if !self.state.allows_send(Kind::Msg) {
            self.local_err(format!("cannot send MSG in the {} state", self.state));
            return;
        }
        if let Err(e) = msg::validate_content(content) {
            self.local_err(e.to_string());
            return;
        }
        self.enqueue(Message::Msg {
            display_name: self.display_name.clone(),
            content: content.to_string(),
        });
    }

    /// Local only; nothing reaches the wire.
    pub fn user_rename(&mut self, display_name: &str) {
        match msg::validate_display_name(display_name) {
            Ok(()) => self.display_name = display_name.to_string(),
            Err(e) => self.local_err(e.to_string()),
        }
    }

    // ---- lifecycle -------------------------------------------------------

    /// Graceful teardown for EOF, interrupt, and peer-reported errors:
    /// pending work is dropped and a BYE goes out first. Idempotent.
    pub fn request_shutdown(&mut self) {
        if self.state.is_terminal() || self.queue.is_closed() {
            return;
        }
        self.awaiting = None;
        let bye = self.stamped(Message::Bye);
        self.queue.priority_clear(vec![bye]);
    }

    /// The peer broke the protocol: tell it why, say BYE, and mark the
    /// session failed.
    fn protocol_error(&mut self, diagnostic: &str) {
        self.failed = true;
        if self.state.is_terminal() || self.queue.is_closed() {
            return;
        }
        // Keep the outbound diagnostic inside the content grammar.
        let mut diagnostic: String = diagnostic
            .chars()
            .filter(|c| (' '..='~').contains(c))
            .take(120)
            .collect();
        if diagnostic.is_empty() {
            diagnostic = "malformed message".to_string();
        }
        let diagnostic = diagnostic.as_str();
        self.local_err(diagnostic);
        self.state = State::Error;
        self.awaiting = None;
        let err = self.stamped(Message::Err {
            display_name: self.display_name.clone(),
            content: diagnostic.to_string(),
        });
        let bye = self.stamped(Message::Bye);
        self.queue.priority_clear(vec![err, bye]);
    }

    /// The stream ended under us (EOF from the server).
    pub fn on_disconnect(&mut self) {
        if self.state.is_terminal() {
            return;
        }
        self.failed = true;
        self.state = State::End;
        self.local_err("connection closed by the server");
    }

    // ---- inbound ---------------------------------------------------------

    pub fn on_message(&mut self, message: Message) {
        match self.state {
            State::Start => {
                debug!(kind = %message.kind(), "ignoring inbound message before first send");
            }
            State::Auth => match message {
                Message::Reply {
                    result,
                    ref_id,
                    content,
                } => self.on_reply(result, ref_id, content),
                Message::Err {
                    display_name,
                    content,
                } => {
                    self.effects.push(Effect::PeerError {
                        from: display_name,
                        content,
                    });
                    self.request_shutdown();
                }
                other => self.protocol_error(&format!(
                    "unexpected {} during authentication",
                    other.kind()
                )),
            },
            State::Open => match message {
                Message::Msg {
                    display_name,
                    content,
                } => self.effects.push(Effect::Chat {
                    from: display_name,
                    content,
                }),
                Message::Reply {
                    result,
                    ref_id,
                    content,
                } => self.on_reply(result, ref_id, content),
                Message::Err {
                    display_name,
                    content,
                } => {
                    self.effects.push(Effect::PeerError {
                        from: display_name,
                        content,
                    });
                    self.request_shutdown();
                }
                Message::Bye => {
                    debug!("peer closed the session");
                    self.state = State::End;
                }
                other => {
                    self.protocol_error(&format!("unexpected {} in open session", other.kind()))
                }
            },
            State::Error | State::End => {
                debug!(kind = %message.kind(), state = %self.state, "dropping inbound message");
            }
        }
    }

    fn on_reply(&mut self, result: bool, ref_id: u16, content: String) {
        let Some(pending) = self.awaiting else {
            self.protocol_error("reply without a pending request");
            return;
        };
        if self.is_udp() && pending != ref_id {
            self.protocol_error("reply references an unknown message");
            return;
        }
        self.awaiting = None;
        self.effects.push(Effect::Reply {
            ok: result,
            content,
        });
        // A negative answer to AUTH keeps the session in the auth phase so
        // the user may try other credentials.
        if self.state == State::Auth && result {
            self.state = State::Open;
        }
    }

    /// A frame or datagram that did not parse.
    pub fn on_wire_error(&mut self, err: &WireError) {
        match self.state {
            State::Start | State::Error | State::End => {
                debug!(error = %err, state = %self.state, "dropping undecodable input");
            }
            State::Auth | State::Open => self.protocol_error(&err.to_string()),
        }
    }

    // ---- scheduling ------------------------------------------------------

    /// Pops the next message that may be sent right now, enforcing the
    /// awaiting-REPLY gate, the single in-flight datagram, and the per-state
    /// legality of the head. Illegal heads are discarded with a local error.
    pub fn take_sendable(&mut self) -> Option<Outbound> {
        if self.state.is_terminal() || self.awaiting.is_some() {
            return None;
        }
        if let Some(r) = &self.reliability {
            if !r.is_idle() {
                return None;
            }
        }
        loop {
            let kind = self.queue.head()?.msg.kind();
            if self.state.allows_send(kind) {
                let out = self.queue.pop()?;
                if matches!(kind, Kind::Auth | Kind::Join) {
                    self.awaiting = Some(out.msg_id);
                }
                return Some(out);
            }
            warn!(kind = %kind, state = %self.state, "discarding queued message");
            self.queue.pop();
            self.local_err(format!("cannot send {} in the {} state", kind, self.state));
        }
    }

    /// Stream binding: the write for `out` has completed.
    pub fn note_sent(&mut self, out: &Outbound) {
        if out.msg.kind() == Kind::Bye {
            self.state = State::End;
        }
    }

    /// Stream binding: silence while authentication awaits its answer.
    pub fn reply_timeout(&mut self) {
        if self.state == State::Auth && self.awaiting.is_some() {
            self.protocol_error("no reply from the server");
        }
    }

    // ---- datagram reliability -------------------------------------------

    /// Next confirmation deadline, if a datagram is in flight.
    pub fn udp_deadline(&self) -> Option<Instant> {
        self.reliability.as_ref().and_then(StopAndWait::deadline)
    }

    /// Records the first transmission of `out`.
    pub fn track_transmission(&mut self, out: &Outbound, wire: Bytes, now: Instant) {
        if let Some(r) = &mut self.reliability {
            r.track(out.msg_id, out.msg.kind(), wire, now);
        }
    }

    /// Feeds an inbound CONFIRM to the reliability layer.
    pub fn on_confirm(&mut self, ref_id: u16) {
        let Some(r) = &mut self.reliability else {
            return;
        };
        match r.on_confirm(ref_id) {
            ConfirmVerdict::Acked { kind } => {
                debug!(ref_id, kind = %kind, "message confirmed");
                if kind == Kind::Bye {
                    self.state = State::End;
                }
            }
            ConfirmVerdict::Stray => {
                warn!(ref_id, "confirm does not match the message in flight");
            }
        }
    }

    /// The confirmation timer fired. Returns bytes to retransmit, or `None`
    /// when the budget is exhausted (the session then winds down on its
    /// own: a lost BYE terminates, anything else triggers a priority BYE).
    pub fn on_retransmit_timeout(&mut self, now: Instant) -> Option<Bytes> {
        let verdict = self.reliability.as_mut()?.on_timeout(now);
        match verdict {
            TimeoutVerdict::Retransmit(wire) => {
                debug!("retransmitting unconfirmed message");
                Some(wire)
            }
            TimeoutVerdict::Exhausted { kind } => {
                warn!(kind = %kind, "retransmission budget exhausted");
                if kind == Kind::Bye {
                    self.state = State::End;
                } else {
                    self.local_err("no response from the server");
                    self.awaiting = None;
                    self.request_shutdown();
                }
                None
            }
            TimeoutVerdict::Idle => None,
        }
    }

    /// Dedup filter: true when `msg_id` has not been delivered before.
    pub fn register_inbound(&mut self, msg_id: u16) -> bool {
        self.reliability
            .as_mut()
            .map_or(true, |r| r.register_inbound(msg_id))
    }
}
