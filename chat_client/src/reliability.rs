//! Stop-and-wait reliability for the datagram binding.
//!
//! One message is in flight at a time. It keeps its identifier and its exact
//! wire bytes across retransmissions, so a confirmation delayed past a
//! timeout still matches. Inbound identifiers are remembered for the whole
//! session to suppress duplicate deliveries.
//!
//! This layer owns no socket; the runner transmits and feeds back
//! confirmations and timer expiry.

use std::collections::HashSet;
use std::time::Duration;

use bytes::Bytes;
use chat_shared::msg::Kind;
use tokio::time::Instant;

/// The unique outbound message awaiting its confirmation.
#[derive(Debug, Clone)]
pub struct InFlight {
    pub msg_id: u16,
    pub kind: Kind,
    /// Exact bytes of the original transmission; retransmissions repeat them.
    pub wire: Bytes,
    pub attempts_remaining: u8,
    pub deadline: Instant,
}

/// What to do when the confirmation timer fires.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeoutVerdict {
    /// Budget left: send these bytes again.
    Retransmit(Bytes),
    /// Budget exhausted: the record is gone.
    Exhausted { kind: Kind },
    /// Nothing was in flight (stale timer).
    Idle,
}

/// Outcome of an inbound CONFIRM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmVerdict {
    /// It matched the in-flight message, which is now settled.
    Acked { kind: Kind },
    /// It referenced something else; the in-flight record is untouched.
    Stray,
}

#[derive(Debug)]
pub struct StopAndWait {
    timeout: Duration,
    retries: u8,
    next_id: u16,
    in_flight: Option<InFlight>,
    delivered: HashSet<u16>,
}

impl StopAndWait {
    pub fn new(timeout: Duration, retries: u8) -> Self {
        Self {
            timeout,
            retries,
            next_id: 0,
            in_flight: None,
            delivered: HashSet::new(),
        }
    }

    /// Stamps the next outbound identifier.
    pub fn stamp(&mut self) -> u16 {
        let id = self.next_id;
        self.next_id = self.next_id.wrapping_add(1);
        id
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    pub fn in_flight(&self) -> Option<&InFlight> {
        self.in_flight.as_ref()
    }

    /// When the confirmation timer should next fire, if anything is in flight.
    pub fn deadline(&self) -> Option<Instant> {
        self.in_flight.as_ref().map(|f| f.deadline)
    }

    /// Records the first transmission of the queue head.
    pub fn track(&mut self, msg_id: u16, kind: Kind, wire: Bytes, now: Instant) {
        debug_assert!(self.in_flight.is_none(), "one message in flight at a time");
        self.in_flight = Some(InFlight {
            msg_id,
            kind,
            wire,
            attempts_remaining: self.retries,
            deadline: now + self.timeout,
        });
    }

    pub fn on_timeout(&mut self, now: Instant) -> TimeoutVerdict {
        let Some(mut f) = self.in_flight.take() else {
            return TimeoutVerdict::Idle;
        };
        if f.attempts_remaining > 1 {
            f.attempts_remaining -= 1;
            f.deadline = now + self.timeout;
            let wire = f.wire.clone();
            self.in_flight = Some(f);
            TimeoutVerdict::Retransmit(wire)
        } else {
            TimeoutVerdict::Exhausted { kind: f.kind }
        }
    }

    pub fn on_confirm(&mut self, ref_id: u16) -> ConfirmVerdict {
        match self.in_flight.take() {
            Some(f) if f.msg_id == ref_id => ConfirmVerdict::Acked { kind: f.kind },
            other => {
                self.in_flight = other;
                ConfirmVerdict::Stray
            }
        }
    }

    /// Returns true the first time an inbound identifier is seen, false for
    /// a duplicate. Identifiers never leave the set during a session.
    pub fn register_inbound(&mut self, msg_id: u16) -> bool {
        self.delivered.insert(msg_id)
    }
}
