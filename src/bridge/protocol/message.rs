//! ReadCommand replies and reading signals.

use super::{CallSerial, CommandId};
use crate::error::CallError;
use crate::observer::ReadNotification;

/// Method requesting speech: `ReadCommand(text: s, interruptible: b) -> (s, b, i)`.
pub const READ_COMMAND: &str = "ReadCommand";

/// Signal emitted when an utterance finished: `ReadingStopped(command_id: i)`.
pub const READING_STOPPED: &str = "ReadingStopped";

/// Signal emitted when an utterance was cut short: `ReadingCancelled(command_id: i)`.
pub const READING_CANCELLED: &str = "ReadingCancelled";

/// Successful ReadCommand reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadReply {
    /// Text echoed back by the service
    pub text: String,
    /// Whether the service queued the request
    pub accepted: bool,
    /// Id the service will use in later signals for this utterance
    pub command_id: CommandId,
}

impl From<(String, bool, i32)> for ReadReply {
    fn from((text, accepted, command_id): (String, bool, i32)) -> Self {
        Self {
            text,
            accepted,
            command_id: CommandId::new(command_id),
        }
    }
}

/// Which of the two reading signals arrived.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignalKind {
    Stopped,
    Cancelled,
}

impl SignalKind {
    /// All signal kinds, in subscription order.
    pub const ALL: [SignalKind; 2] = [SignalKind::Stopped, SignalKind::Cancelled];

    /// Bus member name of the signal.
    pub fn member(self) -> &'static str {
        match self {
            SignalKind::Stopped => READING_STOPPED,
            SignalKind::Cancelled => READING_CANCELLED,
        }
    }

    /// Map a bus member name back to a signal kind.
    pub fn from_member(member: &str) -> Option<Self> {
        match member {
            READING_STOPPED => Some(SignalKind::Stopped),
            READING_CANCELLED => Some(SignalKind::Cancelled),
            _ => None,
        }
    }

    /// Notification delivered to the owner when this signal resolves a request.
    pub fn notification(self) -> ReadNotification {
        match self {
            SignalKind::Stopped => ReadNotification::ReadStopped,
            SignalKind::Cancelled => ReadNotification::ReadCancelled,
        }
    }
}

/// A ReadingStopped or ReadingCancelled signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadingSignal {
    pub kind: SignalKind,
    pub command_id: CommandId,
}

impl ReadingSignal {
    pub fn new(kind: SignalKind, command_id: CommandId) -> Self {
        Self { kind, command_id }
    }

    pub fn stopped(command_id: i32) -> Self {
        Self::new(SignalKind::Stopped, CommandId::new(command_id))
    }

    pub fn cancelled(command_id: i32) -> Self {
        Self::new(SignalKind::Cancelled, CommandId::new(command_id))
    }
}

/// One message taken from the connection inbox, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Incoming {
    /// Reply (or error reply) to the call with the given serial
    Reply {
        serial: CallSerial,
        outcome: Result<ReadReply, CallError>,
    },
    /// Reading signal from the reader interface
    Signal(ReadingSignal),
}
