//! Routing of ReadCommand replies to the calls that issued them.
//!
//! This module provides the CallRouter which tracks in-flight calls by bus
//! serial and hands each reply, together with the call's owner, to the
//! signal task.
//!
//! - Before sending a call, register it via `register(serial, owner)`
//! - The signal task calls `take(serial)` when the reply arrives
//! - The original caller may await the [`PendingReply`] without holding any Mutex

use std::collections::HashMap;
use std::sync::Mutex;

use tokio::sync::oneshot;

use super::protocol::{CallSerial, CommandId};
use crate::error::{CallError, LockResultExt};
use crate::observer::OwnerRef;

type ReplySender = oneshot::Sender<Result<CommandId, CallError>>;

/// A call put on the bus and not answered yet.
pub(crate) struct PendingCall {
    /// UI object to bind the command id to (None for ownerless reads)
    pub(crate) owner: Option<OwnerRef>,
    reply_tx: ReplySender,
}

impl PendingCall {
    /// Tell the caller's waiter how the call ended.
    ///
    /// The waiter is optional: a dropped [`PendingReply`] is the normal
    /// fire-and-forget case.
    pub(crate) fn complete(self, result: Result<CommandId, CallError>) {
        let _ = self.reply_tx.send(result);
    }
}

/// Handle on the eventual command id of one read request.
///
/// Dropping it does not cancel anything; correlation happens regardless.
#[derive(Debug)]
pub struct PendingReply {
    serial: Option<CallSerial>,
    rx: oneshot::Receiver<Result<CommandId, CallError>>,
}

impl PendingReply {
    /// A reply for a call that never made it past preparation.
    pub(crate) fn failed(error: CallError) -> Self {
        let (tx, rx) = oneshot::channel();
        let _ = tx.send(Err(error));
        Self { serial: None, rx }
    }

    /// Serial of the underlying ReadCommand call, if it got one.
    pub fn serial(&self) -> Option<CallSerial> {
        self.serial
    }

    /// Wait for the command id assigned by the service.
    ///
    /// By the time this resolves the id has already been bound to the
    /// request's owner.
    pub async fn command_id(self) -> Result<CommandId, CallError> {
        self.rx.await.unwrap_or(Err(CallError::Closed))
    }
}

/// Tracks in-flight ReadCommand calls by serial.
pub(crate) struct CallRouter {
    pending: Mutex<HashMap<CallSerial, PendingCall>>,
}

impl CallRouter {
    pub(crate) fn new() -> Self {
        Self {
            pending: Mutex::new(HashMap::new()),
        }
    }

    /// Register a call and return the handle its reply will complete.
    ///
    /// Must be called before the call is sent so the reply can be routed
    /// when it arrives.
    ///
    /// Returns `None` if a call with this serial is already pending.
    pub(crate) fn register(
        &self,
        serial: CallSerial,
        owner: Option<OwnerRef>,
    ) -> Option<PendingReply> {
        let (reply_tx, rx) = oneshot::channel();
        let mut pending = self.pending.lock().recover_poison("CallRouter::register");

        if pending.contains_key(&serial) {
            return None;
        }
        pending.insert(serial, PendingCall { owner, reply_tx });

        Some(PendingReply {
            serial: Some(serial),
            rx,
        })
    }

    /// Take the pending call answered by a reply with this serial.
    ///
    /// Returns `None` for replies to calls this router never saw.
    pub(crate) fn take(&self, serial: CallSerial) -> Option<PendingCall> {
        self.pending
            .lock()
            .recover_poison("CallRouter::take")
            .remove(&serial)
    }

    /// Remove a pending call that failed before reaching the bus.
    pub(crate) fn remove(&self, serial: CallSerial, error: CallError) -> bool {
        match self.take(serial) {
            Some(call) => {
                call.complete(Err(error));
                true
            }
            None => false,
        }
    }

    pub(crate) fn pending_count(&self) -> usize {
        self.pending
            .lock()
            .recover_poison("CallRouter::pending_count")
            .len()
    }

    /// Fail every pending call (the connection is going away).
    pub(crate) fn fail_all(&self, error: CallError) {
        let entries: Vec<_> = self
            .pending
            .lock()
            .recover_poison("CallRouter::fail_all")
            .drain()
            .collect();

        // Lock released before completing waiters
        for (_, call) in entries {
            call.complete(Err(error.clone()));
        }
    }
}
