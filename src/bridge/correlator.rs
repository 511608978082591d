//! Correlation of service command ids with the UI objects that asked to read.
//!
//! The ReadCommand reply only says "accepted, here is my id"; completion and
//! cancellation arrive later as bus-wide signals naming nothing but that id.
//! The [`RequestCorrelator`] is what ties such a signal back to one UI object
//! among several concurrent requests.
//!
//! # Request lifecycle
//!
//! ```text
//! Issued --reply--> Bound(owner) --signal--> Resolved
//!   \--error reply--> Failed (dropped, never bound)
//! ```

use std::collections::HashMap;
use std::sync::{Mutex, Weak};

use log::{debug, warn};

use super::protocol::{CommandId, ReadReply, ReadingSignal};
use crate::error::{CallError, LockResultExt};
use crate::observer::{OwnerRef, ReadNotification};

/// What happened to a signal handed to [`RequestCorrelator::on_signal`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalOutcome {
    /// The owner was notified and the entry removed
    Delivered(ReadNotification),
    /// The entry existed but its owner was already destroyed
    OwnerGone,
    /// No entry for this id (never bound, or already resolved)
    Unknown,
}

/// Maps outstanding command ids to the owners that issued them.
///
/// Holds only [`Weak`] owner references; the UI toolkit alone decides when an
/// object dies. Ids come from the remote service, so a reused id overwrites
/// the previous binding.
pub struct RequestCorrelator {
    bound: Mutex<HashMap<CommandId, OwnerRef>>,
}

impl RequestCorrelator {
    pub fn new() -> Self {
        Self {
            bound: Mutex::new(HashMap::new()),
        }
    }

    /// Handle the reply to one ReadCommand call.
    ///
    /// An error reply is logged and dropped. A successful reply binds its
    /// command id to `owner`, unless there is no owner, in which case the
    /// reply is only acknowledged.
    ///
    /// Returns the command id so the caller's waiter can be told as well.
    pub fn on_reply_received(
        &self,
        owner: Option<OwnerRef>,
        outcome: Result<ReadReply, CallError>,
    ) -> Result<CommandId, CallError> {
        let reply = match outcome {
            Ok(reply) => reply,
            Err(err) => {
                warn!(
                    target: "yomiage::correlator",
                    "ReadCommand failed, dropping request: {}",
                    err
                );
                return Err(err);
            }
        };

        let id = reply.command_id;
        if !reply.accepted {
            debug!(
                target: "yomiage::correlator",
                "Service did not accept read {} (text: {:?})",
                id,
                reply.text
            );
        }

        let Some(owner) = owner else {
            debug!(
                target: "yomiage::correlator",
                "Read {} acknowledged without owner",
                id
            );
            return Ok(id);
        };

        let mut bound = self.bound.lock().recover_poison("RequestCorrelator::on_reply_received");
        if bound.insert(id, owner).is_some() {
            debug!(
                target: "yomiage::correlator",
                "Command id {} reused by service, replacing previous owner",
                id
            );
        }
        Ok(id)
    }

    /// Resolve a reading signal to its owner.
    ///
    /// A known id is removed and its owner, if still alive, receives the
    /// matching notification. Unknown ids are expected (late or duplicate
    /// signals) and are ignored.
    pub fn on_signal(&self, signal: ReadingSignal) -> SignalOutcome {
        let owner = self
            .bound
            .lock()
            .recover_poison("RequestCorrelator::on_signal")
            .remove(&signal.command_id);

        let Some(owner) = owner else {
            debug!(
                target: "yomiage::correlator",
                "{:?} for unknown command id {}, ignoring",
                signal.kind,
                signal.command_id
            );
            return SignalOutcome::Unknown;
        };

        // Lock is released: the owner may call back into the bridge.
        match owner.upgrade() {
            Some(owner) => {
                let notification = signal.kind.notification();
                owner.notify(notification);
                SignalOutcome::Delivered(notification)
            }
            None => {
                debug!(
                    target: "yomiage::correlator",
                    "Owner of command id {} is gone, dropping {:?}",
                    signal.command_id,
                    signal.kind
                );
                SignalOutcome::OwnerGone
            }
        }
    }

    /// Number of bound, unresolved requests.
    pub fn bound_count(&self) -> usize {
        self.bound
            .lock()
            .recover_poison("RequestCorrelator::bound_count")
            .len()
    }

    /// Whether `id` is currently bound to an owner.
    pub fn is_bound(&self, id: CommandId) -> bool {
        self.bound
            .lock()
            .recover_poison("RequestCorrelator::is_bound")
            .contains_key(&id)
    }

    /// Whether `id` is bound to exactly this owner.
    pub fn is_bound_to(&self, id: CommandId, owner: &OwnerRef) -> bool {
        self.bound
            .lock()
            .recover_poison("RequestCorrelator::is_bound_to")
            .get(&id)
            .is_some_and(|bound| Weak::ptr_eq(bound, owner))
    }

    /// Drop every binding (used at shutdown).
    pub fn clear(&self) {
        self.bound
            .lock()
            .recover_poison("RequestCorrelator::clear")
            .clear();
    }
}

impl Default for RequestCorrelator {
    fn default() -> Self {
        Self::new()
    }
}
