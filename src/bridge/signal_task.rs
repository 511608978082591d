//! Background task consuming the accessibility-bus inbox.
//!
//! The task is the only reader of the connection, and it handles one message
//! at a time:
//! - a ReadCommand reply binds its command id (through the
//!   [`RequestCorrelator`]) and then wakes the caller's [`PendingReply`]
//! - a reading signal is resolved to its owner
//!
//! Because the inbox preserves arrival order, a reply is always bound before
//! any signal carrying the same id is looked up.
//!
//! [`PendingReply`]: super::router::PendingReply

use std::sync::Arc;

use log::{debug, warn};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::correlator::{RequestCorrelator, SignalOutcome};
use super::protocol::Incoming;
use super::router::CallRouter;
use super::transport::Inbox;
use crate::error::CallError;

/// Handle to a running signal task.
///
/// Dropping the handle cancels the task; [`stop`](Self::stop) also waits for
/// it to finish.
pub(crate) struct SignalTaskHandle {
    cancel_token: CancellationToken,
    join_handle: Option<JoinHandle<()>>,
}

impl SignalTaskHandle {
    /// Cancel the task and wait until it has exited.
    pub(crate) async fn stop(mut self) {
        self.cancel_token.cancel();
        let Some(join_handle) = self.join_handle.take() else {
            return;
        };
        if let Err(err) = join_handle.await {
            warn!(
                target: "yomiage::signal",
                "Signal task ended abnormally: {}",
                err
            );
        }
    }
}

impl Drop for SignalTaskHandle {
    fn drop(&mut self) {
        self.cancel_token.cancel();
    }
}

/// Spawn the task that drains `inbox` into the router and the correlator.
pub(crate) fn spawn_signal_task<I: Inbox>(
    runtime: &Handle,
    inbox: I,
    router: Arc<CallRouter>,
    correlator: Arc<RequestCorrelator>,
) -> SignalTaskHandle {
    let cancel_token = CancellationToken::new();
    let join_handle = runtime.spawn(signal_loop(
        inbox,
        router,
        correlator,
        cancel_token.clone(),
    ));

    SignalTaskHandle {
        cancel_token,
        join_handle: Some(join_handle),
    }
}

async fn signal_loop<I: Inbox>(
    mut inbox: I,
    router: Arc<CallRouter>,
    correlator: Arc<RequestCorrelator>,
    cancel_token: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;

            _ = cancel_token.cancelled() => {
                debug!(
                    target: "yomiage::signal",
                    "Signal task cancelled, shutting down"
                );
                break;
            }

            incoming = inbox.next() => {
                let Some(incoming) = incoming else {
                    warn!(
                        target: "yomiage::signal",
                        "Accessibility bus connection closed, failing pending reads"
                    );
                    router.fail_all(CallError::Closed);
                    break;
                };
                handle_message(incoming, &router, &correlator);
            }
        }
    }
}

/// Apply one inbox message.
fn handle_message(incoming: Incoming, router: &CallRouter, correlator: &RequestCorrelator) {
    match incoming {
        Incoming::Reply { serial, outcome } => {
            let Some(call) = router.take(serial) else {
                debug!(
                    target: "yomiage::signal",
                    "Reply {} for unknown call, dropping",
                    serial
                );
                return;
            };
            let result = correlator.on_reply_received(call.owner.clone(), outcome);
            call.complete(result);
        }
        Incoming::Signal(signal) => {
            if let SignalOutcome::Delivered(notification) = correlator.on_signal(signal) {
                debug!(
                    target: "yomiage::signal",
                    "Delivered {} for command id {}",
                    notification,
                    signal.command_id
                );
            }
        }
    }
}
