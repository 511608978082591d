//! Typed access to the remote screen-reader object.
//!
//! The proxy owns the accessibility-bus connection and the resolved reader
//! object. Its call primitives never wait for the service: they register the
//! call with the [`CallRouter`], queue it for the proxy's writer task and
//! return. The writer is the only task that sends, so calls reach the bus in
//! the order they were made and a read can only be interrupted by a later one.

use std::sync::Arc;

use log::{debug, warn};
use tokio::sync::mpsc;

use super::protocol::{CallSerial, SignalKind};
use super::router::{CallRouter, PendingReply};
use super::transport::{BusConnection, RemoteObject, Transport};
use crate::config::Endpoint;
use crate::error::{BindError, CallError};
use crate::observer::Owner;

pub(crate) type ObjectOf<T> = <<T as Transport>::Connection as BusConnection>::Object;
pub(crate) type InboxOf<T> = <<T as Transport>::Connection as BusConnection>::Inbox;
type CallOf<T> = <ObjectOf<T> as RemoteObject>::Call;

/// Live binding to the reader object.
pub struct ServiceProxy<T: Transport> {
    // Kept for its lifetime: dropping it closes the bus connection.
    _connection: T::Connection,
    object: Arc<ObjectOf<T>>,
    router: Arc<CallRouter>,
    // Dropping the sender ends the writer task once the queue is drained.
    outbound: mpsc::UnboundedSender<(CallSerial, CallOf<T>)>,
}

impl<T: Transport> ServiceProxy<T> {
    /// Dial `address` and resolve the reader object on it.
    ///
    /// Returns the proxy together with the connection's inbox, which the
    /// caller hands to the signal task.
    ///
    /// # Errors
    /// * `ConnectFailed` - the address could not be dialed
    /// * `ObjectUnavailable` - the reader object could not be resolved; the
    ///   connection opened for it is released before returning
    pub(crate) async fn bind(
        transport: &T,
        address: &str,
        reader: &Endpoint,
        router: Arc<CallRouter>,
    ) -> Result<(Self, InboxOf<T>), BindError> {
        let connect_failed = |err: crate::error::TransportError| BindError::ConnectFailed {
            address: address.to_string(),
            reason: err.to_string(),
        };

        let connection = transport.dial(address).await.map_err(connect_failed)?;
        let inbox = connection
            .open_inbox(reader)
            .await
            .map_err(connect_failed)?;

        let object = match connection.resolve_object(reader).await {
            Ok(object) => object,
            Err(err) => {
                drop(inbox);
                drop(connection);
                return Err(BindError::ObjectUnavailable(format!(
                    "{} {} ({}): {}",
                    reader.service, reader.path, reader.interface, err
                )));
            }
        };

        debug!(
            target: "yomiage::proxy",
            "Proxy object is created for {} {}",
            reader.service,
            reader.path
        );

        let object = Arc::new(object);
        let (outbound, rx) = mpsc::unbounded_channel();
        tokio::spawn(writer_loop::<T>(Arc::clone(&object), rx, Arc::clone(&router)));

        let proxy = Self {
            _connection: connection,
            object,
            router,
            outbound,
        };
        Ok((proxy, inbox))
    }

    /// Install the ReadingStopped/ReadingCancelled subscriptions.
    ///
    /// Called once at bind time; they stay active for the proxy's lifetime.
    pub(crate) async fn subscribe(&self) -> Result<(), BindError> {
        let members = SignalKind::ALL.map(SignalKind::member);
        self.object
            .subscribe(&members)
            .await
            .map_err(|err| BindError::ObjectUnavailable(format!("signal subscription: {}", err)))
    }

    /// Request speech that a later request may interrupt.
    pub fn say_interruptible(&self, owner: Option<&Owner>, text: &str) -> PendingReply {
        self.say(owner, text, true)
    }

    /// Request speech that must run to completion.
    pub fn say_uninterruptible(&self, owner: Option<&Owner>, text: &str) -> PendingReply {
        self.say(owner, text, false)
    }

    fn say(&self, owner: Option<&Owner>, text: &str, interruptible: bool) -> PendingReply {
        let (serial, call) = match self.object.prepare_read_command(text, interruptible) {
            Ok(prepared) => prepared,
            Err(err) => {
                warn!(
                    target: "yomiage::proxy",
                    "Could not build ReadCommand: {}",
                    err
                );
                return PendingReply::failed(CallError::SendFailed(err.to_string()));
            }
        };

        let Some(reply) = self.router.register(serial, owner.map(Arc::downgrade)) else {
            warn!(
                target: "yomiage::proxy",
                "Call serial {} already pending, dropping read",
                serial
            );
            return PendingReply::failed(CallError::SendFailed(format!(
                "duplicate call serial {}",
                serial
            )));
        };

        debug!(
            target: "yomiage::proxy",
            "Requesting {} reading {} (text: {:?})",
            if interruptible { "interruptible" } else { "uninterruptible" },
            serial,
            text
        );

        if self.outbound.send((serial, call)).is_err() {
            warn!(
                target: "yomiage::proxy",
                "Writer task is gone, dropping ReadCommand {}",
                serial
            );
            self.router.remove(serial, CallError::Closed);
        }

        reply
    }
}

/// Send queued calls one at a time, in queue order.
///
/// A failed send fails only its own pending call; later calls still go out.
async fn writer_loop<T: Transport>(
    object: Arc<ObjectOf<T>>,
    mut rx: mpsc::UnboundedReceiver<(CallSerial, CallOf<T>)>,
    router: Arc<CallRouter>,
) {
    while let Some((serial, call)) = rx.recv().await {
        if let Err(err) = object.send(call).await {
            warn!(
                target: "yomiage::proxy",
                "ReadCommand {} was not sent: {}",
                serial,
                err
            );
            router.remove(serial, CallError::SendFailed(err.to_string()));
        }
    }
    debug!(target: "yomiage::proxy", "Writer task finished");
}
