//! The boundary between bridge logic and the message bus.
//!
//! The bus protocol itself is a black box: the bridge needs a reliable
//! asynchronous RPC/signal transport with string service names, object paths
//! and typed arguments. These traits describe exactly that, so the
//! correlation logic can run against [`ZbusTransport`](super::ZbusTransport)
//! in production and against an in-memory fake in tests.

use std::future::Future;

use super::protocol::{CallSerial, Incoming};
use crate::config::Endpoint;
use crate::error::TransportError;

/// Entry point: how to reach the session bus and the accessibility bus.
pub trait Transport: Send + Sync + 'static {
    type Session: DiscoverySession;
    type Connection: BusConnection;

    /// Open a short-lived session-bus connection for discovery.
    ///
    /// Dropping the returned session releases the connection.
    fn open_session(&self) -> impl Future<Output = Result<Self::Session, TransportError>> + Send;

    /// Open a connection to the bus at `address`.
    fn dial(
        &self,
        address: &str,
    ) -> impl Future<Output = Result<Self::Connection, TransportError>> + Send;
}

/// Session-bus connection used only to ask for the accessibility bus address.
pub trait DiscoverySession: Send + Sync + 'static {
    /// Call `GetAddress` on `endpoint` and return its single string argument.
    fn get_address(
        &self,
        endpoint: &Endpoint,
    ) -> impl Future<Output = Result<String, TransportError>> + Send;
}

/// Live connection to the accessibility bus.
pub trait BusConnection: Send + Sync + 'static {
    type Object: RemoteObject;
    type Inbox: Inbox;

    /// Start receiving every message addressed to this connection, in order.
    ///
    /// Must be opened before the first call goes out so no reply is missed.
    fn open_inbox(
        &self,
        reader: &Endpoint,
    ) -> impl Future<Output = Result<Self::Inbox, TransportError>> + Send;

    /// Resolve the reader object and its interface on this connection.
    fn resolve_object(
        &self,
        reader: &Endpoint,
    ) -> impl Future<Output = Result<Self::Object, TransportError>> + Send;
}

/// The remote screen-reader object.
pub trait RemoteObject: Send + Sync + 'static {
    /// A built, not yet sent, ReadCommand call.
    type Call: Send + 'static;

    /// Ask the bus to deliver the given signals of the reader interface.
    fn subscribe(
        &self,
        members: &[&'static str],
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    /// Build a `ReadCommand(text, interruptible)` call.
    ///
    /// The serial is known before anything touches the wire, which lets the
    /// caller register the pending call first.
    fn prepare_read_command(
        &self,
        text: &str,
        interruptible: bool,
    ) -> Result<(CallSerial, Self::Call), TransportError>;

    /// Put a prepared call on the bus.
    fn send(&self, call: Self::Call) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Ordered stream of replies and reading signals.
pub trait Inbox: Send + 'static {
    /// Next relevant message, or `None` once the connection is gone.
    fn next(&mut self) -> impl Future<Output = Option<Incoming>> + Send;
}
