//! Bridge to the remote screen-reader service.
//!
//! # Module Structure
//!
//! - `resolver` - accessibility bus address discovery over the session bus
//! - `proxy` - ServiceProxy bound to the reader object
//! - `router` - CallRouter for in-flight ReadCommand calls
//! - `correlator` - RequestCorrelator binding command ids to owners
//! - `signal_task` - background reader of the connection inbox
//! - `transport` - the bus seam, with `zbus_transport` as the production side
//! - `protocol` - ids, replies and reading signals
//! - `state` - BridgeState lifecycle

mod correlator;
mod protocol;
mod proxy;
mod resolver;
mod router;
mod signal_task;
mod state;
mod transport;
mod zbus_transport;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use correlator::{RequestCorrelator, SignalOutcome};
pub use protocol::{
    CallSerial, CommandId, Incoming, READ_COMMAND, READING_CANCELLED, READING_STOPPED, ReadReply,
    ReadingSignal, SignalKind,
};
pub use proxy::ServiceProxy;
pub use resolver::{BusAddress, BusAddressResolver};
pub use router::PendingReply;
pub use state::BridgeState;
pub use transport::{BusConnection, DiscoverySession, Inbox, RemoteObject, Transport};
pub use zbus_transport::{ZbusConnection, ZbusInbox, ZbusObject, ZbusSession, ZbusTransport};

pub(crate) use router::CallRouter;
pub(crate) use signal_task::{SignalTaskHandle, spawn_signal_task};
