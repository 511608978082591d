//! Bus vocabulary shared by the bridge components.
//!
//! This module provides the typed identifiers, reply payloads and signal
//! kinds exchanged with the remote screen-reader service.
//!
//! ## Module Structure
//!
//! - `ids` - CommandId and CallSerial newtypes
//! - `message` - ReadCommand reply, reading signals and the inbox item type

mod ids;
mod message;

pub use ids::{CallSerial, CommandId};
pub use message::{
    Incoming, READ_COMMAND, READING_CANCELLED, READING_STOPPED, ReadReply, ReadingSignal,
    SignalKind,
};
