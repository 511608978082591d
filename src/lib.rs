//! Speech output bridge to a remote screen-reader service.
//!
//! Text is sent to the reader over the accessibility bus, and the reader's
//! stop/cancel signals are routed back to the UI object that asked for the
//! speech. [`SpeechOutput`] is the entry point.

pub mod bridge;
pub mod completion;
pub mod config;
pub mod error;
pub mod observer;
pub mod output;

pub use bridge::{BridgeState, CommandId, PendingReply, Transport, ZbusTransport};
pub use completion::{CompletionContext, CompletionFn};
pub use config::{BridgeSettings, load_settings};
pub use error::{BindError, BootstrapError, CallError, CompletionError, InitError};
pub use observer::{Owner, ReadNotification, ReadingObserver};
pub use output::{InitStatus, SpeechOutput};
