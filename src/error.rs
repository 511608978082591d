//! Error handling types for yomiage
//!
//! This module provides the error taxonomy of the speech bridge: bootstrap,
//! bind, per-call and transport failures, plus the facade-level errors.

use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

/// Failure while discovering the accessibility bus address.
///
/// Terminal for the bootstrap attempt: the facade stays unbound until restart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BootstrapError {
    /// The session bus used for discovery could not be reached
    #[error("session bus unavailable: {0}")]
    SessionUnavailable(String),

    /// The GetAddress call failed or timed out
    #[error("GetAddress failed: {0}")]
    CallFailed(String),

    /// The GetAddress reply did not carry a usable address
    #[error("malformed GetAddress reply: {0}")]
    MalformedReply(String),
}

/// Failure while binding to the remote reader object.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BindError {
    /// The resolved bus address could not be dialed
    #[error("failed to connect to {address}: {reason}")]
    ConnectFailed { address: String, reason: String },

    /// The reader object or its interface could not be resolved
    #[error("reader object unavailable: {0}")]
    ObjectUnavailable(String),

    /// No live proxy yet (bootstrap pending, failed, or shut down)
    #[error("reader proxy is not bound")]
    NotBound,
}

/// Failure of a single ReadCommand call.
///
/// Local to that one request: it is logged and dropped, no correlation
/// entry is created.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CallError {
    /// The service answered with an error reply
    #[error("{name}: {message}")]
    Remote { name: String, message: String },

    /// The reply body did not match `(text, accepted, command_id)`
    #[error("malformed ReadCommand reply: {0}")]
    MalformedReply(String),

    /// The call never made it onto the bus
    #[error("failed to send ReadCommand: {0}")]
    SendFailed(String),

    /// The bridge shut down before the reply arrived
    #[error("bridge closed before reply")]
    Closed,
}

/// Error reported by a [`Transport`](crate::bridge::Transport) implementation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The peer answered with a bus error
    #[error("{name}: {message}")]
    Remote { name: String, message: String },

    /// A message body had an unexpected signature
    #[error("unexpected message body: {0}")]
    Malformed(String),

    /// Connection-level failure (dial, send, invalid name, ...)
    #[error("{0}")]
    Link(String),

    /// No answer within the configured time
    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

/// Error returned by [`SpeechOutput::init`](crate::SpeechOutput::init).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InitError {
    /// `init` was called outside a tokio runtime
    #[error("no tokio runtime available to drive the bus")]
    NoRuntime,

    /// The facade was already shut down
    #[error("speech output has been shut down")]
    ShutDown,

    /// A previous bootstrap failed; there is no automatic retry
    #[error("bootstrap already failed: {0}")]
    Failed(String),
}

/// Error returned when updating the process-wide completion callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CompletionError {
    /// A clear was attempted with a context other than the registered one
    #[error("completion callback is registered under a different context")]
    ContextMismatch,
}

/// Helper trait to recover poisoned locks.
pub trait LockResultExt<T> {
    /// Recover the guard from a poisoned lock, logging the context.
    ///
    /// The context parameter identifies which operation triggered lock recovery.
    fn recover_poison(self, context: &str) -> T;
}

impl<T> LockResultExt<T> for Result<T, PoisonError<T>> {
    fn recover_poison(self, context: &str) -> T {
        match self {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!(
                    target: "yomiage::lock_recovery",
                    "Recovered from poisoned lock in {}",
                    context
                );
                poisoned.into_inner()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[test]
    fn bind_error_messages_name_the_address() {
        let err = BindError::ConnectFailed {
            address: "unix:path=/run/a11y".to_string(),
            reason: "refused".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "failed to connect to unix:path=/run/a11y: refused"
        );
    }

    #[test]
    fn call_error_remote_formats_name_and_message() {
        let err = CallError::Remote {
            name: "org.freedesktop.DBus.Error.ServiceUnknown".to_string(),
            message: "no reader".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "org.freedesktop.DBus.Error.ServiceUnknown: no reader"
        );
    }

    #[test]
    fn recover_poison_returns_inner_guard() {
        let lock = Arc::new(Mutex::new(7));
        let poisoner = Arc::clone(&lock);
        let _ = std::thread::spawn(move || {
            let _guard = poisoner.lock().unwrap();
            panic!("poison the lock");
        })
        .join();

        assert!(lock.is_poisoned());
        let guard = lock.lock().recover_poison("test");
        assert_eq!(*guard, 7);
    }
}
