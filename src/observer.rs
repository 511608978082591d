//! The contract the UI layer honours to hear about its utterances.
//!
//! UI objects are owned by the toolkit. The bridge only ever keeps a
//! [`Weak`] reference to them, so an object destroyed while its speech is
//! still running is simply skipped when the stop/cancel signal arrives.

use std::fmt;
use std::sync::{Arc, Weak};

/// Named notification delivered to the object that requested a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReadNotification {
    /// The utterance ran to its end
    ReadStopped,
    /// The utterance was cut short by the service
    ReadCancelled,
}

impl ReadNotification {
    /// Toolkit-facing event name, carried without payload.
    pub fn signal_name(self) -> &'static str {
        match self {
            ReadNotification::ReadStopped => "read-stopped",
            ReadNotification::ReadCancelled => "read-cancelled",
        }
    }
}

impl fmt::Display for ReadNotification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.signal_name())
    }
}

/// A UI element that can own read requests.
///
/// `notify` is invoked from the bridge's signal task. Implementations should
/// hand the event to their toolkit's own loop rather than do real work inline.
pub trait ReadingObserver: Send + Sync {
    fn notify(&self, notification: ReadNotification);
}

/// Strong handle the UI layer passes to `read`/`force_read`.
pub type Owner = Arc<dyn ReadingObserver>;

/// Non-owning reference held by the correlation table.
pub type OwnerRef = Weak<dyn ReadingObserver>;


#[cfg(test)]
mod tests {
    use super::testing::RecordingObserver;
    use super::*;

    #[test]
    fn signal_names_match_toolkit_events() {
        assert_eq!(ReadNotification::ReadStopped.to_string(), "read-stopped");
        assert_eq!(ReadNotification::ReadCancelled.to_string(), "read-cancelled");
    }

    #[test]
    fn owner_ref_dies_with_the_ui_object() {
        let widget = RecordingObserver::new("widget");
        let owner = widget.as_owner();
        let weak: OwnerRef = Arc::downgrade(&owner);
        assert!(weak.upgrade().is_some());

        drop(owner);
        drop(widget);
        assert!(weak.upgrade().is_none());
    }
}
