//! Lifecycle states of the speech bridge.

/// State of the connection to the remote screen reader.
///
/// - Unbound: `init` not called yet
/// - Bootstrapping: address discovery and proxy binding in flight
/// - Bound: proxy live, signals subscribed, reads go out
/// - Failed: bootstrap or bind failed (terminal until restart)
/// - Closed: `shutdown` ran (terminal)
///
/// State transitions:
/// - Unbound -> Bootstrapping (on `init`)
/// - Bootstrapping -> Bound (proxy bound and subscribed)
/// - Bootstrapping -> Failed (any bootstrap/bind error)
/// - any -> Closed (on `shutdown`)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeState {
    Unbound,
    Bootstrapping,
    Bound,
    /// Carries the logged failure reason
    Failed(String),
    Closed,
}

impl BridgeState {
    /// True once bootstrap will not progress any further.
    pub fn is_settled(&self) -> bool {
        matches!(
            self,
            BridgeState::Bound | BridgeState::Failed(_) | BridgeState::Closed
        )
    }

    pub fn is_bound(&self) -> bool {
        matches!(self, BridgeState::Bound)
    }
}
