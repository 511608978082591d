//! Discovery of the accessibility bus address.
//!
//! The accessibility bus is not the session bus: its socket address has to
//! be asked for, once, from a well-known launcher service on the session bus.
//! The session connection used for that question is released right after,
//! whatever the answer.

use std::fmt;
use std::time::Duration;

use log::debug;

use super::transport::{DiscoverySession, Transport};
use crate::config::Endpoint;
use crate::error::{BootstrapError, TransportError};

/// Socket address of the accessibility bus, as returned by `GetAddress`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusAddress(String);

impl BusAddress {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BusAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One-shot `GetAddress` resolver.
pub struct BusAddressResolver<'a, T> {
    transport: &'a T,
    discovery: &'a Endpoint,
    timeout: Duration,
}

impl<'a, T: Transport> BusAddressResolver<'a, T> {
    pub fn new(transport: &'a T, discovery: &'a Endpoint, timeout: Duration) -> Self {
        Self {
            transport,
            discovery,
            timeout,
        }
    }

    /// Ask the discovery service for the accessibility bus address.
    ///
    /// # Errors
    /// * `SessionUnavailable` - the session bus could not be reached
    /// * `CallFailed` - `GetAddress` returned an error or timed out
    /// * `MalformedReply` - the reply lacked a string or the string was empty
    pub async fn resolve(&self) -> Result<BusAddress, BootstrapError> {
        let session = self
            .transport
            .open_session()
            .await
            .map_err(|err| BootstrapError::SessionUnavailable(err.to_string()))?;

        let reply = tokio::time::timeout(self.timeout, session.get_address(self.discovery)).await;
        drop(session);
        debug!(
            target: "yomiage::bootstrap",
            "Released discovery session ({}.GetAddress answered: {})",
            self.discovery.interface,
            reply.is_ok()
        );

        let address = match reply {
            Err(_) => {
                return Err(BootstrapError::CallFailed(
                    TransportError::Timeout(self.timeout).to_string(),
                ));
            }
            Ok(Err(TransportError::Malformed(reason))) => {
                return Err(BootstrapError::MalformedReply(reason));
            }
            Ok(Err(err)) => return Err(BootstrapError::CallFailed(err.to_string())),
            Ok(Ok(address)) => address,
        };

        if address.is_empty() {
            return Err(BootstrapError::MalformedReply(
                "empty bus address".to_string(),
            ));
        }
        Ok(BusAddress(address))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::test_helpers::FakeTransport;
    use crate::config::defaults;

    async fn resolve(fake: &FakeTransport) -> Result<BusAddress, BootstrapError> {
        let discovery = defaults::discovery_endpoint();
        BusAddressResolver::new(fake, &discovery, Duration::from_millis(200))
            .resolve()
            .await
    }

    #[tokio::test]
    async fn resolves_address_and_releases_session() {
        let fake = FakeTransport::new();

        let address = resolve(&fake).await.expect("should resolve");

        assert_eq!(address.as_str(), FakeTransport::ADDRESS);
        assert_eq!(fake.session_opens(), 1);
        assert_eq!(fake.session_releases(), 1);
    }

    #[tokio::test]
    async fn session_unavailable_is_reported() {
        let fake = FakeTransport::new().with_session_error("no session bus");

        let err = resolve(&fake).await.unwrap_err();

        assert!(matches!(err, BootstrapError::SessionUnavailable(_)));
        assert_eq!(fake.session_releases(), 0, "nothing was opened");
    }

    #[tokio::test]
    async fn remote_error_is_call_failed_and_session_released() {
        let fake = FakeTransport::new().with_address(Err(TransportError::Remote {
            name: "org.freedesktop.DBus.Error.ServiceUnknown".to_string(),
            message: "no launcher".to_string(),
        }));

        let err = resolve(&fake).await.unwrap_err();

        assert!(matches!(err, BootstrapError::CallFailed(_)));
        assert_eq!(fake.session_releases(), 1);
    }

    #[tokio::test]
    async fn non_string_reply_is_malformed() {
        let fake =
            FakeTransport::new().with_address(Err(TransportError::Malformed("got u".into())));

        let err = resolve(&fake).await.unwrap_err();

        assert_eq!(err, BootstrapError::MalformedReply("got u".into()));
        assert_eq!(fake.session_releases(), 1);
    }

    #[tokio::test]
    async fn empty_address_is_malformed() {
        let fake = FakeTransport::new().with_address(Ok(String::new()));

        let err = resolve(&fake).await.unwrap_err();

        assert!(matches!(err, BootstrapError::MalformedReply(_)));
        assert_eq!(fake.session_releases(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn unanswered_call_times_out_as_call_failed() {
        let fake = FakeTransport::new();
        let _gate = fake.hold_discovery();

        let err = resolve(&fake).await.unwrap_err();

        assert!(matches!(err, BootstrapError::CallFailed(ref m) if m.contains("timed out")));
        assert_eq!(fake.session_releases(), 1);
    }
}
