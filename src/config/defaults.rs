//! Default configuration values for yomiage.
//!
//! The discovery triple is the standard accessibility bus launcher; the
//! reader triple is the screen reader's direct-reading interface.

use super::settings::Endpoint;

pub const DISCOVERY_SERVICE: &str = "org.a11y.Bus";
pub const DISCOVERY_PATH: &str = "/org/a11y/bus";
pub const DISCOVERY_INTERFACE: &str = "org.a11y.Bus";

pub const READER_SERVICE: &str = "org.tizen.ScreenReader";
pub const READER_PATH: &str = "/org/tizen/DirectReading";
pub const READER_INTERFACE: &str = "org.tizen.DirectReading";

/// Method on the discovery interface returning the bus address.
pub const GET_ADDRESS: &str = "GetAddress";

pub const DISCOVERY_TIMEOUT_MS: u64 = 5_000;

pub fn discovery_endpoint() -> Endpoint {
    Endpoint::new(DISCOVERY_SERVICE, DISCOVERY_PATH, DISCOVERY_INTERFACE)
}

pub fn reader_endpoint() -> Endpoint {
    Endpoint::new(READER_SERVICE, READER_PATH, READER_INTERFACE)
}
