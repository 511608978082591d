use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::defaults;

/// Partial bus endpoint as written in a config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    pub service: Option<String>,
    pub path: Option<String>,
    pub interface: Option<String>,
}

/// One configuration layer (`yomiage.toml`). Every field is optional so that
/// layers can be merged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsFile {
    /// Where to ask for the accessibility bus address
    pub discovery: Option<EndpointConfig>,
    /// The screen-reader object that speaks
    pub reader: Option<EndpointConfig>,
    /// Upper bound for the GetAddress call
    pub discovery_timeout_ms: Option<u64>,
}

/// Fully resolved bus endpoint: service name, object path, interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub service: String,
    pub path: String,
    pub interface: String,
}

impl Endpoint {
    pub fn new(
        service: impl Into<String>,
        path: impl Into<String>,
        interface: impl Into<String>,
    ) -> Self {
        Self {
            service: service.into(),
            path: path.into(),
            interface: interface.into(),
        }
    }

    fn with_overrides(self, config: Option<EndpointConfig>) -> Self {
        let Some(config) = config else {
            return self;
        };
        Self {
            service: config.service.unwrap_or(self.service),
            path: config.path.unwrap_or(self.path),
            interface: config.interface.unwrap_or(self.interface),
        }
    }
}

/// Settings the bridge runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeSettings {
    pub discovery: Endpoint,
    pub reader: Endpoint,
    pub discovery_timeout: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            discovery: defaults::discovery_endpoint(),
            reader: defaults::reader_endpoint(),
            discovery_timeout: Duration::from_millis(defaults::DISCOVERY_TIMEOUT_MS),
        }
    }
}

impl From<SettingsFile> for BridgeSettings {
    fn from(file: SettingsFile) -> Self {
        let base = BridgeSettings::default();
        Self {
            discovery: base.discovery.with_overrides(file.discovery),
            reader: base.reader.with_overrides(file.reader),
            discovery_timeout: file
                .discovery_timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(base.discovery_timeout),
        }
    }
}
