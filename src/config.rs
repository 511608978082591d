pub mod defaults;
pub mod settings;
pub mod user;

use std::path::Path;

pub use settings::{BridgeSettings, Endpoint, EndpointConfig, SettingsFile};
pub use user::{
    UserConfigError, UserConfigResult, load_config_file, load_user_config, user_config_path,
};

/// Merge multiple config layers in order.
/// Later layers in the slice have higher precedence (override earlier ones).
/// Use this for layered config: `merge_all(&[user, explicit])`
pub fn merge_all(configs: &[Option<SettingsFile>]) -> Option<SettingsFile> {
    configs.iter().cloned().reduce(merge_settings).flatten()
}

/// Merge two layers, preferring values from `primary` over `fallback`
pub fn merge_settings(
    fallback: Option<SettingsFile>,
    primary: Option<SettingsFile>,
) -> Option<SettingsFile> {
    match (fallback, primary) {
        (None, None) => None,
        (Some(settings), None) => Some(settings),
        (None, Some(settings)) => Some(settings),
        (Some(fallback), Some(primary)) => Some(SettingsFile {
            discovery: merge_endpoint(fallback.discovery, primary.discovery),
            reader: merge_endpoint(fallback.reader, primary.reader),
            discovery_timeout_ms: primary
                .discovery_timeout_ms
                .or(fallback.discovery_timeout_ms),
        }),
    }
}

fn merge_endpoint(
    fallback: Option<EndpointConfig>,
    primary: Option<EndpointConfig>,
) -> Option<EndpointConfig> {
    match (fallback, primary) {
        (None, primary) => primary,
        (fallback, None) => fallback,
        (Some(fallback), Some(primary)) => Some(EndpointConfig {
            service: primary.service.or(fallback.service),
            path: primary.path.or(fallback.path),
            interface: primary.interface.or(fallback.interface),
        }),
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SettingsEventKind {
    Info,
    Warning,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SettingsEvent {
    pub kind: SettingsEventKind,
    pub message: String,
}

impl SettingsEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            kind: SettingsEventKind::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            kind: SettingsEventKind::Warning,
            message: message.into(),
        }
    }

    /// Forward this event to the `log` facade.
    pub fn log(&self) {
        match self.kind {
            SettingsEventKind::Info => log::info!(target: "yomiage::config", "{}", self.message),
            SettingsEventKind::Warning => {
                log::warn!(target: "yomiage::config", "{}", self.message)
            }
        }
    }
}

#[derive(Debug)]
pub struct SettingsLoadOutcome {
    pub settings: BridgeSettings,
    pub events: Vec<SettingsEvent>,
}

/// Resolve the settings the bridge runs with.
///
/// Layers: programmed defaults < user config < `explicit` file. A layer that
/// cannot be read or parsed is skipped with a warning event rather than
/// failing the whole load.
pub fn load_settings(explicit: Option<&Path>) -> SettingsLoadOutcome {
    let mut events = Vec::new();

    let user_config = match load_user_config() {
        Ok(Some(settings)) => {
            events.push(SettingsEvent::info("Loaded user config from XDG_CONFIG_HOME"));
            Some(settings)
        }
        // No user config file exists - zero-config experience
        Ok(None) => None,
        Err(err) => {
            events.push(SettingsEvent::warning(format!(
                "Failed to load user config: {}",
                err
            )));
            None
        }
    };

    let explicit_config = explicit.and_then(|path| match load_config_file(path) {
        Ok(settings) => {
            events.push(SettingsEvent::info(format!(
                "Loaded config file: {}",
                path.display()
            )));
            Some(settings)
        }
        Err(err) => {
            events.push(SettingsEvent::warning(format!(
                "Failed to load config file: {}",
                err
            )));
            None
        }
    });

    let merged = merge_all(&[user_config, explicit_config]).unwrap_or_default();
    SettingsLoadOutcome {
        settings: BridgeSettings::from(merged),
        events,
    }
}
