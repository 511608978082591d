//! User configuration loading for yomiage.
//!
//! This module handles loading user-wide configuration from the XDG config directory.
//! User config location: $XDG_CONFIG_HOME/yomiage/yomiage.toml
//! Fallback: the platform config directory (~/.config/yomiage/yomiage.toml on Linux)

use std::path::{Path, PathBuf};

use thiserror::Error;

use super::settings::SettingsFile;

#[derive(Debug, Error)]
pub enum UserConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

pub type UserConfigResult<T> = Result<T, UserConfigError>;

/// Returns the path to the user configuration file.
///
/// The path is determined by:
/// 1. If $XDG_CONFIG_HOME is set: $XDG_CONFIG_HOME/yomiage/yomiage.toml
/// 2. Otherwise: `dirs::config_dir()`/yomiage/yomiage.toml
///
/// Returns None if no config directory can be determined.
pub fn user_config_path() -> Option<PathBuf> {
    let base = std::env::var_os("XDG_CONFIG_HOME")
        .filter(|value| !value.is_empty())
        .map(PathBuf::from)
        .or_else(dirs::config_dir)?;
    Some(base.join("yomiage").join("yomiage.toml"))
}

/// Load the user configuration file.
///
/// Returns `Ok(None)` when no user config exists.
pub fn load_user_config() -> UserConfigResult<Option<SettingsFile>> {
    match user_config_path() {
        Some(path) if path.exists() => load_config_file(&path).map(Some),
        _ => Ok(None),
    }
}

/// Parse one TOML settings file.
pub fn load_config_file(path: &Path) -> UserConfigResult<SettingsFile> {
    let contents = std::fs::read_to_string(path).map_err(|source| UserConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| UserConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
