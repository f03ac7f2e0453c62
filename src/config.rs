//! Transfer configuration loaded from TOML.
//!
//! The default location is `$XDG_CONFIG_HOME/frostwire-transfers/config.toml`,
//! falling back to `$HOME/.config/frostwire-transfers/config.toml`. A missing
//! file means defaults.

use std::env;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::download::{CONNECT_TIMEOUT_SECS, READ_TIMEOUT_SECS};
use crate::platform::DEFAULT_POOL_SLOTS;

const APP_DIR: &str = "frostwire-transfers";
const CONFIG_FILE: &str = "config.toml";

/// Errors from loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file exists but could not be read.
    #[error("failed to read config file '{path}': {source}")]
    Read {
        /// Config file path.
        path: PathBuf,
        /// The underlying IO error.
        #[source]
        source: std::io::Error,
    },

    /// Config file is not valid TOML or has unknown keys.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value is outside its allowed range.
    #[error("invalid config value for `{field}`: {value}. Expected range: {expected}")]
    Invalid {
        /// Offending key.
        field: &'static str,
        /// Value found in the file.
        value: u64,
        /// Allowed range, e.g. `1..=100`.
        expected: &'static str,
    },
}

/// Settings shared by every transfer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransferConfig {
    /// Where finished downloads are moved.
    pub save_dir: PathBuf,
    /// Where partial downloads are written.
    pub temp_dir: PathBuf,
    /// Worker pool size (1..=100).
    pub max_concurrent_transfers: usize,
    /// HTTP connect timeout in seconds (1..=3600).
    pub connect_timeout_secs: u64,
    /// HTTP read timeout in seconds (1..=3600).
    pub read_timeout_secs: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            save_dir: default_save_dir(),
            temp_dir: env::temp_dir().join(APP_DIR),
            max_concurrent_transfers: DEFAULT_POOL_SLOTS,
            connect_timeout_secs: CONNECT_TIMEOUT_SECS,
            read_timeout_secs: READ_TIMEOUT_SECS,
        }
    }
}

impl TransferConfig {
    /// Validates numeric ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first out-of-range field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let transfers = u64::try_from(self.max_concurrent_transfers).unwrap_or(u64::MAX);
        if !(1..=100).contains(&transfers) {
            return Err(ConfigError::Invalid {
                field: "max_concurrent_transfers",
                value: transfers,
                expected: "1..=100",
            });
        }
        validate_timeout_secs("connect_timeout_secs", self.connect_timeout_secs)?;
        validate_timeout_secs("read_timeout_secs", self.read_timeout_secs)?;
        Ok(())
    }
}

fn validate_timeout_secs(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if !(1..=3600).contains(&value) {
        return Err(ConfigError::Invalid {
            field,
            value,
            expected: "1..=3600",
        });
    }
    Ok(())
}

fn default_save_dir() -> PathBuf {
    env_var_non_empty_os("HOME").map_or_else(
        || PathBuf::from("Downloads").join("FrostWire"),
        |home| PathBuf::from(home).join("Downloads").join("FrostWire"),
    )
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path if a base directory is known.
    pub path: Option<PathBuf>,
    /// Effective configuration, defaults when no file was found.
    pub config: TransferConfig,
    /// Indicates whether configuration was loaded from disk.
    pub loaded_from_file: bool,
}

/// Resolves the default config path from the environment.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/frostwire-transfers/config.toml`
/// 2. `$HOME/.config/frostwire-transfers/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    resolve_config_path_from(
        env_var_non_empty_os("XDG_CONFIG_HOME"),
        env_var_non_empty_os("HOME"),
    )
}

/// Same as [`resolve_default_config_path`] with explicit base directories.
#[must_use]
pub fn resolve_config_path_from(
    xdg_config_home: Option<OsString>,
    home: Option<OsString>,
) -> Option<PathBuf> {
    if let Some(xdg) = xdg_config_home.filter(|v| !v.is_empty()) {
        return Some(PathBuf::from(xdg).join(APP_DIR).join(CONFIG_FILE));
    }
    let home = home.filter(|v| !v.is_empty())?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join(APP_DIR)
            .join(CONFIG_FILE),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads config from the default path, or defaults when no file exists.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file exists but cannot be read, parsed or
/// validated.
pub fn load_default_config() -> Result<LoadedConfig, ConfigError> {
    let path = resolve_default_config_path();
    match path.as_deref() {
        Some(path_ref) if path_ref.exists() => {
            let config = load_config_file(path_ref)?;
            Ok(LoadedConfig {
                path,
                config,
                loaded_from_file: true,
            })
        }
        _ => {
            debug!(path = ?path, "no config file, using defaults");
            Ok(LoadedConfig {
                path,
                config: TransferConfig::default(),
                loaded_from_file: false,
            })
        }
    }
}

/// Reads, parses and validates a config file.
///
/// # Errors
///
/// Returns [`ConfigError`] when the file cannot be read, parsed or validated.
pub fn load_config_file(path: &Path) -> Result<TransferConfig, ConfigError> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let config = parse_config_str(&raw)?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

/// Parses and validates TOML config text.
///
/// # Errors
///
/// Returns [`ConfigError::Parse`] for malformed TOML or unknown keys and
/// [`ConfigError::Invalid`] for out-of-range values.
pub fn parse_config_str(raw: &str) -> Result<TransferConfig, ConfigError> {
    let config: TransferConfig = toml::from_str(raw)?;
    config.validate()?;
    Ok(config)
}
