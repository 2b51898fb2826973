//! Configuration management for the FileHub daemon.
//!
//! This module provides TOML-based configuration file loading and saving.
//! The default configuration path is `~/.config/filehub/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ipc::get_socket_path;
use crate::namespace::mutation::DEFAULT_TEXT_SUFFIX;
use crate::namespace::ConflictPolicy;

/// Configuration validation errors.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("log_level must be one of: trace, debug, info, warn, error; got {0}")]
    InvalidLogLevel(String),

    #[error("storage root must not be empty")]
    EmptyRoot,

    #[error("storage root must be an absolute path, got {0}")]
    RelativeRoot(String),

    #[error("text_suffix must start with '.' and contain no '/', got {0:?}")]
    InvalidTextSuffix(String),
}

/// Valid log level values for tracing configuration.
const VALID_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Main configuration structure for the FileHub daemon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(default)]
pub struct Config {
    /// General daemon configuration.
    pub daemon: DaemonConfig,

    /// Where the namespace lives.
    pub storage: StorageConfig,

    /// Conflict handling.
    pub policy: PolicyConfig,
}

/// General daemon configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DaemonConfig {
    /// Logging level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Unix socket path. Empty means the XDG default.
    pub socket_path: String,
}

/// Namespace storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StorageConfig {
    /// Root directory of the namespace.
    pub root: PathBuf,

    /// Create the root at startup if it is missing.
    pub create_root: bool,

    /// Suffix enforced on text files.
    pub text_suffix: String,
}

/// Conflict policies.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PolicyConfig {
    /// Applies to rename and move.
    pub rename_conflict: ConflictPolicy,

    /// Applies to text file writes that don't specify `overwrite`.
    pub text_file_conflict: ConflictPolicy,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            socket_path: String::new(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_root(),
            create_root: true,
            text_suffix: DEFAULT_TEXT_SUFFIX.to_string(),
        }
    }
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            rename_conflict: ConflictPolicy::Fail,
            text_file_conflict: ConflictPolicy::Overwrite,
        }
    }
}

/// Returns the default configuration file path.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("filehub")
        .join("config.toml")
}

/// Returns the default namespace root.
fn default_root() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("filehub")
        .join("uploads")
}

impl Config {
    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables take precedence over config file values.
    /// Supported variables:
    /// - FILEHUB_ROOT: Override the namespace root
    /// - FILEHUB_LOG_LEVEL: Override log level (trace, debug, info, warn, error)
    /// - FILEHUB_SOCKET: Override the socket path
    pub fn apply_env_overrides(&mut self) {
        if let Ok(root) = std::env::var("FILEHUB_ROOT") {
            if !root.is_empty() {
                tracing::info!("Overriding storage root from environment: {}", root);
                self.storage.root = PathBuf::from(root);
            }
        }

        if let Ok(level) = std::env::var("FILEHUB_LOG_LEVEL") {
            if !level.is_empty() {
                tracing::info!("Overriding log_level from environment: {}", level);
                self.daemon.log_level = level;
            }
        }

        if let Ok(socket) = std::env::var("FILEHUB_SOCKET") {
            if !socket.is_empty() {
                tracing::info!("Overriding socket_path from environment: {}", socket);
                self.daemon.socket_path = socket;
            }
        }
    }

    /// Validate the configuration values.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let level = self.daemon.log_level.to_lowercase();
        if !VALID_LOG_LEVELS.contains(&level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(self.daemon.log_level.clone()));
        }

        if self.storage.root.as_os_str().is_empty() {
            return Err(ConfigError::EmptyRoot);
        }
        if !self.storage.root.is_absolute() {
            return Err(ConfigError::RelativeRoot(
                self.storage.root.display().to_string(),
            ));
        }

        let suffix = &self.storage.text_suffix;
        if !suffix.starts_with('.') || suffix.len() < 2 || suffix.contains('/') || suffix.contains('\\')
        {
            return Err(ConfigError::InvalidTextSuffix(suffix.clone()));
        }

        Ok(())
    }

    /// The socket to bind or connect to.
    pub fn socket_path(&self) -> PathBuf {
        if self.daemon.socket_path.is_empty() {
            get_socket_path()
        } else {
            PathBuf::from(&self.daemon.socket_path)
        }
    }

    /// Load configuration from a file.
    ///
    /// If the file does not exist, returns the default configuration.
    /// If the file exists but is invalid TOML, returns an error with
    /// a helpful message.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            tracing::debug!("Config file not found at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from the default path.
    pub fn load_default() -> Result<Self> {
        Self::load(default_config_path())
    }

    /// Parse configuration from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str)
            .map_err(|e| anyhow::anyhow!("Invalid TOML configuration: {}", format_toml_error(&e)))
    }

    /// Save configuration to a file.
    ///
    /// Creates parent directories if they don't exist.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let contents = self.to_toml()?;
        fs::write(path, contents)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;

        tracing::debug!("Configuration saved to {:?}", path);
        Ok(())
    }

    /// Serialize configuration to a TOML string.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration to TOML")
    }
}

/// Format a TOML deserialization error for user-friendly display.
fn format_toml_error(error: &toml::de::Error) -> String {
    let mut msg = error.message().to_string();

    if let Some(span) = error.span() {
        msg.push_str(&format!(" (at position {}..{})", span.start, span.end));
    }

    msg
}
