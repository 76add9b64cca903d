//! Configuration management for usql-gate.
//!
//! Settings come from an optional TOML file, then environment variables,
//! then command-line flags, each layer overriding the previous one.
//! Connection strings are not part of this file; see [`crate::connection`].

use crate::error::{GateError, Result};
use crate::install::LocatorConfig;
use crate::query::DEFAULT_TIMEOUT_MS;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Enables downloading usql when set to exactly `true`.
pub const ENV_UNSAFE_INSTALL: &str = "UNSAFE_USQL_BINARY";
/// Explicit usql binary path.
pub const ENV_USQL_PATH: &str = "USQL_PATH";
/// Directory usql is installed into in unsafe mode.
pub const ENV_INSTALL_DIR: &str = "USQL_INSTALL_DIR";
/// Query timeout in milliseconds.
pub const ENV_TIMEOUT_MS: &str = "USQL_TIMEOUT_MS";

/// Runtime settings for usql-gate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Allow downloading and installing usql from GitHub releases.
    pub unsafe_install: bool,

    /// Explicit path to the usql binary.
    pub usql_path: Option<PathBuf>,

    /// Install directory for unsafe mode (defaults to the working directory).
    pub install_dir: Option<PathBuf>,

    /// Per-query timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            unsafe_install: false,
            usql_path: None,
            install_dir: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl Settings {
    /// Returns the default settings file path for the current platform.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("usql-gate")
            .join("config.toml")
    }

    /// Loads settings from a TOML file; a missing file yields the defaults.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .map_err(|e| GateError::config(format!("Failed to read config file: {e}")))?;

        Self::parse_toml(&content, path)
    }

    fn parse_toml(content: &str, path: &Path) -> Result<Self> {
        toml::from_str(content).map_err(|e| {
            GateError::config(format!(
                "Configuration error in {}:\n  {}",
                path.display(),
                e
            ))
        })
    }

    /// Applies environment overrides read through `lookup`.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup(ENV_UNSAFE_INSTALL) {
            self.unsafe_install = value == "true";
        }
        if let Some(path) = lookup(ENV_USQL_PATH).filter(|v| !v.is_empty()) {
            self.usql_path = Some(PathBuf::from(path));
        }
        if let Some(dir) = lookup(ENV_INSTALL_DIR).filter(|v| !v.is_empty()) {
            self.install_dir = Some(PathBuf::from(dir));
        }
        if let Some(value) = lookup(ENV_TIMEOUT_MS) {
            self.timeout_ms = value.trim().parse().map_err(|_| {
                GateError::config(format!("{ENV_TIMEOUT_MS} must be a number, got '{value}'"))
            })?;
        }
        Ok(())
    }

    /// Applies environment overrides from the process environment.
    pub fn apply_process_env(&mut self) -> Result<()> {
        self.apply_env(|name| std::env::var(name).ok())
    }

    /// Rejects settings that cannot work.
    pub fn validate(&self) -> Result<()> {
        if self.timeout_ms == 0 {
            return Err(GateError::config("timeout_ms must be greater than zero"));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Settings for the binary locator, with the install directory resolved.
    pub fn locator_config(&self) -> LocatorConfig {
        LocatorConfig {
            unsafe_install: self.unsafe_install,
            usql_path: self.usql_path.clone(),
            install_dir: self
                .install_dir
                .clone()
                .or_else(|| std::env::current_dir().ok())
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}
