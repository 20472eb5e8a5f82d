//! Configuration management for Abacus
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. CLI arguments (highest precedence)
//! 2. Environment variables (ABACUS_* prefix)
//! 3. abacus.local.toml (gitignored, local overrides)
//! 4. abacus.toml (git-tracked, project config)
//! 5. ~/.config/abacus/config.toml (user defaults)
//! 6. Built-in defaults (lowest precedence)

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use abacus_policy::Strategy;
use anyhow::Result;
use serde::{Deserialize, Serialize};

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Log levels accepted by `log.level`.
pub const LOG_LEVELS: [&str; 6] = ["off", "error", "warn", "info", "debug", "trace"];

/// Main Abacus configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AbacusConfig {
    pub analytics: AnalyticsConfig,
    pub output: OutputConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalyticsConfig {
    /// How the bulk scan finds candidate rules and subjects.
    pub strategy: Strategy,
    /// Partition the scan across threads.
    pub parallel: bool,
    /// Length of the most/least accessed resource listings.
    pub top: usize,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Indexed,
            parallel: true,
            top: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: OutputFormat,
    pub color: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: OutputFormat::Table,
            color: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Boxed tables for humans.
    Table,
    /// Plain lines, one record per line.
    Text,
    /// Machine-readable JSON on stdout.
    Json,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Table => "table",
            Self::Text => "text",
            Self::Json => "json",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "table" => Ok(Self::Table),
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "unknown output format '{other}' (expected 'table', 'text' or 'json')"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Default tracing level; `RUST_LOG` overrides it.
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

impl AbacusConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Rejects values that deserialize but cannot be used.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.analytics.top == 0 {
            return Err(ConfigError::ValidationError(
                "analytics.top must be at least 1".to_string(),
            ));
        }
        if !LOG_LEVELS.contains(&self.log.level.to_ascii_lowercase().as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "log.level '{}' is not one of {}",
                self.log.level,
                LOG_LEVELS.join(", ")
            )));
        }
        Ok(())
    }

    /// Renders the configuration as TOML, in the layout of `abacus.toml`.
    pub fn to_toml(&self) -> std::result::Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(ConfigError::SerializeError)
    }
}
