// Local MCP Gateway - Configuration
// Copyright 2026 Joseph Stone - All Rights Reserved
//
// Immutable configuration snapshot. Loaded once from YAML at startup and
// passed by reference to everything that needs it, never mutated after.

use crate::paths;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_NERDCTL: &str = "nerdctl";
pub const DEFAULT_TOOL_TIMEOUT_SECS: u64 = 120;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config.yaml not found. Set {env} or place config.yaml next to the binary (searched: {searched})")]
    NotFound { env: &'static str, searched: String },

    #[error("failed to read config {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {path:?}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
}

/// Master gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Filesystem roots every path-bearing tool is confined to
    pub allowed_roots: Vec<String>,
    pub postgres: PostgresConfig,
    pub ssh: SshConfig,
    pub nerdctl: NerdctlConfig,
    pub logging: LoggingConfig,
    pub limits: LimitsConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PostgresConfig {
    pub connections: BTreeMap<String, PgConnection>,
    pub write_policy: WritePolicy,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PgConnection {
    pub url: Option<String>,
}

/// Toggles relaxing individual SQL write-safety checks.
/// Defaults are the strict setting for every flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct WritePolicy {
    pub allow_ddl: bool,
    pub allow_truncate: bool,
    pub require_where: bool,
    pub allow_multi_statement: bool,
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self {
            allow_ddl: false,
            allow_truncate: false,
            require_where: true,
            allow_multi_statement: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SshConfig {
    pub hosts: BTreeMap<String, SshHost>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SshHost {
    /// ssh destination, e.g. `deploy@10.0.0.5`
    pub target: Option<String>,
    pub nerdctl_path: String,
}

impl Default for SshHost {
    fn default() -> Self {
        Self { target: None, nerdctl_path: DEFAULT_NERDCTL.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NerdctlConfig {
    pub local_path: String,
}

impl Default for NerdctlConfig {
    fn default() -> Self {
        Self { local_path: DEFAULT_NERDCTL.to_string() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    /// Append-only command log (CALL/FAIL lines). Disabled when unset.
    pub audit_log: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "INFO".to_string(), audit_log: None }
    }
}

impl LoggingConfig {
    /// env_logger filter for the configured level
    pub fn filter(&self) -> &'static str {
        match self.level.to_ascii_lowercase().as_str() {
            "trace" => "trace",
            "debug" => "debug",
            "warn" | "warning" => "warn",
            "error" | "critical" => "error",
            "off" => "off",
            _ => "info",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LimitsConfig {
    /// Deadline for every external process and database call
    pub tool_timeout_secs: u64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self { tool_timeout_secs: DEFAULT_TOOL_TIMEOUT_SECS }
    }
}

impl Config {
    /// Locate and load the config. Missing source is fatal.
    pub fn discover(explicit: Option<&Path>) -> Result<(Self, PathBuf), ConfigError> {
        // An explicit path is used as given, never silently skipped
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, path.to_path_buf()));
        }
        match paths::find_config(None) {
            Some(path) => {
                let config = Self::load(&path)?;
                Ok((config, path))
            }
            None => {
                let searched = paths::config_candidates(explicit)
                    .iter()
                    .map(|p| p.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(ConfigError::NotFound { env: paths::CONFIG_ENV, searched })
            }
        }
    }

    /// Load config from a YAML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_yaml(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    /// Parse YAML. An empty document yields the defaults.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Option<Self> = serde_yaml::from_str(content)?;
        Ok(config.unwrap_or_default())
    }

    pub fn write_policy(&self) -> &WritePolicy {
        &self.postgres.write_policy
    }

    pub fn tool_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.limits.tool_timeout_secs.max(1))
    }
}

// ============================================================================
// TESTS
// ============================================================================
