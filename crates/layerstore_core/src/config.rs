//! Typed runtime configuration.
//!
//! # Responsibility
//! - Describe every tunable of the core in one serde-deserializable value.
//! - Validate values before any component is built from them.
//!
//! # Invariants
//! - Every field has a default; `{}` is a valid configuration document.
//! - Loading and merging configuration sources is the host's job; this module
//!   only parses one JSON document.

use crate::filter::DeletePolicy;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

const DEFAULT_BRIDGE_WORKERS: usize = 2;
const DEFAULT_BRIDGE_THREAD_NAME: &str = "layerstore-bridge";

/// Configuration error.
#[derive(Debug)]
pub enum ConfigError {
    Parse(serde_json::Error),
    Invalid { field: &'static str, reason: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Parse(err) => write!(f, "failed to parse configuration: {err}"),
            Self::Invalid { field, reason } => write!(f, "invalid `{field}`: {reason}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CoreConfig {
    pub logging: LoggingConfig,
    /// Default delete policy for registered soft-deletable types.
    pub delete_policy: DeletePolicy,
    pub audit: AuditConfig,
    pub bridge: BridgeConfig,
}

impl CoreConfig {
    /// Parses and validates one JSON configuration document.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.logging.validate()?;
        self.bridge.validate()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    pub level: String,
    /// Absolute log directory. `None` leaves logging uninitialized.
    pub dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: crate::logging::default_log_level().to_string(),
            dir: None,
        }
    }
}

impl LoggingConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        crate::logging::normalize_level(&self.level)
            .map(|_| ())
            .map_err(|reason| ConfigError::Invalid {
                field: "logging.level",
                reason,
            })
    }
}

/// Delivery guarantee of audit dispatch on the synchronous contract.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncAuditDispatch {
    /// One submission attempt; failures are logged and the call succeeds.
    #[default]
    BestEffort,
    /// Submission failures are surfaced to the caller.
    Required,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    pub sync_dispatch: SyncAuditDispatch,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    pub worker_threads: usize,
    pub thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            worker_threads: DEFAULT_BRIDGE_WORKERS,
            thread_name: DEFAULT_BRIDGE_THREAD_NAME.to_string(),
        }
    }
}

impl BridgeConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.worker_threads == 0 {
            return Err(ConfigError::Invalid {
                field: "bridge.worker_threads",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.thread_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                field: "bridge.thread_name",
                reason: "must not be blank".to_string(),
            });
        }
        Ok(())
    }
}
