//! Expander configuration.
//!
//! Configuration is read from an optional YAML file; every field has a
//! default so a partial file is enough. The CLI layers flag and environment
//! overrides on top.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::manifest::Secret;
use crate::policy::{StallPolicy, DEFAULT_MAX_STALLS};

/// Default interval between phase polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;

/// Default timeout for a single gateway request.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Errors raised while loading or checking configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Config file could not be read.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    /// Config file is not valid YAML for [`ExpanderConfig`].
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },

    /// A setting is out of range.
    #[error("invalid setting '{field}': {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Connection settings for the installation gateway.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Base URL of the gateway REST API.
    pub base_url: String,
    /// Gateway account.
    pub username: String,
    /// Gateway account password.
    pub password: Secret,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// Accept self-signed gateway certificates.
    pub accept_invalid_certs: bool,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "https://127.0.0.1:8088/".to_string(),
            username: "admin".to_string(),
            password: Secret::default(),
            timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            accept_invalid_certs: false,
        }
    }
}

/// Polling behaviour of the phase sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequencerConfig {
    /// Seconds to wait between polls.
    pub poll_interval_secs: u64,
    /// Consecutive non-completed polls before a phase is stalled.
    pub max_stalls: u32,
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: DEFAULT_POLL_INTERVAL_SECS,
            max_stalls: DEFAULT_MAX_STALLS,
        }
    }
}

impl SequencerConfig {
    /// Interval between polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    /// Stall policy derived from these settings.
    #[must_use]
    pub fn policy(&self) -> StallPolicy {
        StallPolicy::new(self.max_stalls)
    }
}

/// Full expander configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExpanderConfig {
    /// Gateway connection.
    pub gateway: GatewayConfig,
    /// Sequencer polling.
    pub sequencer: SequencerConfig,
}

impl ExpanderConfig {
    /// Load configuration from a YAML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or fails validation.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let config = Self::from_yaml(&content).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from YAML text without validating it.
    ///
    /// # Errors
    /// Returns an error if the YAML does not match the configuration shape.
    pub fn from_yaml(content: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(content)
    }

    /// Check that all settings are usable.
    ///
    /// # Errors
    /// Returns the first invalid setting.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sequencer.max_stalls == 0 {
            return Err(ConfigError::Invalid {
                field: "sequencer.max_stalls",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.sequencer.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "sequencer.poll_interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if self.gateway.timeout_secs == 0 {
            return Err(ConfigError::Invalid {
                field: "gateway.timeout_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if let Err(e) = url::Url::parse(self.gateway.base_url.trim()) {
            return Err(ConfigError::Invalid {
                field: "gateway.base_url",
                reason: e.to_string(),
            });
        }
        Ok(())
    }
}
