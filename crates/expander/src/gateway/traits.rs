//! Gateway traits and common types.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::credentials::CredentialCheck;
use crate::manifest::{NodeRecord, Secret};
use crate::phase::Phase;

/// Status code the gateway uses for "accepted, proceed".
pub const STATUS_OK: u16 = 200;

/// Errors that can occur while talking to the gateway.
#[derive(Error, Debug)]
pub enum GatewayError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Gateway answered with an unusable response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Invalid client configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Request URL could not be built.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Manifest could not be rendered as CSV.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

/// Status returned by every non-polling gateway operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatewayStatus {
    /// HTTP-style status code; 200 means proceed.
    pub code: u16,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Gateway-specific error code, when the call was refused.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
}

impl GatewayStatus {
    /// A plain 200 status.
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            code: STATUS_OK,
            message: message.into(),
            error_code: None,
        }
    }

    /// A refusal with the given code and message.
    pub fn refused(code: u16, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            error_code: None,
        }
    }

    /// Attach a gateway error code.
    #[must_use]
    pub fn with_error_code(mut self, error_code: impl Into<String>) -> Self {
        self.error_code = Some(error_code.into());
        self
    }

    /// Whether the gateway accepted the call.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == STATUS_OK
    }

    /// Message plus error code, for failure reports.
    #[must_use]
    pub fn describe(&self) -> String {
        match &self.error_code {
            Some(code) => format!("{} (code {}, error {code})", self.message, self.code),
            None => format!("{} (code {})", self.message, self.code),
        }
    }
}

/// Result of polling a phase's queued commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseReport {
    /// Raw status string as reported.
    pub status: String,
    /// Human-readable detail.
    #[serde(default)]
    pub message: String,
    /// Client addresses installed so far.
    #[serde(default)]
    pub installed_clients: Vec<String>,
}

impl PhaseReport {
    /// Report with a status and no detail.
    pub fn new(status: impl Into<String>) -> Self {
        Self {
            status: status.into(),
            ..Self::default()
        }
    }

    /// Attach a message.
    #[must_use]
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Attach installed client addresses.
    #[must_use]
    pub fn with_installed(mut self, clients: Vec<String>) -> Self {
        self.installed_clients = clients;
        self
    }
}

/// Handle to a manifest the gateway has parsed and accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ManifestToken(pub String);

impl ManifestToken {
    /// Token value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ManifestToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Request starting the phased rollout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BeginInstallation {
    /// Token of the parsed manifest.
    pub manifest: ManifestToken,
    /// Cluster administrator password.
    pub admin_password: Secret,
    /// Storage-client agent password.
    pub agent_password: Secret,
}

/// Operations exposed by the installation gateway.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Stop any in-flight gateway operation.
    async fn abort_operation(&self) -> Result<GatewayStatus, GatewayError>;

    /// Drop queued commands that have not started.
    async fn clear_queue(&self) -> Result<GatewayStatus, GatewayError>;

    /// Reset the gateway's phase pointer to idle.
    async fn move_to_idle(&self) -> Result<GatewayStatus, GatewayError>;

    /// Pre-flight check of cluster credentials.
    async fn validate_credentials(
        &self,
        check: &CredentialCheck,
    ) -> Result<GatewayStatus, GatewayError>;

    /// Start the phased rollout for a parsed manifest.
    async fn begin_installation(
        &self,
        req: &BeginInstallation,
    ) -> Result<GatewayStatus, GatewayError>;

    /// Poll whether the phase's queued commands have finished.
    async fn check_phase(&self, phase: Phase) -> Result<PhaseReport, GatewayError>;

    /// Move the gateway from `phase` to the next one.
    async fn advance_phase(&self, phase: Phase) -> Result<GatewayStatus, GatewayError>;

    /// Re-issue the commands of `phase`.
    async fn retry_phase(&self, phase: Phase) -> Result<GatewayStatus, GatewayError>;
}

/// Converts node records into the gateway's submission format and submits them.
#[async_trait]
pub trait ManifestBuilder: Send + Sync {
    /// Submit the nodes and return the token of the parsed manifest.
    async fn build_and_submit(&self, nodes: &[NodeRecord]) -> Result<ManifestToken, GatewayError>;
}
