//! Terminal result of an expansion run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::phase::Phase;

/// Why a run failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// Manifest failed local validation.
    InvalidManifest,
    /// Gateway queue could not be reset before the run.
    QueueReset,
    /// Gateway refused the node manifest.
    ManifestRejected,
    /// Gateway refused the cluster credentials.
    CredentialsRejected,
    /// Gateway refused to begin the installation.
    BeginRejected,
    /// A phase stalled or kept failing after its retry.
    StallTimeout,
    /// Gateway refused to move to the next phase.
    AdvanceFailed,
    /// Caller cancelled the run.
    Cancelled,
}

impl FailureKind {
    /// Whether the failure happened before the polling loop started.
    #[must_use]
    pub fn is_preflight(self) -> bool {
        matches!(
            self,
            Self::InvalidManifest
                | Self::QueueReset
                | Self::ManifestRejected
                | Self::CredentialsRejected
                | Self::BeginRejected
        )
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::InvalidManifest => "invalid manifest",
            Self::QueueReset => "queue reset failed",
            Self::ManifestRejected => "manifest rejected",
            Self::CredentialsRejected => "credentials rejected",
            Self::BeginRejected => "installation not started",
            Self::StallTimeout => "stall timeout",
            Self::AdvanceFailed => "phase advance failed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Success or failure of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum Outcome {
    /// All phases completed.
    Succeeded {
        /// Client addresses the gateway reports as installed.
        installed_clients: Vec<String>,
    },
    /// The run stopped before completing.
    Failed {
        /// Failure classification.
        kind: FailureKind,
        /// Human-readable detail, usually the gateway's message.
        message: String,
        /// Phase the run was in, if polling had started.
        phase: Option<Phase>,
    },
}

/// Counters collected during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunStats {
    /// Run identifier, also attached to log spans.
    pub run_id: Uuid,
    /// Phase polls issued.
    pub polls: u32,
    /// Phase retries issued.
    pub retries: u32,
    /// Successful phase advances.
    pub advances: u32,
    /// Current phase at each poll, in order.
    pub phase_history: Vec<Phase>,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the run finished.
    pub finished_at: Option<DateTime<Utc>>,
}

impl RunStats {
    /// Fresh counters for a new run.
    #[must_use]
    pub fn new(run_id: Uuid) -> Self {
        Self {
            run_id,
            polls: 0,
            retries: 0,
            advances: 0,
            phase_history: Vec::new(),
            started_at: Utc::now(),
            finished_at: None,
        }
    }
}

/// Result handed back to the caller; the orchestrator keeps nothing after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrchestrationResult {
    /// Outcome of the run.
    pub outcome: Outcome,
    /// Run counters.
    pub stats: RunStats,
    /// Failure of the final queue reset, if any. Never changes `outcome`.
    pub cleanup_error: Option<String>,
}

impl OrchestrationResult {
    /// Successful run.
    #[must_use]
    pub fn succeeded(installed_clients: Vec<String>, stats: RunStats) -> Self {
        Self::finish(Outcome::Succeeded { installed_clients }, stats)
    }

    /// Failed run.
    pub fn failed(
        kind: FailureKind,
        message: impl Into<String>,
        phase: Option<Phase>,
        stats: RunStats,
    ) -> Self {
        Self::finish(
            Outcome::Failed {
                kind,
                message: message.into(),
                phase,
            },
            stats,
        )
    }

    fn finish(outcome: Outcome, mut stats: RunStats) -> Self {
        stats.finished_at = Some(Utc::now());
        Self {
            outcome,
            stats,
            cleanup_error: None,
        }
    }

    /// Whether the run completed every phase.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, Outcome::Succeeded { .. })
    }

    /// Installed clients on success.
    #[must_use]
    pub fn installed_clients(&self) -> Option<&[String]> {
        match &self.outcome {
            Outcome::Succeeded { installed_clients } => Some(installed_clients),
            Outcome::Failed { .. } => None,
        }
    }

    /// Failure classification on failure.
    #[must_use]
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match &self.outcome {
            Outcome::Succeeded { .. } => None,
            Outcome::Failed { kind, .. } => Some(*kind),
        }
    }

    /// Failure message on failure.
    #[must_use]
    pub fn failure_message(&self) -> Option<&str> {
        match &self.outcome {
            Outcome::Succeeded { .. } => None,
            Outcome::Failed { message, .. } => Some(message),
        }
    }
}
