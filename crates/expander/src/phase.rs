//! Installation phases and poll classification.

use serde::{Deserialize, Serialize};

/// Ordered installation phases run by the gateway.
///
/// Ordering follows the rollout: `Query < Upload < Install < Configure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    /// Gateway inspects the candidate nodes.
    Query,
    /// Packages are uploaded to the nodes.
    Upload,
    /// Packages are installed.
    Install,
    /// Nodes are configured and joined to the cluster.
    Configure,
}

impl Phase {
    /// All phases in rollout order.
    pub const ALL: [Phase; 4] = [Self::Query, Self::Upload, Self::Install, Self::Configure];

    /// First phase entered after the installation begins.
    pub const FIRST: Phase = Self::Query;

    /// Get the phase that follows this one, or `None` for the last phase.
    #[must_use]
    pub fn next(self) -> Option<Self> {
        match self {
            Self::Query => Some(Self::Upload),
            Self::Upload => Some(Self::Install),
            Self::Install => Some(Self::Configure),
            Self::Configure => None,
        }
    }

    /// Name used by the gateway API.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Query => "query",
            Self::Upload => "upload",
            Self::Install => "install",
            Self::Configure => "configure",
        }
    }

    /// 1-based position for progress output.
    #[must_use]
    pub fn step_number(self) -> usize {
        match self {
            Self::Query => 1,
            Self::Upload => 2,
            Self::Install => 3,
            Self::Configure => 4,
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Three-way reduction of a raw gateway phase status.
///
/// All sequencing decisions are made on this value, never on the raw string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStatus {
    /// The phase's queued commands have all finished.
    Completed,
    /// The phase is still working.
    Running,
    /// Explicit error or a status we do not recognize.
    Other,
}

impl PollStatus {
    /// Classify a raw status string reported by the gateway.
    #[must_use]
    pub fn classify(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "completed" | "complete" | "success" | "succeeded" | "done" => Self::Completed,
            "running" | "in_progress" | "in-progress" | "pending" | "queued" => Self::Running,
            _ => Self::Other,
        }
    }
}

impl std::fmt::Display for PollStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Running => write!(f, "running"),
            Self::Other => write!(f, "other"),
        }
    }
}
