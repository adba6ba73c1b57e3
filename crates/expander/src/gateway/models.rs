//! Gateway REST request and response models.

use serde::{Deserialize, Serialize};

// ============================================================================
// Common envelope
// ============================================================================

/// Envelope wrapping every gateway response.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiEnvelope {
    /// Status code reported in the body, if any.
    pub code: Option<u16>,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Gateway error code.
    pub error_code: Option<String>,
}

// ============================================================================
// Manifest upload
// ============================================================================

/// Response to a manifest upload.
#[derive(Debug, Deserialize)]
pub(crate) struct ManifestUploadResponse {
    /// Status code reported in the body, if any.
    pub code: Option<u16>,
    /// Human-readable message.
    #[serde(default)]
    pub message: String,
    /// Token of the parsed manifest.
    pub token: Option<String>,
}

// ============================================================================
// Installation
// ============================================================================

/// Body of the begin-installation request.
#[derive(Debug, Serialize)]
pub(crate) struct BeginInstallBody<'a> {
    /// Token of the parsed manifest.
    pub manifest_token: &'a str,
    /// Cluster administrator password.
    pub admin_password: &'a str,
    /// Storage-client agent password.
    pub agent_password: &'a str,
}

/// Response to a phase status poll.
#[derive(Debug, Deserialize)]
pub(crate) struct PhaseStatusResponse {
    /// Raw status of the phase's queued commands.
    pub status: String,
    /// Human-readable detail.
    #[serde(default)]
    pub message: String,
    /// Client addresses installed so far.
    #[serde(default)]
    pub installed_clients: Vec<String>,
}
