//! Pre-flight cluster credential check.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::gateway::{Gateway, GatewayError, GatewayStatus};
use crate::manifest::{Manifest, Secret};

/// Component that keeps an unauthenticated channel to the cluster.
pub const GATEWAY_COMPONENT: &str = "install-gateway";

/// Communication security settings sent with the credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityPosture {
    /// Whether components may talk to each other without authentication.
    pub allow_unauthenticated: bool,
    /// Components exempted from the rule above.
    pub unauthenticated_allowlist: Vec<String>,
}

impl SecurityPosture {
    /// The only posture the expander submits: unauthenticated traffic is
    /// disabled except for the gateway's own component.
    #[must_use]
    pub fn locked_down() -> Self {
        Self {
            allow_unauthenticated: false,
            unauthenticated_allowlist: vec![GATEWAY_COMPONENT.to_string()],
        }
    }
}

/// Credential-check payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialCheck {
    /// Cluster administrator account.
    pub admin_user: String,
    /// Cluster administrator password.
    pub admin_password: Secret,
    /// Management IPs of the cluster.
    pub management_ips: Vec<String>,
    /// Security posture to apply.
    pub security: SecurityPosture,
}

impl CredentialCheck {
    /// Build the payload for a manifest.
    #[must_use]
    pub fn for_manifest(manifest: &Manifest) -> Self {
        Self {
            admin_user: manifest.credentials.admin_user.clone(),
            admin_password: manifest.credentials.admin_password.clone(),
            management_ips: manifest.management_ips(),
            security: SecurityPosture::locked_down(),
        }
    }
}

/// Submit the manifest's cluster credentials to the gateway.
///
/// The raw status is returned; callers proceed only on 200.
///
/// # Errors
/// Returns an error if the gateway cannot be reached.
pub async fn validate_credentials(
    gateway: &dyn Gateway,
    manifest: &Manifest,
) -> Result<GatewayStatus, GatewayError> {
    let check = CredentialCheck::for_manifest(manifest);
    let status = gateway.validate_credentials(&check).await?;

    if status.is_ok() {
        info!(admin_user = %check.admin_user, "Cluster credentials accepted");
    } else {
        warn!(
            code = status.code,
            error_code = ?status.error_code,
            message = %status.message,
            "Cluster credentials rejected"
        );
    }

    Ok(status)
}
