//! HTTP client for the installation gateway.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Response};
use tracing::{debug, info, warn};
use url::Url;

use super::models::{ApiEnvelope, BeginInstallBody, ManifestUploadResponse, PhaseStatusResponse};
use super::traits::{
    BeginInstallation, Gateway, GatewayError, GatewayStatus, ManifestBuilder, ManifestToken,
    PhaseReport, STATUS_OK,
};
use crate::config::GatewayConfig;
use crate::credentials::CredentialCheck;
use crate::manifest::{NodeRecord, Secret};
use crate::phase::Phase;

/// Column order of the tabular manifest.
const MANIFEST_HEADER: [&str; 8] = [
    "address",
    "username",
    "password",
    "os",
    "role",
    "storage_client",
    "performance_profile",
    "client_name",
];

/// Installation gateway reached over HTTP.
#[derive(Clone)]
pub struct HttpGateway {
    /// HTTP client.
    client: Client,
    /// Base URL, always ending in `/`.
    base_url: Url,
    /// Gateway account.
    username: String,
    /// Gateway account password.
    password: Secret,
}

impl HttpGateway {
    /// Create a gateway client from configuration.
    ///
    /// # Errors
    /// Returns error if the base URL is invalid or the HTTP client cannot be created.
    pub fn new(config: &GatewayConfig) -> Result<Self, GatewayError> {
        if config.base_url.trim().is_empty() {
            return Err(GatewayError::Config("gateway base URL is empty".to_string()));
        }

        let mut base_url = Url::parse(config.base_url.trim())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .build()?;

        Ok(Self {
            client,
            base_url,
            username: config.username.clone(),
            password: config.password.clone(),
        })
    }

    /// Base URL requests are resolved against.
    #[must_use]
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url, GatewayError> {
        Ok(self.base_url.join(path)?)
    }

    /// Make an authenticated POST request with a JSON body.
    async fn post_json<B: serde::Serialize + Sync>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<GatewayStatus, GatewayError> {
        let url = self.url(path)?;
        debug!(url = %url, "POST request");

        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(self.password.expose()))
            .json(body)
            .send()
            .await?;

        Self::to_status(response).await
    }

    /// Make an authenticated POST request without a body.
    async fn post_empty(&self, path: &str) -> Result<GatewayStatus, GatewayError> {
        let url = self.url(path)?;
        debug!(url = %url, "POST request (no body)");

        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(self.password.expose()))
            .send()
            .await?;

        Self::to_status(response).await
    }

    /// Turn any HTTP response into a gateway status.
    ///
    /// The envelope's code wins over the HTTP status; bodies that are not an
    /// envelope are reported verbatim with the HTTP status.
    async fn to_status(response: Response) -> Result<GatewayStatus, GatewayError> {
        let http_status = response.status().as_u16();
        let text = response.text().await?;

        match serde_json::from_str::<ApiEnvelope>(&text) {
            Ok(envelope) => Ok(GatewayStatus {
                code: envelope.code.unwrap_or(http_status),
                message: envelope.message,
                error_code: envelope.error_code,
            }),
            Err(_) => Ok(GatewayStatus {
                code: http_status,
                message: text,
                error_code: None,
            }),
        }
    }
}

/// Render node records as the gateway's CSV manifest.
///
/// # Errors
/// Returns error if a record cannot be written.
pub fn render_manifest_csv(nodes: &[NodeRecord]) -> Result<Vec<u8>, GatewayError> {
    let mut writer = csv::WriterBuilder::new().from_writer(Vec::new());
    writer.write_record(MANIFEST_HEADER)?;

    for node in nodes {
        let storage_client = if node.storage_client { "yes" } else { "no" };
        writer.write_record([
            node.address.as_str(),
            node.username.as_str(),
            node.password.expose(),
            node.os.as_str(),
            node.role.as_str(),
            storage_client,
            node.performance_profile.as_str(),
            node.client_name.as_str(),
        ])?;
    }

    writer
        .into_inner()
        .map_err(|e| GatewayError::Csv(e.into_error().into()))
}

#[async_trait]
impl Gateway for HttpGateway {
    async fn abort_operation(&self) -> Result<GatewayStatus, GatewayError> {
        self.post_empty("installer/abort").await
    }

    async fn clear_queue(&self) -> Result<GatewayStatus, GatewayError> {
        self.post_empty("installer/queue/clear").await
    }

    async fn move_to_idle(&self) -> Result<GatewayStatus, GatewayError> {
        self.post_empty("installer/phase/idle").await
    }

    async fn validate_credentials(
        &self,
        check: &CredentialCheck,
    ) -> Result<GatewayStatus, GatewayError> {
        info!(
            admin_user = %check.admin_user,
            management_ips = ?check.management_ips,
            "Validating cluster credentials"
        );
        self.post_json("installer/credentials/validate", check).await
    }

    async fn begin_installation(
        &self,
        req: &BeginInstallation,
    ) -> Result<GatewayStatus, GatewayError> {
        info!(manifest = %req.manifest, "Beginning installation");

        let body = BeginInstallBody {
            manifest_token: req.manifest.as_str(),
            admin_password: req.admin_password.expose(),
            agent_password: req.agent_password.expose(),
        };
        self.post_json("installer/install", &body).await
    }

    async fn check_phase(&self, phase: Phase) -> Result<PhaseReport, GatewayError> {
        let url = self.url(&format!("installer/phase/{phase}/status"))?;
        debug!(url = %url, "GET request");

        let response = self
            .client
            .get(url)
            .basic_auth(&self.username, Some(self.password.expose()))
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(GatewayError::Api {
                status: status.as_u16(),
                message: text,
            });
        }

        let parsed: PhaseStatusResponse = serde_json::from_str(&text).map_err(|e| {
            warn!(error = %e, body = %text, "Failed to parse phase status");
            GatewayError::Serialization(e)
        })?;

        Ok(PhaseReport {
            status: parsed.status,
            message: parsed.message,
            installed_clients: parsed.installed_clients,
        })
    }

    async fn advance_phase(&self, phase: Phase) -> Result<GatewayStatus, GatewayError> {
        self.post_empty(&format!("installer/phase/{phase}/advance"))
            .await
    }

    async fn retry_phase(&self, phase: Phase) -> Result<GatewayStatus, GatewayError> {
        self.post_empty(&format!("installer/phase/{phase}/retry"))
            .await
    }
}

#[async_trait]
impl ManifestBuilder for HttpGateway {
    async fn build_and_submit(&self, nodes: &[NodeRecord]) -> Result<ManifestToken, GatewayError> {
        let url = self.url("installer/manifest")?;
        let body = render_manifest_csv(nodes)?;
        info!(nodes = nodes.len(), "Submitting node manifest");

        let response = self
            .client
            .post(url)
            .basic_auth(&self.username, Some(self.password.expose()))
            .header("Content-Type", "text/csv")
            .body(body)
            .send()
            .await?;

        let http_status = response.status().as_u16();
        let text = response.text().await?;

        let parsed: ManifestUploadResponse =
            serde_json::from_str(&text).map_err(|_| GatewayError::Api {
                status: http_status,
                message: text.clone(),
            })?;

        let code = parsed.code.unwrap_or(http_status);
        match parsed.token {
            Some(token) if code == STATUS_OK && !token.is_empty() => {
                info!(token = %token, "Manifest accepted");
                Ok(ManifestToken(token))
            }
            _ => Err(GatewayError::Api {
                status: code,
                message: parsed.message,
            }),
        }
    }
}
