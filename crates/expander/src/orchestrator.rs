//! Expansion entry points.
//!
//! The [`Orchestrator`] wires the pieces together for a full run:
//! 1. Validate the manifest locally
//! 2. Reset the gateway queue
//! 3. Submit the node manifest
//! 4. Validate cluster credentials
//! 5. Drive the phases to completion
//!
//! The gateway queue is reset again on every exit path once the gateway has
//! been touched.

use std::sync::Arc;

use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, info_span, Instrument};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::SequencerConfig;
use crate::credentials;
use crate::gateway::{Gateway, GatewayError, GatewayStatus, ManifestBuilder, ManifestToken};
use crate::manifest::{Manifest, ManifestError};
use crate::outcome::{FailureKind, OrchestrationResult, RunStats};
use crate::queue::{self, finish_with_reset, QueueResetError};
use crate::sequencer::PhaseSequencer;

/// Errors from the standalone orchestrator operations.
#[derive(Error, Debug)]
pub enum OrchestratorError {
    /// Manifest failed local validation.
    #[error("invalid manifest: {0}")]
    Manifest(#[from] ManifestError),

    /// Gateway could not be reached.
    #[error("gateway error: {0}")]
    Gateway(#[from] GatewayError),

    /// Queue reset did not complete.
    #[error(transparent)]
    QueueReset(#[from] QueueResetError),
}

/// Pre-flight failure before the phase loop.
struct Preflight {
    kind: FailureKind,
    message: String,
}

impl Preflight {
    fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Runs cluster expansions against one gateway.
#[derive(Clone)]
pub struct Orchestrator {
    gateway: Arc<dyn Gateway>,
    builder: Arc<dyn ManifestBuilder>,
    sequencer: PhaseSequencer,
}

impl Orchestrator {
    /// Create an orchestrator with default polling settings.
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>, builder: Arc<dyn ManifestBuilder>) -> Self {
        let sequencer = PhaseSequencer::new(gateway.clone());
        Self {
            gateway,
            builder,
            sequencer,
        }
    }

    /// Use a different clock for the polling loop.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.sequencer = self.sequencer.with_clock(clock);
        self
    }

    /// Apply polling settings.
    #[must_use]
    pub fn with_settings(mut self, settings: &SequencerConfig) -> Self {
        self.sequencer = self.sequencer.with_settings(settings);
        self
    }

    /// Check the manifest's cluster credentials without installing anything.
    ///
    /// # Errors
    /// Returns an error if the manifest is invalid or the gateway is unreachable.
    pub async fn check_credentials(
        &self,
        manifest: &Manifest,
    ) -> Result<GatewayStatus, OrchestratorError> {
        manifest.validate()?;
        Ok(credentials::validate_credentials(self.gateway.as_ref(), manifest).await?)
    }

    /// Reset the gateway queue.
    ///
    /// # Errors
    /// Returns the reset step that failed.
    pub async fn reset_queue(&self) -> Result<(), QueueResetError> {
        queue::reset_gateway_queue(self.gateway.as_ref()).await
    }

    /// Run a full expansion.
    ///
    /// Never returns early without a result; cancellation through `cancel`
    /// ends the run as [`FailureKind::Cancelled`] after cleanup.
    pub async fn expand(
        &self,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> OrchestrationResult {
        let stats = RunStats::new(Uuid::new_v4());
        let span = info_span!("expansion", run_id = %stats.run_id, nodes = manifest.nodes.len());

        async move {
            if let Err(e) = manifest.validate() {
                return OrchestrationResult::failed(
                    FailureKind::InvalidManifest,
                    e.to_string(),
                    None,
                    stats,
                );
            }
            if cancel.is_cancelled() {
                return OrchestrationResult::failed(
                    FailureKind::Cancelled,
                    "run cancelled before start",
                    None,
                    stats,
                );
            }

            if let Err(e) = self.reset_queue().await {
                let failed = OrchestrationResult::failed(
                    FailureKind::QueueReset,
                    e.to_string(),
                    None,
                    stats,
                );
                return finish_with_reset(self.gateway.as_ref(), failed).await;
            }

            match self.preflight(manifest, cancel).await {
                Ok(token) => {
                    self.sequencer
                        .run_with_stats(manifest, &token, cancel, stats)
                        .await
                }
                Err(failure) => {
                    finish_with_reset(
                        self.gateway.as_ref(),
                        OrchestrationResult::failed(failure.kind, failure.message, None, stats),
                    )
                    .await
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Submit the manifest and validate credentials.
    async fn preflight(
        &self,
        manifest: &Manifest,
        cancel: &CancellationToken,
    ) -> Result<ManifestToken, Preflight> {
        let token = self
            .builder
            .build_and_submit(&manifest.nodes)
            .await
            .map_err(|e| Preflight::new(FailureKind::ManifestRejected, e.to_string()))?;
        info!(token = %token, "Manifest submitted");

        if cancel.is_cancelled() {
            return Err(Preflight::new(
                FailureKind::Cancelled,
                "run cancelled after manifest submission",
            ));
        }

        let status = credentials::validate_credentials(self.gateway.as_ref(), manifest)
            .await
            .map_err(|e| Preflight::new(FailureKind::CredentialsRejected, e.to_string()))?;
        if !status.is_ok() {
            return Err(Preflight::new(
                FailureKind::CredentialsRejected,
                status.describe(),
            ));
        }

        Ok(token)
    }
}
