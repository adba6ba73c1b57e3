//! Phase sequencer.
//!
//! Starts the gateway's installation job and walks it through
//! [`Phase::ALL`] by polling. The sleep before each poll is the only
//! suspension point and is raced against the caller's cancellation token.
//! Each phase is bounded by the [`StallPolicy`]; the run as a whole is not,
//! since install and configure legitimately take as long as the remote side
//! needs.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, TokioClock};
use crate::config::SequencerConfig;
use crate::gateway::{BeginInstallation, Gateway, ManifestToken, PhaseReport};
use crate::manifest::Manifest;
use crate::outcome::{FailureKind, OrchestrationResult, RunStats};
use crate::phase::{Phase, PollStatus};
use crate::policy::{Decision, PhaseProgress, StallPolicy};
use crate::queue::finish_with_reset;

/// Drives one installation run through all phases.
#[derive(Clone)]
pub struct PhaseSequencer {
    gateway: Arc<dyn Gateway>,
    clock: Arc<dyn Clock>,
    policy: StallPolicy,
    poll_interval: Duration,
}

impl PhaseSequencer {
    /// Create a sequencer with default polling settings and the tokio clock.
    #[must_use]
    pub fn new(gateway: Arc<dyn Gateway>) -> Self {
        let settings = SequencerConfig::default();
        Self {
            gateway,
            clock: Arc::new(TokioClock),
            policy: settings.policy(),
            poll_interval: settings.poll_interval(),
        }
    }

    /// Use a different clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Apply polling settings.
    #[must_use]
    pub fn with_settings(mut self, settings: &SequencerConfig) -> Self {
        self.policy = settings.policy();
        self.poll_interval = settings.poll_interval();
        self
    }

    /// Interval between polls.
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    /// Run the installation for an already submitted manifest.
    ///
    /// The gateway queue is reset before returning, whatever the outcome.
    pub async fn run_installation(
        &self,
        manifest: &Manifest,
        token: &ManifestToken,
        cancel: &CancellationToken,
    ) -> OrchestrationResult {
        self.run_with_stats(manifest, token, cancel, RunStats::new(Uuid::new_v4()))
            .await
    }

    pub(crate) async fn run_with_stats(
        &self,
        manifest: &Manifest,
        token: &ManifestToken,
        cancel: &CancellationToken,
        stats: RunStats,
    ) -> OrchestrationResult {
        let result = self.drive(manifest, token, cancel, stats).await;
        finish_with_reset(self.gateway.as_ref(), result).await
    }

    async fn drive(
        &self,
        manifest: &Manifest,
        token: &ManifestToken,
        cancel: &CancellationToken,
        mut stats: RunStats,
    ) -> OrchestrationResult {
        let begin = BeginInstallation {
            manifest: token.clone(),
            admin_password: manifest.credentials.admin_password.clone(),
            agent_password: manifest.credentials.agent_password.clone(),
        };

        if cancel.is_cancelled() {
            return fail(
                FailureKind::Cancelled,
                "run cancelled before installation began".to_string(),
                None,
                stats,
            );
        }

        match self.gateway.begin_installation(&begin).await {
            Ok(status) if status.is_ok() => {}
            Ok(status) => {
                return fail(FailureKind::BeginRejected, status.describe(), None, stats);
            }
            Err(e) => {
                return fail(FailureKind::BeginRejected, e.to_string(), None, stats);
            }
        }

        let mut phase = Phase::FIRST;
        let mut progress = PhaseProgress::default();
        info!(
            phase = %phase,
            step = phase.step_number(),
            total = Phase::ALL.len(),
            "Installation started"
        );

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return fail(
                        FailureKind::Cancelled,
                        format!("run cancelled during {phase} phase"),
                        Some(phase),
                        stats,
                    );
                }
                () = self.clock.sleep(self.poll_interval) => {}
            }

            stats.polls += 1;
            stats.phase_history.push(phase);

            let report = match self.gateway.check_phase(phase).await {
                Ok(report) => report,
                Err(e) => {
                    warn!(phase = %phase, error = %e, "Phase poll failed");
                    PhaseReport::new("error").with_message(e.to_string())
                }
            };
            let status = PollStatus::classify(&report.status);

            debug!(
                phase = %phase,
                raw_status = %report.status,
                status = %status,
                stall_count = progress.stall_count,
                "Polled phase"
            );

            match self.policy.decide(&mut progress, status) {
                Decision::Proceed => {
                    let Some(next) = phase.next() else {
                        info!(
                            installed = report.installed_clients.len(),
                            polls = stats.polls,
                            retries = stats.retries,
                            "All phases completed"
                        );
                        return OrchestrationResult::succeeded(report.installed_clients, stats);
                    };

                    match self.gateway.advance_phase(phase).await {
                        Ok(advanced) if advanced.is_ok() => {
                            stats.advances += 1;
                            info!(
                                from = %phase,
                                to = %next,
                                step = next.step_number(),
                                total = Phase::ALL.len(),
                                "Phase completed"
                            );
                            phase = next;
                        }
                        Ok(refused) => {
                            return fail(
                                FailureKind::AdvanceFailed,
                                refused.describe(),
                                Some(phase),
                                stats,
                            );
                        }
                        Err(e) => {
                            return fail(
                                FailureKind::AdvanceFailed,
                                e.to_string(),
                                Some(phase),
                                stats,
                            );
                        }
                    }
                }
                Decision::Wait => {}
                Decision::Retry => {
                    stats.retries += 1;
                    warn!(
                        phase = %phase,
                        raw_status = %report.status,
                        message = %report.message,
                        "Phase not progressing, retrying once"
                    );
                    match self.gateway.retry_phase(phase).await {
                        Ok(retried) if retried.is_ok() => {}
                        Ok(refused) => warn!(
                            phase = %phase,
                            status = %refused.describe(),
                            "Phase retry refused"
                        ),
                        Err(e) => warn!(phase = %phase, error = %e, "Phase retry failed"),
                    }
                }
                Decision::Stalled => {
                    let mut message = if progress.retry_used {
                        format!("{phase} phase still {} after retry", report.status)
                    } else {
                        format!(
                            "{phase} phase made no progress after {} polls ({}s)",
                            progress.stall_count,
                            self.poll_interval
                                .as_secs()
                                .saturating_mul(u64::from(progress.stall_count))
                        )
                    };
                    if !report.message.is_empty() {
                        message = format!("{message}: {}", report.message);
                    }
                    return fail(FailureKind::StallTimeout, message, Some(phase), stats);
                }
                Decision::RetryExhausted => {
                    let message = if report.message.is_empty() {
                        format!("{phase} phase reported '{}' after retry", report.status)
                    } else {
                        report.message
                    };
                    return fail(FailureKind::StallTimeout, message, Some(phase), stats);
                }
            }
        }
    }
}

fn fail(
    kind: FailureKind,
    message: String,
    phase: Option<Phase>,
    stats: RunStats,
) -> OrchestrationResult {
    error!(kind = %kind, phase = ?phase, message = %message, "Installation failed");
    OrchestrationResult::failed(kind, message, phase, stats)
}
