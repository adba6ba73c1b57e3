//! Gateway queue recovery.
//!
//! Every run starts and ends with [`reset_gateway_queue`] so the gateway is
//! never left holding work from a previous attempt.

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::gateway::{Gateway, GatewayError, GatewayStatus};
use crate::outcome::OrchestrationResult;

/// Steps of a queue reset, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetStep {
    /// Abort the in-flight operation.
    Abort,
    /// Drop queued commands.
    ClearQueue,
    /// Return the gateway to its idle phase.
    MoveToIdle,
}

impl ResetStep {
    /// All steps in execution order.
    pub const ALL: [ResetStep; 3] = [Self::Abort, Self::ClearQueue, Self::MoveToIdle];
}

impl std::fmt::Display for ResetStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Abort => write!(f, "abort"),
            Self::ClearQueue => write!(f, "clear queue"),
            Self::MoveToIdle => write!(f, "move to idle"),
        }
    }
}

/// A queue reset stopped part-way.
#[derive(Error, Debug)]
pub enum QueueResetError {
    /// Gateway refused a step.
    #[error("queue reset failed at '{step}': {message}")]
    Refused { step: ResetStep, message: String },

    /// Gateway could not be reached for a step.
    #[error("queue reset failed at '{step}': {source}")]
    Unreachable {
        step: ResetStep,
        source: GatewayError,
    },
}

impl QueueResetError {
    /// Step that failed.
    #[must_use]
    pub fn step(&self) -> ResetStep {
        match self {
            Self::Refused { step, .. } | Self::Unreachable { step, .. } => *step,
        }
    }
}

async fn run_step(gateway: &dyn Gateway, step: ResetStep) -> Result<GatewayStatus, GatewayError> {
    match step {
        ResetStep::Abort => gateway.abort_operation().await,
        ResetStep::ClearQueue => gateway.clear_queue().await,
        ResetStep::MoveToIdle => gateway.move_to_idle().await,
    }
}

/// Abort running work, clear queued work and return the gateway to idle.
///
/// Stops at the first step that fails; a half-reset gateway is reported as
/// an error naming that step. Safe to call against an idle gateway.
///
/// # Errors
/// Returns the first failing step.
pub async fn reset_gateway_queue(gateway: &dyn Gateway) -> Result<(), QueueResetError> {
    for step in ResetStep::ALL {
        let status = run_step(gateway, step)
            .await
            .map_err(|source| QueueResetError::Unreachable { step, source })?;

        if !status.is_ok() {
            return Err(QueueResetError::Refused {
                step,
                message: status.describe(),
            });
        }
        debug!(step = %step, "Queue reset step done");
    }

    info!("Gateway queue reset");
    Ok(())
}

/// Reset the gateway queue after a run and hand back its result.
///
/// A failed reset is logged and recorded in `cleanup_error`; the run's own
/// outcome is never replaced.
pub async fn finish_with_reset(
    gateway: &dyn Gateway,
    mut result: OrchestrationResult,
) -> OrchestrationResult {
    if let Err(e) = reset_gateway_queue(gateway).await {
        warn!(error = %e, success = result.is_success(), "Post-run queue reset failed");
        result.cleanup_error = Some(e.to_string());
    }
    result
}
