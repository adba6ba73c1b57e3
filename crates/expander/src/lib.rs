//! Cluster expansion orchestration for storage clusters.
//!
//! This crate drives a remote installation gateway through the phased
//! rollout that adds management, tie-breaker and storage-client nodes to a
//! cluster. The gateway does the actual work; this crate submits the node
//! manifest, validates credentials, polls each phase to completion and always
//! leaves the gateway queue clean afterwards.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//!
//! use expander::{HttpGateway, Orchestrator};
//! use tokio_util::sync::CancellationToken;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let gateway = Arc::new(HttpGateway::new(&config.gateway)?);
//!     let orchestrator = Orchestrator::new(gateway.clone(), gateway);
//!
//!     let result = orchestrator.expand(&manifest, &CancellationToken::new()).await;
//!     if let Some(clients) = result.installed_clients() {
//!         println!("installed: {}", clients.join(", "));
//!     }
//!
//!     Ok(())
//! }
//! ```

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod clock;
pub mod config;
pub mod credentials;
pub mod gateway;
pub mod manifest;
pub mod orchestrator;
pub mod outcome;
pub mod phase;
pub mod policy;
pub mod queue;
pub mod sequencer;

pub use clock::{Clock, TokioClock};
pub use config::{ExpanderConfig, GatewayConfig, SequencerConfig};
pub use gateway::{
    BeginInstallation, CredentialCheck, Gateway, GatewayError, GatewayStatus, HttpGateway,
    ManifestBuilder, ManifestToken, PhaseReport,
};
pub use manifest::{ClusterCredentials, ClusterRole, Manifest, ManifestError, NodeRecord, Secret};
pub use orchestrator::{Orchestrator, OrchestratorError};
pub use outcome::{FailureKind, OrchestrationResult, Outcome, RunStats};
pub use phase::{Phase, PollStatus};
pub use policy::{Decision, PhaseProgress, StallPolicy};
pub use queue::{finish_with_reset, reset_gateway_queue, QueueResetError, ResetStep};
pub use sequencer::PhaseSequencer;
