//! Installation gateway abstractions.
//!
//! The orchestrator only talks to the gateway through the [`Gateway`] and
//! [`ManifestBuilder`] traits. [`HttpGateway`] implements both over the
//! gateway's REST API.

mod client;
mod models;
mod traits;

pub use client::{render_manifest_csv, HttpGateway};
pub use traits::{
    BeginInstallation, Gateway, GatewayError, GatewayStatus, ManifestBuilder, ManifestToken,
    PhaseReport, STATUS_OK,
};

pub use crate::credentials::CredentialCheck;
