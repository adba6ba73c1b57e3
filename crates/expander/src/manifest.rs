//! Node manifest submitted for one expansion run.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors found while validating a manifest before it reaches the gateway.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// No nodes were listed.
    #[error("manifest contains no nodes")]
    Empty,

    /// Two nodes share an address.
    #[error("duplicate node address: {0}")]
    DuplicateAddress(String),

    /// A node has no address.
    #[error("node #{0} has an empty address")]
    MissingAddress(usize),

    /// No node carries the management role.
    #[error("manifest has no management node")]
    NoManagementNode,

    /// A storage-client node has no client name assigned.
    #[error("storage client {0} has no client name")]
    MissingClientName(String),

    /// A required cluster credential is empty.
    #[error("cluster credential '{0}' is empty")]
    MissingCredential(&'static str),
}

/// A password or similar value that must never show up in logs.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Secret(String);

impl Secret {
    /// Wrap a secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Access the raw value for a request body.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Whether the secret is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Secret {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Debug for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Secret(***)")
    }
}

impl std::fmt::Display for Secret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("***")
    }
}

/// Role a node plays in the cluster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClusterRole {
    /// Primary management node.
    Management,
    /// Quorum tie-breaker.
    TieBreaker,
    /// Standby (secondary) management node.
    Standby,
    /// No cluster role; typically a storage client only.
    #[default]
    None,
}

impl ClusterRole {
    /// Whether nodes with this role expose the management API.
    #[must_use]
    pub fn is_management(self) -> bool {
        matches!(self, Self::Management | Self::Standby)
    }

    /// Name used in the tabular manifest.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Management => "management",
            Self::TieBreaker => "tie_breaker",
            Self::Standby => "standby",
            Self::None => "none",
        }
    }
}

impl std::fmt::Display for ClusterRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Network address the gateway reaches the node on.
    pub address: String,
    /// Login user on the node.
    #[serde(default = "default_node_user")]
    pub username: String,
    /// Login password on the node.
    pub password: Secret,
    /// Operating system label (e.g. "euleros", "centos").
    pub os: String,
    /// Cluster role.
    #[serde(default)]
    pub role: ClusterRole,
    /// Whether the node runs the storage client.
    #[serde(default)]
    pub storage_client: bool,
    /// Performance profile applied by the installer.
    #[serde(default = "default_profile")]
    pub performance_profile: String,
    /// Client name assigned to the node.
    #[serde(default)]
    pub client_name: String,
}

fn default_node_user() -> String {
    "root".to_string()
}

fn default_profile() -> String {
    "default".to_string()
}

impl NodeRecord {
    /// Create a node record with default user, role and profile.
    pub fn new(
        address: impl Into<String>,
        password: impl Into<Secret>,
        os: impl Into<String>,
    ) -> Self {
        Self {
            address: address.into(),
            username: default_node_user(),
            password: password.into(),
            os: os.into(),
            role: ClusterRole::None,
            storage_client: false,
            performance_profile: default_profile(),
            client_name: String::new(),
        }
    }

    /// Set the cluster role.
    #[must_use]
    pub fn with_role(mut self, role: ClusterRole) -> Self {
        self.role = role;
        self
    }

    /// Mark the node as a storage client with the given client name.
    #[must_use]
    pub fn as_storage_client(mut self, client_name: impl Into<String>) -> Self {
        self.storage_client = true;
        self.client_name = client_name.into();
        self
    }

    /// Set the performance profile.
    #[must_use]
    pub fn with_profile(mut self, profile: impl Into<String>) -> Self {
        self.performance_profile = profile.into();
        self
    }
}

/// Cluster-wide management credentials.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterCredentials {
    /// Cluster administrator account.
    #[serde(default = "default_admin_user")]
    pub admin_user: String,
    /// Cluster administrator password.
    pub admin_password: Secret,
    /// Password of the storage-client agent.
    pub agent_password: Secret,
    /// Management IP of the existing cluster.
    pub management_ip: String,
}

fn default_admin_user() -> String {
    "admin".to_string()
}

impl ClusterCredentials {
    /// Create credentials for the default admin account.
    pub fn new(
        admin_password: impl Into<Secret>,
        agent_password: impl Into<Secret>,
        management_ip: impl Into<String>,
    ) -> Self {
        Self {
            admin_user: default_admin_user(),
            admin_password: admin_password.into(),
            agent_password: agent_password.into(),
            management_ip: management_ip.into(),
        }
    }
}

/// Ordered node records plus the credentials for one run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    /// Candidate nodes in submission order.
    pub nodes: Vec<NodeRecord>,
    /// Cluster credentials.
    pub credentials: ClusterCredentials,
}

impl Manifest {
    /// Create a manifest.
    #[must_use]
    pub fn new(nodes: Vec<NodeRecord>, credentials: ClusterCredentials) -> Self {
        Self { nodes, credentials }
    }

    /// Management IPs sent to the gateway for the credential check.
    ///
    /// The configured management IP comes first, followed by the addresses of
    /// management and standby nodes, without duplicates.
    #[must_use]
    pub fn management_ips(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        std::iter::once(self.credentials.management_ip.as_str())
            .chain(
                self.nodes
                    .iter()
                    .filter(|n| n.role.is_management())
                    .map(|n| n.address.as_str()),
            )
            .filter(|ip| !ip.is_empty() && seen.insert(*ip))
            .map(str::to_string)
            .collect()
    }

    /// Nodes that will run the storage client.
    pub fn storage_clients(&self) -> impl Iterator<Item = &NodeRecord> {
        self.nodes.iter().filter(|n| n.storage_client)
    }

    /// Check the manifest before any gateway call is made.
    ///
    /// # Errors
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ManifestError> {
        if self.credentials.management_ip.trim().is_empty() {
            return Err(ManifestError::MissingCredential("management_ip"));
        }
        if self.credentials.admin_password.is_empty() {
            return Err(ManifestError::MissingCredential("admin_password"));
        }
        if self.credentials.agent_password.is_empty() {
            return Err(ManifestError::MissingCredential("agent_password"));
        }
        if self.nodes.is_empty() {
            return Err(ManifestError::Empty);
        }

        let mut addresses = HashSet::new();
        for (index, node) in self.nodes.iter().enumerate() {
            let address = node.address.trim();
            if address.is_empty() {
                return Err(ManifestError::MissingAddress(index));
            }
            if !addresses.insert(address) {
                return Err(ManifestError::DuplicateAddress(address.to_string()));
            }
            if node.storage_client && node.client_name.trim().is_empty() {
                return Err(ManifestError::MissingClientName(address.to_string()));
            }
        }

        if !self.nodes.iter().any(|n| n.role == ClusterRole::Management) {
            return Err(ManifestError::NoManagementNode);
        }

        Ok(())
    }
}
