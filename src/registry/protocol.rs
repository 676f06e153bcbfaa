//! Wire types for the fleet registration protocol.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A node's self-declared schema, configuration and version.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeCandidate {
    /// The schema document the node runs against
    pub schema: Value,
    /// The node's locally observed configuration
    pub configuration: Value,
    /// Opaque version string, compared lexicographically
    pub version: String,
    /// Optional per-declaration record lifetime override, in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_to_live_seconds: Option<i64>,
}

/// A node record as returned by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Node id
    pub id: String,
    /// Owning application id
    pub app_id: String,
    /// Version the node declared
    pub version: String,
    /// Schema snapshot the node declared
    pub schema: Value,
    /// Configuration snapshot the node declared
    pub configuration: Value,
    /// When this record stops counting unless re-declared
    pub expires_at: DateTime<Utc>,
}

/// Whether a node's configuration matches the canonical one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeStatus {
    /// Node configuration is structurally equivalent to the canonical one
    #[serde(rename = "synced")]
    Synced,
    /// Node configuration has drifted from the canonical one
    #[serde(rename = "unsynced")]
    NotSynced,
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Synced => write!(f, "synced"),
            Self::NotSynced => write!(f, "unsynced"),
        }
    }
}

/// Per-node derived state inside an [`App`] view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeState {
    /// Computed sync status
    pub status: NodeStatus,
}

/// An application view: canonical records plus every live node's status.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct App {
    /// Application id
    pub id: String,
    /// Live nodes keyed by node id
    pub nodes: BTreeMap<String, NodeState>,
    /// Canonical schema document
    pub schema: Value,
    /// Canonical configuration document
    pub configuration: Value,
}

/// One row of the application listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppSummary {
    /// Application id
    pub id: String,
    /// Display name; defaults to the id until patched
    pub name: String,
}

/// The application listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppCollection {
    /// Number of applications
    pub count: usize,
    /// The applications themselves
    pub items: Vec<AppSummary>,
}

/// Mutable application attributes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppChanges {
    /// New display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
