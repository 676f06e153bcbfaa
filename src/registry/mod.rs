//! Fleet registry: canonical schema/configuration records per application
//! and drift status for every self-declaring node.

#[cfg(feature = "http")]
mod client;
mod protocol;

#[cfg(feature = "http")]
pub use client::RegistryClient;
pub use protocol::{
    App, AppChanges, AppCollection, AppSummary, Node, NodeCandidate, NodeState, NodeStatus,
};

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::Value;
use tracing::{debug, info};

use crate::core::is_newer_or_equal;
use crate::error::{Result, SyncError};

/// The registration protocol, as seen by a declaring node.
///
/// Implemented by the in-process [`Registry`] and, behind the `http`
/// feature, by [`RegistryClient`] speaking to a remote registry.
#[async_trait]
pub trait RegistryApi: Send + Sync {
    /// Register or refresh a node's self-declaration.
    async fn put_node(&self, app_id: &str, node_id: &str, candidate: NodeCandidate)
    -> Result<Node>;

    /// Fetch a single node record.
    async fn get_node(&self, app_id: &str, node_id: &str) -> Result<Node>;

    /// Fetch the application view with per-node drift status.
    async fn get_app(&self, app_id: &str) -> Result<App>;

    /// Authoritatively overwrite the canonical configuration.
    async fn put_configuration(&self, app_id: &str, configuration: Value) -> Result<App>;
}

/// Canonical normalized serialization used for structural equivalence.
///
/// `serde_json` stores object keys sorted (no `preserve_order`), so two
/// documents that differ only in key order serialize identically. Value
/// encoding is deliberately not normalized: `1.0` and `1` register as
/// drift.
fn canonical(value: &Value) -> String {
    value.to_string()
}

struct SchemeRecord {
    version: String,
    schema: Value,
}

struct NodeRecord {
    id: String,
    app_id: String,
    version: String,
    schema: Value,
    configuration: Value,
    expires_at: DateTime<Utc>,
}

impl NodeRecord {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    fn to_wire(&self) -> Node {
        Node {
            id: self.id.clone(),
            app_id: self.app_id.clone(),
            version: self.version.clone(),
            schema: self.schema.clone(),
            configuration: self.configuration.clone(),
            expires_at: self.expires_at,
        }
    }
}

#[derive(Default)]
struct AppState {
    scheme: Option<SchemeRecord>,
    configuration: Option<Value>,
    name: Option<String>,
    nodes: HashMap<String, NodeRecord>,
}

/// In-memory fleet registry.
///
/// Holds one canonical schema (resolved by newest-or-equal version) and
/// one canonical configuration (first writer wins, overridable through
/// [`put_configuration`]) per application, plus the ephemeral node
/// records used for drift reporting. Every operation is a single atomic
/// read-modify-write; there is no cross-operation transactionality.
///
/// [`put_configuration`]: Registry::put_configuration
pub struct Registry {
    apps: Arc<Mutex<HashMap<String, AppState>>>,
    node_ttl: Duration,
}

/// Node records disappear this long after their last declaration unless
/// the candidate overrides it.
const DEFAULT_NODE_TTL_SECONDS: i64 = 10;

impl Registry {
    /// Create an empty registry with the default node TTL.
    pub fn new() -> Self {
        Self {
            apps: Arc::new(Mutex::new(HashMap::new())),
            node_ttl: Duration::seconds(DEFAULT_NODE_TTL_SECONDS),
        }
    }

    /// Override the default node record lifetime.
    pub fn with_node_ttl(mut self, ttl: Duration) -> Self {
        self.node_ttl = ttl;
        self
    }

    /// Register or refresh a node, updating canonical records as needed.
    ///
    /// The node record is overwritten wholesale with a fresh expiry. The
    /// canonical schema is replaced only when the candidate's version is
    /// newer than or equal to the current one (ties favor the candidate,
    /// so re-declaring an unbumped version still picks up schema edits).
    /// The canonical configuration is seeded only if absent.
    pub fn put_node(&self, app_id: &str, node_id: &str, candidate: NodeCandidate) -> Result<Node> {
        let now = Utc::now();
        let ttl = candidate
            .time_to_live_seconds
            .map(Duration::seconds)
            .unwrap_or(self.node_ttl);

        let mut apps = self.apps.lock().unwrap();
        let app = apps.entry(app_id.to_string()).or_default();

        let record = NodeRecord {
            id: node_id.to_string(),
            app_id: app_id.to_string(),
            version: candidate.version.clone(),
            schema: candidate.schema.clone(),
            configuration: candidate.configuration.clone(),
            expires_at: now + ttl,
        };
        let wire = record.to_wire();
        app.nodes.insert(node_id.to_string(), record);

        let replace_schema = match &app.scheme {
            None => true,
            Some(current) => is_newer_or_equal(&candidate.version, &current.version),
        };
        if replace_schema {
            info!(app_id, version = %candidate.version, "Updating canonical schema");
            app.scheme = Some(SchemeRecord {
                version: candidate.version,
                schema: candidate.schema,
            });
        } else {
            // Candidate is older; silently keep the canonical schema.
            debug!(app_id, version = %wire.version, "Ignoring stale schema version");
        }

        if app.configuration.is_none() {
            info!(app_id, node_id, "Seeding canonical configuration");
            app.configuration = Some(candidate.configuration);
        }

        Ok(wire)
    }

    /// Fetch a node record, treating expired records as absent.
    pub fn get_node(&self, app_id: &str, node_id: &str) -> Result<Node> {
        let now = Utc::now();
        let mut apps = self.apps.lock().unwrap();
        let app = apps.get_mut(app_id).ok_or_else(|| SyncError::NodeNotFound {
            app_id: app_id.to_string(),
            node_id: node_id.to_string(),
        })?;

        match app.nodes.get(node_id) {
            Some(record) if !record.is_expired(now) => Ok(record.to_wire()),
            Some(_) => {
                app.nodes.remove(node_id);
                Err(SyncError::NodeNotFound {
                    app_id: app_id.to_string(),
                    node_id: node_id.to_string(),
                })
            }
            None => Err(SyncError::NodeNotFound {
                app_id: app_id.to_string(),
                node_id: node_id.to_string(),
            }),
        }
    }

    /// Explicitly remove a node record, returning its last state.
    pub fn delete_node(&self, app_id: &str, node_id: &str) -> Result<Node> {
        let mut apps = self.apps.lock().unwrap();
        let app = apps.get_mut(app_id).ok_or_else(|| SyncError::NodeNotFound {
            app_id: app_id.to_string(),
            node_id: node_id.to_string(),
        })?;

        app.nodes
            .remove(node_id)
            .map(|record| record.to_wire())
            .ok_or_else(|| SyncError::NodeNotFound {
                app_id: app_id.to_string(),
                node_id: node_id.to_string(),
            })
    }

    /// Assemble the application view.
    ///
    /// Fails with [`SyncError::AppNotFound`] unless both a canonical
    /// schema and a canonical configuration exist. Expired node records
    /// are purged; a node still inside its TTL window counts toward drift
    /// reporting even if it has gone silent.
    pub fn get_app(&self, app_id: &str) -> Result<App> {
        let now = Utc::now();
        let mut apps = self.apps.lock().unwrap();
        let app = apps.get_mut(app_id).ok_or_else(|| SyncError::AppNotFound {
            app_id: app_id.to_string(),
        })?;

        Self::build_app_view(app_id, app, now)
    }

    /// Authoritatively overwrite the canonical configuration and return
    /// the refreshed application view.
    pub fn put_configuration(&self, app_id: &str, configuration: Value) -> Result<App> {
        let now = Utc::now();
        let mut apps = self.apps.lock().unwrap();
        let app = apps.entry(app_id.to_string()).or_default();

        info!(app_id, "Overwriting canonical configuration");
        app.configuration = Some(configuration);

        Self::build_app_view(app_id, app, now)
    }

    /// Fetch the canonical configuration document alone.
    pub fn get_configuration(&self, app_id: &str) -> Result<Value> {
        let apps = self.apps.lock().unwrap();
        apps.get(app_id)
            .and_then(|app| app.configuration.clone())
            .ok_or_else(|| SyncError::AppNotFound {
                app_id: app_id.to_string(),
            })
    }

    /// List every application that has a canonical schema.
    pub fn list_apps(&self) -> AppCollection {
        let apps = self.apps.lock().unwrap();
        let mut items: Vec<AppSummary> = apps
            .iter()
            .filter(|(_, state)| state.scheme.is_some())
            .map(|(id, state)| AppSummary {
                id: id.clone(),
                name: state.name.clone().unwrap_or_else(|| id.clone()),
            })
            .collect();
        items.sort_by(|a, b| a.id.cmp(&b.id));

        AppCollection {
            count: items.len(),
            items,
        }
    }

    /// Update mutable application attributes.
    pub fn patch_app(&self, app_id: &str, changes: AppChanges) -> AppSummary {
        let mut apps = self.apps.lock().unwrap();
        let app = apps.entry(app_id.to_string()).or_default();

        let name = changes.name.unwrap_or_else(|| app_id.to_string());
        app.name = Some(name.clone());

        AppSummary {
            id: app_id.to_string(),
            name,
        }
    }

    fn build_app_view(app_id: &str, app: &mut AppState, now: DateTime<Utc>) -> Result<App> {
        let not_found = || SyncError::AppNotFound {
            app_id: app_id.to_string(),
        };
        let scheme = app.scheme.as_ref().ok_or_else(not_found)?;
        let configuration = app.configuration.as_ref().ok_or_else(not_found)?;

        app.nodes.retain(|_, record| !record.is_expired(now));

        let canonical_form = canonical(configuration);
        let nodes: BTreeMap<String, NodeState> = app
            .nodes
            .values()
            .map(|record| {
                let status = if canonical(&record.configuration) == canonical_form {
                    NodeStatus::Synced
                } else {
                    NodeStatus::NotSynced
                };
                (record.id.clone(), NodeState { status })
            })
            .collect();

        Ok(App {
            id: app_id.to_string(),
            nodes,
            schema: scheme.schema.clone(),
            configuration: configuration.clone(),
        })
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for Registry {
    fn clone(&self) -> Self {
        Self {
            apps: Arc::clone(&self.apps),
            node_ttl: self.node_ttl,
        }
    }
}

#[async_trait]
impl RegistryApi for Registry {
    async fn put_node(
        &self,
        app_id: &str,
        node_id: &str,
        candidate: NodeCandidate,
    ) -> Result<Node> {
        Registry::put_node(self, app_id, node_id, candidate)
    }

    async fn get_node(&self, app_id: &str, node_id: &str) -> Result<Node> {
        Registry::get_node(self, app_id, node_id)
    }

    async fn get_app(&self, app_id: &str) -> Result<App> {
        Registry::get_app(self, app_id)
    }

    async fn put_configuration(&self, app_id: &str, configuration: Value) -> Result<App> {
        Registry::put_configuration(self, app_id, configuration)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(version: &str, configuration: Value) -> NodeCandidate {
        NodeCandidate {
            schema: json!({"type": "object", "properties": {"a": {"type": "integer"}}}),
            configuration,
            version: version.to_string(),
            time_to_live_seconds: None,
        }
    }

    #[test]
    fn test_first_declaration_seeds_canonical_records() {
        let registry = Registry::new();
        registry
            .put_node("shop", "node-1", candidate("1.0.0", json!({"a": 1})))
            .unwrap();

        let app = registry.get_app("shop").unwrap();
        assert_eq!(app.configuration, json!({"a": 1}));
        assert_eq!(app.nodes["node-1"].status, NodeStatus::Synced);
    }

    #[test]
    fn test_get_app_without_records_is_not_found() {
        let registry = Registry::new();
        assert!(matches!(
            registry.get_app("ghost"),
            Err(SyncError::AppNotFound { .. })
        ));
    }

    #[test]
    fn test_equal_version_redeclaration_updates_schema() {
        let registry = Registry::new();
        registry
            .put_node("shop", "node-1", candidate("1.0.0", json!({"a": 1})))
            .unwrap();

        // Same version, edited schema: the tie favors the candidate.
        let mut edited = candidate("1.0.0", json!({"a": 1}));
        edited.schema = json!({"type": "object", "properties": {"b": {"type": "string"}}});
        registry.put_node("shop", "node-2", edited.clone()).unwrap();

        let app = registry.get_app("shop").unwrap();
        assert_eq!(app.schema, edited.schema);
    }

    #[test]
    fn test_older_version_keeps_canonical_schema() {
        let registry = Registry::new();
        let newer = candidate("1.0.0", json!({"a": 1}));
        registry.put_node("shop", "node-1", newer.clone()).unwrap();

        let mut stale = candidate("0.9.0", json!({"a": 1}));
        stale.schema = json!({"type": "object", "properties": {"old": {"type": "string"}}});
        registry.put_node("shop", "node-2", stale).unwrap();

        let app = registry.get_app("shop").unwrap();
        assert_eq!(app.schema, newer.schema);
    }

    #[test]
    fn test_later_declarations_do_not_overwrite_configuration() {
        let registry = Registry::new();
        registry
            .put_node("shop", "node-1", candidate("1.0.0", json!({"a": 1})))
            .unwrap();
        registry
            .put_node("shop", "node-2", candidate("2.0.0", json!({"a": 2})))
            .unwrap();

        let app = registry.get_app("shop").unwrap();
        assert_eq!(app.configuration, json!({"a": 1}));
        assert_eq!(app.nodes["node-1"].status, NodeStatus::Synced);
        assert_eq!(app.nodes["node-2"].status, NodeStatus::NotSynced);
    }

    #[test]
    fn test_put_configuration_overwrites() {
        let registry = Registry::new();
        registry
            .put_node("shop", "node-1", candidate("1.0.0", json!({"a": 1})))
            .unwrap();

        let app = registry.put_configuration("shop", json!({"a": 2})).unwrap();
        assert_eq!(app.configuration, json!({"a": 2}));
        assert_eq!(app.nodes["node-1"].status, NodeStatus::NotSynced);
    }

    #[test]
    fn test_status_normalizes_key_order_but_not_value_encoding() {
        let registry = Registry::new();
        let seed: Value = serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        registry
            .put_node("shop", "node-1", candidate("1.0.0", seed))
            .unwrap();

        // Same pairs, different textual order: still synced.
        let reordered: Value = serde_json::from_str(r#"{"a": 1, "b": 2}"#).unwrap();
        registry
            .put_node("shop", "node-2", candidate("1.0.0", reordered))
            .unwrap();

        // Same numbers, different encoding: drift.
        let reencoded: Value = serde_json::from_str(r#"{"a": 1.0, "b": 2}"#).unwrap();
        registry
            .put_node("shop", "node-3", candidate("1.0.0", reencoded))
            .unwrap();

        let app = registry.get_app("shop").unwrap();
        assert_eq!(app.nodes["node-2"].status, NodeStatus::Synced);
        assert_eq!(app.nodes["node-3"].status, NodeStatus::NotSynced);
    }

    #[test]
    fn test_get_and_delete_node() {
        let registry = Registry::new();
        registry
            .put_node("shop", "node-1", candidate("1.0.0", json!({"a": 1})))
            .unwrap();

        let node = registry.get_node("shop", "node-1").unwrap();
        assert_eq!(node.version, "1.0.0");

        registry.delete_node("shop", "node-1").unwrap();
        assert!(matches!(
            registry.get_node("shop", "node-1"),
            Err(SyncError::NodeNotFound { .. })
        ));
    }

    #[test]
    fn test_expired_node_disappears() {
        let registry = Registry::new().with_node_ttl(Duration::seconds(-1));
        registry
            .put_node("shop", "node-1", candidate("1.0.0", json!({"a": 1})))
            .unwrap();

        assert!(matches!(
            registry.get_node("shop", "node-1"),
            Err(SyncError::NodeNotFound { .. })
        ));
        let app = registry.get_app("shop").unwrap();
        assert!(app.nodes.is_empty());
    }

    #[test]
    fn test_candidate_ttl_override() {
        let registry = Registry::new();
        let mut short_lived = candidate("1.0.0", json!({"a": 1}));
        short_lived.time_to_live_seconds = Some(3600);

        let node = registry.put_node("shop", "node-1", short_lived).unwrap();
        let remaining = node.expires_at - Utc::now();
        assert!(remaining > Duration::seconds(3000));
    }

    #[test]
    fn test_list_and_patch_apps() {
        let registry = Registry::new();
        registry
            .put_node("beta", "n", candidate("1.0.0", json!({})))
            .unwrap();
        registry
            .put_node("alpha", "n", candidate("1.0.0", json!({})))
            .unwrap();

        let listing = registry.list_apps();
        assert_eq!(listing.count, 2);
        assert_eq!(listing.items[0].id, "alpha");
        assert_eq!(listing.items[0].name, "alpha");

        registry.patch_app(
            "alpha",
            AppChanges {
                name: Some("Alpha Shop".to_string()),
            },
        );
        assert_eq!(registry.list_apps().items[0].name, "Alpha Shop");
    }

    #[test]
    fn test_get_configuration() {
        let registry = Registry::new();
        assert!(registry.get_configuration("shop").is_err());

        registry
            .put_node("shop", "node-1", candidate("1.0.0", json!({"a": 1})))
            .unwrap();
        assert_eq!(registry.get_configuration("shop").unwrap(), json!({"a": 1}));
    }
}
