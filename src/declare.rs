//! Node self-declaration: projecting the live configuration through a
//! schema and reporting it to the fleet registry.

use std::sync::Arc;

use tracing::info;

use crate::core::{Schema, Snapshot};
use crate::error::Result;
use crate::registry::{Node, NodeCandidate, RegistryApi};
use crate::store::ConfigCell;

/// A node's standing self-declaration.
///
/// Owns the identity (app id, node id, version) and the schema that
/// shapes the declaration payload; reads the configuration from a live
/// [`ConfigCell`] at declaration time, so repeated declarations always
/// report the node's current state.
///
/// # Examples
///
/// ```rust,no_run
/// use driftsync::core::Schema;
/// use driftsync::declare::SelfDeclaration;
/// use driftsync::registry::Registry;
/// use driftsync::store::SnapshotStore;
///
/// # async fn example() -> driftsync::error::Result<()> {
/// let store = SnapshotStore::new();
/// let schema = Schema::parse(r#"{"type": "object", "properties": {}}"#)?;
/// let registry = Registry::new();
///
/// let declaration =
///     SelfDeclaration::new("shop", "node-1", "1.0.0", schema, store.cell("app-settings"));
/// declaration.declare(&registry).await?;
/// # Ok(())
/// # }
/// ```
pub struct SelfDeclaration {
    app_id: String,
    node_id: String,
    version: String,
    schema: Schema,
    cell: Arc<ConfigCell>,
}

impl SelfDeclaration {
    /// Create a declaration bound to a cell.
    pub fn new(
        app_id: impl Into<String>,
        node_id: impl Into<String>,
        version: impl Into<String>,
        schema: Schema,
        cell: Arc<ConfigCell>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            node_id: node_id.into(),
            version: version.into(),
            schema,
            cell,
        }
    }

    /// Build the declaration payload from the cell's current snapshot.
    ///
    /// # Errors
    ///
    /// Fails when the snapshot cannot be projected through the schema;
    /// that is a local data problem and is never retried.
    pub fn candidate(&self) -> Result<NodeCandidate> {
        let snapshot = self
            .cell
            .get()
            .unwrap_or_else(|| Arc::new(Snapshot::empty()));
        let configuration = self.schema.project(&snapshot)?;

        Ok(NodeCandidate {
            schema: self.schema.as_value().clone(),
            configuration,
            version: self.version.clone(),
            time_to_live_seconds: None,
        })
    }

    /// Declare this node to a registry.
    pub async fn declare(&self, registry: &dyn RegistryApi) -> Result<Node> {
        let candidate = self.candidate()?;
        info!(
            app_id = %self.app_id,
            node_id = %self.node_id,
            version = %self.version,
            "Self-declaring node"
        );
        registry
            .put_node(&self.app_id, &self.node_id, candidate)
            .await
    }
}
