//! Taxonomy engine.
//!
//! [`Taxonomy`] owns the rules of the graph: it mutates nodes and
//! connections through a [`GraphStore`] and keeps the derived contexts and
//! quality aggregates in step within the same transaction.
//!
//! Operations are spread over one file per concern, each adding an
//! `impl Taxonomy` block:
//! - `connection`: connect, disconnect, update and connection queries
//! - `quality`: aggregate propagation and rebuilds
//! - `linearize`: ordered subtree listing
//! - `snapshot`: whole-version capture

pub mod connection;
mod context;
pub mod integrity;
pub mod linearize;
pub mod notify;
mod quality;
pub mod rank;
mod snapshot;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use taxograph_core::{
    Connection, Context, EdgeId, Grade, GradeAverage, GraphStore, Node, NodeId, TaxonomyError,
    TaxonomyResult, Transaction, VersionId,
};
use taxograph_storage::MemoryGraphStore;

use crate::config::TaxonomyConfig;
use connection::disconnect_in;
use context::ContextPass;
use notify::{ChangeKind, EditorialNotifier, NoopNotifier, StructuralChange};

pub use connection::{ConnectOptions, ConnectionUpdate};
pub use integrity::PrimaryOutcome;
pub use linearize::{linearize, ConnectionSortable, Sortable};
pub use snapshot::TaxonomySnapshot;

pub(crate) fn require_node(txn: &dyn Transaction, id: &NodeId) -> TaxonomyResult<Node> {
    txn.get_node(id)?
        .ok_or_else(|| TaxonomyError::not_found(format!("node {}", id)))
}

pub(crate) fn require_edge(txn: &dyn Transaction, id: &EdgeId) -> TaxonomyResult<Connection> {
    txn.get_edge(id)?
        .ok_or_else(|| TaxonomyError::not_found(format!("connection {}", id)))
}

pub(crate) fn too_many_levels() -> TaxonomyError {
    TaxonomyError::invalid_argument("too many levels")
}

/// Field changes for an existing node. Absent fields are untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeUpdate {
    /// New display name.
    pub name: Option<String>,
    /// New visibility.
    pub visible: Option<bool>,
    /// New context-root flag.
    pub context_root: Option<bool>,
}

/// The taxonomy engine over a graph store.
pub struct Taxonomy<S: GraphStore> {
    store: Arc<S>,
    config: TaxonomyConfig,
    notifier: Arc<dyn EditorialNotifier>,
}

impl Taxonomy<MemoryGraphStore> {
    /// An engine over a fresh in-memory store with default config.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryGraphStore::new()))
    }
}

impl<S: GraphStore> Taxonomy<S> {
    /// Create an engine with default config and no notifications.
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            config: TaxonomyConfig::default(),
            notifier: Arc::new(NoopNotifier),
        }
    }

    /// Create an engine with the given config.
    ///
    /// Fails with [`TaxonomyError::Config`] when the config does not
    /// validate.
    pub fn with_config(store: Arc<S>, config: TaxonomyConfig) -> TaxonomyResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            ..Self::new(store)
        })
    }

    /// Replace the editorial notifier.
    pub fn with_notifier(mut self, notifier: Arc<dyn EditorialNotifier>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Active configuration.
    pub fn config(&self) -> &TaxonomyConfig {
        &self.config
    }

    /// Underlying store.
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The configured default version.
    pub fn default_version(&self) -> VersionId {
        self.config.default_version_id()
    }

    /// Send committed changes to the notifier. Failures are logged only.
    fn publish(
        &self,
        version: &VersionId,
        kind: ChangeKind,
        connections: impl IntoIterator<Item = Connection>,
    ) {
        for connection in connections {
            let change = StructuralChange::new(version.clone(), kind, connection);
            if let Err(e) = self.notifier.notify(&change) {
                tracing::warn!(
                    version = %version,
                    connection = %change.connection.id,
                    error = %e,
                    "editorial notification failed"
                );
            }
        }
    }

    // =========================================================================
    // Node lifecycle
    // =========================================================================

    /// Insert a new node and materialize its root context if it has one.
    ///
    /// Derived fields (contexts, aggregates) on the input are discarded.
    pub fn add_node(&self, version: &VersionId, node: Node) -> TaxonomyResult<Node> {
        if node.id.as_str().is_empty() {
            return Err(TaxonomyError::invalid_argument("node id must not be empty"));
        }
        if node.quality_grade.is_some() && !node.node_type.is_leaf() {
            return Err(TaxonomyError::invalid_argument(format!(
                "{} is not a leaf and cannot carry a grade",
                node.id
            )));
        }

        let config = &self.config;
        self.store.transaction(version, |txn| {
            if txn.get_node(&node.id)?.is_some() {
                return Err(TaxonomyError::invalid_argument(format!(
                    "node {} already exists",
                    node.id
                )));
            }

            let mut node = node;
            node.contexts.clear();
            node.context_ids.clear();
            node.child_quality_average = None;
            let id = node.id.clone();
            txn.put_node(node)?;

            ContextPass::new(config).update(txn, &id)?;
            tracing::debug!(version = %version, node = %id, "node added");
            require_node(txn, &id)
        })
    }

    /// Change name, visibility and/or context-root flag, then rebuild the
    /// contexts of the node and everything below it.
    pub fn update_node(
        &self,
        version: &VersionId,
        id: &NodeId,
        update: NodeUpdate,
    ) -> TaxonomyResult<Node> {
        let config = &self.config;
        self.store.transaction(version, |txn| {
            let mut node = require_node(txn, id)?;
            if let Some(name) = update.name {
                node.name = name;
            }
            if let Some(visible) = update.visible {
                node.visible = visible;
            }
            if let Some(context_root) = update.context_root {
                node.context_root = context_root;
            }
            txn.put_node(node)?;

            let mut pass = ContextPass::new(config);
            pass.update(txn, id)?;
            tracing::debug!(
                version = %version,
                node = %id,
                rebuilt = pass.rebuilt_count(),
                "node updated"
            );
            require_node(txn, id)
        })
    }

    /// Set or clear the grade of a leaf and propagate the change to every
    /// ancestor.
    pub fn set_grade(
        &self,
        version: &VersionId,
        id: &NodeId,
        grade: Option<Grade>,
    ) -> TaxonomyResult<Node> {
        let config = &self.config;
        self.store.transaction(version, |txn| {
            let mut node = require_node(txn, id)?;
            if !node.node_type.is_leaf() {
                return Err(TaxonomyError::invalid_argument(format!(
                    "{} is not a leaf and cannot carry a grade",
                    id
                )));
            }

            let old = quality::contribution(&node);
            node.quality_grade = grade;
            let new = quality::contribution(&node);
            txn.put_node(node)?;

            for edge in txn.edges_by_child(id)? {
                quality::propagate(txn, config, &edge.parent, old, new)?;
            }
            tracing::debug!(
                version = %version,
                node = %id,
                grade = ?grade.map(Grade::value),
                "grade set"
            );
            require_node(txn, id)
        })
    }

    /// Disconnect a node from all children and parents, then delete it.
    ///
    /// Returns the removed connections.
    pub fn remove_node(&self, version: &VersionId, id: &NodeId) -> TaxonomyResult<Vec<Connection>> {
        let config = &self.config;
        let removed = self.store.transaction(version, |txn| {
            require_node(txn, id)?;
            let mut ids: Vec<EdgeId> = txn.edges_by_parent(id)?.iter().map(|e| e.id).collect();
            ids.extend(txn.edges_by_child(id)?.iter().map(|e| e.id));

            let removed = ids
                .iter()
                .map(|edge| disconnect_in(txn, config, edge))
                .collect::<TaxonomyResult<Vec<_>>>()?;
            txn.delete_node(id)?;
            tracing::debug!(
                version = %version,
                node = %id,
                connections = removed.len(),
                "node removed"
            );
            Ok(removed)
        })?;
        self.publish(version, ChangeKind::Disconnected, removed.iter().cloned());
        Ok(removed)
    }

    // =========================================================================
    // Queries and repair
    // =========================================================================

    /// Load a node.
    pub fn get_node(&self, version: &VersionId, id: &NodeId) -> TaxonomyResult<Option<Node>> {
        self.store.transaction(version, |txn| txn.get_node(id))
    }

    /// Current contexts of a node.
    pub fn contexts(&self, version: &VersionId, id: &NodeId) -> TaxonomyResult<Vec<Context>> {
        self.store
            .transaction(version, |txn| Ok(require_node(txn, id)?.contexts))
    }

    /// Grade aggregate of a node: its own grade for a leaf, the aggregate
    /// of its subtree for a branch.
    pub fn quality_average(
        &self,
        version: &VersionId,
        id: &NodeId,
    ) -> TaxonomyResult<Option<GradeAverage>> {
        self.store
            .transaction(version, |txn| Ok(quality::contribution(&require_node(txn, id)?)))
    }

    /// Rebuild the contexts of a node and everything below it. Safe to
    /// re-run. Returns the number of nodes rewritten.
    pub fn refresh_contexts(&self, version: &VersionId, id: &NodeId) -> TaxonomyResult<usize> {
        let config = &self.config;
        self.store.transaction(version, |txn| {
            require_node(txn, id)?;
            let mut pass = ContextPass::new(config);
            pass.update(txn, id)?;
            Ok(pass.rebuilt_count())
        })
    }
}

impl<S: GraphStore> std::fmt::Debug for Taxonomy<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Taxonomy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
