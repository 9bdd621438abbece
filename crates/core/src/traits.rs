//! Storage traits consumed by the engine.
//!
//! The engine only talks to these traits; `taxograph-storage` ships the
//! in-memory implementation.

use crate::error::TaxonomyResult;
use crate::types::{Connection, EdgeId, Node, NodeId, VersionId};

/// One atomic unit of work against a single taxonomy version.
///
/// Reads observe the transaction's own uncommitted writes. Nothing is
/// visible to other callers until the enclosing
/// [`GraphStore::transaction`] closure returns `Ok`.
pub trait Transaction {
    /// Version this transaction is bound to.
    fn version(&self) -> &VersionId;

    /// Load a node.
    fn get_node(&self, id: &NodeId) -> TaxonomyResult<Option<Node>>;

    /// Insert or replace a node.
    fn put_node(&mut self, node: Node) -> TaxonomyResult<()>;

    /// Delete a node. Deleting a missing node is a no-op.
    fn delete_node(&mut self, id: &NodeId) -> TaxonomyResult<()>;

    /// Ids of every node, sorted ascending.
    fn node_ids(&self) -> TaxonomyResult<Vec<NodeId>>;

    /// Load a connection.
    fn get_edge(&self, id: &EdgeId) -> TaxonomyResult<Option<Connection>>;

    /// Insert or replace a connection.
    fn put_edge(&mut self, edge: Connection) -> TaxonomyResult<()>;

    /// Delete a connection. Deleting a missing connection is a no-op.
    fn delete_edge(&mut self, id: &EdgeId) -> TaxonomyResult<()>;

    /// Connections whose parent is `parent`, ordered by (rank, id).
    fn edges_by_parent(&self, parent: &NodeId) -> TaxonomyResult<Vec<Connection>>;

    /// Connections whose child is `child`, ordered by (rank, id).
    fn edges_by_child(&self, child: &NodeId) -> TaxonomyResult<Vec<Connection>>;
}

/// A store of independent taxonomy versions.
pub trait GraphStore: Send + Sync {
    /// Run `f` as one atomic unit of work on `version`.
    ///
    /// If `f` returns `Err`, none of its writes are applied.
    fn transaction<T, F>(&self, version: &VersionId, f: F) -> TaxonomyResult<T>
    where
        F: FnOnce(&mut dyn Transaction) -> TaxonomyResult<T>;
}
