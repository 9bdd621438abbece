//! Whole-version snapshots.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use taxograph_core::{
    Connection, GraphStore, Node, NodeId, TaxonomyResult, VersionId,
};

use super::Taxonomy;

/// Every node and connection of one version at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaxonomySnapshot {
    /// Version the snapshot was taken from.
    pub version: VersionId,
    /// Nodes by id.
    pub nodes: BTreeMap<NodeId, Node>,
    /// Connections, ordered by parent then (rank, id).
    pub connections: Vec<Connection>,
}

impl TaxonomySnapshot {
    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of connections.
    pub fn edge_count(&self) -> usize {
        self.connections.len()
    }

    /// Pretty-printed JSON.
    pub fn to_json(&self) -> TaxonomyResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a snapshot produced by [`TaxonomySnapshot::to_json`].
    pub fn from_json(json: &str) -> TaxonomyResult<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

impl<S: GraphStore> Taxonomy<S> {
    /// Capture every node and connection of `version`.
    pub fn snapshot(&self, version: &VersionId) -> TaxonomyResult<TaxonomySnapshot> {
        self.store.transaction(version, |txn| {
            let mut nodes = BTreeMap::new();
            let mut connections = Vec::new();
            let mut seen = HashSet::new();

            for id in txn.node_ids()? {
                for edge in txn.edges_by_parent(&id)? {
                    if seen.insert(edge.id) {
                        connections.push(edge);
                    }
                }
                if let Some(node) = txn.get_node(&id)? {
                    nodes.insert(id, node);
                }
            }

            Ok(TaxonomySnapshot {
                version: version.clone(),
                nodes,
                connections,
            })
        })
    }
}
