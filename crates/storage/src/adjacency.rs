//! Adjacency index over connections.
//!
//! Maps each node to the ids of the connections where it is parent and
//! where it is child, so neighbor lookups are O(degree) instead of a scan
//! over every connection in the version.

use rustc_hash::{FxHashMap, FxHashSet};
use taxograph_core::{Connection, EdgeId, NodeId};

/// Parent/child adjacency for a single taxonomy version.
#[derive(Debug, Clone, Default)]
pub struct ConnectionIndex {
    /// parent → ids of connections to its children
    by_parent: FxHashMap<NodeId, FxHashSet<EdgeId>>,
    /// child → ids of connections to its parents
    by_child: FxHashMap<NodeId, FxHashSet<EdgeId>>,
}

impl ConnectionIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a connection.
    pub fn insert(&mut self, edge: &Connection) {
        self.by_parent
            .entry(edge.parent.clone())
            .or_default()
            .insert(edge.id);
        self.by_child
            .entry(edge.child.clone())
            .or_default()
            .insert(edge.id);
    }

    /// Forget a connection. Removing an unknown connection is a no-op.
    pub fn remove(&mut self, edge: &Connection) {
        if let Some(ids) = self.by_parent.get_mut(&edge.parent) {
            ids.remove(&edge.id);
            if ids.is_empty() {
                self.by_parent.remove(&edge.parent);
            }
        }
        if let Some(ids) = self.by_child.get_mut(&edge.child) {
            ids.remove(&edge.id);
            if ids.is_empty() {
                self.by_child.remove(&edge.child);
            }
        }
    }

    /// Ids of connections where `parent` is the parent.
    pub fn children_of<'a>(&'a self, parent: &NodeId) -> impl Iterator<Item = &'a EdgeId> + 'a {
        self.by_parent.get(parent).into_iter().flatten()
    }

    /// Ids of connections where `child` is the child.
    pub fn parents_of<'a>(&'a self, child: &NodeId) -> impl Iterator<Item = &'a EdgeId> + 'a {
        self.by_child.get(child).into_iter().flatten()
    }
}
