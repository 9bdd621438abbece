//! Version-sharded in-memory graph store
//!
//! One shard per [`VersionId`], each behind its own mutex. Different
//! versions never contend; writers to the same version are serialized.
//!
//! # Design
//!
//! - DashMap: version → shard, lock-free shard lookup
//! - FxHashMap: O(1) node and connection lookups inside a shard
//! - ConnectionIndex: O(degree) parent/child neighbor queries
//! - Transactions buffer writes and apply them only on success

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use taxograph_core::{
    Connection, EdgeId, GraphStore, Node, NodeId, TaxonomyResult, Transaction, VersionId,
};

use crate::adjacency::ConnectionIndex;
use crate::txn::{MemoryTransaction, WriteSet};

/// All nodes and connections of one taxonomy version.
#[derive(Debug, Default)]
pub struct GraphShard {
    pub(crate) nodes: FxHashMap<NodeId, Node>,
    pub(crate) edges: FxHashMap<EdgeId, Connection>,
    pub(crate) index: ConnectionIndex,
}

impl GraphShard {
    /// Create an empty shard.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of connections.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Apply a committed write set.
    pub(crate) fn apply(&mut self, writes: WriteSet) {
        for (id, pending) in writes.nodes {
            match pending {
                Some(node) => {
                    self.nodes.insert(id, node);
                }
                None => {
                    self.nodes.remove(&id);
                }
            }
        }

        for (id, pending) in writes.edges {
            if let Some(old) = self.edges.remove(&id) {
                self.index.remove(&old);
            }
            if let Some(edge) = pending {
                self.index.insert(&edge);
                self.edges.insert(id, edge);
            }
        }
    }
}

/// In-memory [`GraphStore`] sharded by taxonomy version.
///
/// # Thread Safety
///
/// - Shard lookup: lock-free via DashMap
/// - Transactions: hold only the target version's mutex
/// - Different versions never contend
pub struct MemoryGraphStore {
    shards: DashMap<VersionId, Arc<Mutex<GraphShard>>>,
    /// Count of committed, non-empty transactions across all versions.
    commits: AtomicU64,
}

impl MemoryGraphStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            shards: DashMap::new(),
            commits: AtomicU64::new(0),
        }
    }

    /// Create with an expected number of versions.
    pub fn with_capacity(num_versions: usize) -> Self {
        Self {
            shards: DashMap::with_capacity(num_versions),
            commits: AtomicU64::new(0),
        }
    }

    /// Number of versions that have been touched.
    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Whether a version has been touched.
    pub fn has_version(&self, version: &VersionId) -> bool {
        self.shards.contains_key(version)
    }

    /// Number of committed transactions that wrote something.
    #[inline]
    pub fn commit_count(&self) -> u64 {
        self.commits.load(Ordering::Acquire)
    }

    /// Number of nodes in a version.
    pub fn node_count(&self, version: &VersionId) -> usize {
        self.shards
            .get(version)
            .map(|shard| shard.lock().node_count())
            .unwrap_or(0)
    }

    /// Number of connections in a version.
    pub fn edge_count(&self, version: &VersionId) -> usize {
        self.shards
            .get(version)
            .map(|shard| shard.lock().edge_count())
            .unwrap_or(0)
    }

    /// Drop a whole version. Returns true if it existed.
    pub fn drop_version(&self, version: &VersionId) -> bool {
        self.shards.remove(version).is_some()
    }

    /// Get or create the shard for `version`.
    ///
    /// The DashMap guard is released before the caller locks the shard.
    fn shard(&self, version: &VersionId) -> Arc<Mutex<GraphShard>> {
        if let Some(shard) = self.shards.get(version) {
            return Arc::clone(shard.value());
        }
        let entry = self
            .shards
            .entry(version.clone())
            .or_insert_with(|| Arc::new(Mutex::new(GraphShard::new())));
        Arc::clone(entry.value())
    }
}

impl GraphStore for MemoryGraphStore {
    fn transaction<T, F>(&self, version: &VersionId, f: F) -> TaxonomyResult<T>
    where
        F: FnOnce(&mut dyn Transaction) -> TaxonomyResult<T>,
    {
        let shard = self.shard(version);
        let mut guard = shard.lock();

        let (result, writes) = {
            let mut txn = MemoryTransaction::new(version, &guard);
            let result = f(&mut txn);
            (result, txn.into_writes())
        };

        match result {
            Ok(value) => {
                if !writes.is_empty() {
                    tracing::trace!(version = %version, writes = writes.len(), "commit");
                    guard.apply(writes);
                    self.commits.fetch_add(1, Ordering::AcqRel);
                }
                Ok(value)
            }
            Err(e) => {
                tracing::debug!(
                    version = %version,
                    discarded = writes.len(),
                    error = %e,
                    "transaction rolled back"
                );
                Err(e)
            }
        }
    }
}

impl Default for MemoryGraphStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MemoryGraphStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryGraphStore")
            .field("shard_count", &self.shard_count())
            .field("commits", &self.commit_count())
            .finish()
    }
}
