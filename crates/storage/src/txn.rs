//! Write-set transactions over a locked shard.
//!
//! A [`MemoryTransaction`] reads through to the shard and buffers every
//! write in a [`WriteSet`]. The store applies the write set only when the
//! transaction closure succeeds.

use rustc_hash::FxHashMap;
use taxograph_core::{
    Connection, EdgeId, Node, NodeId, TaxonomyResult, Transaction, VersionId,
};

use crate::sharded::GraphShard;

/// Buffered writes of one transaction. `None` marks a delete.
#[derive(Debug, Default)]
pub struct WriteSet {
    pub(crate) nodes: FxHashMap<NodeId, Option<Node>>,
    pub(crate) edges: FxHashMap<EdgeId, Option<Connection>>,
}

impl WriteSet {
    /// True when the transaction wrote nothing.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty() && self.edges.is_empty()
    }

    /// Number of buffered node and edge writes.
    pub fn len(&self) -> usize {
        self.nodes.len() + self.edges.len()
    }
}

/// Transaction over a single locked [`GraphShard`].
pub struct MemoryTransaction<'a> {
    version: &'a VersionId,
    base: &'a GraphShard,
    writes: WriteSet,
}

impl<'a> MemoryTransaction<'a> {
    pub(crate) fn new(version: &'a VersionId, base: &'a GraphShard) -> Self {
        Self {
            version,
            base,
            writes: WriteSet::default(),
        }
    }

    /// Consume the transaction, returning its buffered writes.
    pub(crate) fn into_writes(self) -> WriteSet {
        self.writes
    }

    /// Merge committed connections listed by `base_ids` with this
    /// transaction's pending writes that satisfy `belongs`.
    fn merged_edges<'b>(
        &self,
        base_ids: impl Iterator<Item = &'b EdgeId>,
        belongs: impl Fn(&Connection) -> bool,
    ) -> Vec<Connection> {
        let mut edges: Vec<Connection> = base_ids
            .filter(|id| !self.writes.edges.contains_key(*id))
            .filter_map(|id| self.base.edges.get(id))
            .cloned()
            .collect();
        edges.extend(
            self.writes
                .edges
                .values()
                .flatten()
                .filter(|e| belongs(*e))
                .cloned(),
        );
        edges.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.id.cmp(&b.id)));
        edges
    }
}

impl Transaction for MemoryTransaction<'_> {
    fn version(&self) -> &VersionId {
        self.version
    }

    fn get_node(&self, id: &NodeId) -> TaxonomyResult<Option<Node>> {
        match self.writes.nodes.get(id) {
            Some(pending) => Ok(pending.clone()),
            None => Ok(self.base.nodes.get(id).cloned()),
        }
    }

    fn put_node(&mut self, node: Node) -> TaxonomyResult<()> {
        self.writes.nodes.insert(node.id.clone(), Some(node));
        Ok(())
    }

    fn delete_node(&mut self, id: &NodeId) -> TaxonomyResult<()> {
        self.writes.nodes.insert(id.clone(), None);
        Ok(())
    }

    fn node_ids(&self) -> TaxonomyResult<Vec<NodeId>> {
        let mut ids: Vec<NodeId> = self
            .base
            .nodes
            .keys()
            .filter(|id| !self.writes.nodes.contains_key(*id))
            .cloned()
            .collect();
        ids.extend(
            self.writes
                .nodes
                .iter()
                .filter(|(_, pending)| pending.is_some())
                .map(|(id, _)| id.clone()),
        );
        ids.sort();
        Ok(ids)
    }

    fn get_edge(&self, id: &EdgeId) -> TaxonomyResult<Option<Connection>> {
        match self.writes.edges.get(id) {
            Some(pending) => Ok(pending.clone()),
            None => Ok(self.base.edges.get(id).cloned()),
        }
    }

    fn put_edge(&mut self, edge: Connection) -> TaxonomyResult<()> {
        self.writes.edges.insert(edge.id, Some(edge));
        Ok(())
    }

    fn delete_edge(&mut self, id: &EdgeId) -> TaxonomyResult<()> {
        self.writes.edges.insert(*id, None);
        Ok(())
    }

    fn edges_by_parent(&self, parent: &NodeId) -> TaxonomyResult<Vec<Connection>> {
        Ok(self.merged_edges(self.base.index.children_of(parent), |e| {
            &e.parent == parent
        }))
    }

    fn edges_by_child(&self, child: &NodeId) -> TaxonomyResult<Vec<Connection>> {
        Ok(self.merged_edges(self.base.index.parents_of(child), |e| &e.child == child))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taxograph_core::{ConnectionKind, NodeType};

    fn shard_with_edge() -> (GraphShard, Connection) {
        let mut shard = GraphShard::new();
        let mut writes = WriteSet::default();
        let a = Node::new("A", "A", NodeType::Subject);
        let b = Node::new("B", "B", NodeType::Topic);
        let mut e = Connection::new(a.id.clone(), b.id.clone(), ConnectionKind::Branch);
        e.rank = 1;
        writes.nodes.insert(a.id.clone(), Some(a));
        writes.nodes.insert(b.id.clone(), Some(b));
        writes.edges.insert(e.id, Some(e.clone()));
        shard.apply(writes);
        (shard, e)
    }

    #[test]
    fn reads_see_own_writes() {
        let (shard, _) = shard_with_edge();
        let version = VersionId::default();
        let mut txn = MemoryTransaction::new(&version, &shard);

        txn.put_node(Node::new("C", "C", NodeType::Topic)).unwrap();
        assert!(txn.get_node(&"C".into()).unwrap().is_some());
        assert!(shard.nodes.get(&NodeId::from("C")).is_none());
    }

    #[test]
    fn deleted_node_is_hidden() {
        let (shard, _) = shard_with_edge();
        let version = VersionId::default();
        let mut txn = MemoryTransaction::new(&version, &shard);

        txn.delete_node(&"A".into()).unwrap();
        assert!(txn.get_node(&"A".into()).unwrap().is_none());
        assert_eq!(txn.node_ids().unwrap(), vec![NodeId::from("B")]);
    }

    #[test]
    fn edges_by_parent_merges_pending_writes() {
        let (shard, existing) = shard_with_edge();
        let version = VersionId::default();
        let mut txn = MemoryTransaction::new(&version, &shard);

        let mut added = Connection::new("A".into(), "C".into(), ConnectionKind::Branch);
        added.rank = 0;
        txn.put_edge(added.clone()).unwrap();

        let edges = txn.edges_by_parent(&"A".into()).unwrap();
        assert_eq!(edges.len(), 2);
        // Ordered by rank.
        assert_eq!(edges[0].id, added.id);
        assert_eq!(edges[1].id, existing.id);
    }

    #[test]
    fn moved_edge_leaves_old_parent() {
        let (shard, existing) = shard_with_edge();
        let version = VersionId::default();
        let mut txn = MemoryTransaction::new(&version, &shard);

        let mut moved = existing.clone();
        moved.parent = "Z".into();
        txn.put_edge(moved).unwrap();

        assert!(txn.edges_by_parent(&"A".into()).unwrap().is_empty());
        assert_eq!(txn.edges_by_parent(&"Z".into()).unwrap().len(), 1);
        assert_eq!(txn.edges_by_child(&"B".into()).unwrap().len(), 1);
    }

    #[test]
    fn deleted_edge_is_hidden() {
        let (shard, existing) = shard_with_edge();
        let version = VersionId::default();
        let mut txn = MemoryTransaction::new(&version, &shard);

        txn.delete_edge(&existing.id).unwrap();
        assert!(txn.get_edge(&existing.id).unwrap().is_none());
        assert!(txn.edges_by_child(&"B".into()).unwrap().is_empty());
        assert_eq!(txn.into_writes().len(), 1);
    }
}
