//! Flatten ranked parent/child records into one depth-first sequence.

use std::collections::{HashMap, HashSet, VecDeque};
use std::hash::Hash;

use serde::Serialize;
use taxograph_core::{
    Connection, ConnectionKind, GraphStore, NodeId, TaxonomyResult, VersionId,
};

use super::{require_node, too_many_levels, Taxonomy};

/// Rank offset applied to leaf connections.
pub const LEAF_RANK_OFFSET: i64 = 10_000;

/// Rank offset applied to branch connections below a non-root branch.
pub const NESTED_BRANCH_RANK_OFFSET: i64 = 1_000;

/// A record that can be placed in a ranked tree.
pub trait Sortable {
    /// Identity type shared by records and their parent references.
    type Id: Eq + Hash + Clone;

    /// This record's id.
    fn sortable_id(&self) -> Self::Id;

    /// The parent's id, if any. Records whose parent is not part of the
    /// input are roots.
    fn sortable_parent_id(&self) -> Option<Self::Id>;

    /// Sort key among siblings; lower comes first.
    fn sortable_rank(&self) -> i64;
}

/// Order `records` depth-first, siblings by ascending rank.
///
/// Ties keep input order. A record whose id appears under several parents
/// is followed by its full subtree at every occurrence. Records not
/// reachable from a root are dropped. Nesting deeper than `max_depth`
/// fails with "too many levels", which also stops reachable cycles.
pub fn linearize<T>(records: Vec<T>, max_depth: usize) -> TaxonomyResult<Vec<T>>
where
    T: Sortable + Clone,
{
    let ids: HashSet<T::Id> = records.iter().map(|r| r.sortable_id()).collect();

    let mut roots: Vec<usize> = Vec::new();
    let mut buckets: HashMap<T::Id, Vec<usize>> = HashMap::new();
    for (index, record) in records.iter().enumerate() {
        match record.sortable_parent_id() {
            Some(parent) if ids.contains(&parent) => {
                buckets.entry(parent).or_default().push(index)
            }
            _ => roots.push(index),
        }
    }

    let by_rank = |a: &usize, b: &usize| {
        records[*a]
            .sortable_rank()
            .cmp(&records[*b].sortable_rank())
    };
    roots.sort_by(by_rank);
    for bucket in buckets.values_mut() {
        bucket.sort_by(by_rank);
    }

    let mut order: Vec<usize> = Vec::with_capacity(records.len());
    for &root in &roots {
        emit(&records, &buckets, root, 0, max_depth, &mut order)?;
    }

    Ok(order.into_iter().map(|i| records[i].clone()).collect())
}

fn emit<T: Sortable>(
    records: &[T],
    buckets: &HashMap<T::Id, Vec<usize>>,
    index: usize,
    depth: usize,
    max_depth: usize,
    order: &mut Vec<usize>,
) -> TaxonomyResult<()> {
    if depth > max_depth {
        return Err(too_many_levels());
    }
    order.push(index);

    if let Some(children) = buckets.get(&records[index].sortable_id()) {
        for &child in children {
            emit(records, buckets, child, depth + 1, max_depth, order)?;
        }
    }
    Ok(())
}

/// A connection inside a subtree, sorted by its child below its parent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectionSortable {
    /// The connection.
    pub connection: Connection,
    /// Whether the connection's parent is the subtree root.
    pub parent_is_root: bool,
}

impl Sortable for ConnectionSortable {
    type Id = NodeId;

    fn sortable_id(&self) -> NodeId {
        self.connection.child.clone()
    }

    fn sortable_parent_id(&self) -> Option<NodeId> {
        Some(self.connection.parent.clone())
    }

    fn sortable_rank(&self) -> i64 {
        let rank = i64::from(self.connection.rank);
        match self.connection.kind {
            ConnectionKind::Leaf => rank - LEAF_RANK_OFFSET,
            ConnectionKind::Branch if !self.parent_is_root => rank - NESTED_BRANCH_RANK_OFFSET,
            ConnectionKind::Branch => rank,
        }
    }
}

impl<S: GraphStore> Taxonomy<S> {
    /// Every connection below `node`, depth-first with siblings in rank
    /// order. Leaves sort ahead of branches under the same parent.
    pub fn child_tree(&self, version: &VersionId, node: &NodeId) -> TaxonomyResult<Vec<Connection>> {
        let config = &self.config;
        let records = self.store.transaction(version, |txn| {
            require_node(txn, node)?;

            let mut records = Vec::new();
            let mut seen: HashSet<NodeId> = HashSet::new();
            let mut queue: VecDeque<(NodeId, usize)> = VecDeque::new();
            seen.insert(node.clone());
            queue.push_back((node.clone(), 0));

            while let Some((current, depth)) = queue.pop_front() {
                if depth > config.max_tree_depth {
                    return Err(too_many_levels());
                }
                for edge in txn.edges_by_parent(&current)? {
                    if seen.insert(edge.child.clone()) {
                        queue.push_back((edge.child.clone(), depth + 1));
                    }
                    records.push(ConnectionSortable {
                        parent_is_root: &edge.parent == node,
                        connection: edge,
                    });
                }
            }
            Ok(records)
        })?;

        let ordered = linearize(records, config.max_tree_depth)?;
        Ok(ordered.into_iter().map(|r| r.connection).collect())
    }
}
