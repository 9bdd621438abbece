//! Incremental quality-grade aggregation.
//!
//! Leaves carry their own grade; branches carry the `(sum, count)` of the
//! grades below them. A leaf reachable through several parent paths counts
//! once per path, both in the incremental updates and in the rebuilds.

use std::collections::HashMap;

use taxograph_core::{
    GradeAverage, GraphStore, Node, NodeId, TaxonomyResult, Transaction, VersionId,
};

use super::{require_node, too_many_levels, Taxonomy};
use crate::config::TaxonomyConfig;

/// What `node` contributes to each of its parents.
pub(crate) fn contribution(node: &Node) -> Option<GradeAverage> {
    if node.node_type.is_leaf() {
        node.quality_grade.map(GradeAverage::from_grade)
    } else {
        node.child_quality_average
    }
}

/// Replace `old` with `new` in the aggregate of `start` and of every
/// ancestor, once per parent path.
pub(crate) fn propagate(
    txn: &mut dyn Transaction,
    config: &TaxonomyConfig,
    start: &NodeId,
    old: Option<GradeAverage>,
    new: Option<GradeAverage>,
) -> TaxonomyResult<()> {
    if old == new {
        return Ok(());
    }

    let mut stack = vec![(start.clone(), 0usize)];
    while let Some((id, depth)) = stack.pop() {
        if depth > config.max_ancestor_depth {
            return Err(too_many_levels());
        }
        let mut node = require_node(txn, &id)?;
        node.child_quality_average =
            GradeAverage::apply_delta(node.child_quality_average, old, new);
        txn.put_node(node)?;

        for edge in txn.edges_by_child(&id)? {
            stack.push((edge.parent, depth + 1));
        }
    }
    Ok(())
}

/// Recompute the aggregate of `id` and of every branch below it from the
/// live subtree. Returns what `id` contributes to its parents.
fn rebuild_subtree(
    txn: &mut dyn Transaction,
    config: &TaxonomyConfig,
    id: &NodeId,
    depth: usize,
    done: &mut HashMap<NodeId, Option<GradeAverage>>,
) -> TaxonomyResult<Option<GradeAverage>> {
    if let Some(result) = done.get(id) {
        return Ok(*result);
    }
    if depth > config.max_tree_depth {
        return Err(too_many_levels());
    }

    let mut node = require_node(txn, id)?;
    if node.node_type.is_leaf() {
        let result = contribution(&node);
        done.insert(id.clone(), result);
        return Ok(result);
    }

    let mut total = GradeAverage::default();
    for edge in txn.edges_by_parent(id)? {
        if let Some(child) = rebuild_subtree(txn, config, &edge.child, depth + 1, done)? {
            total.merge(child);
        }
    }
    let result = if total.is_empty() { None } else { Some(total) };

    node.child_quality_average = result;
    txn.put_node(node)?;
    done.insert(id.clone(), result);
    Ok(result)
}

impl<S: GraphStore> Taxonomy<S> {
    /// Recompute the aggregates of `node` and its branch descendants from
    /// their current subtree. Safe to re-run.
    pub fn rebuild_subtree_average(
        &self,
        version: &VersionId,
        node: &NodeId,
    ) -> TaxonomyResult<Option<GradeAverage>> {
        let config = &self.config;
        let result = self.store.transaction(version, |txn| {
            let mut done = HashMap::new();
            let result = rebuild_subtree(txn, config, node, 0, &mut done)?;
            tracing::debug!(
                version = %version,
                node = %node,
                visited = done.len(),
                "subtree average rebuilt"
            );
            Ok(result)
        })?;
        Ok(result)
    }

    /// Wipe every aggregate in `version` and re-propagate every graded leaf.
    ///
    /// Node ids are processed in chunks of `rebuild_chunk_size`. Returns the
    /// number of graded leaves propagated.
    pub fn rebuild_all_averages(&self, version: &VersionId) -> TaxonomyResult<usize> {
        let config = &self.config;
        self.store.transaction(version, |txn| {
            let ids = txn.node_ids()?;
            let mut leaves: Vec<Node> = Vec::new();

            for (chunk_no, chunk) in ids.chunks(config.rebuild_chunk_size).enumerate() {
                for id in chunk {
                    let mut node = require_node(txn, id)?;
                    if node.node_type.is_leaf() {
                        if node.quality_grade.is_some() {
                            leaves.push(node);
                        }
                    } else if node.child_quality_average.is_some() {
                        node.child_quality_average = None;
                        txn.put_node(node)?;
                    }
                }
                tracing::debug!(version = %version, chunk = chunk_no, size = chunk.len(), "aggregates cleared");
            }

            for (chunk_no, chunk) in leaves.chunks(config.rebuild_chunk_size).enumerate() {
                for leaf in chunk {
                    let grade = contribution(leaf);
                    for edge in txn.edges_by_child(&leaf.id)? {
                        propagate(txn, config, &edge.parent, None, grade)?;
                    }
                }
                tracing::debug!(version = %version, chunk = chunk_no, size = chunk.len(), "leaf grades propagated");
            }

            Ok(leaves.len())
        })
    }
}
