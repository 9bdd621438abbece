//! Materialized root-to-node contexts.
//!
//! Contexts are derived purely from structure: a node's contexts are its
//! root context (if it is a context root) plus one context per (parent
//! edge, parent context). A [`ContextPass`] recomputes them for a node and
//! everything below it and writes the result back to each node.

use std::collections::{HashMap, HashSet};

use taxograph_core::{
    Connection, Context, Node, NodeId, Relevance, TaxonomyResult, Transaction,
};
use xxhash_rust::xxh3::xxh3_64;

use super::{require_node, too_many_levels};
use crate::config::TaxonomyConfig;

/// Identity hash for a context, rendered as 16 hex digits.
pub(crate) fn context_hash(input: &str) -> String {
    format!("{:016x}", xxh3_64(input.as_bytes()))
}

/// The context a context root starts for itself.
pub(crate) fn root_context(node: &Node) -> Context {
    Context {
        root_id: node.id.clone(),
        root_name: node.name.clone(),
        path: format!("/{}", node.id.path_part()),
        breadcrumbs: Vec::new(),
        parent_ids: Vec::new(),
        parent_context_ids: Vec::new(),
        is_visible: node.visible,
        is_primary: true,
        relevance: Relevance::Core,
        context_id: context_hash(node.id.as_str()),
        rank: 0,
        connection_id: None,
    }
}

/// Extend `parent_context` (a context of `edge.parent`) down to `node`.
pub(crate) fn child_context(parent_context: &Context, edge: &Connection, node: &Node) -> Context {
    let mut breadcrumbs = parent_context.breadcrumbs.clone();
    breadcrumbs.push(node.name.clone());

    let mut parent_ids = parent_context.parent_ids.clone();
    parent_ids.push(edge.parent.clone());

    let mut parent_context_ids = parent_context.parent_context_ids.clone();
    parent_context_ids.push(parent_context.context_id.clone());

    Context {
        root_id: parent_context.root_id.clone(),
        root_name: parent_context.root_name.clone(),
        path: format!("{}/{}", parent_context.path, node.id.path_part()),
        breadcrumbs,
        parent_ids,
        parent_context_ids,
        is_visible: parent_context.is_visible && node.visible,
        is_primary: edge.primary,
        relevance: edge.relevance,
        context_id: context_hash(&format!("{}{}", parent_context.context_id, edge.id)),
        rank: edge.rank,
        connection_id: Some(edge.id),
    }
}

/// One recomputation pass.
///
/// Every node is rebuilt at most once and every node's contexts are
/// computed at most once per pass.
pub(crate) struct ContextPass<'c> {
    config: &'c TaxonomyConfig,
    rebuilt: HashSet<NodeId>,
    computed: HashMap<NodeId, Vec<Context>>,
}

impl<'c> ContextPass<'c> {
    pub(crate) fn new(config: &'c TaxonomyConfig) -> Self {
        Self {
            config,
            rebuilt: HashSet::new(),
            computed: HashMap::new(),
        }
    }

    /// Number of nodes rewritten so far.
    pub(crate) fn rebuilt_count(&self) -> usize {
        self.rebuilt.len()
    }

    /// Replace the contexts of `id` and of every node below it.
    pub(crate) fn update(&mut self, txn: &mut dyn Transaction, id: &NodeId) -> TaxonomyResult<()> {
        self.update_at(txn, id, 0)
    }

    fn update_at(
        &mut self,
        txn: &mut dyn Transaction,
        id: &NodeId,
        depth: usize,
    ) -> TaxonomyResult<()> {
        if depth > self.config.max_tree_depth {
            return Err(too_many_levels());
        }
        if !self.rebuilt.insert(id.clone()) {
            return Ok(());
        }

        for edge in txn.edges_by_parent(id)? {
            self.update_at(txn, &edge.child, depth + 1)?;
        }

        let contexts = self.contexts_of(txn, id, 0)?;
        let mut node = require_node(txn, id)?;
        node.context_ids
            .extend(contexts.iter().map(|c| c.context_id.clone()));
        node.contexts = contexts;
        txn.put_node(node)?;
        Ok(())
    }

    /// Compute (without writing) the contexts of `id`.
    pub(crate) fn contexts_of(
        &mut self,
        txn: &mut dyn Transaction,
        id: &NodeId,
        depth: usize,
    ) -> TaxonomyResult<Vec<Context>> {
        if let Some(contexts) = self.computed.get(id) {
            return Ok(contexts.clone());
        }
        if depth > self.config.max_ancestor_depth {
            return Err(too_many_levels());
        }

        let node = require_node(txn, id)?;
        let mut unique: HashSet<Context> = HashSet::new();
        if node.context_root {
            unique.insert(root_context(&node));
        }
        for edge in txn.edges_by_child(id)? {
            for parent_context in self.contexts_of(txn, &edge.parent, depth + 1)? {
                unique.insert(child_context(&parent_context, &edge, &node));
            }
        }

        let mut contexts: Vec<Context> = unique.into_iter().collect();
        contexts.sort_by(|a, b| {
            a.path
                .cmp(&b.path)
                .then_with(|| a.context_id.cmp(&b.context_id))
        });
        self.computed.insert(id.clone(), contexts.clone());
        Ok(contexts)
    }
}
