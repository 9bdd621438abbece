//! Connection service: create, remove and update connections while keeping
//! the graph acyclic, ranks unique and exactly one primary parent per child.
//!
//! Every public operation runs in one transaction. Context and quality
//! recomputation happen inside the same transaction; notifications go out
//! after it commits.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use taxograph_core::{
    Connection, ConnectionKind, EdgeId, GraphStore, NodeId, Relevance, TaxonomyError,
    TaxonomyResult, Transaction, VersionId,
};

use super::context::ContextPass;
use super::integrity::{check_cycle, check_duplicate, elect_primary, set_primary, PrimaryOutcome};
use super::notify::ChangeKind;
use super::quality::{contribution, propagate};
use super::rank::{next_rank, rank};
use super::{require_edge, require_node, Taxonomy};
use crate::config::TaxonomyConfig;

/// Optional settings for a new connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectOptions {
    /// Relevance; core when absent.
    pub relevance: Option<Relevance>,
    /// Rank among the parent's children; appended after the last sibling
    /// when absent.
    pub rank: Option<i32>,
    /// Requested primary flag; true when absent. Ignored for a child's
    /// first parent, which is always primary.
    pub primary: Option<bool>,
}

impl ConnectOptions {
    /// Builder: set relevance.
    pub fn relevance(mut self, relevance: Relevance) -> Self {
        self.relevance = Some(relevance);
        self
    }

    /// Builder: set rank.
    pub fn rank(mut self, rank: i32) -> Self {
        self.rank = Some(rank);
        self
    }

    /// Builder: request a primary flag.
    pub fn primary(mut self, primary: bool) -> Self {
        self.primary = Some(primary);
        self
    }
}

/// Field changes for an existing connection. Absent fields are untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    /// New relevance.
    pub relevance: Option<Relevance>,
    /// New rank.
    pub rank: Option<i32>,
    /// New primary flag.
    pub primary: Option<bool>,
}

/// Persist `edge` at rank `desired`, shifting siblings as needed.
///
/// Returns the children of the siblings whose rank moved.
fn place(
    txn: &mut dyn Transaction,
    edge: &mut Connection,
    desired: i32,
) -> TaxonomyResult<Vec<NodeId>> {
    let siblings = txn.edges_by_parent(&edge.parent)?;
    let before: HashMap<EdgeId, i32> = siblings.iter().map(|s| (s.id, s.rank)).collect();

    let mut shifted = Vec::new();
    for sibling in rank(siblings, edge.clone(), desired)? {
        if sibling.id != edge.id && before.get(&sibling.id) != Some(&sibling.rank) {
            shifted.push(sibling.child.clone());
        }
        txn.put_edge(sibling)?;
    }
    edge.rank = desired;
    Ok(shifted)
}

/// Rebuild contexts of `child` plus the children of shifted siblings.
fn refresh(
    txn: &mut dyn Transaction,
    config: &TaxonomyConfig,
    child: &NodeId,
    shifted: &[NodeId],
) -> TaxonomyResult<()> {
    let mut pass = ContextPass::new(config);
    pass.update(txn, child)?;
    for sibling in shifted {
        pass.update(txn, sibling)?;
    }
    Ok(())
}

pub(crate) fn connect_in(
    txn: &mut dyn Transaction,
    config: &TaxonomyConfig,
    parent: &NodeId,
    child: &NodeId,
    kind: ConnectionKind,
    options: ConnectOptions,
) -> TaxonomyResult<Connection> {
    let parent_node = require_node(txn, parent)?;
    let child_node = require_node(txn, child)?;

    if parent == child {
        return Err(TaxonomyError::invalid_argument(format!(
            "cannot connect {} to itself",
            child
        )));
    }
    if child_node.connection_kind() != kind {
        return Err(TaxonomyError::invalid_argument(format!(
            "{:?} connection does not fit {:?} node {}",
            kind, child_node.node_type, child
        )));
    }
    if parent_node.node_type.is_leaf() {
        return Err(TaxonomyError::invalid_argument(format!(
            "{} is a leaf and cannot have children",
            parent
        )));
    }

    check_cycle(txn, parent, child, config.max_ancestor_depth)?;
    check_duplicate(txn, parent, &child_node, kind)?;

    let first_parent = !txn
        .edges_by_child(child)?
        .iter()
        .any(|e| e.kind == kind);

    let mut edge = Connection::new(parent.clone(), child.clone(), kind);
    edge.relevance = options.relevance.unwrap_or_default();

    let shifted = match options.rank {
        Some(desired) => place(txn, &mut edge, desired)?,
        None => {
            edge.rank = next_rank(&txn.edges_by_parent(parent)?)?;
            txn.put_edge(edge.clone())?;
            Vec::new()
        }
    };

    if first_parent {
        edge.primary = true;
        txn.put_edge(edge.clone())?;
    } else {
        let requested = options.primary.unwrap_or(true);
        set_primary(txn, &mut edge, requested)?.require_applied(&edge)?;
    }

    refresh(txn, config, child, &shifted)?;
    if let Some(grades) = contribution(&child_node) {
        propagate(txn, config, parent, None, Some(grades))?;
    }

    tracing::debug!(
        version = %txn.version(),
        parent = %parent,
        child = %child,
        connection = %edge.id,
        rank = edge.rank,
        primary = edge.primary,
        "connected"
    );
    Ok(edge)
}

pub(crate) fn disconnect_in(
    txn: &mut dyn Transaction,
    config: &TaxonomyConfig,
    id: &EdgeId,
) -> TaxonomyResult<Connection> {
    let edge = require_edge(txn, id)?;
    txn.delete_edge(id)?;

    if edge.primary {
        elect_primary(txn, &edge.child, edge.kind)?;
    }

    ContextPass::new(config).update(txn, &edge.child)?;
    let child_node = require_node(txn, &edge.child)?;
    if let Some(grades) = contribution(&child_node) {
        propagate(txn, config, &edge.parent, Some(grades), None)?;
    }

    tracing::debug!(
        version = %txn.version(),
        parent = %edge.parent,
        child = %edge.child,
        connection = %edge.id,
        "disconnected"
    );
    Ok(edge)
}

fn update_in(
    txn: &mut dyn Transaction,
    config: &TaxonomyConfig,
    id: &EdgeId,
    update: ConnectionUpdate,
) -> TaxonomyResult<Connection> {
    let mut edge = require_edge(txn, id)?;

    if let Some(relevance) = update.relevance {
        edge.relevance = relevance;
        txn.put_edge(edge.clone())?;
    }
    let shifted = match update.rank {
        Some(desired) => place(txn, &mut edge, desired)?,
        None => Vec::new(),
    };
    if let Some(primary) = update.primary {
        set_primary(txn, &mut edge, primary)?.require_applied(&edge)?;
    }

    refresh(txn, config, &edge.child, &shifted)?;
    tracing::debug!(
        version = %txn.version(),
        connection = %edge.id,
        rank = edge.rank,
        primary = edge.primary,
        "connection updated"
    );
    Ok(edge)
}

impl<S: GraphStore> Taxonomy<S> {
    /// Connect `child` below `parent`.
    ///
    /// Fails with `NotFound` for a missing node, `InvalidArgument` for a
    /// self-connection, a kind that does not fit the child, a leaf parent or
    /// a cycle, and `DuplicateConnection` when the child may not take this
    /// parent.
    pub fn connect(
        &self,
        version: &VersionId,
        parent: &NodeId,
        child: &NodeId,
        kind: ConnectionKind,
        options: ConnectOptions,
    ) -> TaxonomyResult<Connection> {
        let config = &self.config;
        let edge = self.store.transaction(version, |txn| {
            connect_in(txn, config, parent, child, kind, options)
        })?;
        self.publish(version, ChangeKind::Connected, [edge.clone()]);
        Ok(edge)
    }

    /// Remove a connection, electing a new primary parent when needed.
    pub fn disconnect(&self, version: &VersionId, id: &EdgeId) -> TaxonomyResult<Connection> {
        let config = &self.config;
        let edge = self
            .store
            .transaction(version, |txn| disconnect_in(txn, config, id))?;
        self.publish(version, ChangeKind::Disconnected, [edge.clone()]);
        Ok(edge)
    }

    /// Change relevance, rank and/or primary flag of a connection.
    ///
    /// Unsetting the primary flag fails with `InvalidArgument` when the
    /// child has no other parent to promote; nothing changes in that case.
    pub fn update_connection(
        &self,
        version: &VersionId,
        id: &EdgeId,
        update: ConnectionUpdate,
    ) -> TaxonomyResult<Connection> {
        let config = &self.config;
        let edge = self
            .store
            .transaction(version, |txn| update_in(txn, config, id, update))?;
        self.publish(version, ChangeKind::Updated, [edge.clone()]);
        Ok(edge)
    }

    /// Remove every connection from `parent` to `child`.
    pub fn disconnect_parent_child(
        &self,
        version: &VersionId,
        parent: &NodeId,
        child: &NodeId,
    ) -> TaxonomyResult<Vec<Connection>> {
        let config = &self.config;
        let removed = self.store.transaction(version, |txn| {
            let ids: Vec<EdgeId> = txn
                .edges_by_child(child)?
                .into_iter()
                .filter(|e| &e.parent == parent)
                .map(|e| e.id)
                .collect();
            if ids.is_empty() {
                return Err(TaxonomyError::not_found(format!(
                    "connection {} -> {}",
                    parent, child
                )));
            }
            ids.iter()
                .map(|id| disconnect_in(txn, config, id))
                .collect::<TaxonomyResult<Vec<_>>>()
        })?;
        self.publish(version, ChangeKind::Disconnected, removed.iter().cloned());
        Ok(removed)
    }

    /// Remove every parent connection of `node`.
    pub fn disconnect_all_parents(
        &self,
        version: &VersionId,
        node: &NodeId,
    ) -> TaxonomyResult<Vec<Connection>> {
        let config = &self.config;
        let removed = self.store.transaction(version, |txn| {
            require_node(txn, node)?;
            let ids: Vec<EdgeId> = txn.edges_by_child(node)?.iter().map(|e| e.id).collect();
            ids.iter()
                .map(|id| disconnect_in(txn, config, id))
                .collect::<TaxonomyResult<Vec<_>>>()
        })?;
        self.publish(version, ChangeKind::Disconnected, removed.iter().cloned());
        Ok(removed)
    }

    /// Remove every child connection of `node`.
    pub fn disconnect_all_children(
        &self,
        version: &VersionId,
        node: &NodeId,
    ) -> TaxonomyResult<Vec<Connection>> {
        let config = &self.config;
        let removed = self.store.transaction(version, |txn| {
            require_node(txn, node)?;
            let ids: Vec<EdgeId> = txn.edges_by_parent(node)?.iter().map(|e| e.id).collect();
            ids.iter()
                .map(|id| disconnect_in(txn, config, id))
                .collect::<TaxonomyResult<Vec<_>>>()
        })?;
        self.publish(version, ChangeKind::Disconnected, removed.iter().cloned());
        Ok(removed)
    }

    /// Hand the primary flag of every primary child connection of `node` to
    /// another parent of that child.
    ///
    /// Children without another parent keep their primary connection; their
    /// entry carries [`PrimaryOutcome::NoCandidate`].
    pub fn replace_primary_connections_for(
        &self,
        version: &VersionId,
        node: &NodeId,
    ) -> TaxonomyResult<Vec<(EdgeId, PrimaryOutcome)>> {
        let config = &self.config;
        let (outcomes, changed) = self.store.transaction(version, |txn| {
            require_node(txn, node)?;
            let mut outcomes = Vec::new();
            let mut changed = Vec::new();

            for mut edge in txn.edges_by_parent(node)?.into_iter().filter(|e| e.primary) {
                let outcome = set_primary(txn, &mut edge, false)?;
                match outcome {
                    PrimaryOutcome::Applied => {
                        ContextPass::new(config).update(txn, &edge.child)?;
                        changed.push(edge.clone());
                    }
                    PrimaryOutcome::NoCandidate => {
                        tracing::warn!(
                            version = %version,
                            node = %node,
                            child = %edge.child,
                            connection = %edge.id,
                            "no other parent to take over primary connection"
                        );
                    }
                }
                outcomes.push((edge.id, outcome));
            }
            Ok((outcomes, changed))
        })?;
        self.publish(version, ChangeKind::Updated, changed);
        Ok(outcomes)
    }

    /// Parent connections of `node`, ordered by (rank, id).
    pub fn parent_connections(
        &self,
        version: &VersionId,
        node: &NodeId,
    ) -> TaxonomyResult<Vec<Connection>> {
        self.store.transaction(version, |txn| {
            require_node(txn, node)?;
            txn.edges_by_child(node)
        })
    }

    /// Child connections of `node`, ordered by (rank, id).
    pub fn child_connections(
        &self,
        version: &VersionId,
        node: &NodeId,
    ) -> TaxonomyResult<Vec<Connection>> {
        self.store.transaction(version, |txn| {
            require_node(txn, node)?;
            txn.edges_by_parent(node)
        })
    }

    /// Load one connection.
    pub fn get_connection(
        &self,
        version: &VersionId,
        id: &EdgeId,
    ) -> TaxonomyResult<Option<Connection>> {
        self.store.transaction(version, |txn| txn.get_edge(id))
    }
}
