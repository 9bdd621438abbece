//! Structural integrity: cycle detection, parent multiplicity and the
//! single-primary-parent rule.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use taxograph_core::{
    Connection, ConnectionKind, Node, NodeId, ParentPolicy, TaxonomyError, TaxonomyResult,
    Transaction,
};

use super::too_many_levels;

/// Result of asking for a primary flag change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimaryOutcome {
    /// The flag change (and any promotion or demotion it implied) was written.
    Applied,
    /// Unsetting was requested but the child has no other parent of the same
    /// kind to take over. Nothing was written.
    NoCandidate,
}

impl PrimaryOutcome {
    /// Turn [`PrimaryOutcome::NoCandidate`] into an error for `edge`.
    pub fn require_applied(self, edge: &Connection) -> TaxonomyResult<()> {
        match self {
            PrimaryOutcome::Applied => Ok(()),
            PrimaryOutcome::NoCandidate => Err(TaxonomyError::invalid_argument(format!(
                "{} has no other parent to become primary; connection {} must stay primary",
                edge.child, edge.id
            ))),
        }
    }
}

/// Fail if `child` is `parent` or one of its ancestors.
///
/// Walks the ancestors of `parent` one level at a time. More than
/// `max_levels` ancestor levels fails with "too many levels".
pub(crate) fn check_cycle(
    txn: &mut dyn Transaction,
    parent: &NodeId,
    child: &NodeId,
    max_levels: usize,
) -> TaxonomyResult<()> {
    let mut seen: HashSet<NodeId> = HashSet::new();
    seen.insert(parent.clone());
    let mut frontier = vec![parent.clone()];
    let mut levels = 0usize;

    while !frontier.is_empty() {
        let mut next = Vec::new();
        for id in &frontier {
            for edge in txn.edges_by_child(id)? {
                if &edge.parent == child {
                    tracing::debug!(parent = %parent, child = %child, "cycle detected");
                    return Err(TaxonomyError::invalid_argument("cycle detected"));
                }
                if seen.insert(edge.parent.clone()) {
                    next.push(edge.parent);
                }
            }
        }

        if !next.is_empty() {
            levels += 1;
            if levels > max_levels {
                return Err(too_many_levels());
            }
        }
        frontier = next;
    }
    Ok(())
}

/// Fail if connecting `child` under `parent` with `kind` would violate the
/// child's parent multiplicity.
pub(crate) fn check_duplicate(
    txn: &mut dyn Transaction,
    parent: &NodeId,
    child: &Node,
    kind: ConnectionKind,
) -> TaxonomyResult<()> {
    let existing: Vec<Connection> = txn
        .edges_by_child(&child.id)?
        .into_iter()
        .filter(|e| e.kind == kind)
        .collect();

    match kind.parent_policy(child.node_type) {
        ParentPolicy::Single if !existing.is_empty() => {
            Err(TaxonomyError::duplicate_connection(child.id.as_str()))
        }
        ParentPolicy::Deduplicated if existing.iter().any(|e| &e.parent == parent) => Err(
            TaxonomyError::duplicate_pair(parent.as_str(), child.id.as_str()),
        ),
        _ => Ok(()),
    }
}

/// Other parent connections of `edge.child` with the same kind, ordered by
/// (rank, id).
fn same_kind_siblings(
    txn: &mut dyn Transaction,
    edge: &Connection,
) -> TaxonomyResult<Vec<Connection>> {
    Ok(txn
        .edges_by_child(&edge.child)?
        .into_iter()
        .filter(|e| e.kind == edge.kind && e.id != edge.id)
        .collect())
}

/// Set the primary flag of `edge` and keep exactly one primary parent.
///
/// - `true` demotes every other same-kind parent connection.
/// - `false` promotes the first other connection by (rank, id), unless one
///   is already primary. With no other connection the outcome is
///   [`PrimaryOutcome::NoCandidate`] and nothing is written.
///
/// `edge` is written back with the new flag on success.
pub(crate) fn set_primary(
    txn: &mut dyn Transaction,
    edge: &mut Connection,
    primary: bool,
) -> TaxonomyResult<PrimaryOutcome> {
    let others = same_kind_siblings(txn, edge)?;

    if primary {
        for mut other in others.into_iter().filter(|o| o.primary) {
            other.primary = false;
            txn.put_edge(other)?;
        }
    } else {
        if others.is_empty() {
            return Ok(PrimaryOutcome::NoCandidate);
        }
        if !others.iter().any(|o| o.primary) {
            let mut promoted = others[0].clone();
            tracing::debug!(
                child = %edge.child,
                demoted = %edge.id,
                promoted = %promoted.id,
                "primary parent handed over"
            );
            promoted.primary = true;
            txn.put_edge(promoted)?;
        }
    }

    edge.primary = primary;
    txn.put_edge(edge.clone())?;
    Ok(PrimaryOutcome::Applied)
}

/// After a connection of `kind` to `child` was removed, make sure one of the
/// remaining same-kind parent connections is primary.
///
/// Returns the promoted connection, if any.
pub(crate) fn elect_primary(
    txn: &mut dyn Transaction,
    child: &NodeId,
    kind: ConnectionKind,
) -> TaxonomyResult<Option<Connection>> {
    let remaining: Vec<Connection> = txn
        .edges_by_child(child)?
        .into_iter()
        .filter(|e| e.kind == kind)
        .collect();

    if remaining.iter().any(|e| e.primary) {
        return Ok(None);
    }
    match remaining.into_iter().next() {
        Some(mut elected) => {
            elected.primary = true;
            tracing::debug!(child = %child, elected = %elected.id, "primary parent elected");
            txn.put_edge(elected.clone())?;
            Ok(Some(elected))
        }
        None => Ok(None),
    }
}
