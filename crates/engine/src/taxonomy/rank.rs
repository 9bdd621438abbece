//! Dense rank assignment among the children of one parent.

use taxograph_core::{Connection, TaxonomyError, TaxonomyResult};

/// Place `edge` at `desired` among `siblings` and return the whole updated
/// sibling list, sorted by rank.
///
/// `edge` is removed from `siblings` first if present. It is inserted before
/// the first sibling whose rank is at least `desired`; every following
/// sibling whose rank no longer exceeds its predecessor's is pushed to
/// predecessor + 1, stopping at the first gap. Ranks are never clamped; a
/// shift past `i32::MAX` fails with `InvalidArgument`.
pub fn rank(
    siblings: Vec<Connection>,
    mut edge: Connection,
    desired: i32,
) -> TaxonomyResult<Vec<Connection>> {
    edge.rank = desired;

    let mut ordered: Vec<Connection> = siblings.into_iter().filter(|s| s.id != edge.id).collect();
    ordered.sort_by(|a, b| a.rank.cmp(&b.rank).then_with(|| a.id.cmp(&b.id)));

    let position = ordered
        .iter()
        .position(|s| s.rank >= desired)
        .unwrap_or(ordered.len());
    ordered.insert(position, edge);

    for i in (position + 1)..ordered.len() {
        let previous = ordered[i - 1].rank;
        if ordered[i].rank > previous {
            break;
        }
        ordered[i].rank = successor(previous)?;
    }

    Ok(ordered)
}

/// Rank for a new child appended after every existing sibling.
pub fn next_rank(siblings: &[Connection]) -> TaxonomyResult<i32> {
    match siblings.iter().map(|s| s.rank).max() {
        Some(max) => successor(max),
        None => Ok(1),
    }
}

fn successor(rank: i32) -> TaxonomyResult<i32> {
    rank.checked_add(1)
        .ok_or_else(|| TaxonomyError::invalid_argument(format!("no rank after {}", rank)))
}
