//! Taxonomy engine for taxograph
//!
//! This crate keeps a taxonomy graph consistent while it is edited:
//! - Connection service: connect, disconnect and update with cycle, duplicate
//!   and primary-parent checks
//! - Rank orderer: dense sibling ranks
//! - Context materializer: root-to-node paths, rebuilt on structural change
//! - Quality aggregator: incremental grade averages with full rebuilds
//! - Tree linearizer: rank-ordered depth-first listing
//!
//! All operations take an explicit [`VersionId`](taxograph_core::VersionId)
//! and run in a single store transaction.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod config;
pub mod taxonomy;

pub use config::TaxonomyConfig;
pub use taxograph_core::{TaxonomyError, TaxonomyResult};
pub use taxonomy::integrity::PrimaryOutcome;
pub use taxonomy::linearize::{linearize, ConnectionSortable, Sortable};
pub use taxonomy::notify::{
    ChangeKind, EditorialNotifier, NoopNotifier, StructuralChange, TracingNotifier,
};
pub use taxonomy::rank::{next_rank, rank};
pub use taxonomy::{
    ConnectOptions, ConnectionUpdate, NodeUpdate, Taxonomy, TaxonomySnapshot,
};
