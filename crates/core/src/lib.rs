//! Core types for taxograph
//!
//! This crate defines the shared vocabulary of the workspace:
//! - Identifiers: NodeId, EdgeId, VersionId
//! - Domain records: Node, Connection, Context, Grade, GradeAverage
//! - Error handling: TaxonomyError, TaxonomyResult
//! - Storage traits: GraphStore, Transaction

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{TaxonomyError, TaxonomyResult};
pub use traits::{GraphStore, Transaction};
pub use types::{
    Connection, ConnectionKind, Context, EdgeId, Grade, GradeAverage, Node, NodeId, NodeType,
    ParentPolicy, Relevance, VersionId,
};
