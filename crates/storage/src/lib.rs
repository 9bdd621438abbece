//! Storage layer for taxograph
//!
//! In-memory implementation of the `GraphStore` trait:
//! - `MemoryGraphStore`: one mutex-guarded shard per taxonomy version
//! - `MemoryTransaction`: write-set transaction, applied only on success
//! - `ConnectionIndex`: parent/child adjacency over connections

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod adjacency;
pub mod sharded;
pub mod txn;

pub use adjacency::ConnectionIndex;
pub use sharded::{GraphShard, MemoryGraphStore};
pub use txn::{MemoryTransaction, WriteSet};
pub use taxograph_core::{TaxonomyError, TaxonomyResult};
