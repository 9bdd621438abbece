//! Taxograph: connection and integrity engine for taxonomy graphs.
//!
//! Programmes, subjects, topics and resources form a versioned directed
//! graph. [`Taxonomy`] keeps it consistent while it is edited: no cycles,
//! one primary parent per child, dense sibling ranks, materialized
//! contexts and aggregated quality grades.
//!
//! # Quick Start
//!
//! ```
//! use taxograph::prelude::*;
//!
//! let taxonomy = Taxonomy::in_memory();
//! let v = VersionId::default();
//!
//! taxonomy.add_node(&v, Node::new("urn:subject:1", "Maths", NodeType::Subject).context_root(true))?;
//! taxonomy.add_node(&v, Node::new("urn:topic:1", "Algebra", NodeType::Topic))?;
//! taxonomy.connect(
//!     &v,
//!     &"urn:subject:1".into(),
//!     &"urn:topic:1".into(),
//!     ConnectionKind::Branch,
//!     ConnectOptions::default(),
//! )?;
//!
//! let contexts = taxonomy.contexts(&v, &"urn:topic:1".into())?;
//! assert_eq!(contexts[0].path, "/subject:1/topic:1");
//! # Ok::<(), taxograph::TaxonomyError>(())
//! ```

#![warn(missing_docs)]

pub mod types;

pub use types::*;

pub use taxograph_core::{GraphStore, Transaction};
pub use taxograph_engine::{
    linearize, next_rank, rank, ConnectionSortable, EditorialNotifier, NoopNotifier, Sortable,
    Taxonomy, TaxonomyConfig, TracingNotifier,
};
pub use taxograph_storage::MemoryGraphStore;

/// Everything needed for typical use.
pub mod prelude {
    pub use crate::types::*;
    pub use crate::{GraphStore, MemoryGraphStore, Taxonomy, TaxonomyConfig};
}
