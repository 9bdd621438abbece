//! Public types for the taxograph API.
//!
//! This module re-exports types from internal crates with a clean public interface.

// ============================================================================
// Graph records
// ============================================================================

// Identities
pub use taxograph_core::{EdgeId, NodeId, VersionId};

// Nodes and their derived state
pub use taxograph_core::{Context, Grade, GradeAverage, Node, NodeType};

// Connections
pub use taxograph_core::{Connection, ConnectionKind, ParentPolicy, Relevance};

// ============================================================================
// Errors
// ============================================================================

pub use taxograph_core::{TaxonomyError, TaxonomyResult};

// ============================================================================
// Engine surface
// ============================================================================

// Request types
pub use taxograph_engine::{ConnectOptions, ConnectionUpdate, NodeUpdate};

// Results and snapshots
pub use taxograph_engine::{PrimaryOutcome, TaxonomySnapshot};

// Change notifications
pub use taxograph_engine::{ChangeKind, StructuralChange};
