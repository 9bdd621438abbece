//! Error types for the taxonomy engine.
//!
//! Every fallible operation in the workspace returns [`TaxonomyResult`].
//! Any error aborts the enclosing transaction, so no partial state is
//! ever persisted.

use thiserror::Error;

/// Result alias used throughout the workspace.
pub type TaxonomyResult<T> = Result<T, TaxonomyError>;

/// Errors produced by the taxonomy store and engine.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TaxonomyError {
    /// A referenced node or connection does not exist.
    #[error("not found: {entity}")]
    NotFound {
        /// Description of the missing entity (e.g. "node urn:topic:1").
        entity: String,
    },

    /// The child is already connected under a uniqueness-constrained kind.
    #[error("duplicate connection: {child} is already connected{}", parent_suffix(.parent))]
    DuplicateConnection {
        /// Parent of the existing connection, when the duplicate is parent-specific.
        parent: Option<String>,
        /// Child that is already connected.
        child: String,
    },

    /// The request violates a structural invariant or carries a bad value.
    #[error("invalid argument: {reason}")]
    InvalidArgument {
        /// Human-readable reason.
        reason: String,
    },

    /// A value could not be encoded or decoded.
    #[error("serialization error: {message}")]
    Serialization {
        /// Underlying message.
        message: String,
    },

    /// Configuration could not be loaded or is out of range.
    #[error("configuration error: {message}")]
    Config {
        /// Underlying message.
        message: String,
    },
}

fn parent_suffix(parent: &Option<String>) -> String {
    parent
        .as_ref()
        .map(|p| format!(" to {p}"))
        .unwrap_or_default()
}

impl TaxonomyError {
    /// Build a [`TaxonomyError::NotFound`].
    pub fn not_found(entity: impl Into<String>) -> Self {
        TaxonomyError::NotFound {
            entity: entity.into(),
        }
    }

    /// Build a [`TaxonomyError::InvalidArgument`].
    pub fn invalid_argument(reason: impl Into<String>) -> Self {
        TaxonomyError::InvalidArgument {
            reason: reason.into(),
        }
    }

    /// Build a [`TaxonomyError::DuplicateConnection`] for a child that may have
    /// only one parent of its kind.
    pub fn duplicate_connection(child: impl Into<String>) -> Self {
        TaxonomyError::DuplicateConnection {
            parent: None,
            child: child.into(),
        }
    }

    /// Build a [`TaxonomyError::DuplicateConnection`] for a repeated
    /// parent/child pair.
    pub fn duplicate_pair(parent: impl Into<String>, child: impl Into<String>) -> Self {
        TaxonomyError::DuplicateConnection {
            parent: Some(parent.into()),
            child: child.into(),
        }
    }

    /// Build a [`TaxonomyError::Serialization`].
    pub fn serialization(message: impl Into<String>) -> Self {
        TaxonomyError::Serialization {
            message: message.into(),
        }
    }

    /// Build a [`TaxonomyError::Config`].
    pub fn config(message: impl Into<String>) -> Self {
        TaxonomyError::Config {
            message: message.into(),
        }
    }

    /// True for [`TaxonomyError::NotFound`].
    pub fn is_not_found(&self) -> bool {
        matches!(self, TaxonomyError::NotFound { .. })
    }

    /// True for [`TaxonomyError::InvalidArgument`].
    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, TaxonomyError::InvalidArgument { .. })
    }

    /// True for [`TaxonomyError::DuplicateConnection`].
    pub fn is_duplicate_connection(&self) -> bool {
        matches!(self, TaxonomyError::DuplicateConnection { .. })
    }
}

impl From<serde_json::Error> for TaxonomyError {
    fn from(e: serde_json::Error) -> Self {
        TaxonomyError::serialization(e.to_string())
    }
}
