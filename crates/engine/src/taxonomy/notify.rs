//! Editorial notifications for structural changes.
//!
//! Notifiers run after the change has committed. They are fire-and-forget:
//! a failing notifier is logged and never undoes or fails the change.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use taxograph_core::{Connection, TaxonomyResult, VersionId};

/// What happened to a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeKind {
    /// The connection was created.
    Connected,
    /// The connection was removed.
    Disconnected,
    /// Relevance, rank or primary flag changed.
    Updated,
}

/// A committed structural change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralChange {
    /// Version the change was made in.
    pub version: VersionId,
    /// Kind of change.
    pub kind: ChangeKind,
    /// The connection as of the change (as removed, for disconnects).
    pub connection: Connection,
    /// Commit time.
    pub at: DateTime<Utc>,
}

impl StructuralChange {
    /// A change stamped with the current time.
    pub fn new(version: VersionId, kind: ChangeKind, connection: Connection) -> Self {
        Self {
            version,
            kind,
            connection,
            at: Utc::now(),
        }
    }
}

/// Receiver of committed structural changes.
pub trait EditorialNotifier: Send + Sync {
    /// Handle one change. Errors are logged by the caller and otherwise
    /// ignored.
    fn notify(&self, change: &StructuralChange) -> TaxonomyResult<()>;
}

/// Discards every change.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl EditorialNotifier for NoopNotifier {
    fn notify(&self, _change: &StructuralChange) -> TaxonomyResult<()> {
        Ok(())
    }
}

/// Logs every change at `info`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingNotifier;

impl EditorialNotifier for TracingNotifier {
    fn notify(&self, change: &StructuralChange) -> TaxonomyResult<()> {
        tracing::info!(
            version = %change.version,
            kind = ?change.kind,
            connection = %change.connection.id,
            parent = %change.connection.parent,
            child = %change.connection.child,
            primary = change.connection.primary,
            rank = change.connection.rank,
            "structural change"
        );
        Ok(())
    }
}
