//! Core domain types for the taxonomy graph.
//!
//! Nodes and connections live in flat, id-addressed collections. A
//! connection refers to its endpoints by [`NodeId`], never by pointer, so
//! the graph has no ownership cycles.

use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{TaxonomyError, TaxonomyResult};

// =============================================================================
// Identifiers
// =============================================================================

/// Stable public identifier of a node (e.g. `urn:subject:1`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Create a node id from any string-like value.
    pub fn new(id: impl Into<String>) -> Self {
        NodeId(id.into())
    }

    /// The raw id string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The segment this node contributes to a context path.
    ///
    /// A leading `urn:` is dropped, so `urn:subject:1` becomes `subject:1`.
    pub fn path_part(&self) -> &str {
        self.0.strip_prefix("urn:").unwrap_or(&self.0)
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for NodeId {
    fn from(s: &str) -> Self {
        NodeId(s.to_string())
    }
}

impl From<String> for NodeId {
    fn from(s: String) -> Self {
        NodeId(s)
    }
}

/// Public identifier of a connection.
///
/// Displays as `urn:node-connection:{uuid}`; ordering follows the uuid and
/// is used as the final tie-break when electing a primary parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EdgeId(Uuid);

impl EdgeId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        EdgeId(Uuid::new_v4())
    }

    /// Wrap an existing uuid.
    pub fn from_uuid(uuid: Uuid) -> Self {
        EdgeId(uuid)
    }

    /// Deterministic id from a 128-bit value. Mostly useful in tests.
    pub fn from_u128(value: u128) -> Self {
        EdgeId(Uuid::from_u128(value))
    }

    /// The underlying uuid.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for EdgeId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "urn:node-connection:{}", self.0)
    }
}

/// Partition key selecting which taxonomy version a call operates on.
///
/// Passed explicitly to every store and engine call; there is no ambient
/// "current version".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionId(String);

impl VersionId {
    /// Name of the version used when callers have no preference.
    pub const DEFAULT: &'static str = "default";

    /// Create a version id.
    pub fn new(id: impl Into<String>) -> Self {
        VersionId(id.into())
    }

    /// The raw version name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for VersionId {
    fn default() -> Self {
        VersionId(Self::DEFAULT.to_string())
    }
}

impl fmt::Display for VersionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for VersionId {
    fn from(s: &str) -> Self {
        VersionId(s.to_string())
    }
}

// =============================================================================
// Classification enums
// =============================================================================

/// Closed set of node types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeType {
    /// Top-level container grouping subjects.
    Programme,
    /// Subject; usually a context root.
    Subject,
    /// Topic inside a subject or another topic.
    Topic,
    /// Learning resource. The only graded (leaf) type.
    Resource,
}

impl NodeType {
    /// Leaf nodes carry their own quality grade and connect via
    /// [`ConnectionKind::Leaf`].
    pub fn is_leaf(self) -> bool {
        matches!(self, NodeType::Resource)
    }
}

/// How many same-kind parents a child may have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentPolicy {
    /// At most one parent of the kind.
    Single,
    /// Any number of parents, but each parent at most once.
    Deduplicated,
}

/// Discriminates the two relation kinds stored as connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionKind {
    /// Branch-to-branch (structural hierarchy).
    Branch,
    /// Branch-to-leaf (resource placement).
    Leaf,
}

impl ConnectionKind {
    /// The kind a connection to a child of `child_type` must have.
    pub fn for_child(child_type: NodeType) -> Self {
        if child_type.is_leaf() {
            ConnectionKind::Leaf
        } else {
            ConnectionKind::Branch
        }
    }

    /// Parent multiplicity allowed for a child of `child_type` under this kind.
    ///
    /// Topics form a strict hierarchy; everything else may be placed under
    /// several parents.
    pub fn parent_policy(self, child_type: NodeType) -> ParentPolicy {
        match (self, child_type) {
            (ConnectionKind::Branch, NodeType::Topic) => ParentPolicy::Single,
            _ => ParentPolicy::Deduplicated,
        }
    }
}

/// Relevance tag of a connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Relevance {
    /// Core curriculum content (default).
    #[default]
    Core,
    /// Supplementary content.
    Supplementary,
}

impl Relevance {
    /// Public urn of the relevance.
    pub fn as_urn(self) -> &'static str {
        match self {
            Relevance::Core => "urn:relevance:core",
            Relevance::Supplementary => "urn:relevance:supplementary",
        }
    }
}

// =============================================================================
// Quality grades
// =============================================================================

/// A human-assigned quality grade between 1 and 5 inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct Grade(u8);

impl Grade {
    /// Lowest valid grade.
    pub const MIN: u8 = 1;
    /// Highest valid grade.
    pub const MAX: u8 = 5;

    /// Validate and wrap a grade value.
    pub fn new(value: u8) -> TaxonomyResult<Self> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Grade(value))
        } else {
            Err(TaxonomyError::invalid_argument(format!(
                "grade must be between {} and {}, got {}",
                Self::MIN,
                Self::MAX,
                value
            )))
        }
    }

    /// The numeric grade.
    pub fn value(self) -> u8 {
        self.0
    }
}

impl TryFrom<u8> for Grade {
    type Error = TaxonomyError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Grade::new(value)
    }
}

impl From<Grade> for u8 {
    fn from(g: Grade) -> u8 {
        g.0
    }
}

/// Running `(sum, count)` of leaf grades below a node.
///
/// Merging and unmerging are O(1), which is what lets ancestors absorb a
/// whole subtree without re-walking it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeAverage {
    /// Sum of contributing grades.
    pub sum: u64,
    /// Number of contributing grades.
    pub count: u64,
}

impl GradeAverage {
    /// A single-grade average.
    pub fn from_grade(grade: Grade) -> Self {
        GradeAverage {
            sum: u64::from(grade.value()),
            count: 1,
        }
    }

    /// Add another average into this one.
    pub fn merge(&mut self, other: GradeAverage) {
        self.sum += other.sum;
        self.count += other.count;
    }

    /// Remove a previously merged average. Saturates at zero.
    pub fn unmerge(&mut self, other: GradeAverage) {
        self.sum = self.sum.saturating_sub(other.sum);
        self.count = self.count.saturating_sub(other.count);
    }

    /// True when no grade contributes.
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Mean grade, or None when empty.
    pub fn average(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum as f64 / self.count as f64)
        }
    }

    /// Replace `old` with `new` inside `current`.
    ///
    /// Returns None once nothing contributes any more.
    pub fn apply_delta(
        current: Option<GradeAverage>,
        old: Option<GradeAverage>,
        new: Option<GradeAverage>,
    ) -> Option<GradeAverage> {
        let mut avg = current.unwrap_or_default();
        if let Some(old) = old {
            avg.unmerge(old);
        }
        if let Some(new) = new {
            avg.merge(new);
        }
        if avg.is_empty() {
            None
        } else {
            Some(avg)
        }
    }
}

// =============================================================================
// Contexts
// =============================================================================

/// One materialized root-to-node path for a node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Context {
    /// Id of the context root at the top of the chain.
    pub root_id: NodeId,
    /// Display name of the root.
    pub root_name: String,
    /// Slash-separated path, e.g. `/subject:1/topic:2`.
    pub path: String,
    /// Names along the chain below the root, ending with this node.
    pub breadcrumbs: Vec<String>,
    /// Ancestor ids from the root down to the direct parent.
    pub parent_ids: Vec<NodeId>,
    /// Context ids of the ancestor contexts, root first.
    pub parent_context_ids: Vec<String>,
    /// AND of visibility along the chain.
    pub is_visible: bool,
    /// Primary flag of the connection this context goes through.
    pub is_primary: bool,
    /// Relevance of that connection.
    pub relevance: Relevance,
    /// Stable identity hash.
    pub context_id: String,
    /// Rank of the connection (0 for root contexts).
    pub rank: i32,
    /// The connection, absent for root contexts.
    pub connection_id: Option<EdgeId>,
}

// =============================================================================
// Nodes and connections
// =============================================================================

fn default_visible() -> bool {
    true
}

/// A taxonomy node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Public id.
    pub id: NodeId,
    /// Display name.
    pub name: String,
    /// Node type.
    pub node_type: NodeType,
    /// Visibility flag (default true).
    #[serde(default = "default_visible")]
    pub visible: bool,
    /// Whether the node starts contexts of its own.
    #[serde(default)]
    pub context_root: bool,
    /// Own grade; only meaningful for leaf nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_grade: Option<Grade>,
    /// Aggregate of grades below this node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub child_quality_average: Option<GradeAverage>,
    /// Current materialized contexts.
    #[serde(default)]
    pub contexts: Vec<Context>,
    /// Every context id ever assigned to this node.
    #[serde(default)]
    pub context_ids: BTreeSet<String>,
}

impl Node {
    /// Create a visible, non-root, ungraded node.
    pub fn new(id: impl Into<NodeId>, name: impl Into<String>, node_type: NodeType) -> Self {
        Node {
            id: id.into(),
            name: name.into(),
            node_type,
            visible: true,
            context_root: false,
            quality_grade: None,
            child_quality_average: None,
            contexts: Vec::new(),
            context_ids: BTreeSet::new(),
        }
    }

    /// Builder: mark as context root.
    pub fn context_root(mut self, context_root: bool) -> Self {
        self.context_root = context_root;
        self
    }

    /// Builder: set visibility.
    pub fn visible(mut self, visible: bool) -> Self {
        self.visible = visible;
        self
    }

    /// Builder: set own grade.
    pub fn grade(mut self, grade: Grade) -> Self {
        self.quality_grade = Some(grade);
        self
    }

    /// The kind a connection to this node as child must have.
    pub fn connection_kind(&self) -> ConnectionKind {
        ConnectionKind::for_child(self.node_type)
    }
}

/// A directed, ranked, primary-flaggable parent/child connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Connection {
    /// Public id.
    pub id: EdgeId,
    /// Parent node.
    pub parent: NodeId,
    /// Child node.
    pub child: NodeId,
    /// Relation kind.
    pub kind: ConnectionKind,
    /// Relevance tag.
    #[serde(default)]
    pub relevance: Relevance,
    /// Ordering key among the parent's children.
    pub rank: i32,
    /// Canonical-parent flag.
    pub primary: bool,
}

impl Connection {
    /// A fresh non-primary, core, rank-0 connection.
    pub fn new(parent: NodeId, child: NodeId, kind: ConnectionKind) -> Self {
        Connection {
            id: EdgeId::new(),
            parent,
            child,
            kind,
            relevance: Relevance::Core,
            rank: 0,
            primary: false,
        }
    }
}
