//! Domain layer
//!
//! # Domain Models
//!
//! - `HierarchyNode`: node metadata as read from the hierarchy source
//! - `IntervalRecord`: one row of the nested-set index
//!
//! # Port Traits
//!
//! - `HierarchySource`: node metadata + ordered child edges
//! - `LabelSource`: disease labels in use and their canonical linkage
//! - `IndexStore`: staged replacement of the published index
//! - `IndexQuery`: containment lookups against the published index

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::Result;

// ═══════════════════════════════════════════════════════════════════════════
// Domain Models
// ═══════════════════════════════════════════════════════════════════════════

/// Metadata for one hierarchy concept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HierarchyNode {
    pub id: String,
    pub name: String,
    pub definition: Option<String>,
}

impl HierarchyNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            definition: None,
        }
    }

    pub fn with_definition(mut self, definition: impl Into<String>) -> Self {
        self.definition = Some(definition.into());
        self
    }
}

/// One row of the nested-set index.
///
/// Ancestor/descendant tests reduce to interval containment: `d` lies in the
/// subtree of `a` iff `a.left <= d.left && d.right <= a.right`.
///
/// # Examples
///
/// ```rust
/// use disease_tree::domain::IntervalRecord;
///
/// let parent = IntervalRecord::canonical(2, 3, "A", "A", None);
/// let child = IntervalRecord::canonical(3, 3, "A1", "A1", None);
/// assert!(parent.contains(&child));
/// assert!(child.is_leaf());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntervalRecord {
    /// Preorder position (primary key)
    pub left: i64,
    /// Largest counter value assigned inside this subtree
    pub right: i64,
    /// Hierarchy identifier, `None` for orphan labels
    pub external_id: Option<String>,
    pub name: String,
    pub definition: Option<String>,
}

impl IntervalRecord {
    /// Record for a node of the canonical hierarchy.
    pub fn canonical(
        left: i64,
        right: i64,
        external_id: impl Into<String>,
        name: impl Into<String>,
        definition: Option<String>,
    ) -> Self {
        Self {
            left,
            right,
            external_id: Some(external_id.into()),
            name: name.into(),
            definition,
        }
    }

    /// Singleton record for a label outside the canonical hierarchy.
    pub fn orphan(position: i64, label: impl Into<String>, definition: impl Into<String>) -> Self {
        Self {
            left: position,
            right: position,
            external_id: None,
            name: label.into(),
            definition: Some(definition.into()),
        }
    }

    pub fn is_orphan(&self) -> bool {
        self.external_id.is_none()
    }

    pub fn is_leaf(&self) -> bool {
        self.left == self.right
    }

    /// Inclusive containment; a record contains itself.
    pub fn contains(&self, other: &IntervalRecord) -> bool {
        self.left <= other.left && other.right <= self.right
    }

    /// Ranges share no counter value.
    pub fn is_disjoint(&self, other: &IntervalRecord) -> bool {
        self.right < other.left || other.right < self.left
    }
}

/// SHA-256 over the ordered `(left, right, external_id, name)` tuples.
///
/// Equal checksums across two runs mean identical interval assignment.
pub fn interval_checksum(records: &[IntervalRecord]) -> String {
    let mut hasher = Sha256::new();
    for record in records {
        hasher.update(record.left.to_le_bytes());
        hasher.update(record.right.to_le_bytes());
        match &record.external_id {
            Some(id) => {
                hasher.update([1u8]);
                hasher.update(id.as_bytes());
            }
            None => hasher.update([0u8]),
        }
        hasher.update(record.name.as_bytes());
        hasher.update([0xffu8]);
    }
    format!("{:x}", hasher.finalize())
}

// ═══════════════════════════════════════════════════════════════════════════
// Port Traits
// ═══════════════════════════════════════════════════════════════════════════

/// Read-only access to the disease-concept hierarchy.
pub trait HierarchySource {
    /// `(name, definition)` for a node.
    ///
    /// # Errors
    ///
    /// Returns `ErrorKind::NotFound` if the node has no metadata row.
    fn node_details(&self, id: &str) -> Result<(String, Option<String>)>;

    /// Child ids of `id`, possibly empty.
    ///
    /// The order must be stable across runs; it fixes the interval
    /// assignment.
    fn children(&self, id: &str) -> Result<Vec<String>>;
}

/// Read-only access to the disease labels referenced by assignment data.
pub trait LabelSource {
    fn distinct_labels(&self) -> Result<Vec<String>>;

    /// True when the label resolves to a canonical hierarchy identifier.
    fn is_canonically_linked(&self, label: &str) -> Result<bool>;

    /// Labels with no canonical link, in no particular order.
    fn unlinked_labels(&self) -> Result<Vec<String>> {
        let mut unlinked = Vec::new();
        for label in self.distinct_labels()? {
            if !self.is_canonically_linked(&label)? {
                unlinked.push(label);
            }
        }
        Ok(unlinked)
    }
}

/// Facts about a freshly published generation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Generation {
    pub generation: i64,
    pub built_at: String,
    pub record_count: usize,
    pub canonical_count: usize,
    pub orphan_count: usize,
    pub checksum: String,
}

/// Persistence of the nested-set index.
pub trait IndexStore {
    /// Stage, validate and atomically publish `records`, replacing the
    /// previous generation.
    ///
    /// # Errors
    ///
    /// - `ConstraintViolation` on duplicate `left` or an invalid interval
    /// - `StoreUnavailable` on any store failure
    ///
    /// On error the previously published index is left untouched.
    fn replace(&mut self, records: &[IntervalRecord]) -> Result<Generation>;
}

/// Containment queries against the published index.
pub trait IndexQuery {
    /// Every record carrying `external_id` (several under shared descendants).
    fn lookup(&self, external_id: &str) -> Result<Vec<IntervalRecord>>;

    /// Records inside the first interval named `name`, itself included,
    /// ordered by `left`.
    ///
    /// "First" is the smallest `left`. When distinct concepts share a name,
    /// only that one interval is searched; the ranges of the others are not
    /// merged into it.
    fn descendants_of_name(&self, name: &str) -> Result<Vec<IntervalRecord>>;

    /// Records whose interval contains the one at `left`, outermost first.
    fn ancestors_of(&self, left: i64) -> Result<Vec<IntervalRecord>>;
}

// ═══════════════════════════════════════════════════════════════════════════
// Tests
// ═══════════════════════════════════════════════════════════════════════════
