use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};

/// Which relation list an entry references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RelationKind {
    /// Entries sharing the same parent.
    Siblings,
    /// Entries that are part of this entry's series.
    Children,
}
impl RelationKind {
    pub const ALL: [RelationKind; 2] = [RelationKind::Siblings, RelationKind::Children];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationKind::Siblings => "siblings",
            RelationKind::Children => "children",
        }
    }
}
impl Display for RelationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "{}", self.as_str())
    }
}

/// Resolution state of a relation list, as carried by an entry.
///
/// A relation that failed to resolve carries no list at all: partial results
/// stay in the relation cache and never leak into the entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum RelationStatus {
    Unresolved,
    Resolving,
    Resolved { entries: Vec<String> },
    Failed,
}
impl RelationStatus {
    /// Returns `true` once the status can no longer change.
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Resolved { .. } | Self::Failed)
    }
}

/// A reference from an entry to one of its relation lists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// URL of the (first page of the) relation list.
    pub url: String,
    #[serde(flatten)]
    pub status: RelationStatus,
}
impl Relation {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into(), status: RelationStatus::Unresolved }
    }

    /// The resolved entry URLs, if the list resolved.
    pub fn entries(&self) -> Option<&[String]> {
        match &self.status {
            RelationStatus::Resolved { entries } => Some(entries),
            _ => None,
        }
    }
}
