use super::{DetailValue, Relation, RelationKind, RelationStatus, Section};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One extracted entry page. This is the record handed to persistence, which
/// upserts by [`url`](Self::url).
///
/// Every map is insertion-ordered and nothing here depends on the wall clock,
/// so extracting an unchanged page always serializes to the same bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Page URL (unique key)
    pub url: String,
    pub title: String,
    pub category: Option<String>,
    /// Unix timestamp of the "added" marker, absent on pages that only show an update.
    pub added_at: Option<i64>,
    /// Unix timestamp of the most recent update.
    pub updated_at: Option<i64>,
    pub image_url: Option<String>,
    /// Head meta tags, keyed by `property` or `name`.
    pub meta: IndexMap<String, String>,
    /// Embedded JSON-LD, opaque to the extractor.
    pub structured_data: Option<Value>,
    pub parent_url: Option<String>,
    /// Detail rows keyed by lowercased label.
    pub details: IndexMap<String, DetailValue>,
    /// Body outline, only present for entries of the primary category.
    pub content: Option<IndexMap<String, Section>>,
    pub tags: Vec<String>,
    pub additional_references: IndexMap<String, String>,
    pub search_keywords: Option<Vec<String>>,
    pub siblings: Option<Relation>,
    pub children: Option<Relation>,
}
impl Entry {
    pub fn relation(&self, kind: RelationKind) -> Option<&Relation> {
        match kind {
            RelationKind::Siblings => self.siblings.as_ref(),
            RelationKind::Children => self.children.as_ref(),
        }
    }

    fn relation_mut(&mut self, kind: RelationKind) -> Option<&mut Relation> {
        match kind {
            RelationKind::Siblings => self.siblings.as_mut(),
            RelationKind::Children => self.children.as_mut(),
        }
    }
}

/// An [`Entry`] that may still be waiting on its relation lists.
///
/// The draft is the only mutable form of an entry; [`finalize`](Self::finalize)
/// consumes it, so an emitted entry can never be touched again.
#[derive(Debug, Clone, PartialEq)]
pub struct EntryDraft {
    entry: Entry,
}
impl EntryDraft {
    pub fn url(&self) -> &str {
        &self.entry.url
    }

    pub fn entry(&self) -> &Entry {
        &self.entry
    }

    /// Relation references that have not settled yet.
    pub fn unsettled(&self) -> Vec<(RelationKind, String)> {
        RelationKind::ALL
            .into_iter()
            .filter_map(|kind| {
                self.entry.relation(kind).filter(|r| !r.status.is_settled()).map(|r| (kind, r.url.clone()))
            })
            .collect()
    }

    /// Updates the status of a relation reference. Settled relations are
    /// terminal; a second settlement is ignored and reported as `false`.
    pub fn set_relation(&mut self, kind: RelationKind, status: RelationStatus) -> bool {
        match self.entry.relation_mut(kind) {
            Some(relation) if !relation.status.is_settled() => {
                relation.status = status;
                true
            },
            _ => false,
        }
    }

    /// Returns `true` when no relation is left waiting.
    pub fn is_complete(&self) -> bool {
        self.unsettled().is_empty()
    }

    pub fn finalize(self) -> Entry {
        self.entry
    }
}
impl From<Entry> for EntryDraft {
    fn from(entry: Entry) -> Self {
        Self { entry }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry() -> Entry {
        Entry {
            url: "https://example.org/memes/a".to_string(),
            title: "A".to_string(),
            category: None,
            added_at: None,
            updated_at: Some(1),
            image_url: None,
            meta: IndexMap::new(),
            structured_data: None,
            parent_url: None,
            details: IndexMap::new(),
            content: None,
            tags: vec![],
            additional_references: IndexMap::new(),
            search_keywords: None,
            siblings: Some(Relation::new("https://example.org/memes/a/siblings")),
            children: None,
        }
    }

    #[test]
    fn test_field_names() {
        let json = serde_json::to_value(entry()).unwrap();
        let keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        for expected in [
            "url",
            "title",
            "category",
            "addedAt",
            "updatedAt",
            "imageUrl",
            "meta",
            "structuredData",
            "parentUrl",
            "details",
            "content",
            "tags",
            "additionalReferences",
            "searchKeywords",
            "siblings",
            "children",
        ] {
            assert!(keys.iter().any(|k| k == expected), "missing {expected}");
        }
        assert_eq!(keys.len(), 16);
    }

    #[test]
    fn test_settled_relation_is_terminal() {
        let mut draft = EntryDraft::from(entry());
        assert_eq!(draft.unsettled(), vec![(RelationKind::Siblings, "https://example.org/memes/a/siblings".into())]);
        assert!(!draft.set_relation(RelationKind::Children, RelationStatus::Failed));
        assert!(draft.set_relation(RelationKind::Siblings, RelationStatus::Failed));
        assert!(!draft.set_relation(RelationKind::Siblings, RelationStatus::Resolved { entries: vec![] }));
        assert!(draft.is_complete());
        assert_eq!(draft.finalize().siblings.unwrap().status, RelationStatus::Failed);
    }
}
