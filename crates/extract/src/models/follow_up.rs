use super::RelationKind;

/// A fetch the extractor asks for on behalf of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FollowUp {
    /// The series page this entry is part of; extracted with the same rules.
    Parent(String),
    /// A (possibly paginated) relation list to resolve before the entry is emitted.
    Relation(RelationKind, String),
}
impl FollowUp {
    pub fn url(&self) -> &str {
        match self {
            Self::Parent(url) | Self::Relation(_, url) => url,
        }
    }
}
