use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A link found inside a body paragraph.
///
/// Serialized as a `[text, url]` pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "(String, String)", into = "(String, String)")]
pub struct Link {
    /// Link text, as written (not whitespace-normalized).
    pub text: String,
    /// Absolute URL for internal links, untouched for external ones.
    pub url: String,
}
impl From<(String, String)> for Link {
    fn from((text, url): (String, String)) -> Self {
        Self { text, url }
    }
}
impl From<Link> for (String, String) {
    fn from(link: Link) -> Self {
        (link.text, link.url)
    }
}

/// One node of the outline built from an entry's heading structure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Section {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub text: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub links: Vec<Link>,
    /// Nested sections keyed by lowercased heading text, in document order.
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub subsections: IndexMap<String, Section>,
}
impl Section {
    pub fn is_empty(&self) -> bool {
        self.text.is_empty() && self.images.is_empty() && self.links.is_empty() && self.subsections.is_empty()
    }
}
