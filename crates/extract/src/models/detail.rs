use serde::{Deserialize, Serialize};

/// Value of a detail row from the entry info panel.
///
/// The shape depends on the row label: `year` is always text, `type` is
/// always a list of URLs, anything else is text when the value cell has text
/// of its own and the list of its link targets otherwise.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DetailValue {
    Text(String),
    Links(Vec<String>),
}
impl DetailValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            Self::Links(_) => None,
        }
    }

    pub fn as_links(&self) -> Option<&[String]> {
        match self {
            Self::Text(_) => None,
            Self::Links(links) => Some(links),
        }
    }
}
impl From<String> for DetailValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}
impl From<Vec<String>> for DetailValue {
    fn from(value: Vec<String>) -> Self {
        Self::Links(value)
    }
}
