/// A fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// Final URL of the document, after redirects. Relative links on the page
    /// resolve against this, not against the requested URL.
    pub url: String,
    pub body: String,
}
impl Page {
    pub fn new(url: impl Into<String>, body: impl Into<String>) -> Self {
        Self { url: url.into(), body: body.into() }
    }
}
