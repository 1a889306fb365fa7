use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use url::Url;

pub const DEFAULT_BASE_URL: &str = "https://knowyourmeme.com";
pub const DEFAULT_PRIMARY_CATEGORY: &str = "Meme";
pub const DEFAULT_META_DENYLIST: [&str; 4] = ["viewport", "referrer", "p:domain_verify", "domain-verify"];

/// Site-specific knobs for the extractor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractOptions {
    /// Internal links and detail URLs are resolved against this.
    pub base_url: Url,
    /// Only entries of this category get their body outlined.
    pub primary_category: String,
    /// Meta `name`s that are never collected.
    pub meta_denylist: Vec<String>,
}
impl ExtractOptions {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url).or_raise(|| ErrorKind::InvalidUrl(base_url.to_string()))?;
        if base_url.cannot_be_a_base() {
            exn::bail!(ErrorKind::InvalidUrl(base_url.to_string()));
        }
        Ok(Self { base_url, ..Self::default() })
    }

    pub fn with_primary_category(mut self, category: impl Into<String>) -> Self {
        self.primary_category = category.into();
        self
    }

    pub fn with_meta_denylist(mut self, names: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.meta_denylist = names.into_iter().map(Into::into).collect();
        self
    }

    /// Resolves a site-relative link to an absolute URL.
    pub fn resolve(&self, href: &str) -> Option<Url> {
        self.base_url.join(href.trim()).ok()
    }
}
impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            // Safety: constant, known to be a valid absolute URL.
            base_url: Url::parse(DEFAULT_BASE_URL).unwrap(),
            primary_category: DEFAULT_PRIMARY_CATEGORY.to_string(),
            meta_denylist: DEFAULT_META_DENYLIST.iter().map(|s| s.to_string()).collect(),
        }
    }
}
