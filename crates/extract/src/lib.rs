mod consts;
pub mod error;
mod extract;
mod listing;
pub mod models;
mod options;

use tracing::instrument;

use crate::error::Result;
pub use crate::extract::{Details, Extraction, Extractor, is_valid};
pub use crate::listing::{ListPage, parse_list_page};
pub use crate::options::{DEFAULT_BASE_URL, DEFAULT_META_DENYLIST, DEFAULT_PRIMARY_CATEGORY, ExtractOptions};

/// Easy, top-level entrypoint for the extraction of an entry from raw HTML.
///
/// Returns the draft entry together with the follow-up fetches it asks for
/// (its parent page and its relation lists). See [`Extractor`] for more
/// details.
#[instrument(skip(html, options), fields(html_size = html.len()))]
pub fn extract(html: &str, page_url: &str, options: &ExtractOptions) -> Result<Extraction> {
    Extractor::from_html(html).entry(page_url, options)
}
