use crate::ExtractOptions;
use crate::consts;
use crate::extract::anchor_href;
use scraper::Html;
use std::collections::HashSet;
use tracing::instrument;

/// One page of a paginated entry list (a relation list, or the site index).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Absolute entry URLs, in document order, without duplicates.
    pub entries: Vec<String>,
    /// Absolute URL of the next page, if there is one.
    pub next: Option<String>,
}

/// Parses a list page. Links that can't be resolved against the site base are
/// skipped, as are fragments (`/memes/x#comments` and `/memes/x` are the same
/// entry).
#[instrument(skip(html, options), fields(html_size = html.len()))]
pub fn parse_list_page(html: &str, options: &ExtractOptions) -> ListPage {
    let document = Html::parse_document(html);
    let mut seen = HashSet::new();
    let mut entries = Vec::new();
    for anchor in document.select(&consts::LIST_ENTRY_SELECTOR) {
        let Some(mut url) = anchor_href(&anchor).and_then(|href| options.resolve(href)) else {
            continue;
        };
        url.set_fragment(None);
        let url = String::from(url);
        if seen.insert(url.clone()) {
            entries.push(url);
        }
    }
    let next = document
        .select(&consts::NEXT_PAGE_SELECTOR)
        .next()
        .and_then(|a| anchor_href(&a))
        .and_then(|href| options.resolve(href))
        .map(String::from);
    ListPage { entries, next }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(rows: &str, next: Option<&str>) -> String {
        let next = next.map(|href| format!(r#"<a rel="next" href="{href}">Next</a>"#)).unwrap_or_default();
        format!(r#"<html><body><table class="entry_list"><tr>{rows}</tr></table><div class="pagination">{next}</div></body></html>"#)
    }

    #[test]
    fn test_entries_and_next() {
        let html = page(
            r#"<td><h2><a href="/memes/a">A</a></h2></td>
               <td><h2><a href="/memes/b#comments">B</a></h2></td>
               <td><h2><a href="/memes/a">A again</a></h2></td>
               <td><a href="/memes/not-an-entry">ignored</a></td>"#,
            Some("/memes/x/children/page/2"),
        );
        let list = parse_list_page(&html, &ExtractOptions::default());
        assert_eq!(list.entries, vec!["https://knowyourmeme.com/memes/a", "https://knowyourmeme.com/memes/b"]);
        assert_eq!(list.next.as_deref(), Some("https://knowyourmeme.com/memes/x/children/page/2"));
    }

    #[test]
    fn test_last_page() {
        let list = parse_list_page(&page("", None), &ExtractOptions::default());
        assert_eq!(list, ListPage::default());
    }
}
