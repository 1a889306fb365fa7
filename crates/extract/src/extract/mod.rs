//! Entry extraction from a single wiki entry page.

mod details;
mod outline;

use std::convert::Infallible;
use std::str::FromStr;

pub use self::details::Details;
use self::outline::Outline;
use crate::ExtractOptions;
use crate::consts;
use crate::error::{ErrorKind, Result};
use crate::models::{Entry, EntryDraft, FollowUp, Relation, RelationKind};
use exn::{OptionExt, ResultExt};
use indexmap::IndexMap;
use scraper::{ElementRef, Html};
use serde_json::Value;
use time::format_description::well_known::Iso8601;
use time::{OffsetDateTime, PrimitiveDateTime};
use tracing::{instrument, warn};
use url::Url;

/// Result of extracting one entry page: the draft entry and the fetches it
/// depends on or asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct Extraction {
    pub draft: EntryDraft,
    pub follow_ups: Vec<FollowUp>,
}

#[derive(Debug)]
pub struct Extractor {
    document: Html,
}
impl Extractor {
    pub fn from_document(document: Html) -> Self {
        Self { document }
    }

    pub fn from_html(html: &str) -> Self {
        Self::from_document(Html::parse_document(html))
    }

    /// Returns `true` if the document has the anchors every entry page has
    /// (an entry header with a title).
    pub fn is_valid(&self) -> bool {
        self.header().and_then(|header| self.title(header)).is_ok()
    }

    /// Extracts the entry found at `page_url`.
    ///
    /// Follow-ups are returned in a stable order: the parent page first, then
    /// the sibling list, then the child list.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `page_url` is not an absolute URL,
    /// - the entry header or the title are missing,
    /// - the page carries more than two timestamps, or one can't be parsed.
    #[instrument(skip(self, options))]
    pub fn entry(&self, page_url: &str, options: &ExtractOptions) -> Result<Extraction> {
        let page = Url::parse(page_url).or_raise(|| ErrorKind::InvalidUrl(page_url.to_string()))?;
        let header = self.header()?;
        let info = header
            .select(&consts::INFO_SELECTOR)
            .next()
            .ok_or_raise(|| ErrorKind::MalformedPage("info section"))?;
        let title = self.title(header)?;
        let (added_at, updated_at) = self.timestamps(info)?;
        let category = self.category(info);
        let parent_url = self.parent(info, options);
        let content = category
            .as_deref()
            .filter(|c| *c == options.primary_category)
            .map(|_| Outline::new(options).walk(self.document.select(&consts::SECTION_CONTAINER_SELECTOR)));
        let siblings = self.relation(&page, RelationKind::Siblings, options);
        let children = self.relation(&page, RelationKind::Children, options);

        let mut follow_ups = Vec::new();
        if let Some(parent) = &parent_url {
            follow_ups.push(FollowUp::Parent(parent.clone()));
        }
        for (kind, relation) in [(RelationKind::Siblings, &siblings), (RelationKind::Children, &children)] {
            if let Some(relation) = relation {
                follow_ups.push(FollowUp::Relation(kind, relation.url.clone()));
            }
        }

        let entry = Entry {
            url: page_url.to_string(),
            title,
            category,
            added_at,
            updated_at,
            image_url: self.image(header),
            meta: self.meta(options),
            structured_data: self.structured_data(),
            parent_url,
            details: Details::new(info).values(options),
            content,
            tags: self.tags(),
            additional_references: self.additional_references(),
            search_keywords: self.search_keywords(),
            siblings,
            children,
        };
        Ok(Extraction { draft: entry.into(), follow_ups })
    }

    fn header(&self) -> Result<ElementRef<'_>> {
        self.document
            .select(&consts::HEADER_SELECTOR)
            .next()
            .ok_or_raise(|| ErrorKind::MalformedPage("entry header"))
    }

    fn title(&self, header: ElementRef<'_>) -> Result<String> {
        header
            .select(&consts::INFO_SELECTOR)
            .next()
            .and_then(|info| info.select(&consts::TITLE_SELECTOR).next())
            .map(|el| el.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or_raise(|| ErrorKind::MalformedPage("title"))
    }

    /// One timestamp is the last update; two are "added" then "updated".
    fn timestamps(&self, info: ElementRef<'_>) -> Result<(Option<i64>, Option<i64>)> {
        let stamps = info
            .select(&consts::TIMEAGO_SELECTOR)
            .filter_map(|abbr| abbr.value().attr("title"))
            .map(parse_timestamp)
            .collect::<Result<Vec<_>>>()?;
        Ok(match stamps.as_slice() {
            [] => (None, None),
            [updated] => (None, Some(*updated)),
            [added, updated] => (Some(*added), Some(*updated)),
            _ => exn::bail!(ErrorKind::MalformedPage("more than two timestamps")),
        })
    }

    fn category(&self, info: ElementRef<'_>) -> Option<String> {
        info.select(&consts::CATEGORY_SELECTOR)
            .next()
            .map(|span| span.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn image(&self, header: ElementRef<'_>) -> Option<String> {
        header.select(&consts::IMAGE_SELECTOR).next().and_then(|a| anchor_href(&a)).map(str::to_string)
    }

    fn meta(&self, options: &ExtractOptions) -> IndexMap<String, String> {
        let mut meta = IndexMap::new();
        for tag in self.document.select(&consts::META_SELECTOR) {
            let element = tag.value();
            let key = match (element.attr("property"), element.attr("name")) {
                (Some(property), _) => property,
                (None, Some(name)) if !options.meta_denylist.iter().any(|denied| denied == name) => name,
                _ => continue,
            };
            if let Some(content) = element.attr("content") {
                meta.insert(key.to_string(), content.to_string());
            }
        }
        meta
    }

    /// Embedded JSON-LD. Invalid JSON costs the field, not the entry.
    fn structured_data(&self) -> Option<Value> {
        let script = self.document.select(&consts::STRUCTURED_DATA_SELECTOR).next()?;
        let raw = script.text().collect::<String>();
        if raw.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(&raw) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!(%error, "omitting unparseable structured data");
                None
            },
        }
    }

    fn parent(&self, info: ElementRef<'_>, options: &ExtractOptions) -> Option<String> {
        info.select(&consts::SPAN_SELECTOR)
            .filter(|span| own_text(span).contains(consts::PARENT_MARKER))
            .find_map(|span| span.select(&consts::HREF_SELECTOR).next())
            .and_then(|a| anchor_href(&a))
            .and_then(|href| options.resolve(href))
            .map(String::from)
    }

    fn tags(&self) -> Vec<String> {
        self.document
            .select(&consts::TAG_LINK_SELECTOR)
            .map(|a| a.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    fn additional_references(&self) -> IndexMap<String, String> {
        self.document
            .select(&consts::OTHER_LINK_SELECTOR)
            .filter_map(|a| Some((a.text().collect::<String>().trim().to_string(), anchor_href(&a)?.to_string())))
            .collect()
    }

    /// Keywords of the embedded search-interest widget; its second script
    /// carries the widget configuration.
    fn search_keywords(&self) -> Option<Vec<String>> {
        let wrapper = self.document.select(&consts::TRENDS_WRAPPER_SELECTOR).next()?;
        let script = wrapper
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|el| el.value().name() == "script")
            .nth(1)?;
        let raw = script.text().collect::<String>();
        Some(consts::KEYWORD_REGEX.captures_iter(&raw).map(|c| c[1].to_string()).collect())
    }

    /// The relation list lives right below the entry's own URL, e.g.
    /// `/memes/foo/children` for `/memes/foo`.
    fn relation(&self, page: &Url, kind: RelationKind, options: &ExtractOptions) -> Option<Relation> {
        let suffix = match kind {
            RelationKind::Siblings => consts::SIBLINGS_SUFFIX,
            RelationKind::Children => consts::CHILDREN_SUFFIX,
        };
        let expected = format!("{}{}", page.path().trim_end_matches('/'), suffix);
        self.document
            .select(&consts::HREF_SELECTOR)
            .filter_map(|a| anchor_href(&a).and_then(|href| options.resolve(href)))
            .find(|url| url.host_str() == page.host_str() && url.path() == expected)
            .map(|mut url| {
                url.set_fragment(None);
                Relation::new(url)
            })
    }
}
impl FromStr for Extractor {
    type Err = Infallible;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(Self::from_html(s))
    }
}
impl From<String> for Extractor {
    fn from(value: String) -> Self {
        Self::from_html(&value)
    }
}
impl From<Html> for Extractor {
    fn from(document: Html) -> Self {
        Self::from_document(document)
    }
}

/// Parses an ISO-8601 timestamp into unix seconds. Timestamps without an
/// offset are taken to be UTC.
fn parse_timestamp(value: &str) -> Result<i64> {
    let value = value.trim();
    if let Ok(datetime) = OffsetDateTime::parse(value, &Iso8601::DEFAULT) {
        return Ok(datetime.unix_timestamp());
    }
    PrimitiveDateTime::parse(value, &Iso8601::DEFAULT)
        .map(|datetime| datetime.assume_utc().unix_timestamp())
        .or_raise(|| ErrorKind::ParseError { field: "timestamp", value: value.to_string() })
}

/// Non-empty `href` of an anchor.
pub(crate) fn anchor_href<'a>(anchor: &ElementRef<'a>) -> Option<&'a str> {
    anchor.value().attr("href").map(str::trim).filter(|s| !s.is_empty())
}

/// Text of an element's direct text children, ignoring nested elements.
pub(crate) fn own_text(element: &ElementRef<'_>) -> String {
    element.children().filter_map(|node| node.value().as_text()).map(|text| &**text).collect()
}

/// All descendant text with whitespace runs collapsed and trimmed.
pub(crate) fn normalized_text(element: &ElementRef<'_>) -> String {
    element.text().collect::<String>().split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Returns `true` if the HTML content appears to be an entry page.
#[instrument(skip(html), fields(html_size = html.len()))]
pub fn is_valid(html: &str) -> bool {
    Extractor::from_html(html).is_valid()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("2009-02-18T04:08:42-05:00", 1_234_948_122)]
    #[case("2009-02-18T09:08:42Z", 1_234_948_122)]
    #[case("2009-02-18T09:08:42", 1_234_948_122)]
    fn test_parse_timestamp(#[case] value: &str, #[case] expected: i64) {
        assert_eq!(parse_timestamp(value).unwrap(), expected);
    }

    #[test]
    fn test_parse_timestamp_invalid() {
        let err = parse_timestamp("yesterday").unwrap_err();
        assert!(matches!(&*err, ErrorKind::ParseError { field: "timestamp", .. }));
    }

    #[test]
    fn test_normalized_text() {
        let document = Html::parse_fragment("<p>  Hello\n   <b>big</b>\tworld  </p>");
        let p = document.select(&scraper::Selector::parse("p").unwrap()).next().unwrap();
        assert_eq!(normalized_text(&p), "Hello big world");
        assert_eq!(own_text(&p), "  Hello\n   \tworld  ");
    }

    fn trends_page(config: &str) -> String {
        format!(
            r#"<html><body><article class="entry"><div id="entry_body">
               <div class="google-trends-embed-wrapper"><script src="loader.js"></script>
               <script>trends.embed.renderExploreWidget("TIMESERIES", {config});</script></div>
               </div></article></body></html>"#
        )
    }

    #[rstest]
    #[case(
        r#"{"comparisonItem":[{"keyword":"doge","time":"today 5-y"},{"keyword":"shiba","geo":"US"},{"keyword":"wow","time":"x"}]}"#,
        vec!["doge", "shiba", "wow"]
    )]
    #[case(r#"{"comparisonItem":[{"keyword":"much \"wow\"","geo":""}]}"#, vec![r#"much \"wow\""#])]
    #[case(r#"{"comparisonItem":[]}"#, vec![])]
    fn test_search_keywords(#[case] config: &str, #[case] expected: Vec<&str>) {
        let extractor = Extractor::from_html(&trends_page(config));
        assert_eq!(extractor.search_keywords(), Some(expected.into_iter().map(String::from).collect()));
    }

    #[test]
    fn test_trailing_blocks_follow_the_body() {
        let html = r#"<html><body>
            <div class="tags"><a>sidebar</a></div>
            <div class="other-links"><a href="https://ads.example">Ad</a></div>
            <article class="entry">
              <div class="tags"><a>before body</a></div>
              <div id="entry_body"></div>
              <div class="tags"><a>dog</a></div>
              <div class="other-links"><a href="https://en.wikipedia.org/wiki/Doge">Wikipedia</a></div>
            </article></body></html>"#;
        let extractor = Extractor::from_html(html);
        assert_eq!(extractor.tags(), vec!["dog"]);
        let references = extractor.additional_references();
        assert_eq!(references.keys().collect::<Vec<_>>(), vec!["Wikipedia"]);
    }

    #[rstest]
    #[case("<p>a<b>b</b>.</p>", "ab.")]
    #[case("<p>un<b>break</b>able</p>", "unbreakable")]
    #[case("<p>that is <a href=\"/slang\">slang</a>.</p>", "that is slang.")]
    #[case("<p> <i>one</i>\n<i>two</i> </p>", "one two")]
    fn test_normalized_text_inline_boundaries(#[case] html: &str, #[case] expected: &str) {
        let document = Html::parse_fragment(html);
        let p = document.select(&scraper::Selector::parse("p").unwrap()).next().unwrap();
        assert_eq!(normalized_text(&p), expected);
    }
}
