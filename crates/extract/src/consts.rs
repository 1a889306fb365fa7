use regex::Regex;
use scraper::Selector;
use std::sync::LazyLock;

macro_rules! selector {
    ($name:ident, $css:expr) => {
        pub(crate) static $name: LazyLock<Selector> = LazyLock::new(|| Selector::parse($css).unwrap());
    };
}

macro_rules! regex {
    ($name:ident, $regex:expr) => {
        pub(crate) static $name: LazyLock<Regex> = LazyLock::new(|| Regex::new($regex).unwrap());
    };
}

// Entry header. Missing header or title means this isn't an entry page at all.
selector!(HEADER_SELECTOR, "article.entry > header");
selector!(INFO_SELECTOR, "section.info");
selector!(IMAGE_SELECTOR, "div.photo-wrapper > a.full-image[href]");
selector!(TIMEAGO_SELECTOR, "abbr.timeago[title]");
selector!(TITLE_SELECTOR, "h1");
selector!(CATEGORY_SELECTOR, "a.category > span");
selector!(SPAN_SELECTOR, "span");
selector!(DETAIL_SELECTOR, "div.details div.detail");

// Document head.
selector!(META_SELECTOR, "head > meta");
selector!(STRUCTURED_DATA_SELECTOR, "#maru > script");

// Entry body and the blocks following it.
selector!(SECTION_CONTAINER_SELECTOR, "div#entry_body > section.bodycopy > div.entry-section-container");
selector!(OUTLINE_SELECTOR, "h1, h2, h3, h4, h5, h6, p, img");
selector!(TAG_LINK_SELECTOR, "div#entry_body ~ div.tags > a");
selector!(OTHER_LINK_SELECTOR, "div#entry_body ~ div.other-links > a");
selector!(TRENDS_WRAPPER_SELECTOR, "div#entry_body div.google-trends-embed-wrapper");
regex!(KEYWORD_REGEX, r#""keyword":"((?:[^"\\]|\\.)*)""#);

// Relation and index listings.
selector!(LIST_ENTRY_SELECTOR, "table.entry_list td h2 a[href]");
selector!(NEXT_PAGE_SELECTOR, r#"a[rel="next"][href]"#);

selector!(ANCHOR_SELECTOR, "a");
selector!(HREF_SELECTOR, "a[href]");

/// Label of the span that links an entry to the series it is part of.
pub(crate) const PARENT_MARKER: &str = "Part of a series on";
/// Class carried by links that leave the site.
pub(crate) const EXTERNAL_LINK_CLASS: &str = "external-link";
pub(crate) const SIBLINGS_SUFFIX: &str = "/siblings";
pub(crate) const CHILDREN_SUFFIX: &str = "/children";
