use super::{anchor_href, normalized_text};
use crate::ExtractOptions;
use crate::consts;
use crate::models::{Link, Section};
use indexmap::IndexMap;
use scraper::ElementRef;

/// Where the next paragraph/image of the body walk lands.
#[derive(Debug, Clone, Copy)]
enum Cursor {
    /// Content with no owning heading (before the first heading, or below a
    /// nested heading that has no top-level parent). It is discarded.
    Detached,
    /// A top-level section, by index.
    Top(usize),
    /// A nested section, by top-level index and subsection index.
    Nested(usize, usize),
}

/// Builds the section tree of an entry body from its headings, paragraphs
/// and images, visited in document order.
///
/// - `h1`–`h3` open a new top-level section,
/// - `h4`–`h6` open a section nested in the current top-level section,
/// - images and paragraph text/links go to whichever section is open.
///
/// Repeating a heading replaces the earlier section in place, keeping its
/// original position.
#[derive(Debug)]
pub(crate) struct Outline<'o> {
    options: &'o ExtractOptions,
    content: IndexMap<String, Section>,
    top: Option<usize>,
    cursor: Cursor,
}
impl<'o> Outline<'o> {
    pub(crate) fn new(options: &'o ExtractOptions) -> Self {
        Self { options, content: IndexMap::new(), top: None, cursor: Cursor::Detached }
    }

    pub(crate) fn walk<'d>(mut self, containers: impl IntoIterator<Item = ElementRef<'d>>) -> IndexMap<String, Section> {
        for container in containers {
            for node in container.select(&consts::OUTLINE_SELECTOR) {
                self.visit(&node);
            }
        }
        self.content
    }

    fn visit(&mut self, node: &ElementRef<'_>) {
        match node.value().name() {
            "img" => {
                let source = node.value().attr("data-src").or_else(|| node.value().attr("src"));
                if let Some(source) = source.map(str::trim).filter(|s| !s.is_empty())
                    && let Some(section) = self.current()
                {
                    section.images.push(source.to_string());
                }
            },
            "p" => self.paragraph(node),
            "h1" | "h2" | "h3" => {
                let (index, _) = self.content.insert_full(normalized_text(node).to_lowercase(), Section::default());
                self.top = Some(index);
                self.cursor = Cursor::Top(index);
            },
            "h4" | "h5" | "h6" => {
                let key = normalized_text(node).to_lowercase();
                self.cursor = match self.top.and_then(|top| self.content.get_index_mut(top).map(|(_, s)| (top, s))) {
                    Some((top, parent)) => {
                        let (index, _) = parent.subsections.insert_full(key, Section::default());
                        Cursor::Nested(top, index)
                    },
                    None => Cursor::Detached,
                };
            },
            _ => {},
        }
    }

    fn paragraph(&mut self, node: &ElementRef<'_>) {
        let text = normalized_text(node);
        let links = self.links(node);
        let Some(section) = self.current() else {
            return;
        };
        if !text.is_empty() {
            section.text.push(text);
        }
        section.links.extend(links);
    }

    /// Collects paragraph links, dropping same-page fragments and links
    /// without a usable target. Internal links are made absolute.
    fn links(&self, paragraph: &ElementRef<'_>) -> Vec<Link> {
        let mut links = Vec::new();
        for anchor in paragraph.select(&consts::ANCHOR_SELECTOR) {
            let element = anchor.value();
            // The site occasionally ships `hrf` instead of `href`.
            let Some(href) = anchor_href(&anchor).or_else(|| element.attr("hrf").map(str::trim).filter(|s| !s.is_empty()))
            else {
                continue;
            };
            if href.starts_with('#') {
                continue;
            }
            let url = match element.classes().any(|class| class == consts::EXTERNAL_LINK_CLASS) {
                true => href.to_string(),
                false => match self.options.resolve(href) {
                    Some(url) => url.into(),
                    None => continue,
                },
            };
            links.push(Link { text: anchor.text().collect(), url });
        }
        links
    }

    fn current(&mut self) -> Option<&mut Section> {
        match self.cursor {
            Cursor::Detached => None,
            Cursor::Top(top) => self.content.get_index_mut(top).map(|(_, s)| s),
            Cursor::Nested(top, sub) => self
                .content
                .get_index_mut(top)
                .and_then(|(_, s)| s.subsections.get_index_mut(sub))
                .map(|(_, s)| s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use scraper::Html;

    fn outline(body: &str) -> IndexMap<String, Section> {
        let document = Html::parse_document(&format!(
            r#"<div id="entry_body"><section class="bodycopy"><div class="entry-section-container">{body}</div></section></div>"#
        ));
        let options = ExtractOptions::default();
        Outline::new(&options).walk(document.select(&consts::SECTION_CONTAINER_SELECTOR))
    }

    #[test]
    fn test_nesting() {
        let content = outline(
            r#"
            <h2>Origin</h2><p>It began.</p>
            <h4>Early Videos</h4><p>First   upload.</p>
            <h2>Spread</h2><p>It spread.</p>
            "#,
        );
        assert_eq!(content.keys().collect::<Vec<_>>(), vec!["origin", "spread"]);
        assert_eq!(content["origin"].text, vec!["It began."]);
        assert_eq!(content["origin"].subsections.keys().collect::<Vec<_>>(), vec!["early videos"]);
        assert_eq!(content["origin"].subsections["early videos"].text, vec!["First upload."]);
        assert_eq!(content["spread"].text, vec!["It spread."]);
        assert!(content["spread"].subsections.is_empty());
    }

    #[test]
    fn test_link_classification() {
        let content = outline(
            r##"
            <h2>About</h2>
            <p>See <a href="/entry/x">x</a>, <a href="http://out.example" class="external-link">out</a>
               and <a href="#top">top</a>.</p>
            "##,
        );
        let links = &content["about"].links;
        assert_eq!(
            links,
            &vec![
                Link { text: "x".into(), url: "https://knowyourmeme.com/entry/x".into() },
                Link { text: "out".into(), url: "http://out.example".into() },
            ]
        );
    }

    #[test]
    fn test_misspelt_href_and_missing_targets() {
        let content = outline(
            r#"<h3>Notes</h3><p><a hrf="/memes/y">y</a><a>nothing</a><a href="">empty</a></p>"#,
        );
        assert_eq!(content["notes"].links, vec![Link { text: "y".into(), url: "https://knowyourmeme.com/memes/y".into() }]);
    }

    #[test]
    fn test_images_prefer_lazy_source() {
        let content = outline(
            r#"<h2>Gallery</h2><img data-src="https://i.example/a.jpg" src="placeholder.gif"><img src="https://i.example/b.jpg">"#,
        );
        assert_eq!(content["gallery"].images, vec!["https://i.example/a.jpg", "https://i.example/b.jpg"]);
    }

    #[test]
    fn test_orphaned_content_is_dropped() {
        let content = outline(
            r#"
            <p>Before any heading.</p>
            <h5>Orphan</h5><p>Nested without a parent.</p>
            <h1>About</h1><p>Kept.</p>
            "#,
        );
        assert_eq!(content.len(), 1);
        assert_eq!(content["about"].text, vec!["Kept."]);
        assert!(content["about"].subsections.is_empty());
    }

    #[test]
    fn test_empty_paragraph_still_contributes_links() {
        let content = outline(r#"<h2>Refs</h2><p> <a href="/memes/z"> </a> </p>"#);
        assert!(content["refs"].text.is_empty());
        assert_eq!(content["refs"].links.len(), 1);
    }

    #[test]
    fn test_repeated_heading_replaces_in_place() {
        let content = outline(r#"<h2>A</h2><p>one</p><h2>B</h2><h2>A</h2><p>two</p>"#);
        assert_eq!(content.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(content["a"].text, vec!["two"]);
    }
}
