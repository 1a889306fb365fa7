use super::{anchor_href, own_text};
use crate::ExtractOptions;
use crate::consts;
use crate::models::DetailValue;
use indexmap::IndexMap;
use scraper::ElementRef;
use tracing::debug;

/// Detail rows of the entry info panel.
#[derive(Debug)]
pub struct Details<'a> {
    rows: Vec<(String, ElementRef<'a>)>,
}

/// Details Internals
impl<'a> Details<'a> {
    pub(crate) fn new(info: ElementRef<'a>) -> Self {
        Self { rows: Self::collect_rows(info) }
    }

    fn collect_rows(info: ElementRef<'a>) -> Vec<(String, ElementRef<'a>)> {
        let mut rows = Vec::new();
        for row in info.select(&consts::DETAIL_SELECTOR) {
            let mut spans = row.select(&consts::SPAN_SELECTOR);
            let (Some(label), Some(value)) = (spans.next(), spans.next()) else {
                debug!(row = %row.html(), "skipping detail row without a label and a value cell");
                continue;
            };
            let label = own_text(&label);
            let label = label.trim().trim_end_matches(':').trim().to_lowercase();
            if label.is_empty() {
                debug!("skipping detail row with an empty label");
                continue;
            }
            rows.push((label, value));
        }
        rows
    }

    /// Text of the first link in the cell.
    fn first_link_text(cell: &ElementRef<'a>) -> Option<String> {
        cell.select(&consts::ANCHOR_SELECTOR)
            .next()
            .map(|a| a.text().collect::<String>().trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Raw `href` of every link in the cell.
    fn link_targets(cell: &ElementRef<'a>) -> Vec<String> {
        cell.select(&consts::HREF_SELECTOR).filter_map(|a| anchor_href(&a)).map(str::to_string).collect()
    }
}

/// Details Public
impl<'a> Details<'a> {
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.rows.iter().map(|(label, _)| label.as_str())
    }

    /// Coerces one value cell according to its label.
    ///
    /// - `year`: text of the first link,
    /// - `type`: every link, resolved to an absolute URL,
    /// - otherwise: the cell's own text when non-empty, its link targets if not.
    ///
    /// Returns `None` when the cell doesn't have the shape the label requires.
    pub fn coerce(label: &str, cell: &ElementRef<'a>, options: &ExtractOptions) -> Option<DetailValue> {
        match label {
            "year" => Self::first_link_text(cell).map(DetailValue::Text),
            "type" => Some(DetailValue::Links(
                Self::link_targets(cell)
                    .iter()
                    .filter_map(|href| options.resolve(href))
                    .map(String::from)
                    .collect(),
            )),
            _ => {
                let text = own_text(cell);
                let text = text.trim();
                Some(match text.is_empty() {
                    false => DetailValue::Text(text.to_string()),
                    true => DetailValue::Links(Self::link_targets(cell)),
                })
            },
        }
    }

    pub fn values(&self, options: &ExtractOptions) -> IndexMap<String, DetailValue> {
        let mut values = IndexMap::new();
        for (label, cell) in &self.rows {
            match Self::coerce(label, cell, options) {
                Some(value) => {
                    values.insert(label.clone(), value);
                },
                None => debug!(label = %label, "omitting malformed detail row"),
            }
        }
        values
    }
}
