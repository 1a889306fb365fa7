use crate::error::{Error, ErrorKind};
use exn::ResultExt;
use memex_extract::models::Entry;

#[derive(sqlx::FromRow)]
pub(crate) struct EntryRow {
    pub(crate) url: String,
    pub(crate) title: String,
    pub(crate) category: Option<String>,
    pub(crate) added_at: Option<i64>,
    pub(crate) updated_at: Option<i64>,
    pub(crate) parent_url: Option<String>,
    pub(crate) document: String,
}
impl TryFrom<&Entry> for EntryRow {
    type Error = Error;
    fn try_from(entry: &Entry) -> Result<Self, Self::Error> {
        Ok(Self {
            url: entry.url.clone(),
            title: entry.title.clone(),
            category: entry.category.clone(),
            added_at: entry.added_at,
            updated_at: entry.updated_at,
            parent_url: entry.parent_url.clone(),
            document: serde_json::to_string(entry).or_raise(|| ErrorKind::InvalidData("document"))?,
        })
    }
}
impl TryFrom<EntryRow> for Entry {
    type Error = Error;
    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        let entry: Entry = serde_json::from_str(&row.document).or_raise(|| ErrorKind::InvalidData("document"))?;
        // The indexed columns are derived from the document; disagreement
        // means the row was edited by hand.
        if entry.url != row.url {
            exn::bail!(ErrorKind::InvalidData("url"));
        }
        Ok(entry)
    }
}
