//! Repository of extracted entries.

use crate::Database;
use crate::error::{ErrorKind, Result};
use crate::models::EntryRow;
use exn::ResultExt;
use memex_extract::models::Entry;
use sqlx::SqlitePool;
use tracing::{debug, instrument};

/// Repository for storing entries, keyed by URL.
///
/// A dry-run repository answers reads from the database but never writes to
/// it.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
    dry_run: bool,
}
/// A repository over a read-only database is always a dry run.
impl From<&Database> for Repository {
    fn from(db: &Database) -> Self {
        Self { pool: db.pool().clone(), dry_run: db.is_read_only() }
    }
}
impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool, dry_run: bool) -> Self {
        Self { pool, dry_run }
    }

    pub fn is_dry_run(&self) -> bool {
        self.dry_run
    }

    // =========================================================================
    // Insert
    // =========================================================================

    /// Insert an entry, replacing whatever was stored for its URL before.
    #[instrument(skip(self, entry), fields(url = %entry.url))]
    pub async fn upsert(&self, entry: &Entry) -> Result<()> {
        let row = EntryRow::try_from(entry)?;
        if self.dry_run {
            debug!("dry run, skipping upsert");
            return Ok(());
        }
        sqlx::query(include_str!("../queries/upsert_entry.sql"))
            .bind(row.url)
            .bind(row.title)
            .bind(row.category)
            .bind(row.added_at)
            .bind(row.updated_at)
            .bind(row.parent_url)
            .bind(row.document)
            .execute(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    /// Insert several entries in one transaction.
    pub async fn upsert_all(&self, entries: &[Entry]) -> Result<()> {
        let rows = entries.iter().map(EntryRow::try_from).collect::<Result<Vec<_>>>()?;
        if self.dry_run {
            return Ok(());
        }
        let mut tx = self.pool.begin().await.or_raise(|| ErrorKind::Database)?;
        for row in rows {
            sqlx::query(include_str!("../queries/upsert_entry.sql"))
                .bind(row.url)
                .bind(row.title)
                .bind(row.category)
                .bind(row.added_at)
                .bind(row.updated_at)
                .bind(row.parent_url)
                .bind(row.document)
                .execute(&mut *tx)
                .await
                .or_raise(|| ErrorKind::Database)?;
        }
        tx.commit().await.or_raise(|| ErrorKind::Database)?;
        Ok(())
    }

    // =========================================================================
    // Get/Fetch
    // =========================================================================

    /// Get the stored entry for `url`.
    pub async fn get(&self, url: &str) -> Result<Option<Entry>> {
        let row: Option<EntryRow> = sqlx::query_as(include_str!("../queries/get_entry.sql"))
            .bind(url)
            .fetch_optional(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        row.map(Entry::try_from).transpose()
    }

    /// URLs of every stored entry, sorted.
    pub async fn list_urls(&self) -> Result<Vec<String>> {
        sqlx::query_scalar(include_str!("../queries/list_urls.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    /// URLs of the stored entries that name `parent_url` as their parent.
    pub async fn list_children_of(&self, parent_url: &str) -> Result<Vec<String>> {
        sqlx::query_scalar(include_str!("../queries/list_children_of.sql"))
            .bind(parent_url)
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)
    }

    pub async fn count(&self) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(include_str!("../queries/count_entries.sql"))
            .fetch_one(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))
    }

    /// Number of stored entries per category, largest first. Entries without
    /// a category are counted under the empty string.
    pub async fn count_by_category(&self) -> Result<Vec<(String, u64)>> {
        let rows: Vec<(String, i64)> = sqlx::query_as(include_str!("../queries/count_by_category.sql"))
            .fetch_all(&self.pool)
            .await
            .or_raise(|| ErrorKind::Database)?;
        rows.into_iter()
            .map(|(category, count)| Ok((category, u64::try_from(count).or_raise(|| ErrorKind::InvalidData("count"))?)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;
    use memex_extract::models::{Relation, RelationStatus};

    fn entry(url: &str, title: &str, category: Option<&str>) -> Entry {
        Entry {
            url: url.to_string(),
            title: title.to_string(),
            category: category.map(str::to_string),
            added_at: Some(1_374_619_247),
            updated_at: Some(1_704_189_600),
            image_url: None,
            meta: IndexMap::from([("og:title".to_string(), title.to_string())]),
            structured_data: Some(serde_json::json!({"@type": "Article"})),
            parent_url: Some("https://knowyourmeme.com/memes/shiba-inu".to_string()),
            details: IndexMap::new(),
            content: None,
            tags: vec!["dog".to_string()],
            additional_references: IndexMap::new(),
            search_keywords: None,
            siblings: Some(Relation {
                url: format!("{url}/siblings"),
                status: RelationStatus::Resolved { entries: vec!["https://knowyourmeme.com/memes/a".to_string()] },
            }),
            children: Some(Relation { url: format!("{url}/children"), status: RelationStatus::Failed }),
        }
    }

    async fn repo() -> Repository {
        let db = Database::connect_in_memory().await.unwrap();
        Repository::from(&db)
    }

    #[tokio::test]
    async fn test_upsert_and_get() {
        let repo = repo().await;
        let doge = entry("https://knowyourmeme.com/memes/doge", "Doge", Some("Meme"));
        repo.upsert(&doge).await.unwrap();
        assert_eq!(repo.get(&doge.url).await.unwrap(), Some(doge));
        assert_eq!(repo.get("https://knowyourmeme.com/memes/missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_replaces_by_url() {
        let repo = repo().await;
        let url = "https://knowyourmeme.com/memes/doge";
        repo.upsert(&entry(url, "Doge", Some("Meme"))).await.unwrap();
        repo.upsert(&entry(url, "Doge (updated)", Some("Meme"))).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 1);
        assert_eq!(repo.get(url).await.unwrap().unwrap().title, "Doge (updated)");
    }

    #[tokio::test]
    async fn test_listing_and_stats() {
        let repo = repo().await;
        repo.upsert_all(&[
            entry("https://knowyourmeme.com/memes/b", "B", Some("Meme")),
            entry("https://knowyourmeme.com/memes/a", "A", Some("Meme")),
            entry("https://knowyourmeme.com/memes/c", "C", None),
        ])
        .await
        .unwrap();
        assert_eq!(
            repo.list_urls().await.unwrap(),
            vec![
                "https://knowyourmeme.com/memes/a",
                "https://knowyourmeme.com/memes/b",
                "https://knowyourmeme.com/memes/c",
            ]
        );
        assert_eq!(
            repo.count_by_category().await.unwrap(),
            vec![("Meme".to_string(), 2), (String::new(), 1)]
        );
        assert_eq!(repo.list_children_of("https://knowyourmeme.com/memes/shiba-inu").await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_read_only_database_is_dry_run() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("memex.sqlite");
        let writable = Database::connect(&path).await.unwrap();
        Repository::from(&writable).upsert(&entry("https://knowyourmeme.com/memes/doge", "Doge", None)).await.unwrap();
        writable.close().await;

        let db = Database::open_read_only(&path).await.unwrap();
        let repo = Repository::from(&db);
        assert!(repo.is_dry_run());
        repo.upsert(&entry("https://knowyourmeme.com/memes/cate", "Cate", None)).await.unwrap();
        assert_eq!(repo.list_urls().await.unwrap(), vec!["https://knowyourmeme.com/memes/doge"]);
    }

    #[tokio::test]
    async fn test_dry_run_never_writes() {
        let db = Database::connect_in_memory().await.unwrap();
        let repo = Repository::new(db.pool().clone(), true);
        assert!(repo.is_dry_run());
        repo.upsert(&entry("https://knowyourmeme.com/memes/doge", "Doge", None)).await.unwrap();
        assert_eq!(repo.count().await.unwrap(), 0);
    }
}
