//! Index storage using SQLite
//!
//! This module handles all persistent state:
//! - Sites (one row per configured site crawl)
//! - Pages (crawled resources, unique per site and path)
//! - Lemmas (base word forms with per-site document frequency)
//! - Index entries (page <-> lemma edges with occurrence counts)

mod schema;

pub use schema::*;

use crate::config::Config;
use crate::error::{Error, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::FromRow;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Upper bound on bound parameters per statement
const MAX_IN_PARAMS: usize = 500;

/// Site indexing status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum SiteStatus {
    Queued,
    Indexing,
    Indexed,
    Failed,
}

impl std::fmt::Display for SiteStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SiteStatus::Queued => write!(f, "QUEUED"),
            SiteStatus::Indexing => write!(f, "INDEXING"),
            SiteStatus::Indexed => write!(f, "INDEXED"),
            SiteStatus::Failed => write!(f, "FAILED"),
        }
    }
}

impl FromStr for SiteStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().as_str() {
            "QUEUED" => Ok(SiteStatus::Queued),
            "INDEXING" => Ok(SiteStatus::Indexing),
            "INDEXED" => Ok(SiteStatus::Indexed),
            "FAILED" => Ok(SiteStatus::Failed),
            _ => Err(Error::Parse(format!("Unknown site status: {}", s))),
        }
    }
}

/// A crawled site
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Site {
    pub id: i64,
    pub url: String,
    pub name: String,
    pub status: String,
    pub status_time: String,
    pub last_error: Option<String>,
}

impl Site {
    pub fn get_status(&self) -> Result<SiteStatus> {
        self.status.parse()
    }
}

/// A crawled resource
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Page {
    pub id: i64,
    pub site_id: i64,
    pub path: String,
    pub code: i64,
    pub content: String,
}

/// A page about to be stored
#[derive(Debug, Clone)]
pub struct NewPage {
    pub site_id: i64,
    pub path: String,
    pub code: u16,
    pub content: String,
}

/// A base word form of one site
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Lemma {
    pub id: i64,
    pub site_id: i64,
    pub lemma: String,
    pub frequency: i64,
}

/// An inverted-index edge
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct IndexEntry {
    pub id: i64,
    pub page_id: i64,
    pub lemma_id: i64,
    pub rank: i64,
}

/// Occurrences of one lemma on one page
#[derive(Debug, Clone, FromRow)]
pub struct Posting {
    pub page_id: i64,
    pub lemma: String,
    pub rank: i64,
}

/// A page joined with its owning site
#[derive(Debug, Clone, FromRow)]
pub struct PageHit {
    pub page_id: i64,
    pub path: String,
    pub content: String,
    pub site_url: String,
    pub site_name: String,
}

/// Outcome of merging one page into the index
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexPageStats {
    pub lemmas: usize,
    pub entries_created: usize,
}

/// Rows removed with a site
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeletedSite {
    pub sites: u64,
    pub pages: u64,
    pub lemmas: u64,
    pub index_entries: u64,
}

/// Statistics for a single site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStats {
    pub page_count: usize,
    pub lemma_count: usize,
}

/// Global statistics
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalStats {
    pub site_count: usize,
    pub page_count: usize,
    pub lemma_count: usize,
}

fn now() -> String {
    Utc::now().to_rfc3339()
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

/// Index database handle
#[derive(Clone)]
pub struct MetaDb {
    pool: SqlitePool,
}

impl MetaDb {
    /// Connect to the index database
    pub async fn connect(config: &Config) -> Result<Self> {
        Self::new(&config.paths.db_file).await
    }

    /// Create database with path directly (without full config)
    pub async fn new(db_path: &Path) -> Result<Self> {
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .foreign_keys(true);

        debug!("Connecting to SQLite database at {:?}", db_path);

        let pool = SqlitePoolOptions::new()
            .max_connections(8)
            .acquire_timeout(Duration::from_secs(60))
            .connect_with(options)
            .await?;

        let db = Self { pool };

        if !db.is_initialized().await? {
            db.init_schema().await?;
        }

        Ok(db)
    }

    /// Initialize the database schema
    pub async fn init_schema(&self) -> Result<()> {
        info!("Initializing database schema");
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    /// Check if database is initialized
    pub async fn is_initialized(&self) -> Result<bool> {
        let result: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='index_entries'",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(result.is_some())
    }

    // ===== Site Operations =====

    /// Insert a fresh site row
    pub async fn insert_site(&self, url: &str, name: &str, status: SiteStatus) -> Result<Site> {
        let site = sqlx::query_as::<_, Site>(
            r#"
            INSERT INTO sites (url, name, status, status_time, last_error)
            VALUES (?, ?, ?, ?, NULL)
            RETURNING *
            "#,
        )
        .bind(url)
        .bind(name)
        .bind(status.to_string())
        .bind(now())
        .fetch_one(&self.pool)
        .await?;
        Ok(site)
    }

    /// Get site by ID
    pub async fn get_site(&self, id: i64) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>("SELECT * FROM sites WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(site)
    }

    /// Get the most recent site row for a base URL (trailing slash ignored)
    pub async fn get_site_by_url(&self, url: &str) -> Result<Option<Site>> {
        let site = sqlx::query_as::<_, Site>(
            "SELECT * FROM sites WHERE rtrim(url, '/') = rtrim(?, '/') ORDER BY id DESC LIMIT 1",
        )
        .bind(url)
        .fetch_optional(&self.pool)
        .await?;
        Ok(site)
    }

    /// List all sites
    pub async fn list_sites(&self) -> Result<Vec<Site>> {
        let sites = sqlx::query_as::<_, Site>("SELECT * FROM sites ORDER BY id")
            .fetch_all(&self.pool)
            .await?;
        Ok(sites)
    }

    /// Set a site's status unconditionally
    pub async fn update_site_status(
        &self,
        id: i64,
        status: SiteStatus,
        last_error: Option<&str>,
    ) -> Result<()> {
        sqlx::query("UPDATE sites SET status = ?, status_time = ?, last_error = ? WHERE id = ?")
            .bind(status.to_string())
            .bind(now())
            .bind(last_error)
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Move a site from `from` to `to`; returns false if it was no longer in `from`
    pub async fn transition_site(
        &self,
        id: i64,
        from: SiteStatus,
        to: SiteStatus,
        last_error: Option<&str>,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE sites SET status = ?, status_time = ?, last_error = ?
            WHERE id = ? AND status = ?
            "#,
        )
        .bind(to.to_string())
        .bind(now())
        .bind(last_error)
        .bind(id)
        .bind(from.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    /// Refresh a site's status time
    pub async fn touch_site(&self, id: i64) -> Result<()> {
        sqlx::query("UPDATE sites SET status_time = ? WHERE id = ?")
            .bind(now())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Mark every site currently in `status` as failed
    pub async fn fail_sites_in_status(&self, status: SiteStatus, message: &str) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE sites SET status = ?, status_time = ?, last_error = ? WHERE status = ?",
        )
        .bind(SiteStatus::Failed.to_string())
        .bind(now())
        .bind(message)
        .bind(status.to_string())
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Delete every site row with this base URL together with its pages, lemmas and index.
    ///
    /// Every statement is a write so the transaction takes the write lock on
    /// its first statement instead of upgrading a read snapshot.
    pub async fn delete_site_by_url(&self, url: &str) -> Result<DeletedSite> {
        let mut tx = self.pool.begin().await?;
        let mut deleted = DeletedSite::default();

        deleted.index_entries = sqlx::query(
            r#"
            DELETE FROM index_entries WHERE page_id IN (
                SELECT p.id FROM pages p JOIN sites s ON s.id = p.site_id
                WHERE rtrim(s.url, '/') = rtrim(?, '/')
            )
            "#,
        )
        .bind(url)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        deleted.lemmas = sqlx::query(
            r#"
            DELETE FROM lemmas WHERE site_id IN (
                SELECT id FROM sites WHERE rtrim(url, '/') = rtrim(?, '/')
            )
            "#,
        )
        .bind(url)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        deleted.pages = sqlx::query(
            r#"
            DELETE FROM pages WHERE site_id IN (
                SELECT id FROM sites WHERE rtrim(url, '/') = rtrim(?, '/')
            )
            "#,
        )
        .bind(url)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        deleted.sites = sqlx::query("DELETE FROM sites WHERE rtrim(url, '/') = rtrim(?, '/')")
            .bind(url)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(deleted)
    }

    // ===== Page Operations =====

    /// Check whether a page with this path is already stored for the site
    pub async fn page_exists(&self, site_id: i64, path: &str) -> Result<bool> {
        let found: Option<i64> =
            sqlx::query_scalar("SELECT id FROM pages WHERE site_id = ? AND path = ?")
                .bind(site_id)
                .bind(path)
                .fetch_optional(&self.pool)
                .await?;
        Ok(found.is_some())
    }

    /// Insert a page; returns `None` when the (site, path) pair already exists
    pub async fn insert_page(&self, page: &NewPage) -> Result<Option<i64>> {
        let id: Option<i64> = sqlx::query_scalar(
            r#"
            INSERT INTO pages (site_id, path, code, content)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(site_id, path) DO NOTHING
            RETURNING id
            "#,
        )
        .bind(page.site_id)
        .bind(&page.path)
        .bind(i64::from(page.code))
        .bind(&page.content)
        .fetch_optional(&self.pool)
        .await?;
        Ok(id)
    }

    /// List pages of a site in insertion order
    pub async fn list_pages(&self, site_id: i64) -> Result<Vec<Page>> {
        let pages = sqlx::query_as::<_, Page>("SELECT * FROM pages WHERE site_id = ? ORDER BY id")
            .bind(site_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(pages)
    }

    /// Count pages, optionally only those of the site with this base URL
    pub async fn count_pages(&self, site_url: Option<&str>) -> Result<i64> {
        let count: i64 = match site_url {
            Some(url) => {
                sqlx::query_scalar(
                    r#"
                    SELECT COUNT(*) FROM pages p
                    JOIN sites s ON s.id = p.site_id
                    WHERE rtrim(s.url, '/') = rtrim(?, '/')
                    "#,
                )
                .bind(url)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM pages")
                    .fetch_one(&self.pool)
                    .await?
            }
        };
        Ok(count)
    }

    /// Load pages with their site for the given IDs, in ID order
    pub async fn pages_with_sites(&self, ids: &[i64]) -> Result<Vec<PageHit>> {
        let mut hits = Vec::with_capacity(ids.len());
        for batch in ids.chunks(MAX_IN_PARAMS) {
            let query = format!(
                r#"
                SELECT p.id AS page_id, p.path AS path, p.content AS content,
                       s.url AS site_url, s.name AS site_name
                FROM pages p
                JOIN sites s ON s.id = p.site_id
                WHERE p.id IN ({})
                ORDER BY p.id
                "#,
                placeholders(batch.len())
            );
            let mut query_builder = sqlx::query_as::<_, PageHit>(&query);
            for id in batch {
                query_builder = query_builder.bind(id);
            }
            hits.extend(query_builder.fetch_all(&self.pool).await?);
        }
        Ok(hits)
    }

    // ===== Index Operations =====

    /// Merge one page's lemma counts into its site's index in a single transaction.
    ///
    /// A lemma's frequency grows only when a new page edge is created, so the
    /// frequency never exceeds the number of distinct pages containing it and
    /// re-indexing unchanged content leaves it untouched.
    pub async fn index_page(
        &self,
        site_id: i64,
        page_id: i64,
        lemmas: &BTreeMap<String, usize>,
    ) -> Result<IndexPageStats> {
        let mut tx = self.pool.begin().await?;
        let mut stats = IndexPageStats::default();

        for (text, count) in lemmas {
            sqlx::query(
                r#"
                INSERT INTO lemmas (site_id, lemma, frequency) VALUES (?, ?, 0)
                ON CONFLICT(site_id, lemma) DO NOTHING
                "#,
            )
            .bind(site_id)
            .bind(text)
            .execute(&mut *tx)
            .await?;

            let lemma_id: i64 =
                sqlx::query_scalar("SELECT id FROM lemmas WHERE site_id = ? AND lemma = ?")
                    .bind(site_id)
                    .bind(text)
                    .fetch_one(&mut *tx)
                    .await?;

            let rank = *count as i64;
            let created = sqlx::query(
                r#"
                INSERT INTO index_entries (page_id, lemma_id, rank) VALUES (?, ?, ?)
                ON CONFLICT(page_id, lemma_id) DO NOTHING
                "#,
            )
            .bind(page_id)
            .bind(lemma_id)
            .bind(rank)
            .execute(&mut *tx)
            .await?
            .rows_affected();

            if created == 1 {
                sqlx::query("UPDATE lemmas SET frequency = frequency + 1 WHERE id = ?")
                    .bind(lemma_id)
                    .execute(&mut *tx)
                    .await?;
                stats.entries_created += 1;
            } else {
                sqlx::query("UPDATE index_entries SET rank = ? WHERE page_id = ? AND lemma_id = ?")
                    .bind(rank)
                    .bind(page_id)
                    .bind(lemma_id)
                    .execute(&mut *tx)
                    .await?;
            }
            stats.lemmas += 1;
        }

        tx.commit().await?;
        Ok(stats)
    }

    /// Get a lemma of a site
    pub async fn get_lemma(&self, site_id: i64, lemma: &str) -> Result<Option<Lemma>> {
        let lemma = sqlx::query_as::<_, Lemma>("SELECT * FROM lemmas WHERE site_id = ? AND lemma = ?")
            .bind(site_id)
            .bind(lemma)
            .fetch_optional(&self.pool)
            .await?;
        Ok(lemma)
    }

    /// Index entries of one page
    pub async fn index_entries_for_page(&self, page_id: i64) -> Result<Vec<IndexEntry>> {
        let entries = sqlx::query_as::<_, IndexEntry>(
            "SELECT * FROM index_entries WHERE page_id = ? ORDER BY id",
        )
        .bind(page_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(entries)
    }

    /// All (page, lemma, rank) edges for the given lemmas, optionally within one site
    pub async fn postings(&self, lemmas: &[String], site_url: Option<&str>) -> Result<Vec<Posting>> {
        if lemmas.is_empty() {
            return Ok(Vec::new());
        }

        let site_clause = if site_url.is_some() {
            "AND rtrim(s.url, '/') = rtrim(?, '/')"
        } else {
            ""
        };
        let query = format!(
            r#"
            SELECT i.page_id AS page_id, l.lemma AS lemma, i.rank AS rank
            FROM index_entries i
            JOIN lemmas l ON l.id = i.lemma_id
            JOIN sites s ON s.id = l.site_id
            WHERE l.lemma IN ({}) {}
            ORDER BY i.page_id
            "#,
            placeholders(lemmas.len()),
            site_clause
        );

        let mut query_builder = sqlx::query_as::<_, Posting>(&query);
        for lemma in lemmas {
            query_builder = query_builder.bind(lemma);
        }
        if let Some(url) = site_url {
            query_builder = query_builder.bind(url);
        }
        Ok(query_builder.fetch_all(&self.pool).await?)
    }

    /// Document frequency per lemma, summed over sites (or within one site)
    pub async fn lemma_frequencies(
        &self,
        lemmas: &[String],
        site_url: Option<&str>,
    ) -> Result<HashMap<String, i64>> {
        if lemmas.is_empty() {
            return Ok(HashMap::new());
        }

        let site_clause = if site_url.is_some() {
            "AND rtrim(s.url, '/') = rtrim(?, '/')"
        } else {
            ""
        };
        let query = format!(
            r#"
            SELECT l.lemma, SUM(l.frequency)
            FROM lemmas l
            JOIN sites s ON s.id = l.site_id
            WHERE l.lemma IN ({}) {}
            GROUP BY l.lemma
            "#,
            placeholders(lemmas.len()),
            site_clause
        );

        let mut query_builder = sqlx::query_as::<_, (String, i64)>(&query);
        for lemma in lemmas {
            query_builder = query_builder.bind(lemma);
        }
        if let Some(url) = site_url {
            query_builder = query_builder.bind(url);
        }
        Ok(query_builder.fetch_all(&self.pool).await?.into_iter().collect())
    }

    // ===== Statistics =====

    /// Get site statistics
    pub async fn get_site_stats(&self, site_id: i64) -> Result<SiteStats> {
        let page_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pages WHERE site_id = ?")
            .bind(site_id)
            .fetch_one(&self.pool)
            .await?;

        let lemma_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lemmas WHERE site_id = ?")
            .bind(site_id)
            .fetch_one(&self.pool)
            .await?;

        Ok(SiteStats {
            page_count: page_count as usize,
            lemma_count: lemma_count as usize,
        })
    }

    /// Get global statistics
    pub async fn get_global_stats(&self) -> Result<GlobalStats> {
        let site_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM sites")
            .fetch_one(&self.pool)
            .await?;

        let page_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM pages")
            .fetch_one(&self.pool)
            .await?;

        let lemma_count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM lemmas")
            .fetch_one(&self.pool)
            .await?;

        Ok(GlobalStats {
            site_count: site_count as usize,
            page_count: page_count as usize,
            lemma_count: lemma_count as usize,
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use tempfile::TempDir;

    pub(crate) async fn setup_test_db() -> (MetaDb, TempDir) {
        let tmp = TempDir::new().unwrap();
        let db = MetaDb::new(&tmp.path().join("test.db")).await.unwrap();
        (db, tmp)
    }

    /// Run raw SQL against a test database
    pub(crate) async fn execute_sql(db: &MetaDb, sql: &str) {
        sqlx::query(sql).execute(&db.pool).await.unwrap();
    }

    fn page(site_id: i64, path: &str) -> NewPage {
        NewPage {
            site_id,
            path: path.to_string(),
            code: 200,
            content: "<html><body>hello</body></html>".to_string(),
        }
    }

    fn counts(pairs: &[(&str, usize)]) -> BTreeMap<String, usize> {
        pairs.iter().map(|(k, v)| (k.to_string(), *v)).collect()
    }

    #[tokio::test]
    async fn test_site_lifecycle() {
        let (db, _tmp) = setup_test_db().await;

        let site = db
            .insert_site("https://example.com", "Example", SiteStatus::Indexing)
            .await
            .unwrap();
        assert_eq!(site.get_status().unwrap(), SiteStatus::Indexing);

        let loaded = db.get_site_by_url("https://example.com/").await.unwrap().unwrap();
        assert_eq!(loaded.id, site.id);

        assert!(db
            .transition_site(site.id, SiteStatus::Indexing, SiteStatus::Indexed, None)
            .await
            .unwrap());
        assert!(!db
            .transition_site(site.id, SiteStatus::Indexing, SiteStatus::Failed, Some("late"))
            .await
            .unwrap());

        let loaded = db.get_site(site.id).await.unwrap().unwrap();
        assert_eq!(loaded.get_status().unwrap(), SiteStatus::Indexed);
        assert!(loaded.last_error.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_page_is_noop() {
        let (db, _tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://example.com", "Example", SiteStatus::Indexing)
            .await
            .unwrap();

        let first = db.insert_page(&page(site.id, "/a")).await.unwrap();
        let second = db.insert_page(&page(site.id, "/a")).await.unwrap();

        assert!(first.is_some());
        assert!(second.is_none());
        assert!(db.page_exists(site.id, "/a").await.unwrap());
        assert_eq!(db.list_pages(site.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_index_page_document_frequency() {
        let (db, _tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://example.com", "Example", SiteStatus::Indexing)
            .await
            .unwrap();
        let p1 = db.insert_page(&page(site.id, "/1")).await.unwrap().unwrap();
        let p2 = db.insert_page(&page(site.id, "/2")).await.unwrap().unwrap();

        db.index_page(site.id, p1, &counts(&[("cat", 5), ("dog", 1)]))
            .await
            .unwrap();
        db.index_page(site.id, p2, &counts(&[("dog", 7)]))
            .await
            .unwrap();

        let cat = db.get_lemma(site.id, "cat").await.unwrap().unwrap();
        let dog = db.get_lemma(site.id, "dog").await.unwrap().unwrap();
        assert_eq!(cat.frequency, 1);
        assert_eq!(dog.frequency, 2);

        let entries = db.index_entries_for_page(p1).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert!(entries.iter().any(|e| e.lemma_id == cat.id && e.rank == 5));
    }

    #[tokio::test]
    async fn test_reindex_is_idempotent() {
        let (db, _tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://example.com", "Example", SiteStatus::Indexing)
            .await
            .unwrap();
        let p1 = db.insert_page(&page(site.id, "/1")).await.unwrap().unwrap();
        let lemmas = counts(&[("cat", 2)]);

        let first = db.index_page(site.id, p1, &lemmas).await.unwrap();
        let second = db.index_page(site.id, p1, &lemmas).await.unwrap();

        assert_eq!(first.entries_created, 1);
        assert_eq!(second.entries_created, 0);
        assert_eq!(db.get_lemma(site.id, "cat").await.unwrap().unwrap().frequency, 1);
        assert_eq!(db.index_entries_for_page(p1).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_postings_and_frequencies_respect_site_filter() {
        let (db, _tmp) = setup_test_db().await;
        let a = db
            .insert_site("https://a.example.com", "A", SiteStatus::Indexed)
            .await
            .unwrap();
        let b = db
            .insert_site("https://b.example.com/", "B", SiteStatus::Indexed)
            .await
            .unwrap();
        let pa = db.insert_page(&page(a.id, "/")).await.unwrap().unwrap();
        let pb = db.insert_page(&page(b.id, "/")).await.unwrap().unwrap();
        db.index_page(a.id, pa, &counts(&[("cat", 1)])).await.unwrap();
        db.index_page(b.id, pb, &counts(&[("cat", 3)])).await.unwrap();

        let wanted = vec!["cat".to_string()];
        let all = db.postings(&wanted, None).await.unwrap();
        assert_eq!(all.len(), 2);

        let only_b = db.postings(&wanted, Some("https://b.example.com")).await.unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].page_id, pb);
        assert_eq!(only_b[0].rank, 3);

        let freqs = db.lemma_frequencies(&wanted, None).await.unwrap();
        assert_eq!(freqs.get("cat"), Some(&2));
        assert_eq!(db.count_pages(Some("https://a.example.com/")).await.unwrap(), 1);

        let hits = db.pages_with_sites(&[pb, pa]).await.unwrap();
        assert_eq!(hits[0].page_id, pa);
        assert_eq!(hits[1].site_name, "B");
    }

    #[tokio::test]
    async fn test_delete_site_cascades() {
        let (db, _tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://example.com", "Example", SiteStatus::Indexed)
            .await
            .unwrap();
        let p1 = db.insert_page(&page(site.id, "/1")).await.unwrap().unwrap();
        db.index_page(site.id, p1, &counts(&[("cat", 1), ("dog", 1)]))
            .await
            .unwrap();

        let deleted = db.delete_site_by_url("https://example.com/").await.unwrap();
        assert_eq!(
            deleted,
            DeletedSite {
                sites: 1,
                pages: 1,
                lemmas: 2,
                index_entries: 2
            }
        );

        let stats = db.get_global_stats().await.unwrap();
        assert_eq!(stats.site_count, 0);
        assert_eq!(stats.page_count, 0);
        assert_eq!(stats.lemma_count, 0);
    }

    #[tokio::test]
    async fn test_concurrent_site_resets() {
        let (db, _tmp) = setup_test_db().await;

        for round in 0..4 {
            let mut tasks = tokio::task::JoinSet::new();
            for n in 0..8 {
                let db = db.clone();
                tasks.spawn(async move {
                    let url = format!("https://site{}.example.com", n);
                    db.delete_site_by_url(&url).await?;
                    let site = db.insert_site(&url, "Site", SiteStatus::Indexing).await?;
                    let page_id = db.insert_page(&page(site.id, "/")).await?;
                    if let Some(page_id) = page_id {
                        db.index_page(site.id, page_id, &counts(&[("hello", 1)]))
                            .await?;
                    }
                    db.update_site_status(site.id, SiteStatus::Indexed, None)
                        .await
                });
            }
            while let Some(result) = tasks.join_next().await {
                result.unwrap().unwrap_or_else(|e| panic!("round {}: {}", round, e));
            }
        }

        let sites = db.list_sites().await.unwrap();
        assert_eq!(sites.len(), 8);
        assert!(sites.iter().all(|s| s.status == SiteStatus::Indexed.to_string()));
        assert_eq!(db.get_global_stats().await.unwrap().page_count, 8);
    }

    #[tokio::test]
    async fn test_fail_sites_in_status() {
        let (db, _tmp) = setup_test_db().await;
        let a = db
            .insert_site("https://a.example.com", "A", SiteStatus::Indexing)
            .await
            .unwrap();
        let b = db
            .insert_site("https://b.example.com", "B", SiteStatus::Indexed)
            .await
            .unwrap();

        let failed = db
            .fail_sites_in_status(SiteStatus::Indexing, "stopped")
            .await
            .unwrap();
        assert_eq!(failed, 1);

        let a = db.get_site(a.id).await.unwrap().unwrap();
        let b = db.get_site(b.id).await.unwrap().unwrap();
        assert_eq!(a.get_status().unwrap(), SiteStatus::Failed);
        assert_eq!(a.last_error.as_deref(), Some("stopped"));
        assert_eq!(b.get_status().unwrap(), SiteStatus::Indexed);
    }
}
