//! Inverted index writer
//!
//! Merges one page's lemma counts into its site's lemma table and
//! page/lemma edges. Each page is written in its own transaction, so a
//! failure on one page never rolls back pages indexed before it.

use crate::error::Result;
use crate::lemma::Lemmatizer;
use crate::meta::{IndexPageStats, MetaDb};
use tracing::debug;

#[derive(Clone)]
pub struct IndexWriter {
    db: MetaDb,
    lemmatizer: Lemmatizer,
}

impl IndexWriter {
    pub fn new(db: MetaDb, lemmatizer: Lemmatizer) -> Self {
        Self { db, lemmatizer }
    }

    /// Lemmatize a page's visible text and merge it into the index
    pub async fn index_page(&self, site_id: i64, page_id: i64, text: &str) -> Result<IndexPageStats> {
        let counts = self.lemmatizer.lemmatize(text);
        if counts.is_empty() {
            debug!("Page {} has no indexable words", page_id);
            return Ok(IndexPageStats::default());
        }

        let stats = self.db.index_page(site_id, page_id, &counts).await?;
        debug!(
            "Indexed page {}: {} lemmas, {} new entries",
            page_id, stats.lemmas, stats.entries_created
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lemma::tests::identity_lemmatizer;
    use crate::meta::tests::setup_test_db;
    use crate::meta::{NewPage, SiteStatus};

    async fn add_page(db: &MetaDb, site_id: i64, path: &str) -> i64 {
        db.insert_page(&NewPage {
            site_id,
            path: path.to_string(),
            code: 200,
            content: String::new(),
        })
        .await
        .unwrap()
        .unwrap()
    }

    #[tokio::test]
    async fn test_frequency_counts_documents_not_occurrences() {
        let (db, _tmp) = setup_test_db().await;
        let writer = IndexWriter::new(db.clone(), identity_lemmatizer());
        let site = db
            .insert_site("https://example.com", "Example", SiteStatus::Indexing)
            .await
            .unwrap();

        let p1 = add_page(&db, site.id, "/1").await;
        let p2 = add_page(&db, site.id, "/2").await;
        let p3 = add_page(&db, site.id, "/3").await;

        writer.index_page(site.id, p1, "cat cat cat dog").await.unwrap();
        writer.index_page(site.id, p2, "dog").await.unwrap();
        writer.index_page(site.id, p3, "dog bird").await.unwrap();

        let cat = db.get_lemma(site.id, "cat").await.unwrap().unwrap();
        let dog = db.get_lemma(site.id, "dog").await.unwrap().unwrap();
        assert_eq!(cat.frequency, 1);
        assert_eq!(dog.frequency, 3);

        let entries = db.index_entries_for_page(p1).await.unwrap();
        let cat_entry = entries.iter().find(|e| e.lemma_id == cat.id).unwrap();
        assert_eq!(cat_entry.rank, 3);
    }

    #[tokio::test]
    async fn test_reindexing_unchanged_content_is_stable() {
        let (db, _tmp) = setup_test_db().await;
        let writer = IndexWriter::new(db.clone(), identity_lemmatizer());
        let site = db
            .insert_site("https://example.com", "Example", SiteStatus::Indexing)
            .await
            .unwrap();
        let p1 = add_page(&db, site.id, "/1").await;

        writer.index_page(site.id, p1, "cat dog").await.unwrap();
        let again = writer.index_page(site.id, p1, "cat dog").await.unwrap();

        assert_eq!(again.entries_created, 0);
        assert_eq!(db.get_lemma(site.id, "cat").await.unwrap().unwrap().frequency, 1);
        assert_eq!(db.index_entries_for_page(p1).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_pages_sharing_new_lemma() {
        let (db, _tmp) = setup_test_db().await;
        let writer = IndexWriter::new(db.clone(), identity_lemmatizer());
        let site = db
            .insert_site("https://example.com", "Example", SiteStatus::Indexing)
            .await
            .unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let page_id = add_page(&db, site.id, &format!("/{}", i)).await;
            let writer = writer.clone();
            let site_id = site.id;
            handles.push(tokio::spawn(async move {
                writer.index_page(site_id, page_id, "shared word").await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let shared = db.get_lemma(site.id, "shared").await.unwrap().unwrap();
        assert_eq!(shared.frequency, 8);
        assert_eq!(db.get_site_stats(site.id).await.unwrap().lemma_count, 2);
    }
}
