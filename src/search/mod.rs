//! Search and ranking over the lemma index
//!
//! Queries are lemmatized the same way pages are, candidate pages are
//! read from the index, scored with TF-IDF and paginated. Each returned
//! page gets a snippet built from its visible text.

mod snippet;

pub use snippet::*;

use crate::config::SearchConfig;
use crate::error::{Error, Result};
use crate::lemma::Lemmatizer;
use crate::meta::MetaDb;
use crate::parse::parse_html;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// A single search hit
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    /// Site base URL
    pub site: String,
    pub site_name: String,
    /// Page path relative to the site root
    pub uri: String,
    pub title: Option<String>,
    pub snippet: String,
    pub relevance: f64,
}

/// One page of ranked results
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    /// Number of matching pages before pagination
    pub count: usize,
    pub results: Vec<SearchResult>,
}

/// Inverse document frequency
pub fn idf(total_pages: i64, document_frequency: i64) -> f64 {
    (total_pages as f64 / document_frequency.max(1) as f64 + 1.0).ln()
}

/// Term frequency of a lemma normalized by page length
pub fn tf(occurrences: i64, content_len: usize) -> f64 {
    occurrences as f64 / content_len.max(1) as f64
}

struct Candidate {
    page_id: i64,
    score: f64,
}

/// Search engine over the index database
pub struct SearchEngine {
    db: MetaDb,
    lemmatizer: Lemmatizer,
    snippets: SnippetOptions,
}

impl SearchEngine {
    pub fn new(db: MetaDb, lemmatizer: Lemmatizer, config: &SearchConfig) -> Self {
        Self {
            db,
            lemmatizer,
            snippets: SnippetOptions::from(config),
        }
    }

    /// Rank pages matching `query`, optionally within one site, and return
    /// the `offset..offset + limit` slice.
    pub async fn search(
        &self,
        query: &str,
        site: Option<&str>,
        offset: usize,
        limit: usize,
    ) -> Result<SearchResults> {
        let query = query.trim();
        if query.is_empty() {
            return Err(Error::EmptyQuery);
        }

        let lemmas = self.lemmatizer.lemmas(query);
        if lemmas.is_empty() {
            return Err(Error::NoLemmas);
        }
        debug!("Query '{}' lemmas: {:?}", query, lemmas);

        let site = site.map(str::trim).filter(|s| !s.is_empty());

        // page id -> lemma -> occurrences, in page insertion order
        let mut postings: BTreeMap<i64, HashMap<String, i64>> = BTreeMap::new();
        for posting in self.db.postings(&lemmas, site).await? {
            *postings
                .entry(posting.page_id)
                .or_default()
                .entry(posting.lemma)
                .or_insert(0) += posting.rank;
        }

        if postings.is_empty() {
            info!("No pages match '{}'", query);
            return Ok(SearchResults {
                count: 0,
                results: Vec::new(),
            });
        }

        let frequencies = self.db.lemma_frequencies(&lemmas, None).await?;
        let total_pages = self.db.count_pages(None).await?;
        let idfs: Vec<(&String, f64)> = lemmas
            .iter()
            .map(|lemma| {
                let df = frequencies.get(lemma).copied().unwrap_or(1);
                (lemma, idf(total_pages, df))
            })
            .collect();

        let page_ids: Vec<i64> = postings.keys().copied().collect();
        let pages: HashMap<i64, _> = self
            .db
            .pages_with_sites(&page_ids)
            .await?
            .into_iter()
            .map(|hit| (hit.page_id, hit))
            .collect();

        let mut candidates: Vec<Candidate> = postings
            .iter()
            .filter_map(|(page_id, ranks)| {
                let page = pages.get(page_id)?;
                let content_len = page.content.chars().count();
                let score = idfs
                    .iter()
                    .map(|(lemma, weight)| {
                        tf(ranks.get(*lemma).copied().unwrap_or(0), content_len) * weight
                    })
                    .sum();
                Some(Candidate {
                    page_id: *page_id,
                    score,
                })
            })
            .collect();

        candidates.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let count = candidates.len();
        let results = candidates
            .iter()
            .skip(offset)
            .take(limit)
            .filter_map(|candidate| {
                let page = pages.get(&candidate.page_id)?;
                let doc = parse_html(&page.content, None);
                Some(SearchResult {
                    site: page.site_url.trim_end_matches('/').to_string(),
                    site_name: page.site_name.clone(),
                    uri: page.path.clone(),
                    title: doc.title,
                    snippet: generate_snippet(&doc.text, &lemmas, &self.snippets),
                    relevance: candidate.score,
                })
            })
            .collect::<Vec<_>>();

        info!(
            "Search '{}' matched {} pages, returning {}",
            query,
            count,
            results.len()
        );
        Ok(SearchResults { count, results })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::IndexWriter;
    use crate::lemma::tests::identity_lemmatizer;
    use crate::meta::tests::setup_test_db;
    use crate::meta::{NewPage, SiteStatus};
    use crate::parse::extract_text_from_html;
    use tempfile::TempDir;

    async fn add_page(db: &MetaDb, site_id: i64, path: &str, html: &str) {
        let page_id = db
            .insert_page(&NewPage {
                site_id,
                path: path.to_string(),
                code: 200,
                content: html.to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        IndexWriter::new(db.clone(), identity_lemmatizer())
            .index_page(site_id, page_id, &extract_text_from_html(html))
            .await
            .unwrap();
    }

    /// Three pages: "cat" on one, "dog" on all
    async fn corpus() -> (SearchEngine, MetaDb, TempDir) {
        let (db, tmp) = setup_test_db().await;
        let site = db
            .insert_site("https://pets.example.com/", "Pets", SiteStatus::Indexed)
            .await
            .unwrap();
        add_page(&db, site.id, "/1", "<title>One</title><p>dog dog cat</p>").await;
        add_page(&db, site.id, "/2", "<title>Two</title><p>dog</p>").await;
        add_page(&db, site.id, "/3", "<title>Three</title><p>dog bird</p>").await;

        let other = db
            .insert_site("https://zoo.example.com", "Zoo", SiteStatus::Indexed)
            .await
            .unwrap();
        add_page(&db, other.id, "/lion", "<p>lion dog</p>").await;

        let engine = SearchEngine::new(db.clone(), identity_lemmatizer(), &SearchConfig::default());
        (engine, db, tmp)
    }

    #[test]
    fn test_rare_lemma_has_higher_idf() {
        assert!(idf(3, 1) > idf(3, 3));
        assert!((idf(3, 1) - 4f64.ln()).abs() < 1e-9);
        assert!((idf(3, 0) - idf(3, 1)).abs() < 1e-9);
        assert_eq!(tf(0, 100), 0.0);
        assert_eq!(tf(2, 0), 2.0);
    }

    #[tokio::test]
    async fn test_empty_query() {
        let (engine, _db, _tmp) = corpus().await;
        assert!(matches!(engine.search("", None, 0, 20).await, Err(Error::EmptyQuery)));
        assert!(matches!(engine.search("   ", None, 0, 20).await, Err(Error::EmptyQuery)));
    }

    #[tokio::test]
    async fn test_query_without_lemmas() {
        let (engine, _db, _tmp) = corpus().await;
        assert!(matches!(engine.search("a 1 ?", None, 0, 20).await, Err(Error::NoLemmas)));
    }

    #[tokio::test]
    async fn test_search_ranks_and_annotates() {
        let (engine, _db, _tmp) = corpus().await;

        let found = engine.search("cat", None, 0, 20).await.unwrap();
        assert_eq!(found.count, 1);
        let hit = &found.results[0];
        assert_eq!(hit.site, "https://pets.example.com");
        assert_eq!(hit.site_name, "Pets");
        assert_eq!(hit.uri, "/1");
        assert_eq!(hit.title.as_deref(), Some("One"));
        assert!(hit.snippet.contains("<b>cat</b>"));
        assert!(hit.relevance > 0.0);

        let found = engine.search("dog cat", None, 0, 20).await.unwrap();
        assert_eq!(found.count, 4);
        assert_eq!(found.results[0].uri, "/1");
        assert!(found
            .results
            .windows(2)
            .all(|pair| pair[0].relevance >= pair[1].relevance));
    }

    #[tokio::test]
    async fn test_site_filter() {
        let (engine, _db, _tmp) = corpus().await;

        let found = engine
            .search("dog", Some("https://zoo.example.com/"), 0, 20)
            .await
            .unwrap();
        assert_eq!(found.count, 1);
        assert_eq!(found.results[0].site_name, "Zoo");

        let found = engine
            .search("dog", Some("https://unknown.example.com"), 0, 20)
            .await
            .unwrap();
        assert_eq!(found.count, 0);
    }

    #[tokio::test]
    async fn test_pagination() {
        let (engine, _db, _tmp) = corpus().await;

        let all = engine.search("dog", None, 0, 20).await.unwrap();
        assert_eq!(all.count, 4);

        let none = engine.search("dog", None, 0, 0).await.unwrap();
        assert_eq!(none.count, 4);
        assert!(none.results.is_empty());

        let page = engine.search("dog", None, 1, 2).await.unwrap();
        assert_eq!(page.count, 4);
        assert_eq!(page.results.len(), 2);
        assert_eq!(page.results[0].uri, all.results[1].uri);

        let beyond = engine.search("dog", None, 10, 20).await.unwrap();
        assert_eq!(beyond.count, 4);
        assert!(beyond.results.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_word_matches_nothing() {
        let (engine, _db, _tmp) = corpus().await;
        let found = engine.search("elephant", None, 0, 20).await.unwrap();
        assert_eq!(found.count, 0);
        assert!(found.results.is_empty());
    }
}
