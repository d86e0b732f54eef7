//! Search command implementation

use super::index::report;
use crate::search::{SearchEngine, SearchResult};
use serde::{Deserialize, Serialize};

/// Search response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub success: bool,
    pub count: usize,
    pub results: Vec<SearchResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run a ranked search and wrap the outcome for the caller
pub async fn cmd_search(
    engine: &SearchEngine,
    query: &str,
    site: Option<&str>,
    offset: usize,
    limit: usize,
) -> SearchResponse {
    match engine.search(query, site, offset, limit).await {
        Ok(found) => SearchResponse {
            success: true,
            count: found.count,
            results: found.results,
            error: None,
        },
        Err(e) => SearchResponse {
            success: false,
            count: 0,
            results: Vec::new(),
            error: report("Search", e),
        },
    }
}

/// Strip the `<b>` emphasis used in snippets for terminal output
fn plain(snippet: &str) -> String {
    snippet.replace("<b>", "").replace("</b>", "")
}

/// Print search results to console
pub fn print_search_results(response: &SearchResponse) {
    if let Some(e) = &response.error {
        println!("✗ {}", e);
        return;
    }

    if response.results.is_empty() {
        println!("No results found (total matches: {}).", response.count);
        return;
    }

    println!(
        "Showing {} of {} results:\n",
        response.results.len(),
        response.count
    );

    for (i, result) in response.results.iter().enumerate() {
        println!(
            "{}. {} [{}]",
            i + 1,
            result.title.as_deref().unwrap_or(&result.uri),
            result.site_name
        );
        println!("   {}{}", result.site, result.uri);
        println!("   Relevance: {:.6}", result.relevance);
        println!("   {}", plain(&result.snippet));
        println!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SearchConfig;
    use crate::lemma::tests::identity_lemmatizer;
    use crate::meta::tests::setup_test_db;

    #[tokio::test]
    async fn test_failed_search_is_reported() {
        let (db, _tmp) = setup_test_db().await;
        let engine = SearchEngine::new(db, identity_lemmatizer(), &SearchConfig::default());

        let response = cmd_search(&engine, "  ", None, 0, 20).await;
        assert!(!response.success);
        assert_eq!(response.count, 0);
        assert_eq!(response.error.as_deref(), Some("Empty search query"));

        let response = cmd_search(&engine, "nothing indexed", None, 0, 20).await;
        assert!(response.success);
        assert!(response.results.is_empty());

        let json = serde_json::to_value(&response).unwrap();
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_plain_snippet() {
        assert_eq!(plain("...a <b>cat</b> sat..."), "...a cat sat...");
    }
}
