//! Default values for configuration

/// Default maximum crawl depth (hops from the site's base URL)
pub fn default_crawl_max_depth() -> u32 {
    3
}

/// Default request timeout in seconds
pub fn default_crawl_timeout() -> u64 {
    10
}

/// Default user agent
pub fn default_crawl_user_agent() -> String {
    format!(
        "Mozilla/5.0 (compatible; sitesearch/{})",
        env!("CARGO_PKG_VERSION")
    )
}

/// Default referrer sent with every request
pub fn default_crawl_referrer() -> String {
    "http://www.google.com".to_string()
}

/// Default lower bound of the politeness delay
pub fn default_politeness_min_ms() -> u64 {
    500
}

/// Default upper bound of the politeness delay
pub fn default_politeness_max_ms() -> u64 {
    5000
}

/// Default number of in-flight requests per site
pub fn default_max_concurrent_requests() -> usize {
    8
}

/// Default minimum token length kept by the lemmatizer
pub fn default_min_word_len() -> usize {
    3
}

/// Default page size for search results
pub fn default_search_limit() -> usize {
    20
}

/// Default snippet window length in characters
pub fn default_snippet_window() -> usize {
    200
}

/// Default number of characters shown before the first match in a window
pub fn default_snippet_lead() -> usize {
    50
}

/// Default maximum number of snippet fragments
pub fn default_max_snippet_fragments() -> usize {
    3
}
