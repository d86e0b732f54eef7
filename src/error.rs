//! Custom error types for sitesearch

use thiserror::Error;

/// Main error type for sitesearch operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Indexing is already running")]
    AlreadyRunning,

    #[error("Indexing is not running")]
    NotRunning,

    #[error("Page is outside the sites listed in the configuration file: {0}")]
    InvalidScope(String),

    #[error("Empty search query")]
    EmptyQuery,

    #[error("Search query contains no recognizable words")]
    NoLemmas,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Crawl error: {0}")]
    Crawl(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Whether this error is a rejected operation rather than an infrastructure failure
    pub fn is_control(&self) -> bool {
        matches!(
            self,
            Error::AlreadyRunning
                | Error::NotRunning
                | Error::InvalidScope(_)
                | Error::EmptyQuery
                | Error::NoLemmas
        )
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Error::Other(err.to_string())
    }
}

/// Result type alias for sitesearch
pub type Result<T> = std::result::Result<T, Error>;
