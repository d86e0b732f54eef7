//! Configuration management for sitesearch
//!
//! Handles loading, saving, and validating configuration from TOML files.
//! The configured site list is the only source of crawl and search scope.

mod defaults;

pub use defaults::*;

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use url::Url;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Sites to crawl, in order
    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    /// Web crawling configuration
    #[serde(default)]
    pub crawl: CrawlConfig,

    /// Text analysis configuration
    #[serde(default)]
    pub text: TextConfig,

    /// Search configuration
    #[serde(default)]
    pub search: SearchConfig,

    /// Paths configuration (internal, not user-editable)
    #[serde(skip)]
    pub paths: PathsConfig,
}

/// A configured site
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteConfig {
    /// Display name
    pub name: String,

    /// Base URL; every crawled page must start with it
    pub url: String,
}

impl SiteConfig {
    pub fn new(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
        }
    }

    /// Base URL without a trailing slash
    pub fn base_url(&self) -> &str {
        self.url.trim_end_matches('/')
    }

    /// Whether `url` lies within this site
    pub fn contains(&self, url: &str) -> bool {
        let base = self.base_url().to_lowercase();
        let candidate = url.to_lowercase();
        match candidate.strip_prefix(&base) {
            Some(rest) => rest.is_empty() || rest.starts_with(['/', '?', '#']),
            None => false,
        }
    }
}

/// Web crawling configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlConfig {
    /// Maximum crawl depth from the base URL
    #[serde(default = "default_crawl_max_depth")]
    pub max_depth: u32,

    /// Request timeout in seconds
    #[serde(default = "default_crawl_timeout")]
    pub timeout_secs: u64,

    /// User agent string
    #[serde(default = "default_crawl_user_agent")]
    pub user_agent: String,

    /// Referrer header value
    #[serde(default = "default_crawl_referrer")]
    pub referrer: String,

    /// Lower bound of the randomized delay before each request
    #[serde(default = "default_politeness_min_ms")]
    pub politeness_min_ms: u64,

    /// Upper bound of the randomized delay before each request
    #[serde(default = "default_politeness_max_ms")]
    pub politeness_max_ms: u64,

    /// Maximum simultaneous requests to one site
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
}

/// Text analysis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextConfig {
    /// Tokens shorter than this are discarded
    #[serde(default = "default_min_word_len")]
    pub min_word_len: usize,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Page size used when the caller gives none
    #[serde(default = "default_search_limit")]
    pub default_limit: usize,

    /// Snippet window length in characters
    #[serde(default = "default_snippet_window")]
    pub snippet_window: usize,

    /// Characters of context kept before a match
    #[serde(default = "default_snippet_lead")]
    pub snippet_lead: usize,

    /// Maximum number of windows per snippet
    #[serde(default = "default_max_snippet_fragments")]
    pub max_snippet_fragments: usize,
}

/// Internal paths configuration
#[derive(Debug, Clone, Default)]
pub struct PathsConfig {
    /// Base directory for sitesearch data
    pub base_dir: PathBuf,

    /// Path to config file
    pub config_file: PathBuf,

    /// Path to SQLite database
    pub db_file: PathBuf,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            max_depth: default_crawl_max_depth(),
            timeout_secs: default_crawl_timeout(),
            user_agent: default_crawl_user_agent(),
            referrer: default_crawl_referrer(),
            politeness_min_ms: default_politeness_min_ms(),
            politeness_max_ms: default_politeness_max_ms(),
            max_concurrent_requests: default_max_concurrent_requests(),
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            min_word_len: default_min_word_len(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_limit: default_search_limit(),
            snippet_window: default_snippet_window(),
            snippet_lead: default_snippet_lead(),
            max_snippet_fragments: default_max_snippet_fragments(),
        }
    }
}

impl Config {
    /// Get the default base directory for sitesearch (~/.sitesearch)
    pub fn default_base_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".sitesearch")
    }

    /// Get the default config file path
    pub fn default_config_path() -> PathBuf {
        Self::default_base_dir().join("config.toml")
    }

    /// Initialize paths configuration
    pub fn init_paths(&mut self, base_dir: Option<PathBuf>) {
        let base = base_dir.unwrap_or_else(Self::default_base_dir);
        self.paths = PathsConfig {
            config_file: base.join("config.toml"),
            db_file: base.join("index.db"),
            base_dir: base,
        };
    }

    /// Load configuration from a specific file path
    pub fn load(config_path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", config_path);

        if !config_path.exists() {
            return Err(Error::Config(format!(
                "Config file not found: {}",
                config_path.display()
            )));
        }

        let content = std::fs::read_to_string(config_path)?;
        let mut config: Config = toml::from_str(&content)?;

        let base = config_path.parent().unwrap_or(Path::new(".")).to_path_buf();
        config.paths = PathsConfig {
            config_file: config_path.to_path_buf(),
            db_file: base.join("index.db"),
            base_dir: base,
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.paths.config_file.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(&self.paths.config_file, content)?;
        info!("Saved config to {:?}", self.paths.config_file);
        Ok(())
    }

    /// Configuration written by `sitesearch init`
    pub fn example() -> Self {
        Self {
            sites: vec![SiteConfig::new("Example", "https://example.com")],
            ..Self::default()
        }
    }

    /// Find the configured site whose scope covers `url`
    pub fn site_for_url(&self, url: &str) -> Option<&SiteConfig> {
        self.sites.iter().find(|site| site.contains(url))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for site in &self.sites {
            let parsed = Url::parse(&site.url)
                .map_err(|e| Error::Config(format!("Invalid site URL '{}': {}", site.url, e)))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(Error::Config(format!(
                    "Site URL must be http or https: {}",
                    site.url
                )));
            }
            if !seen.insert(site.base_url().to_lowercase()) {
                return Err(Error::Config(format!("Duplicate site URL: {}", site.url)));
            }
        }

        if self.crawl.politeness_min_ms > self.crawl.politeness_max_ms {
            return Err(Error::Config(
                "crawl.politeness_min_ms must be <= crawl.politeness_max_ms".to_string(),
            ));
        }

        if self.crawl.timeout_secs == 0 {
            return Err(Error::Config(
                "crawl.timeout_secs must be positive".to_string(),
            ));
        }

        if self.crawl.max_concurrent_requests == 0 {
            return Err(Error::Config(
                "crawl.max_concurrent_requests must be positive".to_string(),
            ));
        }

        if self.search.snippet_window == 0 {
            return Err(Error::Config(
                "search.snippet_window must be positive".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.crawl.max_depth, 3);
        assert_eq!(config.crawl.timeout_secs, 10);
        assert_eq!(config.search.default_limit, 20);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_save_load() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::example();
        config.init_paths(Some(tmp.path().to_path_buf()));
        config.sites.push(SiteConfig::new("Docs", "https://docs.example.org/"));

        config.save().unwrap();
        assert!(config.paths.config_file.exists());

        let loaded = Config::load(&config.paths.config_file).unwrap();
        assert_eq!(loaded.sites.len(), 2);
        assert_eq!(loaded.sites[1].name, "Docs");
        assert_eq!(loaded.paths.db_file, tmp.path().join("index.db"));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [[sites]]
            name = "Shop"
            url = "https://shop.example.com"

            [crawl]
            max_depth = 1
            "#,
        )
        .unwrap();

        assert_eq!(config.crawl.max_depth, 1);
        assert_eq!(config.crawl.politeness_min_ms, 500);
        assert_eq!(config.text.min_word_len, 3);
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::example();
        assert!(config.validate().is_ok());

        config.sites.push(SiteConfig::new("Dup", "https://EXAMPLE.com/"));
        assert!(config.validate().is_err());

        let mut config = Config::example();
        config.sites.push(SiteConfig::new("Ftp", "ftp://files.example.com"));
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.crawl.politeness_min_ms = 10_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_site_scope() {
        let mut config = Config::example();
        config.sites.push(SiteConfig::new("Blog", "https://blog.example.org/posts/"));

        assert_eq!(
            config.site_for_url("https://example.com/about").map(|s| s.name.as_str()),
            Some("Example")
        );
        assert_eq!(
            config.site_for_url("https://Example.com").map(|s| s.name.as_str()),
            Some("Example")
        );
        assert_eq!(
            config
                .site_for_url("https://blog.example.org/posts/hello")
                .map(|s| s.name.as_str()),
            Some("Blog")
        );
        assert!(config.site_for_url("https://example.community/").is_none());
        assert!(config.site_for_url("https://blog.example.org/about").is_none());
    }
}
