//! Concurrent site crawling
//!
//! This module provides:
//! - URL fetching with configurable timeouts and request headers
//! - Per-site scope and tracking-link filtering
//! - Randomized politeness delay before each request
//! - A fork-join crawl tree per site with a shared visited set
//! - Cooperative cancellation through a [`CancellationToken`]
//!
//! Every fetched page is stored, indexed, and only then are its links
//! followed. A failed branch is logged and abandoned without touching its
//! siblings.

mod filter;
mod politeness;

pub use filter::*;
pub use politeness::*;

use crate::config::{CrawlConfig, SiteConfig};
use crate::error::{Error, Result};
use crate::index::IndexWriter;
use crate::meta::{MetaDb, NewPage};
use crate::parse::{
    file_marker, image_marker, parse_html, unhandled_marker, ContentType, ParsedDocument,
};
use futures::future::{BoxFuture, FutureExt};
use reqwest::header::{HeaderMap, HeaderValue, REFERER};
use reqwest::Client;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// A fetched resource
#[derive(Debug, Clone)]
pub struct Fetched {
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub kind: ContentType,
    /// Response body, read only for HTML
    pub body: Option<String>,
}

/// Outcome of one site crawl
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlStats {
    pub pages_fetched: usize,
    pub pages_indexed: usize,
    pub media_saved: usize,
    pub failed_fetches: usize,
}

#[derive(Default)]
struct Counters {
    pages_fetched: AtomicUsize,
    pages_indexed: AtomicUsize,
    media_saved: AtomicUsize,
    failed_fetches: AtomicUsize,
}

impl Counters {
    fn snapshot(&self) -> CrawlStats {
        CrawlStats {
            pages_fetched: self.pages_fetched.load(Ordering::Relaxed),
            pages_indexed: self.pages_indexed.load(Ordering::Relaxed),
            media_saved: self.media_saved.load(Ordering::Relaxed),
            failed_fetches: self.failed_fetches.load(Ordering::Relaxed),
        }
    }
}

/// State shared by every task of one site's crawl tree
struct SiteCrawl {
    crawler: Crawler,
    site: SiteConfig,
    site_id: i64,
    max_depth: u32,
    visited: Mutex<HashSet<String>>,
    permits: Semaphore,
    token: CancellationToken,
    counters: Counters,
}

impl SiteCrawl {
    /// Atomically mark a URL as visited; false if it already was
    fn claim(&self, url: &str) -> bool {
        match self.visited.lock() {
            Ok(mut visited) => visited.insert(url.to_string()),
            Err(poisoned) => poisoned.into_inner().insert(url.to_string()),
        }
    }
}

/// Web crawler
#[derive(Clone)]
pub struct Crawler {
    client: Client,
    config: CrawlConfig,
    db: MetaDb,
    indexer: IndexWriter,
    politeness: Politeness,
}

impl Crawler {
    /// Create a new crawler
    pub fn new(config: CrawlConfig, db: MetaDb, indexer: IndexWriter) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            REFERER,
            HeaderValue::from_str(&config.referrer)
                .map_err(|e| Error::Config(format!("Invalid referrer: {}", e)))?,
        );

        let client = Client::builder()
            .user_agent(&config.user_agent)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()
            .map_err(|e| Error::Crawl(format!("Failed to create HTTP client: {}", e)))?;

        let politeness = Politeness::from_config(&config);

        Ok(Self {
            client,
            config,
            db,
            indexer,
            politeness,
        })
    }

    /// Fetch a single URL; non-success statuses are errors
    pub async fn fetch(&self, url: &str) -> Result<Fetched> {
        debug!("Fetching: {}", url);

        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::Crawl(format!("HTTP {}: {}", status, url)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let final_url = response.url().clone();
        let kind = ContentType::detect(content_type.as_deref(), final_url.path());

        let body = if kind == ContentType::Html {
            Some(response.text().await?)
        } else {
            None
        };

        Ok(Fetched {
            url: final_url.to_string(),
            status: status.as_u16(),
            content_type,
            kind,
            body,
        })
    }

    /// Crawl one site starting at `seed`, following links up to `max_depth` hops.
    ///
    /// Returns once every task of the crawl tree has finished or observed
    /// cancellation. Per-page failures never surface here; only failures of
    /// the crawl setup do.
    pub async fn crawl_site(
        &self,
        site: &SiteConfig,
        site_id: i64,
        seed: &str,
        max_depth: u32,
        token: CancellationToken,
    ) -> Result<CrawlStats> {
        let ctx = Arc::new(SiteCrawl {
            crawler: self.clone(),
            site: site.clone(),
            site_id,
            max_depth,
            visited: Mutex::new(HashSet::new()),
            permits: Semaphore::new(self.config.max_concurrent_requests.max(1)),
            token,
            counters: Counters::default(),
        });

        let seed = clean_url(seed);
        if should_skip(&seed, site) {
            return Err(Error::InvalidScope(seed));
        }

        info!("Crawling {} from {} (max depth {})", site.name, seed, max_depth);
        ctx.claim(&seed);
        visit(ctx.clone(), seed, 0).await;

        let stats = ctx.counters.snapshot();
        info!(
            "Finished {}: {} pages fetched, {} indexed, {} media, {} failed",
            site.name,
            stats.pages_fetched,
            stats.pages_indexed,
            stats.media_saved,
            stats.failed_fetches
        );
        Ok(stats)
    }

    /// Fetch, store and index one page; returns the links to follow
    async fn process(&self, ctx: &SiteCrawl, url: &str, path: &str, depth: u32) -> Result<Vec<String>> {
        self.db.touch_site(ctx.site_id).await?;

        let fetched = {
            let _permit = ctx
                .permits
                .acquire()
                .await
                .map_err(|e| Error::Crawl(e.to_string()))?;
            tokio::select! {
                _ = ctx.token.cancelled() => return Ok(Vec::new()),
                fetched = self.fetch(url) => fetched?,
            }
        };
        ctx.counters.pages_fetched.fetch_add(1, Ordering::Relaxed);

        let content = match (fetched.kind, fetched.body.as_deref()) {
            (ContentType::Html, Some(body)) => body.to_string(),
            (ContentType::Image, _) => image_marker(&fetched.url),
            (ContentType::Binary, _) => file_marker(&fetched.url),
            _ => unhandled_marker(fetched.content_type.as_deref().unwrap_or("unknown")),
        };

        let page = NewPage {
            site_id: ctx.site_id,
            path: path.to_string(),
            code: fetched.status,
            content,
        };
        let Some(page_id) = self.db.insert_page(&page).await? else {
            debug!("Page {} already stored", path);
            return Ok(Vec::new());
        };

        if fetched.kind != ContentType::Html {
            info!("Stored {} as {:?}", url, fetched.kind);
            return Ok(Vec::new());
        }

        let doc = parse_html(&page.content, Some(&fetched.url));

        match self.indexer.index_page(ctx.site_id, page_id, &doc.text).await {
            Ok(_) => {
                ctx.counters.pages_indexed.fetch_add(1, Ordering::Relaxed);
            }
            Err(e) => warn!("Failed to index {}: {}", url, e),
        }

        self.store_media(ctx, &doc).await;

        let mut children = Vec::new();
        if depth < ctx.max_depth {
            for link in &doc.links {
                if should_skip(link, &ctx.site) {
                    continue;
                }
                let child = clean_url(link);
                if ctx.claim(&child) {
                    children.push(child);
                }
            }
        }

        info!(
            "Fetched {} (depth {}, {} links, {} new)",
            url,
            depth,
            doc.links.len(),
            children.len()
        );
        Ok(children)
    }

    /// Store images, attachments and pseudo-links of a page as unindexed rows
    async fn store_media(&self, ctx: &SiteCrawl, doc: &ParsedDocument) {
        let media = doc
            .images
            .iter()
            .map(|url| (relative_path(&ctx.site, url), 200, image_marker(url)))
            .chain(
                doc.files
                    .iter()
                    .map(|url| (relative_path(&ctx.site, url), 200, file_marker(url))),
            )
            .chain(
                doc.pseudo_links
                    .iter()
                    .map(|link| (link.path().to_string(), 0, link.marker())),
            );

        for (path, code, content) in media {
            let page = NewPage {
                site_id: ctx.site_id,
                path,
                code,
                content,
            };
            match self.db.insert_page(&page).await {
                Ok(Some(_)) => {
                    ctx.counters.media_saved.fetch_add(1, Ordering::Relaxed);
                }
                Ok(None) => {}
                Err(e) => warn!("Failed to store {}: {}", page.path, e),
            }
        }
    }
}

/// Visit one URL and join on the subtree of links it discovers
fn visit(ctx: Arc<SiteCrawl>, url: String, depth: u32) -> BoxFuture<'static, ()> {
    async move {
        if ctx.token.is_cancelled() || depth > ctx.max_depth || should_skip(&url, &ctx.site) {
            return;
        }

        let path = relative_path(&ctx.site, &url);
        match ctx.crawler.db.page_exists(ctx.site_id, &path).await {
            Ok(false) => {}
            Ok(true) => return,
            Err(e) => {
                warn!("Failed to check {}: {}", url, e);
                return;
            }
        }

        if !ctx.crawler.politeness.wait(&ctx.token).await {
            return;
        }

        let children = match ctx.crawler.process(&ctx, &url, &path, depth).await {
            Ok(children) => children,
            Err(e) => {
                ctx.counters.failed_fetches.fetch_add(1, Ordering::Relaxed);
                warn!("Failed to fetch {}: {}", url, e);
                return;
            }
        };

        if children.is_empty() || ctx.token.is_cancelled() {
            return;
        }

        let mut tasks = JoinSet::new();
        for child in children {
            tasks.spawn(visit(ctx.clone(), child, depth + 1));
        }
        while let Some(result) = tasks.join_next().await {
            if let Err(e) = result {
                warn!("Crawl task failed: {}", e);
            }
        }
    }
    .boxed()
}
