//! Indexing run orchestration
//!
//! The [`Orchestrator`] owns the only copy of the run state: whether a
//! full indexing run is active, which sites are scheduled or being
//! crawled, and the cancellation tokens that stop them. A full run
//! spawns one crawl per configured site; each site is wiped, recreated
//! in `INDEXING` status, crawled, and finally marked `INDEXED` or
//! `FAILED`.

use crate::config::{Config, SiteConfig};
use crate::crawl::{clean_url, should_skip, CrawlStats, Crawler};
use crate::error::{Error, Result};
use crate::index::IndexWriter;
use crate::lemma::Lemmatizer;
use crate::meta::{MetaDb, SiteStatus};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::Notify;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Error recorded on sites interrupted by a stop request
pub const STOPPED_MESSAGE: &str = "Indexing stopped by user";

#[derive(Default)]
struct RunState {
    /// A full run is active and has not been asked to stop
    running: bool,
    /// The full run's background task has not finished yet
    run_alive: bool,
    run_token: Option<CancellationToken>,
    /// Site keys scheduled or being crawled
    active: HashSet<String>,
    /// Tokens of single-page crawls, by site key
    page_tokens: HashMap<String, CancellationToken>,
}

impl RunState {
    fn is_idle(&self) -> bool {
        !self.run_alive && self.active.is_empty()
    }
}

struct Shared {
    config: Config,
    db: MetaDb,
    crawler: Crawler,
    state: Mutex<RunState>,
    idle: Notify,
}

fn site_key(url: &str) -> String {
    url.trim_end_matches('/').to_lowercase()
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, RunState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn release_site(&self, site: &SiteConfig) {
        let key = site_key(&site.url);
        let mut state = self.state();
        state.active.remove(&key);
        state.page_tokens.remove(&key);
        drop(state);
        self.idle.notify_waiters();
    }

    fn finish_run(&self) {
        let mut state = self.state();
        state.running = false;
        state.run_alive = false;
        state.run_token = None;
        drop(state);
        self.idle.notify_waiters();
    }

    /// Wipe a site, recreate its row and crawl it from `seed`.
    ///
    /// Any error, including one from the database before the crawl starts,
    /// leaves the site's newest row `FAILED` with the message.
    async fn index_site(
        &self,
        site: &SiteConfig,
        seed: &str,
        max_depth: u32,
        token: CancellationToken,
    ) -> Result<CrawlStats> {
        let row_id = match self.reset_site(site).await {
            Ok(id) => id,
            Err(e) => {
                self.record_failure(site, &e.to_string()).await;
                return Err(e);
            }
        };

        let outcome = self
            .crawler
            .crawl_site(site, row_id, seed, max_depth, token.clone())
            .await
            .and_then(|stats| {
                if stats.pages_fetched == 0 && stats.failed_fetches > 0 {
                    Err(Error::Crawl(format!("Failed to fetch {}", seed)))
                } else {
                    Ok(stats)
                }
            });

        let (outcome, status, message) = if token.is_cancelled() {
            (
                Err(Error::Crawl(STOPPED_MESSAGE.to_string())),
                SiteStatus::Failed,
                Some(STOPPED_MESSAGE.to_string()),
            )
        } else {
            match outcome {
                Ok(stats) => (Ok(stats), SiteStatus::Indexed, None),
                Err(e) => {
                    let message = e.to_string();
                    (Err(e), SiteStatus::Failed, Some(message))
                }
            }
        };
        if let Err(e) = self
            .db
            .transition_site(row_id, SiteStatus::Indexing, status, message.as_deref())
            .await
        {
            self.record_failure(site, &e.to_string()).await;
            return Err(e);
        }

        if let Ok(stats) = &outcome {
            info!("Indexed {}: {} pages", site.name, stats.pages_fetched);
        }
        outcome
    }

    /// Remove a site's previous index and create its `INDEXING` row
    async fn reset_site(&self, site: &SiteConfig) -> Result<i64> {
        let deleted = self.db.delete_site_by_url(&site.url).await?;
        if deleted.sites > 0 {
            debug!(
                "Removed previous index of {}: {} pages, {} lemmas",
                site.url, deleted.pages, deleted.lemmas
            );
        }

        let row = self
            .db
            .insert_site(&site.url, &site.name, SiteStatus::Indexing)
            .await?;
        Ok(row.id)
    }

    /// Mark the site's newest row failed, creating one if none exists
    async fn record_failure(&self, site: &SiteConfig, message: &str) {
        if let Err(e) = self.try_record_failure(site, message).await {
            warn!("Failed to record failure of {}: {}", site.url, e);
        }
    }

    async fn try_record_failure(&self, site: &SiteConfig, message: &str) -> Result<()> {
        let id = match self.db.get_site_by_url(&site.url).await? {
            Some(row) => row.id,
            None => {
                self.db
                    .insert_site(&site.url, &site.name, SiteStatus::Failed)
                    .await?
                    .id
            }
        };
        self.db
            .update_site_status(id, SiteStatus::Failed, Some(message))
            .await
    }

    async fn run_full(self: Arc<Self>, token: CancellationToken) {
        let max_depth = self.config.crawl.max_depth;
        let mut handles = Vec::with_capacity(self.config.sites.len());

        for site in self.config.sites.clone() {
            let shared = self.clone();
            let token = token.clone();
            let task_site = site.clone();
            let handle = tokio::spawn(async move {
                let site = task_site;
                let seed = site.url.clone();
                match shared.index_site(&site, &seed, max_depth, token.clone()).await {
                    Ok(_) => {}
                    Err(_) if token.is_cancelled() => {
                        info!("Indexing of {} stopped", site.name);
                    }
                    Err(e) => error!("Indexing of {} failed: {}", site.name, e),
                }
            });
            handles.push((site, handle));
        }

        for (site, handle) in handles {
            if let Err(e) = handle.await {
                error!("Indexing task for {} failed: {}", site.url, e);
                self.record_failure(&site, &e.to_string()).await;
            }
            self.release_site(&site);
        }

        info!("Indexing run finished");
        self.finish_run();
    }
}

/// Crawl orchestrator and run-state machine
#[derive(Clone)]
pub struct Orchestrator {
    shared: Arc<Shared>,
}

impl Orchestrator {
    /// Create an orchestrator for the configured sites
    pub fn new(config: Config, db: MetaDb) -> Result<Self> {
        let lemmatizer = Lemmatizer::from_config(&config.text);
        let indexer = IndexWriter::new(db.clone(), lemmatizer);
        let crawler = Crawler::new(config.crawl.clone(), db.clone(), indexer)?;

        Ok(Self {
            shared: Arc::new(Shared {
                config,
                db,
                crawler,
                state: Mutex::new(RunState::default()),
                idle: Notify::new(),
            }),
        })
    }

    pub fn config(&self) -> &Config {
        &self.shared.config
    }

    pub fn db(&self) -> &MetaDb {
        &self.shared.db
    }

    /// Start a full indexing run of every configured site in the background
    pub fn start_full_indexing(&self) -> Result<()> {
        let token = CancellationToken::new();
        {
            let mut state = self.shared.state();
            if state.running || !state.is_idle() {
                return Err(Error::AlreadyRunning);
            }
            state.running = true;
            state.run_alive = true;
            state.run_token = Some(token.clone());
            state.active = self
                .shared
                .config
                .sites
                .iter()
                .map(|site| site_key(&site.url))
                .collect();
        }

        info!(
            "Starting indexing of {} sites",
            self.shared.config.sites.len()
        );
        tokio::spawn(self.shared.clone().run_full(token));
        Ok(())
    }

    /// Stop the active run and mark every site still indexing as failed
    pub async fn stop_indexing(&self) -> Result<u64> {
        let tokens: Vec<CancellationToken> = {
            let mut state = self.shared.state();
            if !state.running {
                return Err(Error::NotRunning);
            }
            state.running = false;
            state
                .run_token
                .iter()
                .chain(state.page_tokens.values())
                .cloned()
                .collect()
        };

        info!("Stopping indexing");
        for token in tokens {
            token.cancel();
        }

        self.wait_until_idle().await;

        let failed = self
            .shared
            .db
            .fail_sites_in_status(SiteStatus::Indexing, STOPPED_MESSAGE)
            .await?;
        info!("Indexing stopped; {} sites marked failed", failed);
        Ok(failed)
    }

    /// Whether a full indexing run is active
    pub fn is_indexing_in_progress(&self) -> bool {
        self.shared.state().running
    }

    /// Whether a site is scheduled or being crawled
    pub fn is_site_indexing(&self, url: &str) -> bool {
        self.shared.state().active.contains(&site_key(url))
    }

    /// Wait until no run and no single-page crawl is in flight
    pub async fn wait_until_idle(&self) {
        loop {
            let notified = self.shared.idle.notified();
            if self.shared.state().is_idle() {
                return;
            }
            notified.await;
        }
    }

    /// Re-index the site owning `url`, crawling only that page
    pub async fn index_single_page(&self, url: &str) -> Result<CrawlStats> {
        let site = self
            .shared
            .config
            .site_for_url(url)
            .cloned()
            .ok_or_else(|| Error::InvalidScope(url.to_string()))?;

        // Rejected before the site's previous index is wiped
        if should_skip(&clean_url(url), &site) {
            return Err(Error::InvalidScope(url.to_string()));
        }

        let token = CancellationToken::new();
        {
            let mut state = self.shared.state();
            let key = site_key(&site.url);
            if !state.active.insert(key.clone()) {
                return Err(Error::AlreadyRunning);
            }
            state.page_tokens.insert(key, token.clone());
        }

        info!("Indexing single page {}", url);
        let result = self.shared.index_site(&site, url, 0, token).await;
        self.shared.release_site(&site);
        result
    }
}
