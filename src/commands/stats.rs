//! Statistics command implementation
//!
//! Totals are computed over the configured site list, not over every row in
//! the database. Rows left behind by an interrupted process are reported
//! as failed without being rewritten.

use crate::error::Result;
use crate::indexing::Orchestrator;
use crate::meta::SiteStatus;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Reported for configured sites that have no row yet
pub const NOT_INDEXED_MESSAGE: &str = "Site has not been indexed yet";

/// Reported for rows stuck in `INDEXING` with no crawl behind them
pub const INTERRUPTED_MESSAGE: &str = "Indexing was interrupted";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteStatistics {
    pub name: String,
    pub url: String,
    pub status: SiteStatus,
    pub status_time: Option<String>,
    pub page_count: usize,
    pub lemma_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsResponse {
    pub total_sites: usize,
    pub total_pages: usize,
    pub total_lemmas: usize,
    pub indexing_in_progress: bool,
    pub per_site: Vec<SiteStatistics>,
}

/// Collect per-site and total statistics for the configured sites
pub async fn cmd_statistics(orchestrator: &Orchestrator) -> Result<StatisticsResponse> {
    info!("Collecting statistics");

    let db = orchestrator.db();
    let sites = &orchestrator.config().sites;
    let mut per_site = Vec::with_capacity(sites.len());

    for site in sites {
        let indexing = orchestrator.is_site_indexing(&site.url);

        let Some(row) = db.get_site_by_url(&site.url).await? else {
            let (status, last_error) = if indexing {
                (SiteStatus::Queued, None)
            } else {
                (SiteStatus::Failed, Some(NOT_INDEXED_MESSAGE.to_string()))
            };
            per_site.push(SiteStatistics {
                name: site.name.clone(),
                url: site.url.clone(),
                status,
                status_time: None,
                page_count: 0,
                lemma_count: 0,
                last_error,
            });
            continue;
        };

        let stats = db.get_site_stats(row.id).await?;
        let mut status = row.get_status()?;
        let mut last_error = row.last_error;
        if status == SiteStatus::Indexing && !indexing {
            debug!("Site {} is marked indexing but no crawl is active", site.url);
            status = SiteStatus::Failed;
            last_error = Some(INTERRUPTED_MESSAGE.to_string());
        }

        per_site.push(SiteStatistics {
            name: site.name.clone(),
            url: site.url.clone(),
            status,
            status_time: Some(row.status_time),
            page_count: stats.page_count,
            lemma_count: stats.lemma_count,
            last_error,
        });
    }

    Ok(StatisticsResponse {
        total_sites: per_site.len(),
        total_pages: per_site.iter().map(|s| s.page_count).sum(),
        total_lemmas: per_site.iter().map(|s| s.lemma_count).sum(),
        indexing_in_progress: orchestrator.is_indexing_in_progress(),
        per_site,
    })
}

/// Print statistics to console
pub fn print_statistics(stats: &StatisticsResponse) {
    println!("sitesearch statistics");
    println!("=====================\n");

    println!("Sites: {}", stats.total_sites);
    println!("Pages: {}", stats.total_pages);
    println!("Lemmas: {}", stats.total_lemmas);
    println!(
        "Indexing: {}",
        if stats.indexing_in_progress {
            "in progress"
        } else {
            "idle"
        }
    );

    for site in &stats.per_site {
        println!("\n{} ({})", site.name, site.url);
        println!("  Status: {}", site.status);
        if let Some(time) = &site.status_time {
            println!("  Updated: {}", time);
        }
        println!("  Pages: {}", site.page_count);
        println!("  Lemmas: {}", site.lemma_count);
        if let Some(e) = &site.last_error {
            println!("  Error: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SiteConfig};
    use crate::meta::tests::setup_test_db;
    use crate::meta::NewPage;

    #[tokio::test]
    async fn test_statistics_reconcile_site_rows() {
        let (db, _tmp) = setup_test_db().await;
        let config = Config {
            sites: vec![
                SiteConfig::new("Done", "https://done.example.com"),
                SiteConfig::new("Stale", "https://stale.example.com"),
                SiteConfig::new("Missing", "https://missing.example.com"),
            ],
            ..Config::default()
        };

        let done = db
            .insert_site("https://done.example.com", "Done", SiteStatus::Indexed)
            .await
            .unwrap();
        db.insert_page(&NewPage {
            site_id: done.id,
            path: "/".to_string(),
            code: 200,
            content: "<p>hello</p>".to_string(),
        })
        .await
        .unwrap();
        db.insert_site("https://stale.example.com/", "Stale", SiteStatus::Indexing)
            .await
            .unwrap();
        db.insert_site("https://unlisted.example.com", "Unlisted", SiteStatus::Indexed)
            .await
            .unwrap();

        let orchestrator = Orchestrator::new(config, db).unwrap();
        let stats = cmd_statistics(&orchestrator).await.unwrap();

        assert_eq!(stats.total_sites, 3);
        assert_eq!(stats.total_pages, 1);
        assert!(!stats.indexing_in_progress);

        let done = &stats.per_site[0];
        assert_eq!(done.status, SiteStatus::Indexed);
        assert_eq!(done.page_count, 1);
        assert!(done.status_time.is_some());
        assert!(done.last_error.is_none());

        let stale = &stats.per_site[1];
        assert_eq!(stale.status, SiteStatus::Failed);
        assert_eq!(stale.last_error.as_deref(), Some(INTERRUPTED_MESSAGE));

        let missing = &stats.per_site[2];
        assert_eq!(missing.status, SiteStatus::Failed);
        assert_eq!(missing.last_error.as_deref(), Some(NOT_INDEXED_MESSAGE));
        assert!(missing.status_time.is_none());

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["totalSites"], 3);
        assert_eq!(json["perSite"][0]["pageCount"], 1);
        assert_eq!(json["perSite"][1]["status"], "FAILED");
    }
}
