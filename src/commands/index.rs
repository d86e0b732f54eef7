//! Indexing commands: start, stop and single-page re-index

use crate::error::Error;
use crate::indexing::Orchestrator;
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartIndexingResponse {
    pub started: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StopIndexingResponse {
    pub stopped: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexPageResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Log a rejected or failed command and render it for the caller
pub(crate) fn report(operation: &str, e: Error) -> Option<String> {
    if e.is_control() {
        warn!("{} rejected: {}", operation, e);
    } else {
        error!("{} failed: {}", operation, e);
    }
    Some(e.to_string())
}

/// Start a full indexing run
pub fn cmd_start_indexing(orchestrator: &Orchestrator) -> StartIndexingResponse {
    match orchestrator.start_full_indexing() {
        Ok(()) => StartIndexingResponse {
            started: true,
            error: None,
        },
        Err(e) => StartIndexingResponse {
            started: false,
            error: report("Start indexing", e),
        },
    }
}

/// Stop the active indexing run
pub async fn cmd_stop_indexing(orchestrator: &Orchestrator) -> StopIndexingResponse {
    match orchestrator.stop_indexing().await {
        Ok(failed) => {
            info!("Stopped indexing, {} sites interrupted", failed);
            StopIndexingResponse {
                stopped: true,
                error: None,
            }
        }
        Err(e) => StopIndexingResponse {
            stopped: false,
            error: report("Stop indexing", e),
        },
    }
}

/// Re-index the site owning `url` from that single page
pub async fn cmd_index_page(orchestrator: &Orchestrator, url: &str) -> IndexPageResponse {
    match orchestrator.index_single_page(url.trim()).await {
        Ok(_) => IndexPageResponse {
            success: true,
            error: None,
        },
        Err(e) => IndexPageResponse {
            success: false,
            error: report("Index page", e),
        },
    }
}

/// Print a start response to console
pub fn print_start(response: &StartIndexingResponse) {
    match &response.error {
        None => println!("✓ Indexing started"),
        Some(e) => println!("✗ Indexing not started: {}", e),
    }
}

/// Print a stop response to console
pub fn print_stop(response: &StopIndexingResponse) {
    match &response.error {
        None => println!("✓ Indexing stopped"),
        Some(e) => println!("✗ Indexing not stopped: {}", e),
    }
}

/// Print a single-page response to console
pub fn print_index_page(url: &str, response: &IndexPageResponse) {
    match &response.error {
        None => println!("✓ Indexed {}", url),
        Some(e) => println!("✗ Failed to index {}: {}", url, e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, SiteConfig};
    use crate::meta::tests::setup_test_db;

    #[tokio::test]
    async fn test_control_errors_become_responses() {
        let (db, _tmp) = setup_test_db().await;
        let config = Config {
            sites: vec![SiteConfig::new("Example", "https://example.com")],
            ..Config::default()
        };
        let orchestrator = Orchestrator::new(config, db).unwrap();

        let stop = cmd_stop_indexing(&orchestrator).await;
        assert!(!stop.stopped);
        assert_eq!(stop.error.as_deref(), Some("Indexing is not running"));

        let page = cmd_index_page(&orchestrator, "https://other.example.org/").await;
        assert!(!page.success);
        assert!(page.error.unwrap().contains("outside the sites"));

        let json = serde_json::to_string(&StartIndexingResponse {
            started: true,
            error: None,
        })
        .unwrap();
        assert_eq!(json, r#"{"started":true}"#);
    }
}
