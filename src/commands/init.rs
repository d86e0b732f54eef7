//! Init command implementation

use crate::config::Config;
use crate::error::{Error, Result};
use crate::meta::MetaDb;
use serde::Serialize;
use std::path::PathBuf;
use tracing::info;

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub config_path: PathBuf,
    pub force: bool,
}

/// Files written by `init`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InitReport {
    pub config_path: String,
    pub db_path: String,
}

/// Write an example configuration and create the index database next to it
pub async fn cmd_init(options: InitOptions) -> Result<InitReport> {
    let InitOptions { config_path, force } = options;

    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Config already exists at {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    let base_dir = config_path
        .parent()
        .map(PathBuf::from)
        .unwrap_or_else(Config::default_base_dir);

    let mut config = Config::example();
    config.init_paths(Some(base_dir));
    config.paths.config_file = config_path;
    config.save()?;

    MetaDb::new(&config.paths.db_file).await?;
    info!("Created index database at {:?}", config.paths.db_file);

    Ok(InitReport {
        config_path: config.paths.config_file.display().to_string(),
        db_path: config.paths.db_file.display().to_string(),
    })
}

/// Print init summary to console
pub fn print_init(report: &InitReport) {
    println!("✓ sitesearch initialized successfully");
    println!("  Config: {}", report.config_path);
    println!("  Database: {}", report.db_path);
    println!("\nNext steps:");
    println!("  1. List the sites to index under [[sites]] in the config file");
    println!("  2. Build the index: sitesearch index");
    println!("  3. Search it: sitesearch search \"your query\"");
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_writes_config_and_db() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        let report = cmd_init(InitOptions {
            config_path: config_path.clone(),
            force: false,
        })
        .await
        .unwrap();

        assert!(config_path.exists());
        assert!(tmp.path().join("index.db").exists());
        assert!(report.db_path.ends_with("index.db"));

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.sites.len(), 1);
    }

    #[tokio::test]
    async fn test_init_refuses_to_overwrite() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "sites = []\n").unwrap();

        let result = cmd_init(InitOptions {
            config_path: config_path.clone(),
            force: false,
        })
        .await;
        assert!(matches!(result, Err(Error::Config(_))));

        cmd_init(InitOptions {
            config_path: config_path.clone(),
            force: true,
        })
        .await
        .unwrap();
        assert_eq!(Config::load(&config_path).unwrap().sites.len(), 1);
    }
}
