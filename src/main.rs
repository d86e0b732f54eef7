//! sitesearch CLI entry point

use clap::{Parser, Subcommand};
use serde::Serialize;
use sitesearch::{
    commands::{
        cmd_index_page, cmd_init, cmd_search, cmd_start_indexing, cmd_statistics,
        cmd_stop_indexing, print_index_page, print_init, print_search_results, print_start,
        print_statistics, print_stop, InitOptions,
    },
    config::Config,
    error::Result,
    indexing::Orchestrator,
    lemma::Lemmatizer,
    meta::MetaDb,
    search::SearchEngine,
};
use std::path::PathBuf;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "sitesearch")]
#[command(version, about = "Crawl websites into a lemma index and search them", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, env = "SITESEARCH_CONFIG")]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Write an example config and create the index database
    Init {
        /// Force overwrite existing config
        #[arg(long)]
        force: bool,
    },

    /// Re-index every configured site (Ctrl-C stops the run)
    Index,

    /// Re-index the site owning a URL from that page only
    IndexPage {
        /// Page URL inside one of the configured sites
        url: String,
    },

    /// Search the index
    Search {
        /// The search query
        query: String,

        /// Restrict results to one configured site URL
        #[arg(short, long)]
        site: Option<String>,

        /// Number of ranked results to skip
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Maximum number of results (defaults to search.default_limit)
        #[arg(short, long)]
        limit: Option<usize>,
    },

    /// Show per-site and total index statistics
    Stats,
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    }
}

/// Runs the selected command; `Ok(false)` means the command was rejected
async fn run() -> Result<bool> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if cli.json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).init();
    }

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(Config::default_config_path);

    if let Commands::Init { force } = cli.command {
        let report = cmd_init(InitOptions { config_path, force }).await?;
        if cli.json {
            emit(&report)?;
        } else {
            print_init(&report);
        }
        return Ok(true);
    }

    let config = load_config(&config_path)?;
    let db = MetaDb::connect(&config).await?;

    match cli.command {
        Commands::Init { .. } => unreachable!(),

        Commands::Index => {
            let orchestrator = Orchestrator::new(config, db)?;
            handle_index(&orchestrator, cli.json).await
        }

        Commands::IndexPage { url } => {
            let orchestrator = Orchestrator::new(config, db)?;
            let response = cmd_index_page(&orchestrator, &url).await;
            if cli.json {
                emit(&response)?;
            } else {
                print_index_page(&url, &response);
            }
            Ok(response.success)
        }

        Commands::Search {
            query,
            site,
            offset,
            limit,
        } => {
            let limit = limit.unwrap_or(config.search.default_limit);
            let engine = SearchEngine::new(db, Lemmatizer::from_config(&config.text), &config.search);
            let response = cmd_search(&engine, &query, site.as_deref(), offset, limit).await;
            if cli.json {
                emit(&response)?;
            } else {
                print_search_results(&response);
            }
            Ok(response.success)
        }

        Commands::Stats => {
            let orchestrator = Orchestrator::new(config, db)?;
            let stats = cmd_statistics(&orchestrator).await?;
            if cli.json {
                emit(&stats)?;
            } else {
                print_statistics(&stats);
            }
            Ok(true)
        }
    }
}

fn emit<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn load_config(config_path: &std::path::Path) -> Result<Config> {
    if !config_path.exists() {
        eprintln!(
            "Config file not found: {}\nRun 'sitesearch init' first.",
            config_path.display()
        );
        std::process::exit(1);
    }

    Config::load(config_path)
}

async fn handle_index(orchestrator: &Orchestrator, json: bool) -> Result<bool> {
    let started = cmd_start_indexing(orchestrator);
    if !json {
        print_start(&started);
    }
    if !started.started {
        if json {
            emit(&started)?;
        }
        return Ok(false);
    }

    tokio::select! {
        _ = orchestrator.wait_until_idle() => {
            info!("All sites processed");
        }
        signal = tokio::signal::ctrl_c() => {
            match signal {
                Ok(()) => {
                    let stopped = cmd_stop_indexing(orchestrator).await;
                    if !json {
                        print_stop(&stopped);
                    }
                }
                Err(e) => {
                    warn!("Failed to listen for Ctrl-C: {}", e);
                    orchestrator.wait_until_idle().await;
                }
            }
        }
    }

    let stats = cmd_statistics(orchestrator).await?;
    if json {
        emit(&stats)?;
    } else {
        println!();
        print_statistics(&stats);
    }
    Ok(true)
}
