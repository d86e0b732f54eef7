//! sitesearch - crawl websites and search them
//!
//! This crate provides:
//! - A concurrent, polite crawler for a configured list of sites
//! - A lemma-based inverted index stored in SQLite
//! - TF-IDF ranked search with highlighted snippets
//! - CLI commands for indexing, searching and statistics

pub mod commands;
pub mod config;
pub mod crawl;
pub mod error;
pub mod index;
pub mod indexing;
pub mod lemma;
pub mod meta;
pub mod parse;
pub mod search;

pub use config::Config;
pub use error::{Error, Result};
