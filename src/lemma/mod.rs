//! Text analysis: tokenization and base-form normalization
//!
//! Text is split into words, each word is lowercased and classified by
//! script, and the matching [`Normalizer`] turns it into base forms
//! ("lemmas"). The resulting per-document counts feed both the index
//! writer and the query side of search.

mod normalizer;

pub use normalizer::*;

use crate::config::TextConfig;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use unicode_segmentation::UnicodeSegmentation;

/// Turns text into lemma counts
#[derive(Clone)]
pub struct Lemmatizer {
    normalizers: Vec<Arc<dyn Normalizer>>,
    min_word_len: usize,
}

impl std::fmt::Debug for Lemmatizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lemmatizer")
            .field("scripts", &self.normalizers.iter().map(|n| n.script()).collect::<Vec<_>>())
            .field("min_word_len", &self.min_word_len)
            .finish()
    }
}

impl Lemmatizer {
    /// Russian and English normalizers
    pub fn new(min_word_len: usize) -> Self {
        Self::with_normalizers(
            min_word_len,
            vec![
                Arc::new(SnowballNormalizer::russian()),
                Arc::new(SnowballNormalizer::english()),
            ],
        )
    }

    pub fn with_normalizers(min_word_len: usize, normalizers: Vec<Arc<dyn Normalizer>>) -> Self {
        Self {
            normalizers,
            min_word_len,
        }
    }

    pub fn from_config(config: &TextConfig) -> Self {
        Self::new(config.min_word_len)
    }

    fn normalizer_for(&self, script: Script) -> Option<&dyn Normalizer> {
        self.normalizers
            .iter()
            .find(|n| n.script() == script)
            .map(|n| n.as_ref())
    }

    /// Lowercase words long enough to be indexed, in text order
    pub fn tokens<'a>(&'a self, text: &'a str) -> impl Iterator<Item = String> + 'a {
        text.unicode_words()
            .flat_map(|word| word.split(|c: char| !c.is_alphabetic()))
            .filter(|piece| !piece.is_empty())
            .map(str::to_lowercase)
            .filter(move |token| token.chars().count() >= self.min_word_len)
    }

    /// Base forms of one lowercase token, deduplicated
    fn base_forms(&self, token: &str) -> Vec<String> {
        let Some(script) = Script::detect(token) else {
            return Vec::new();
        };
        let Some(normalizer) = self.normalizer_for(script) else {
            return Vec::new();
        };

        let mut seen = HashSet::new();
        normalizer
            .normalize(token)
            .into_iter()
            .filter(|form| !form.is_empty() && seen.insert(form.clone()))
            .collect()
    }

    /// Count base-form occurrences in one document
    pub fn lemmatize(&self, text: &str) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for token in self.tokens(text) {
            for form in self.base_forms(&token) {
                *counts.entry(form).or_insert(0) += 1;
            }
        }
        counts
    }

    /// Distinct base forms of a query, in order of first appearance
    pub fn lemmas(&self, query: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut lemmas = Vec::new();
        for token in self.tokens(query) {
            for form in self.base_forms(&token) {
                if seen.insert(form.clone()) {
                    lemmas.push(form);
                }
            }
        }
        lemmas
    }
}

impl Default for Lemmatizer {
    fn default() -> Self {
        Self::from_config(&TextConfig::default())
    }
}
