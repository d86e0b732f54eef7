//! Per-language base-form normalizers

use rust_stemmers::{Algorithm, Stemmer};

/// Writing system of a token
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Script {
    Cyrillic,
    Latin,
}

impl Script {
    /// Classify a lowercase token; tokens mixing scripts or containing
    /// other characters have no script.
    pub fn detect(word: &str) -> Option<Self> {
        if word.is_empty() {
            return None;
        }
        if word.chars().all(|c| matches!(c, 'а'..='я' | 'ё')) {
            Some(Script::Cyrillic)
        } else if word.chars().all(|c| c.is_ascii_lowercase()) {
            Some(Script::Latin)
        } else {
            None
        }
    }
}

/// Maps a surface word to its dictionary base form(s)
pub trait Normalizer: Send + Sync {
    /// Script this normalizer handles
    fn script(&self) -> Script;

    /// Base forms of a lowercase word of this normalizer's script
    fn normalize(&self, word: &str) -> Vec<String>;
}

/// Snowball stemmer standing in for a morphological dictionary
pub struct SnowballNormalizer {
    script: Script,
    stemmer: Stemmer,
}

impl SnowballNormalizer {
    pub fn russian() -> Self {
        Self {
            script: Script::Cyrillic,
            stemmer: Stemmer::create(Algorithm::Russian),
        }
    }

    pub fn english() -> Self {
        Self {
            script: Script::Latin,
            stemmer: Stemmer::create(Algorithm::English),
        }
    }
}

impl std::fmt::Debug for SnowballNormalizer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnowballNormalizer")
            .field("script", &self.script)
            .finish()
    }
}

impl Normalizer for SnowballNormalizer {
    fn script(&self) -> Script {
        self.script
    }

    fn normalize(&self, word: &str) -> Vec<String> {
        let word = match self.script {
            Script::Cyrillic => word.replace('ё', "е"),
            Script::Latin => word.to_string(),
        };
        let stem = self.stemmer.stem(&word);
        if stem.is_empty() {
            Vec::new()
        } else {
            vec![stem.into_owned()]
        }
    }
}
