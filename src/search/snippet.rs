//! Snippet generation around query matches

use crate::config::SearchConfig;

/// Snippet returned when no query lemma occurs in the page
pub const NO_MATCH_SNIPPET: &str = "...No matches found...";

const ELLIPSIS: &str = "...";

/// Snippet window parameters
#[derive(Debug, Clone, Copy)]
pub struct SnippetOptions {
    /// Window length in characters
    pub window: usize,
    /// Characters kept before the match that opens a window
    pub lead: usize,
    /// Maximum number of windows
    pub max_fragments: usize,
}

impl From<&SearchConfig> for SnippetOptions {
    fn from(config: &SearchConfig) -> Self {
        Self {
            window: config.snippet_window,
            lead: config.snippet_lead,
            max_fragments: config.max_snippet_fragments,
        }
    }
}

impl Default for SnippetOptions {
    fn default() -> Self {
        Self::from(&SearchConfig::default())
    }
}

/// Half-open char range of one match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Match {
    start: usize,
    end: usize,
}

/// Every case-insensitive occurrence of any lemma, sorted by start then longest first
fn find_matches(lower: &[char], lemmas: &[String]) -> Vec<Match> {
    let mut matches = Vec::new();

    for lemma in lemmas {
        let needle: Vec<char> = lemma.chars().flat_map(char::to_lowercase).collect();
        if needle.is_empty() || needle.len() > lower.len() {
            continue;
        }
        for start in 0..=lower.len() - needle.len() {
            if lower[start..start + needle.len()] == needle[..] {
                matches.push(Match {
                    start,
                    end: start + needle.len(),
                });
            }
        }
    }

    matches.sort_by(|a, b| a.start.cmp(&b.start).then(b.end.cmp(&a.end)));
    matches
}

/// Render one window with every match fully inside it emphasized
fn render_window(chars: &[char], start: usize, end: usize, matches: &[Match]) -> String {
    let mut out = String::new();
    let mut cursor = start;

    for m in matches.iter().filter(|m| m.start >= start && m.end <= end) {
        if m.start < cursor {
            continue;
        }
        out.extend(&chars[cursor..m.start]);
        out.push_str("<b>");
        out.extend(&chars[m.start..m.end]);
        out.push_str("</b>");
        cursor = m.end;
    }
    out.extend(&chars[cursor..end]);
    out
}

/// Build a snippet of up to `max_fragments` non-overlapping windows from `text`
pub fn generate_snippet(text: &str, lemmas: &[String], options: &SnippetOptions) -> String {
    let chars: Vec<char> = text.chars().collect();
    // One lowercase char per source char keeps positions aligned
    let lower: Vec<char> = chars
        .iter()
        .map(|c| c.to_lowercase().next().unwrap_or(*c))
        .collect();

    let matches = find_matches(&lower, lemmas);
    if matches.is_empty() || options.window == 0 {
        return NO_MATCH_SNIPPET.to_string();
    }

    let mut windows: Vec<(usize, usize)> = Vec::new();
    for m in &matches {
        if windows.len() >= options.max_fragments.max(1) {
            break;
        }
        let previous_end = windows.last().map(|w| w.1).unwrap_or(0);
        if m.start < previous_end {
            continue;
        }
        let start = m.start.saturating_sub(options.lead).max(previous_end);
        let end = (start + options.window).min(chars.len());
        windows.push((start, end));
    }

    let fragments: Vec<String> = windows
        .iter()
        .map(|&(start, end)| render_window(&chars, start, end, &matches))
        .map(|fragment| fragment.trim().to_string())
        .collect();

    format!("{}{}{}", ELLIPSIS, fragments.join(ELLIPSIS), ELLIPSIS)
}
