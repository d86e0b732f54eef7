//! HTML parsing and text extraction

use super::{normalize_whitespace, ParsedDocument, PseudoLink};
use regex::Regex;
use once_cell::sync::Lazy;
use scraper::{Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

/// Elements whose text is never shown to a reader
const HIDDEN_ELEMENTS: &[&str] = &["script", "style", "noscript", "template"];

/// Elements that start a new line of text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "br", "dd", "div", "dl", "dt", "figcaption",
    "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header", "hr", "li", "main", "nav",
    "ol", "p", "pre", "section", "table", "td", "th", "title", "tr", "ul",
];

/// Document attachments stored as media pages
static ATTACHMENT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\.(pdf|docx|xlsx|zip|rar)$").expect("valid attachment pattern"));

/// Whether a URL points at a downloadable document attachment
pub fn is_attachment(url: &str) -> bool {
    let path = match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => url.split(['?', '#']).next().unwrap_or("").to_string(),
    };
    ATTACHMENT_RE.is_match(&path)
}

fn has_scheme(href: &str, scheme: &str) -> bool {
    href.get(..scheme.len())
        .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
}

/// Parse HTML content and extract title, visible text, links and assets
pub fn parse_html(content: &str, base_url: Option<&str>) -> ParsedDocument {
    let document = Html::parse_document(content);
    let base = base_url.and_then(|u| Url::parse(u).ok());
    let mut doc = ParsedDocument::default();

    // Extract title
    if let Ok(selector) = Selector::parse("title") {
        if let Some(title_elem) = document.select(&selector).next() {
            let title = normalize_whitespace(&title_elem.text().collect::<String>());
            if !title.is_empty() {
                doc.title = Some(title);
            }
        }
    }

    doc.text = extract_text(&document);

    let resolve = |raw: &str| -> Option<String> {
        let resolved = match base {
            Some(ref base) => base.join(raw).ok()?,
            None => Url::parse(raw).ok()?,
        };
        matches!(resolved.scheme(), "http" | "https").then(|| resolved.to_string())
    };

    // Extract links
    if let Ok(selector) = Selector::parse("a[href]") {
        let mut seen_files = HashSet::new();

        for elem in document.select(&selector) {
            let Some(href) = elem.value().attr("href") else {
                continue;
            };
            let href = href.trim();

            if has_scheme(href, "tel:") {
                doc.pseudo_links.push(PseudoLink::Phone(href[4..].trim().to_string()));
                continue;
            }
            if has_scheme(href, "javascript:") {
                doc.pseudo_links.push(PseudoLink::JavaScript(href.to_string()));
                continue;
            }

            if let Some(url) = resolve(href) {
                if is_attachment(&url) && seen_files.insert(url.clone()) {
                    doc.files.push(url.clone());
                }
                doc.links.push(url);
            }
        }
    }

    // Extract images
    if let Ok(selector) = Selector::parse("img[src]") {
        let mut seen = HashSet::new();
        for elem in document.select(&selector) {
            if let Some(url) = elem.value().attr("src").and_then(|s| resolve(s.trim())) {
                if seen.insert(url.clone()) {
                    doc.images.push(url);
                }
            }
        }
    }

    doc
}

/// Collect visible text in document order
fn extract_text(document: &Html) -> String {
    let mut out = String::new();

    for node in document.tree.root().descendants() {
        match node.value() {
            Node::Element(elem) if BLOCK_ELEMENTS.contains(&elem.name()) => out.push('\n'),
            Node::Text(text) => {
                let hidden = node.ancestors().any(|ancestor| {
                    ancestor
                        .value()
                        .as_element()
                        .is_some_and(|e| HIDDEN_ELEMENTS.contains(&e.name()))
                });
                if !hidden {
                    out.push_str(text);
                }
            }
            _ => {}
        }
    }

    normalize_whitespace(&out)
}

/// Extract just the text content from HTML
pub fn extract_text_from_html(content: &str) -> String {
    extract_text(&Html::parse_document(content))
}
