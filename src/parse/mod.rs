//! Fetched content classification and HTML extraction
//!
//! This module handles:
//! - Content type detection from response headers and URL paths
//! - HTML text, title, link and asset extraction
//! - Whitespace normalization

mod html;

pub use html::*;

/// Kinds of fetched content the crawler distinguishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentType {
    Html,
    Image,
    Binary,
    Other,
}

impl ContentType {
    /// Detect content type from MIME type
    pub fn from_mime(mime: &str) -> Self {
        let mime_lower = mime.to_lowercase();
        let essence = mime_lower.split(';').next().unwrap_or("").trim();

        if essence == "text/html" || essence == "application/xhtml+xml" {
            ContentType::Html
        } else if essence.starts_with("image/") {
            ContentType::Image
        } else if essence.starts_with("application/")
            || essence.starts_with("audio/")
            || essence.starts_with("video/")
            || essence.starts_with("font/")
        {
            ContentType::Binary
        } else {
            ContentType::Other
        }
    }

    /// Guess content type from a URL path's extension
    pub fn from_path(path: &str) -> Self {
        match mime_guess::from_path(path).first() {
            Some(mime) => Self::from_mime(mime.essence_str()),
            None => ContentType::Other,
        }
    }

    /// Detect from the response header, falling back to the URL path
    pub fn detect(mime: Option<&str>, path: &str) -> Self {
        // Header takes precedence
        if let Some(m) = mime {
            let detected = Self::from_mime(m);
            if detected != ContentType::Other {
                return detected;
            }
        }

        Self::from_path(path)
    }
}

/// A non-fetchable pseudo-link found on a page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PseudoLink {
    /// `tel:` link, carrying the number
    Phone(String),
    /// `javascript:` link, carrying the full href
    JavaScript(String),
}

impl PseudoLink {
    /// Path under which the placeholder page is stored
    pub fn path(&self) -> &str {
        match self {
            PseudoLink::Phone(number) => number,
            PseudoLink::JavaScript(href) => href,
        }
    }

    /// Placeholder content stored for the link
    pub fn marker(&self) -> String {
        match self {
            PseudoLink::Phone(number) => format!("Phone link: {}", number),
            PseudoLink::JavaScript(href) => format!("JavaScript link: {}", href),
        }
    }
}

/// Parsed HTML document
#[derive(Debug, Clone, Default)]
pub struct ParsedDocument {
    /// Extracted title (if found)
    pub title: Option<String>,

    /// Visible text content
    pub text: String,

    /// Absolute URLs of `a[href]` links, in document order
    pub links: Vec<String>,

    /// Absolute URLs of `img[src]` images
    pub images: Vec<String>,

    /// Absolute URLs of linked document attachments
    pub files: Vec<String>,

    /// `tel:` and `javascript:` links
    pub pseudo_links: Vec<PseudoLink>,
}

/// Marker stored for an image resource
pub fn image_marker(url: &str) -> String {
    format!("IMAGE: {}", url)
}

/// Marker stored for a binary or attachment resource
pub fn file_marker(url: &str) -> String {
    format!("FILE: {}", url)
}

/// Marker stored for a resource of an unknown type
pub fn unhandled_marker(content_type: &str) -> String {
    format!("Unhandled content type: {}", content_type)
}

/// Normalize whitespace in text
pub fn normalize_whitespace(text: &str) -> String {
    let mut result = String::with_capacity(text.len());
    let mut last_was_whitespace = true;
    let mut newline_count = 0;

    for c in text.chars() {
        if c.is_whitespace() {
            if c == '\n' {
                newline_count += 1;
            }
            last_was_whitespace = true;
        } else {
            if last_was_whitespace && !result.is_empty() {
                if newline_count >= 2 {
                    result.push_str("\n\n");
                } else if newline_count == 1 {
                    result.push('\n');
                } else {
                    result.push(' ');
                }
            }
            newline_count = 0;
            result.push(c);
            last_was_whitespace = false;
        }
    }

    result.trim().to_string()
}
