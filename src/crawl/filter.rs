//! URL cleaning and crawl filtering

use crate::config::SiteConfig;
use url::Url;

/// Query parameters that mark tracking or advertising links
const TRACKING_PARAMS: &[&str] = &["utm_", "clickid=", "gclid=", "fbclid=", "yclid=", "ref="];

/// Analytics and advertising hosts
const AD_DOMAINS: &[&str] = &[
    "doubleclick.net",
    "google-analytics.com",
    "googletagmanager.com",
    "googlesyndication.com",
    "mc.yandex.ru",
    "facebook.com/tr",
];

/// Shopping-flow paths that only mutate session state
const COMMERCE_PATHS: &[&str] = &["/basket", "/cart", "/checkout"];

/// Strip fragment and query string
pub fn clean_url(url: &str) -> String {
    match Url::parse(url) {
        Ok(mut parsed) => {
            parsed.set_fragment(None);
            parsed.set_query(None);
            parsed.to_string()
        }
        Err(_) => url.split(['#', '?']).next().unwrap_or(url).to_string(),
    }
}

/// Whether a discovered link must not be crawled for this site
pub fn should_skip(url: &str, site: &SiteConfig) -> bool {
    let lower = url.to_lowercase();

    if !lower.starts_with("http://") && !lower.starts_with("https://") {
        return true;
    }

    if !site.contains(url) {
        return true;
    }

    if let Some((_, query)) = lower.split_once('?') {
        let query = query.split('#').next().unwrap_or("");
        let tracked = query
            .split('&')
            .any(|param| TRACKING_PARAMS.iter().any(|p| param.starts_with(p)));
        if tracked {
            return true;
        }
    }

    if AD_DOMAINS.iter().any(|domain| lower.contains(domain)) {
        return true;
    }

    let path = Url::parse(url)
        .map(|u| u.path().to_lowercase())
        .unwrap_or_default();
    COMMERCE_PATHS.iter().any(|p| {
        path.strip_prefix(p)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('/'))
    })
}

/// Path of `url` relative to the site root; URLs outside the site keep their full form
pub fn relative_path(site: &SiteConfig, url: &str) -> String {
    let base = site.base_url();
    let rest = match url.get(..base.len()) {
        Some(prefix) if prefix.eq_ignore_ascii_case(base) && site.contains(url) => &url[base.len()..],
        _ => return url.to_string(),
    };

    if rest.is_empty() {
        "/".to_string()
    } else if rest.starts_with('/') {
        rest.to_string()
    } else {
        format!("/{}", rest)
    }
}
