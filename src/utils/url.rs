// src/utils/url.rs

//! Paper link normalization.

use regex::Regex;
use url::Url;

use crate::error::Result;

/// Extract an arXiv identifier from a link or a bare id.
///
/// # Examples
/// ```
/// use paperflow::utils::url::extract_arxiv_id;
///
/// assert_eq!(
///     extract_arxiv_id("https://arxiv.org/abs/2509.18083v2"),
///     Some("2509.18083v2".to_string())
/// );
/// ```
pub fn extract_arxiv_id(link: &str) -> Option<String> {
    let patterns = [
        Regex::new(r"arxiv\.org/(?:abs|pdf)/(\d{4}\.\d{4,5}(?:v\d+)?)").ok()?,
        Regex::new(r"(\d{4}\.\d{4,5}(?:v\d+)?)").ok()?,
    ];

    for pattern in &patterns {
        if let Some(caps) = pattern.captures(link) {
            if let Some(id) = caps.get(1) {
                return Some(id.as_str().to_string());
            }
        }
    }
    None
}

/// Resolve a paper link to the URL of its PDF.
///
/// Accepts `/arxiv/<id>`, `.../abs/<id>`, `.../pdf/<id>` and bare ids.
pub fn pdf_url(link: &str) -> String {
    let link = link.trim();
    if let Some(id) = link.strip_prefix("/arxiv/") {
        format!("https://arxiv.org/pdf/{id}")
    } else if link.contains("/abs/") {
        link.replacen("/abs/", "/pdf/", 1)
    } else if link.contains("/pdf/") {
        link.to_string()
    } else {
        format!("https://arxiv.org/pdf/{link}")
    }
}

/// URL to request from the reader proxy for a paper link.
pub fn reader_url(base: &str, link: &str) -> Result<String> {
    let target = Url::parse(&pdf_url(link))?;
    Ok(format!("{}/{}", base.trim_end_matches('/'), target))
}
