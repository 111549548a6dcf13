//! Internet Archive directory listing scraper.
//!
//! Fetches `/download/<key>/...` pages with curl and pulls the rows out of
//! `table.directory-listing-table` with regexes. Only the first link of each
//! row and the size column are used.

use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use archiver_core::discovery::{DirectoryListing, ListingEntry};
use archiver_core::http::RequestHeaders;
use async_trait::async_trait;
use regex::Regex;

const TABLE_CLASS: &str = "directory-listing-table";

struct Patterns {
    row: Regex,
    cell: Regex,
    href: Regex,
    tag: Regex,
    size: Regex,
}

fn patterns() -> &'static Patterns {
    static PATTERNS: OnceLock<Patterns> = OnceLock::new();
    PATTERNS.get_or_init(|| Patterns {
        row: Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").unwrap(),
        cell: Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").unwrap(),
        href: Regex::new(r#"(?is)<a\b[^>]*?\bhref\s*=\s*["']([^"']*)["']"#).unwrap(),
        tag: Regex::new(r"(?s)<[^>]*>").unwrap(),
        size: Regex::new(r"(?i)^([0-9]+(?:\.[0-9]+)?)\s*([KMGT]i?B?|B)?$").unwrap(),
    })
}

fn unescape_html(s: &str) -> String {
    s.replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}

/// Parse the size column (`12.3M`, `700 KiB`, `1.2G`, `-`). A bare number is MiB.
pub(crate) fn parse_size(text: &str) -> Option<u64> {
    let caps = patterns().size.captures(text.trim())?;
    let value: f64 = caps.get(1)?.as_str().parse().ok()?;
    let unit = caps
        .get(2)
        .map(|m| m.as_str().to_ascii_uppercase())
        .unwrap_or_else(|| "M".to_string());
    let multiplier: f64 = match unit.chars().next() {
        Some('K') => 1024.0,
        Some('M') => 1024.0 * 1024.0,
        Some('G') => 1024.0 * 1024.0 * 1024.0,
        Some('T') => 1024.0 * 1024.0 * 1024.0 * 1024.0,
        _ => 1.0,
    };
    Some((value * multiplier).round() as u64)
}

/// Extract listing rows from a page. Pages without the listing table yield nothing.
pub(crate) fn parse_listing(html: &str) -> Vec<ListingEntry> {
    let Some(table_at) = html.find(TABLE_CLASS) else {
        return Vec::new();
    };
    let table = &html[table_at..];
    let table = table
        .find("</table>")
        .map(|end| &table[..end])
        .unwrap_or(table);
    // Header rows use <th>, so they have no <td> and drop out below.
    let p = patterns();
    let mut out = Vec::new();
    for row in p.row.captures_iter(table) {
        let cells: Vec<&str> = p
            .cell
            .captures_iter(&row[1])
            .filter_map(|c| c.get(1).map(|m| m.as_str()))
            .collect();
        let Some(first) = cells.first() else {
            continue;
        };
        let Some(href) = p.href.captures(first).and_then(|c| c.get(1)) else {
            continue;
        };
        let size_hint_bytes = cells.get(2).and_then(|cell| {
            let text = p.tag.replace_all(cell, "");
            parse_size(&unescape_html(&text))
        });
        out.push(ListingEntry {
            href: unescape_html(href.as_str().trim()),
            size_hint_bytes,
        });
    }
    out
}

/// Blocking GET of a listing page; follows redirects (item pages move between hosts).
fn fetch_page(url: &str, headers: &RequestHeaders) -> Result<String> {
    let mut body = Vec::new();
    let mut easy = curl::easy::Easy::new();
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(10)?;
    easy.connect_timeout(Duration::from_secs(30))?;
    easy.timeout(Duration::from_secs(120))?;
    easy.http_headers(headers.curl_list(None)?)?;
    {
        let mut transfer = easy.transfer();
        transfer.write_function(|data| {
            body.extend_from_slice(data);
            Ok(data.len())
        })?;
        transfer.perform()?;
    }
    let code = easy.response_code()?;
    if !(200..300).contains(&code) {
        anyhow::bail!("HTTP {}", code);
    }
    Ok(String::from_utf8_lossy(&body).into_owned())
}

/// [`DirectoryListing`] over archive.org `/download/` pages.
#[derive(Debug, Clone)]
pub struct ArchiveOrgListing {
    headers: RequestHeaders,
}

impl ArchiveOrgListing {
    pub fn new(headers: RequestHeaders) -> Self {
        Self { headers }
    }
}

#[async_trait]
impl DirectoryListing for ArchiveOrgListing {
    async fn list(&self, url: &str) -> Result<Vec<ListingEntry>> {
        let page_url = url.to_string();
        let headers = self.headers.clone();
        let html = tokio::task::spawn_blocking(move || fetch_page(&page_url, &headers))
            .await
            .context("listing fetch task")?
            .with_context(|| format!("fetch listing {}", url))?;
        let entries = parse_listing(&html);
        tracing::debug!(url, entries = entries.len(), "parsed listing");
        Ok(entries)
    }
}
