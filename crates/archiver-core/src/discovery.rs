//! Resource discovery over a remote directory listing.
//!
//! Markup parsing stays behind [`DirectoryListing`]; this module only walks
//! what a listing returns: it descends into subdirectories, drops navigation
//! links and applies the extension filter. The walk is lazy and stateful;
//! construct a new [`Discovery`] to start over.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;

use crate::config::ArchiverConfig;

/// One link row of a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingEntry {
    /// Link target as written in the page, usually relative (`file.mp4`, `sub/`).
    pub href: String,
    /// Size column, if the page shows one.
    pub size_hint_bytes: Option<u64>,
}

/// Source of listing pages.
#[async_trait]
pub trait DirectoryListing: Send + Sync {
    async fn list(&self, url: &str) -> Result<Vec<ListingEntry>>;
}

/// Filename suffix filter. The deny-list always wins; no allow-list accepts everything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtensionFilter {
    allowed: Option<Vec<String>>,
    excluded: Vec<String>,
}

impl ExtensionFilter {
    pub fn new(allowed: Option<Vec<String>>, excluded: Vec<String>) -> Self {
        let normalize = |list: Vec<String>| -> Vec<String> {
            list.into_iter()
                .map(|s| s.trim().to_ascii_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            allowed: allowed.map(normalize).filter(|l| !l.is_empty()),
            excluded: normalize(excluded),
        }
    }

    pub fn from_config(cfg: &ArchiverConfig) -> Self {
        Self::new(cfg.allowed_extensions.clone(), cfg.excluded_extensions.clone())
    }

    /// Split a comma-separated list (`"mp4, mkv"`).
    pub fn parse_csv(list: &str) -> Vec<String> {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    /// Whether `name` ends with an allowed suffix and no excluded one (case-insensitive).
    pub fn accepts(&self, name: &str) -> bool {
        let name = name.to_ascii_lowercase();
        if self.excluded.iter().any(|ext| name.ends_with(ext.as_str())) {
            return false;
        }
        match &self.allowed {
            None => true,
            Some(allowed) => allowed.iter().any(|ext| name.ends_with(ext.as_str())),
        }
    }
}

/// A downloadable file found by [`Discovery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredResource {
    pub url: String,
    /// URL path, still percent-encoded (`/download/<key>/sub/a%20b.mp4`).
    pub filename: String,
    pub approximate_size_bytes: Option<u64>,
}

/// Navigation links every listing carries (parent dir, item page, sort links).
fn is_navigation(href: &str) -> bool {
    href.is_empty()
        || href.starts_with('.')
        || href.starts_with("/details/")
        || href.starts_with('/')
        || href.starts_with('?')
        || href.starts_with('#')
}

struct Page {
    url: url::Url,
    entries: VecDeque<ListingEntry>,
}

/// Lazy depth-first walk of a listing tree, in page order.
pub struct Discovery {
    listing: Arc<dyn DirectoryListing>,
    filter: ExtensionFilter,
    root: String,
    started: bool,
    stack: Vec<Page>,
    visited: HashSet<String>,
}

impl Discovery {
    pub fn new(listing: Arc<dyn DirectoryListing>, root_url: impl Into<String>, filter: ExtensionFilter) -> Self {
        Self {
            listing,
            filter,
            root: root_url.into(),
            started: false,
            stack: Vec::new(),
            visited: HashSet::new(),
        }
    }

    async fn open(&mut self, page: url::Url) -> Result<()> {
        if !self.visited.insert(page.to_string()) {
            return Ok(());
        }
        let entries = self
            .listing
            .list(page.as_str())
            .await
            .with_context(|| format!("list {}", page))?;
        tracing::debug!(url = %page, entries = entries.len(), "listing page");
        self.stack.push(Page {
            url: page,
            entries: entries.into(),
        });
        Ok(())
    }

    /// Next accepted resource, `Some(Err)` for a page that could not be listed
    /// (the walk continues after it), `None` when the tree is exhausted.
    pub async fn next(&mut self) -> Option<Result<DiscoveredResource>> {
        if !self.started {
            self.started = true;
            let root = match url::Url::parse(&self.root) {
                Ok(u) => u,
                Err(e) => return Some(Err(anyhow::anyhow!("bad listing url {}: {}", self.root, e))),
            };
            if let Err(e) = self.open(root).await {
                return Some(Err(e));
            }
        }

        loop {
            let page = self.stack.last_mut()?;
            let Some(entry) = page.entries.pop_front() else {
                self.stack.pop();
                continue;
            };
            if is_navigation(&entry.href) {
                continue;
            }
            let target = match page.url.join(&entry.href) {
                Ok(u) => u,
                Err(e) => {
                    tracing::warn!(page = %page.url, href = %entry.href, error = %e, "skipping bad link");
                    continue;
                }
            };
            // Only ever descend, never climb out of the listing root.
            if !target.as_str().starts_with(page.url.as_str()) {
                continue;
            }

            if entry.href.ends_with('/') {
                if let Err(e) = self.open(target).await {
                    return Some(Err(e));
                }
                continue;
            }

            let name = entry.href.rsplit('/').next().unwrap_or(&entry.href);
            let decoded = percent_encoding::percent_decode_str(name).decode_utf8_lossy();
            if !self.filter.accepts(&decoded) {
                continue;
            }
            return Some(Ok(DiscoveredResource {
                filename: target.path().to_string(),
                url: target.to_string(),
                approximate_size_bytes: entry.size_hint_bytes,
            }));
        }
    }

    /// Drain the walk. Pages that fail to list are logged and skipped.
    pub async fn collect_all(mut self) -> Vec<DiscoveredResource> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await {
            match item {
                Ok(resource) => out.push(resource),
                Err(e) => tracing::warn!(error = %format!("{:#}", e), "listing failed"),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    struct FakeListing {
        pages: HashMap<String, Vec<ListingEntry>>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeListing {
        fn new(pages: Vec<(&str, Vec<(&str, Option<u64>)>)>) -> Arc<Self> {
            let pages = pages
                .into_iter()
                .map(|(url, entries)| {
                    let entries = entries
                        .into_iter()
                        .map(|(href, size)| ListingEntry {
                            href: href.to_string(),
                            size_hint_bytes: size,
                        })
                        .collect();
                    (url.to_string(), entries)
                })
                .collect();
            Arc::new(Self {
                pages,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DirectoryListing for FakeListing {
        async fn list(&self, url: &str) -> Result<Vec<ListingEntry>> {
            self.calls.lock().unwrap().push(url.to_string());
            self.pages
                .get(url)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("HTTP 404"))
        }
    }

    const ROOT: &str = "https://archive.org/download/item/";

    #[test]
    fn filter_allow_and_deny() {
        let f = ExtensionFilter::new(
            Some(ExtensionFilter::parse_csv("ia.mp4, .MKV")),
            ExtensionFilter::parse_csv("bad.mkv"),
        );
        assert!(f.accepts("movie.ia.mp4"));
        assert!(f.accepts("movie.mkv"));
        assert!(!f.accepts("movie.mp4"));
        assert!(!f.accepts("very.bad.mkv"));
    }

    #[test]
    fn filter_without_allow_list_accepts_all_but_denied() {
        let f = ExtensionFilter::new(None, vec!["xml".to_string()]);
        assert!(f.accepts("a.mp4"));
        assert!(!f.accepts("item_meta.xml"));
        assert!(ExtensionFilter::default().accepts("anything"));
    }

    #[test]
    fn parse_csv_trims_and_drops_empty() {
        assert_eq!(
            ExtensionFilter::parse_csv(" mp4 ,, mkv,"),
            vec!["mp4".to_string(), "mkv".to_string()]
        );
    }

    #[tokio::test]
    async fn walks_subdirectories_in_order() {
        let listing = FakeListing::new(vec![
            (
                ROOT,
                vec![
                    ("../", None),
                    ("/details/item", None),
                    ("a.mp4", Some(100)),
                    ("Disc%201/", None),
                    ("z.mp4", None),
                ],
            ),
            (
                "https://archive.org/download/item/Disc%201/",
                vec![("../", None), ("b%20c.mp4", Some(7))],
            ),
        ]);
        let found = Discovery::new(listing.clone(), ROOT, ExtensionFilter::default())
            .collect_all()
            .await;
        let names: Vec<_> = found.iter().map(|r| r.filename.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "/download/item/a.mp4",
                "/download/item/Disc%201/b%20c.mp4",
                "/download/item/z.mp4",
            ]
        );
        assert_eq!(found[1].url, "https://archive.org/download/item/Disc%201/b%20c.mp4");
        assert_eq!(found[1].approximate_size_bytes, Some(7));
        assert_eq!(listing.calls.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn applies_filter_to_decoded_names() {
        let listing = FakeListing::new(vec![(
            ROOT,
            vec![("a.ia.mp4", None), ("a.mp4", None), ("notes.txt", None)],
        )]);
        let filter = ExtensionFilter::new(Some(vec!["ia.mp4".to_string()]), Vec::new());
        let found = Discovery::new(listing, ROOT, filter).collect_all().await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].filename, "/download/item/a.ia.mp4");
    }

    #[tokio::test]
    async fn failed_subpage_is_reported_and_walk_continues() {
        let listing = FakeListing::new(vec![(ROOT, vec![("missing/", None), ("a.mp4", None)])]);
        let mut walk = Discovery::new(listing, ROOT, ExtensionFilter::default());
        assert!(walk.next().await.unwrap().is_err());
        assert_eq!(walk.next().await.unwrap().unwrap().filename, "/download/item/a.mp4");
        assert!(walk.next().await.is_none());
    }

    #[tokio::test]
    async fn failed_root_yields_one_error() {
        let listing = FakeListing::new(Vec::new());
        let mut walk = Discovery::new(listing, ROOT, ExtensionFilter::default());
        assert!(walk.next().await.unwrap().is_err());
        assert!(walk.next().await.is_none());
    }
}
