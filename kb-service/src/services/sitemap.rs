//! Candidate URLs offered to the router.

use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

static RE_LOC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<loc>\s*(.*?)\s*</loc>").unwrap());

/// Extract the `<loc>` values of a sitemap document, in order.
/// Empty entries are dropped.
pub fn parse_sitemap(xml: &str) -> Vec<String> {
    RE_LOC
        .captures_iter(xml)
        .filter_map(|c| c.get(1))
        .map(|m| unescape(m.as_str()))
        .filter(|url| !url.is_empty())
        .collect()
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

enum Source {
    File(PathBuf),
    Static(Vec<String>),
}

/// Reads the sitemap on every call so edits take effect without a restart.
pub struct SitemapLoader {
    source: Source,
    timeout: Duration,
}

impl SitemapLoader {
    pub fn from_file(path: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            source: Source::File(path.into()),
            timeout,
        }
    }

    pub fn from_urls(urls: Vec<String>) -> Self {
        Self {
            source: Source::Static(urls),
            timeout: Duration::from_secs(30),
        }
    }

    /// Candidate URLs. A missing or unreadable sitemap yields an empty list.
    pub async fn load(&self) -> Vec<String> {
        let path = match &self.source {
            Source::Static(urls) => return urls.clone(),
            Source::File(path) => path,
        };

        match tokio::time::timeout(self.timeout, tokio::fs::read_to_string(path)).await {
            Ok(Ok(xml)) => {
                let urls = parse_sitemap(&xml);
                tracing::debug!(path = %path.display(), count = urls.len(), "Loaded sitemap");
                urls
            }
            Ok(Err(e)) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to read sitemap");
                Vec::new()
            }
            Err(_) => {
                tracing::warn!(path = %path.display(), "Timed out reading sitemap");
                Vec::new()
            }
        }
    }
}
