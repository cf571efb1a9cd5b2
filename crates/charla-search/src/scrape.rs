//! Best-effort HTML-scraping search variant.
//!
//! Fetches a DuckDuckGo HTML results page through a CORS-bypassing proxy and
//! pulls titles/links/snippets out of the raw markup heuristically. The
//! markup is undocumented and changes silently; when extraction yields
//! nothing (or the fetch fails at all), a single fixed fallback result is
//! returned so the caller can still see that a search was attempted.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use regex::Regex;
use tracing::{debug, warn};

use charla_core::types::SearchResult;

use crate::SearchProvider;

const PROVIDER_NAME: &str = "DuckDuckGo (scrape)";
const FALLBACK_PROVIDER: &str = "scrape-fallback";
const SEARCH_URL: &str = "https://html.duckduckgo.com/html/?q=";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);
/// Anchor text shorter than this is navigation chrome, not a result title.
const MIN_TITLE_LEN: usize = 10;
/// Span text shorter than this is too small to be a useful snippet.
const MIN_SNIPPET_LEN: usize = 40;

struct MarkupPatterns {
    anchor: Regex,
    snippet: Regex,
    tag: Regex,
}

static MARKUP: LazyLock<MarkupPatterns> = LazyLock::new(|| MarkupPatterns {
    // href + inner text of result anchors; inner markup stripped afterwards.
    anchor: Regex::new(r#"<a[^>]+href="(https?://[^"]+)"[^>]*>(.{1,300}?)</a>"#)
        .expect("Invalid anchor regex"),
    snippet: Regex::new(r"<(?:span|div)[^>]*>([^<]{40,400})</(?:span|div)>")
        .expect("Invalid snippet regex"),
    tag: Regex::new(r"<[^>]+>").expect("Invalid tag regex"),
});

/// HTML-scrape search through a configured proxy prefix.
pub struct ScrapeSearch {
    client: reqwest::Client,
    proxy_url: String,
    max_results: usize,
}

impl ScrapeSearch {
    pub fn new(proxy_url: String, max_results: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            proxy_url,
            max_results,
        }
    }

    /// Heuristic extraction over raw search-engine markup.
    ///
    /// Pairs qualifying anchors (absolute http(s) href not on the engine's own
    /// domain, stripped text over the minimum length) with snippet-sized text
    /// blocks in document order. Returns an empty list when nothing qualifies.
    pub fn extract_results(&self, html: &str) -> Vec<SearchResult> {
        let now = Utc::now();
        let snippets: Vec<String> = MARKUP
            .snippet
            .captures_iter(html)
            .filter_map(|c| c.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| s.len() >= MIN_SNIPPET_LEN)
            .collect();

        let mut results = Vec::new();
        for caps in MARKUP.anchor.captures_iter(html) {
            let (Some(href), Some(inner)) = (caps.get(1), caps.get(2)) else {
                continue;
            };
            let url = href.as_str().to_string();
            if url.contains("duckduckgo.com") {
                continue;
            }
            let title = MARKUP.tag.replace_all(inner.as_str(), "").trim().to_string();
            if title.len() < MIN_TITLE_LEN {
                continue;
            }
            let snippet = snippets
                .get(results.len())
                .cloned()
                .unwrap_or_else(|| title.clone());
            results.push(SearchResult {
                title,
                snippet: snippet.clone(),
                url,
                content: snippet,
                provider: PROVIDER_NAME.to_string(),
                timestamp: now,
            });
            if results.len() >= self.max_results {
                break;
            }
        }
        results
    }

    /// Fixed placeholder shown when scraping produced nothing usable.
    fn fallback_result(&self, query: &str) -> SearchResult {
        SearchResult {
            title: "Web search attempted, no readable results".to_string(),
            snippet: format!(
                "A web search for \"{}\" was attempted but no results could be extracted.",
                query
            ),
            url: String::new(),
            content: "The search-engine markup could not be parsed; treat this \
                      as a failed search, not as information about the query."
                .to_string(),
            provider: FALLBACK_PROVIDER.to_string(),
            timestamp: Utc::now(),
        }
    }
}

#[async_trait]
impl SearchProvider for ScrapeSearch {
    async fn search(&self, query: &str) -> Vec<SearchResult> {
        let target = format!("{}{}", SEARCH_URL, urlencoding::encode(query));
        let url = format!("{}{}", self.proxy_url, urlencoding::encode(&target));

        let html = match self
            .client
            .get(&url)
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await
        {
            Ok(r) if r.status().is_success() => match r.text().await {
                Ok(body) => body,
                Err(e) => {
                    warn!(error = %e, "Scrape search body unreadable");
                    return vec![self.fallback_result(query)];
                }
            },
            Ok(r) => {
                warn!(status = %r.status(), "Scrape search returned non-2xx");
                return vec![self.fallback_result(query)];
            }
            Err(e) => {
                warn!(error = %e, "Scrape search request failed");
                return vec![self.fallback_result(query)];
            }
        };

        let results = self.extract_results(&html);
        if results.is_empty() {
            debug!("Scrape search extracted nothing; returning labeled fallback");
            return vec![self.fallback_result(query)];
        }
        debug!(count = results.len(), "Scrape search completed");
        results
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}
