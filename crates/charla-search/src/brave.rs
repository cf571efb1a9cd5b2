//! Direct-API search variant backed by the Brave Search API.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde::Deserialize;
use tracing::{debug, warn};

use charla_core::types::SearchResult;

use crate::SearchProvider;

const API_URL: &str = "https://api.search.brave.com/res/v1/web/search";
const PROVIDER_NAME: &str = "Brave Search";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

// Response shape per the Brave web-search API: {web: {results: [...]}}.
#[derive(Debug, Deserialize)]
struct BraveResponse {
    #[serde(default)]
    web: BraveWeb,
}

#[derive(Debug, Default, Deserialize)]
struct BraveWeb {
    #[serde(default)]
    results: Vec<BraveItem>,
}

#[derive(Debug, Deserialize)]
struct BraveItem {
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    url: String,
}

/// Authenticated GET against the Brave web-search endpoint.
///
/// Missing credential, non-2xx status, transport error, or parse failure all
/// degrade to an empty result list.
pub struct BraveSearch {
    client: reqwest::Client,
    api_key: String,
    max_results: usize,
    locale: String,
}

impl BraveSearch {
    pub fn new(api_key: String, max_results: usize, locale: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            max_results,
            locale,
        }
    }

    fn map_items(&self, items: Vec<BraveItem>) -> Vec<SearchResult> {
        let now = Utc::now();
        items
            .into_iter()
            .take(self.max_results)
            .filter(|item| !item.url.is_empty())
            .map(|item| SearchResult {
                title: item.title,
                snippet: item.description.clone(),
                url: item.url,
                content: item.description,
                provider: PROVIDER_NAME.to_string(),
                timestamp: now,
            })
            .collect()
    }
}

#[async_trait]
impl SearchProvider for BraveSearch {
    async fn search(&self, query: &str) -> Vec<SearchResult> {
        if self.api_key.trim().is_empty() {
            warn!("Brave search skipped: no subscription token configured");
            return vec![];
        }

        let response = self
            .client
            .get(API_URL)
            .header("X-Subscription-Token", &self.api_key)
            .query(&[
                ("q", query),
                ("count", &self.max_results.to_string()),
                ("offset", "0"),
                // Brave's wire name for the configured search locale.
                ("search_lang", &self.locale),
            ])
            .timeout(REQUEST_TIMEOUT)
            .send()
            .await;

        let response = match response {
            Ok(r) => r,
            Err(e) => {
                warn!(error = %e, "Brave search request failed");
                return vec![];
            }
        };

        if !response.status().is_success() {
            warn!(status = %response.status(), "Brave search returned non-2xx");
            return vec![];
        }

        match response.json::<BraveResponse>().await {
            Ok(body) => {
                let results = self.map_items(body.web.results);
                debug!(count = results.len(), "Brave search completed");
                results
            }
            Err(e) => {
                warn!(error = %e, "Brave search response unparseable");
                vec![]
            }
        }
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}
