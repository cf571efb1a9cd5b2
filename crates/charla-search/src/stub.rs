//! Offline stub variant: one clearly-labeled synthetic result, no I/O.

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use charla_core::types::SearchResult;

use crate::SearchProvider;

const PROVIDER_NAME: &str = "stub";

/// Used when no real search integration is configured. The `provider` field
/// and title make the synthetic nature unambiguous downstream.
pub struct StubSearch;

#[async_trait]
impl SearchProvider for StubSearch {
    async fn search(&self, query: &str) -> Vec<SearchResult> {
        debug!(query, "Stub search invoked");
        vec![SearchResult {
            title: "[simulated] No search provider configured".to_string(),
            snippet: format!(
                "This is a simulated result for \"{}\"; no web search was actually performed.",
                query
            ),
            url: String::new(),
            content: "Simulated placeholder produced by the stub provider.".to_string(),
            provider: PROVIDER_NAME.to_string(),
            timestamp: Utc::now(),
        }]
    }

    fn name(&self) -> &str {
        PROVIDER_NAME
    }
}
