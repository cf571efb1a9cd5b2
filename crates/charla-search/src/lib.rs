//! Web-search providers for the Charla pipeline.
//!
//! Three variants behind one trait: a direct paid API (Brave), a best-effort
//! HTML scraper, and an offline stub. All variants degrade internally and
//! never surface an error to the caller; the worst outcome is an empty list
//! or a clearly labeled fallback result.

use std::sync::Arc;

use async_trait::async_trait;

use charla_core::config::SearchConfig;
use charla_core::config::SearchProviderKind;
use charla_core::types::SearchResult;

pub mod brave;
pub mod scrape;
pub mod stub;

pub use brave::BraveSearch;
pub use scrape::ScrapeSearch;
pub use stub::StubSearch;

/// A web-search provider.
///
/// Returns plain vectors rather than `Result`: the never-throws contract is
/// structural. Implementations catch their own failures, log them, and
/// return `[]` or a labeled fallback.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Execute a search. Never fails; may return an empty list.
    async fn search(&self, query: &str) -> Vec<SearchResult>;

    /// Display name embedded in prompts and result provenance.
    fn name(&self) -> &str;
}

/// Construct the provider selected by the configuration.
///
/// New variants register here against the closed [`SearchProviderKind`] enum;
/// callers never dispatch on provider strings.
pub fn build_provider(config: &SearchConfig) -> Arc<dyn SearchProvider> {
    match config.provider {
        SearchProviderKind::Brave => Arc::new(BraveSearch::new(
            config.api_key.clone(),
            config.max_results,
            config.locale.clone(),
        )),
        SearchProviderKind::Scrape => Arc::new(ScrapeSearch::new(
            config.proxy_url.clone(),
            config.max_results,
        )),
        SearchProviderKind::Stub => Arc::new(StubSearch),
    }
}
