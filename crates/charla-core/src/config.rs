use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CharlaError, Result};

/// Top-level configuration for the Charla pipeline.
///
/// Loaded from `~/.charla/config.toml` by default. Each section corresponds
/// to one collaborator of the orchestrator. Immutable after the orchestrator
/// is constructed; components receive it by shared reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CharlaConfig {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

impl Default for CharlaConfig {
    fn default() -> Self {
        Self {
            llm: LlmConfig::default(),
            tools: ToolsConfig::default(),
            search: SearchConfig::default(),
            relay: RelayConfig::default(),
        }
    }
}

impl CharlaConfig {
    /// Load configuration from a TOML file.
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CharlaConfig = toml::from_str(&content)?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration from a TOML file, falling back to defaults if the
    /// file does not exist or cannot be parsed.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Validate cross-field invariants before any network call is made.
    ///
    /// If web search is enabled and the selected provider requires a
    /// credential, that credential must be non-empty. Historical variants
    /// silently returned empty results here instead; this surfaces the
    /// misconfiguration up front.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key.trim().is_empty() {
            return Err(CharlaError::Config(
                "llm.api_key must be set before sending messages".to_string(),
            ));
        }
        if self.tools.enable_web_search
            && self.search.provider.requires_credential()
            && self.search.api_key.trim().is_empty()
        {
            return Err(CharlaError::Config(format!(
                "search provider '{}' requires search.api_key",
                self.search.provider.as_str()
            )));
        }
        Ok(())
    }
}

/// Completion endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API.
    pub api_url: String,
    /// Bearer token for the completion endpoint.
    pub api_key: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f64,
    /// Completion token cap.
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.7,
            max_tokens: 1000,
        }
    }
}

/// Feature toggles for the augmentation tools.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Whether time-intent queries invoke the time tool.
    pub enable_time_tool: bool,
    /// Whether search-intent queries invoke the web-search provider.
    pub enable_web_search: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            enable_time_tool: true,
            enable_web_search: false,
        }
    }
}

/// Which web-search provider variant to construct.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    /// Direct authenticated API (Brave Search).
    Brave,
    /// Best-effort HTML scraping through a CORS proxy.
    Scrape,
    /// Synthetic results only; no external calls.
    #[default]
    Stub,
}

impl SearchProviderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SearchProviderKind::Brave => "brave",
            SearchProviderKind::Scrape => "scrape",
            SearchProviderKind::Stub => "stub",
        }
    }

    /// Whether this provider cannot run without an API credential.
    pub fn requires_credential(&self) -> bool {
        matches!(self, SearchProviderKind::Brave)
    }
}

/// Web-search provider settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Provider variant to use.
    pub provider: SearchProviderKind,
    /// Credential for providers that need one (Brave subscription token).
    pub api_key: String,
    /// Maximum results per query.
    pub max_results: usize,
    /// Search language/locale hint.
    pub locale: String,
    /// CORS-bypassing proxy prefix for the scrape variant.
    pub proxy_url: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: SearchProviderKind::Stub,
            api_key: String::new(),
            max_results: 5,
            locale: "es".to_string(),
            proxy_url: "https://api.allorigins.win/raw?url=".to_string(),
        }
    }
}

/// Relay-transport deployment settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Relay endpoint, if the relay deployment is used instead of direct calls.
    pub url: Option<String>,
    /// Initial handshake timeout in seconds.
    pub connect_timeout_secs: u64,
    /// Full request/response round-trip timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_timeout_secs: 5,
            request_timeout_secs: 30,
        }
    }
}
