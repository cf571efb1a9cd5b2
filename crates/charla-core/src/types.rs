use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// =============================================================================
// Enums
// =============================================================================

/// Author of a conversation message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    /// Wire name used by completion APIs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

// =============================================================================
// Conversation data
// =============================================================================

/// A single conversation message, immutable once created.
///
/// `search_results` and `tools` are attached only to assistant messages
/// that used augmentation, and are `None` rather than empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub content: String,
    pub role: Role,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<SearchResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolResult>>,
}

impl Message {
    /// Create a plain message with no augmentation attached.
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            content: content.into(),
            role,
            timestamp: Utc::now(),
            search_results: None,
            tools: None,
        }
    }
}

/// One structured result produced by a web-search provider.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub snippet: String,
    pub url: String,
    pub content: String,
    /// Display name of the provider that produced this result.
    ///
    /// Synthetic/fallback results carry a distinguishable name here
    /// ("stub", "scrape-fallback") and are never disguised as real ones.
    pub provider: String,
    pub timestamp: DateTime<Utc>,
}

/// Output of a synthetic tool invocation (currently only the time tool).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool: String,
    pub result: String,
    pub details: String,
}

/// A single `{role, content}` pair sent to the completion endpoint.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Classifier verdict for one user message.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Intent {
    pub wants_search: bool,
    pub wants_time: bool,
}

/// The normalized envelope returned by a successful `send_message`.
///
/// `search_results` and `tools` are omitted entirely when empty,
/// never serialized as `[]`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_results: Option<Vec<SearchResult>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolResult>>,
}

impl ChatResponse {
    /// Build a response, mapping empty collections to `None`.
    pub fn new(content: String, search_results: Vec<SearchResult>, tools: Vec<ToolResult>) -> Self {
        Self {
            content,
            search_results: if search_results.is_empty() {
                None
            } else {
                Some(search_results)
            },
            tools: if tools.is_empty() { None } else { Some(tools) },
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
