//! Prompt construction.
//!
//! Merges the user message, recent history, and any augmentation results
//! into the ordered system+history+user message list sent to the completion
//! endpoint. Pure function of its inputs.

use charla_core::types::{Message, PromptMessage, Role, SearchResult, ToolResult};

/// Number of trailing history entries included in every prompt. Fixed; older
/// turns are dropped rather than summarized.
pub const HISTORY_WINDOW: usize = 6;

/// Builds the outbound message list for one completion request.
pub struct PromptBuilder {
    /// Display name of the active search provider, named in the system
    /// message whenever results are present.
    provider_name: String,
}

impl PromptBuilder {
    pub fn new(provider_name: impl Into<String>) -> Self {
        Self {
            provider_name: provider_name.into(),
        }
    }

    /// Produce exactly: one system message, the last [`HISTORY_WINDOW`]
    /// history entries in chronological order, one final user message.
    ///
    /// `wants_search` distinguishes "no search intent" from "search intended
    /// but produced nothing": only the latter forces the explicit no-search
    /// disclosure instruction.
    pub fn build_messages(
        &self,
        history: &[Message],
        user_message: &str,
        search_results: &[SearchResult],
        tool_results: &[ToolResult],
        wants_search: bool,
    ) -> Vec<PromptMessage> {
        let mut messages = Vec::with_capacity(history.len().min(HISTORY_WINDOW) + 2);
        messages.push(PromptMessage::new(
            Role::System,
            self.system_message(search_results, wants_search),
        ));

        let start = history.len().saturating_sub(HISTORY_WINDOW);
        for entry in &history[start..] {
            messages.push(PromptMessage::new(entry.role, entry.content.clone()));
        }

        messages.push(PromptMessage::new(
            Role::User,
            self.user_message(user_message, search_results, tool_results),
        ));
        messages
    }

    fn system_message(&self, search_results: &[SearchResult], wants_search: bool) -> String {
        let mut lines = vec![
            "You are a helpful assistant. Answer in the language the user writes in.".to_string(),
        ];

        if !search_results.is_empty() {
            lines.push(format!(
                "Web search results from {} are attached to the user message. \
                 Use them as the exclusive basis for any factual claim.",
                self.provider_name
            ));
            lines.push(
                "Cite the URL of every source you rely on in your reply.".to_string(),
            );
            lines.push(
                "Do not invent or add information beyond what the results contain."
                    .to_string(),
            );
        } else if wants_search {
            lines.push(
                "No web search was performed for this message. State that plainly \
                 to the user instead of inventing an answer."
                    .to_string(),
            );
        }

        lines.join("\n")
    }

    fn user_message(
        &self,
        user_message: &str,
        search_results: &[SearchResult],
        tool_results: &[ToolResult],
    ) -> String {
        let mut lines = vec![user_message.to_string()];

        if !search_results.is_empty() {
            lines.push(String::new());
            lines.push(format!(
                "--- Web search results ({}) ---",
                self.provider_name
            ));
            for (i, r) in search_results.iter().enumerate() {
                lines.push(format!("[{}] {}", i + 1, r.title));
                lines.push(format!("URL: {}", r.url));
                lines.push(format!("Snippet: {}", r.snippet));
                lines.push(format!("Provider: {}", r.provider));
            }
            lines.push("--- End of web search results ---".to_string());
        }

        if !tool_results.is_empty() {
            lines.push(String::new());
            lines.push("--- Tool results ---".to_string());
            for t in tool_results {
                lines.push(format!("Tool: {}", t.tool));
                lines.push(format!("Result: {}", t.result));
                lines.push(format!("Details: {}", t.details));
            }
            lines.push("--- End of tool results ---".to_string());
        }

        lines.join("\n")
    }
}

// =============================================================================
// Tests
// =============================================================================
