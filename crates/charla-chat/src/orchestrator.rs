//! Chat orchestrator: central coordinator wiring classifier, tools, prompt
//! builder, and completion backend.
//!
//! Per message: classify intent, conditionally dispatch web search and the
//! time tool, build the prompt, complete, append to history. Search and time
//! failures degrade to empty result sets; only a completion failure fails
//! the send.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{info, warn};

use charla_core::config::CharlaConfig;
use charla_core::types::{ChatResponse, Message, Role};
use charla_llm::{CompletionBackend, CompletionClient};
use charla_search::{build_provider, SearchProvider};

use crate::error::ChatError;
use crate::intent::IntentClassifier;
use crate::prompt::PromptBuilder;
use crate::time_tool::TimeTool;

/// Maximum message length in characters.
const MAX_MESSAGE_LENGTH: usize = 4000;

/// Central chat orchestrator. Owns immutable config and the append-only
/// conversation history; collaborators are constructed once at build time.
pub struct ChatOrchestrator {
    config: Arc<CharlaConfig>,
    classifier: IntentClassifier,
    time_tool: TimeTool,
    search: Arc<dyn SearchProvider>,
    prompt: PromptBuilder,
    backend: Arc<dyn CompletionBackend>,
    // Held across a full send, which serializes sends per conversation and
    // keeps history ordering stable.
    history: Mutex<Vec<Message>>,
}

impl std::fmt::Debug for ChatOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatOrchestrator").finish_non_exhaustive()
    }
}

impl ChatOrchestrator {
    /// Build an orchestrator from configuration, wiring the configured
    /// search provider and the direct HTTP completion client.
    ///
    /// Fails fast with a configuration error before any network call if the
    /// config violates its invariants (missing credentials).
    pub fn new(config: CharlaConfig) -> Result<Self, ChatError> {
        let backend = Arc::new(CompletionClient::new(&config.llm));
        Self::with_backend(config, backend)
    }

    /// Build with an injected completion backend (relay deployment, tests).
    pub fn with_backend(
        config: CharlaConfig,
        backend: Arc<dyn CompletionBackend>,
    ) -> Result<Self, ChatError> {
        config.validate()?;
        let search = build_provider(&config.search);
        let prompt = PromptBuilder::new(search.name());
        Ok(Self {
            config: Arc::new(config),
            classifier: IntentClassifier::new(),
            time_tool: TimeTool::new(),
            search,
            prompt,
            backend,
            history: Mutex::new(Vec::new()),
        })
    }

    /// Handle one user message end to end.
    ///
    /// On success the user message and the assistant reply are both appended
    /// to history. On completion failure the user message remains in history
    /// (so the user can retry) and no assistant message is appended.
    pub async fn send_message(&self, content: &str) -> Result<ChatResponse, ChatError> {
        if content.is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        if content.chars().count() > MAX_MESSAGE_LENGTH {
            return Err(ChatError::MessageTooLong(MAX_MESSAGE_LENGTH));
        }

        let mut history = self.history.lock().await;

        let intent = self.classifier.classify(content);

        // Dispatch gated on BOTH intent and feature flags. Providers degrade
        // internally and return plain vectors, so neither branch can fail
        // the send.
        let search_results = if intent.wants_search && self.config.tools.enable_web_search {
            let results = self.search.search(content).await;
            info!(
                provider = self.search.name(),
                count = results.len(),
                "Search dispatched"
            );
            results
        } else {
            vec![]
        };

        let tool_results = if intent.wants_time && self.config.tools.enable_time_tool {
            self.time_tool.handle(content)
        } else {
            vec![]
        };

        history.push(Message::new(Role::User, content));

        // Prior turns only; the current message is appended by the builder.
        let prior = &history[..history.len() - 1];
        let messages = self.prompt.build_messages(
            prior,
            content,
            &search_results,
            &tool_results,
            intent.wants_search,
        );

        let reply = match self.backend.complete(&messages).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!(error = %e, "Completion failed; user message kept in history");
                return Err(e.into());
            }
        };

        let mut assistant = Message::new(Role::Assistant, reply.clone());
        if !search_results.is_empty() {
            assistant.search_results = Some(search_results.clone());
        }
        if !tool_results.is_empty() {
            assistant.tools = Some(tool_results.clone());
        }
        history.push(assistant);

        Ok(ChatResponse::new(reply, search_results, tool_results))
    }

    /// Snapshot of the conversation history.
    pub async fn history(&self) -> Vec<Message> {
        self.history.lock().await.clone()
    }

    /// Discard all conversation history.
    pub async fn clear_history(&self) {
        self.history.lock().await.clear();
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use charla_core::config::SearchProviderKind;
    use charla_core::error::CharlaError;
    use charla_core::types::PromptMessage;
    use std::sync::Mutex as StdMutex;

    /// Backend that records every message list it receives.
    struct RecordingBackend {
        reply: String,
        seen: StdMutex<Vec<Vec<PromptMessage>>>,
    }

    impl RecordingBackend {
        fn new(reply: &str) -> Arc<Self> {
            Arc::new(Self {
                reply: reply.to_string(),
                seen: StdMutex::new(Vec::new()),
            })
        }

        fn last_prompt(&self) -> Vec<PromptMessage> {
            self.seen.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl CompletionBackend for RecordingBackend {
        async fn complete(&self, messages: &[PromptMessage]) -> Result<String, CharlaError> {
            self.seen.lock().unwrap().push(messages.to_vec());
            Ok(self.reply.clone())
        }
    }

    /// Backend that always fails with a fixed provider error.
    struct FailingBackend {
        status: u16,
    }

    #[async_trait]
    impl CompletionBackend for FailingBackend {
        async fn complete(&self, _messages: &[PromptMessage]) -> Result<String, CharlaError> {
            Err(CharlaError::Provider {
                status: self.status,
                message: "unauthorized".to_string(),
            })
        }
    }

    fn test_config() -> CharlaConfig {
        let mut config = CharlaConfig::default();
        config.llm.api_key = "sk-test".to_string();
        config.tools.enable_web_search = true;
        config.tools.enable_time_tool = true;
        config.search.provider = SearchProviderKind::Stub;
        config
    }

    fn orchestrator_with(backend: Arc<dyn CompletionBackend>) -> ChatOrchestrator {
        ChatOrchestrator::with_backend(test_config(), backend).unwrap()
    }

    // ---- Construction ----

    #[test]
    fn test_construction_validates_config() {
        let config = CharlaConfig::default(); // empty llm.api_key
        let err = ChatOrchestrator::with_backend(config, RecordingBackend::new("x")).unwrap_err();
        assert!(matches!(err, ChatError::Config(_)));
    }

    #[test]
    fn test_construction_rejects_missing_search_credential() {
        let mut config = test_config();
        config.search.provider = SearchProviderKind::Brave;
        let err = ChatOrchestrator::with_backend(config, RecordingBackend::new("x")).unwrap_err();
        assert!(err.to_string().contains("search.api_key"));
    }

    // ---- Input validation ----

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let orch = orchestrator_with(RecordingBackend::new("ok"));
        let err = orch.send_message("").await.unwrap_err();
        assert!(matches!(err, ChatError::EmptyMessage));
        assert!(orch.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_message_too_long_rejected() {
        let orch = orchestrator_with(RecordingBackend::new("ok"));
        let long = "a".repeat(MAX_MESSAGE_LENGTH + 1);
        let err = orch.send_message(&long).await.unwrap_err();
        assert!(matches!(err, ChatError::MessageTooLong(_)));
    }

    #[tokio::test]
    async fn test_message_at_max_length_ok() {
        let orch = orchestrator_with(RecordingBackend::new("ok"));
        let msg = "a".repeat(MAX_MESSAGE_LENGTH);
        assert!(orch.send_message(&msg).await.is_ok());
    }

    #[tokio::test]
    async fn test_length_limit_counts_characters_not_bytes() {
        let orch = orchestrator_with(RecordingBackend::new("ok"));
        // Two bytes per character in UTF-8; exactly at the character limit.
        let msg = "á".repeat(MAX_MESSAGE_LENGTH);
        assert!(msg.len() > MAX_MESSAGE_LENGTH);
        assert!(orch.send_message(&msg).await.is_ok());

        let over = "á".repeat(MAX_MESSAGE_LENGTH + 1);
        let err = orch.send_message(&over).await.unwrap_err();
        assert!(matches!(err, ChatError::MessageTooLong(_)));
    }

    // ---- Augmentation dispatch ----

    #[tokio::test]
    async fn test_search_intent_dispatches_stub_provider() {
        let backend = RecordingBackend::new("Claude es un asistente de IA.");
        let orch = orchestrator_with(backend.clone());
        let resp = orch.send_message("¿Qué es Claude?").await.unwrap();

        // Stub produced one clearly-labeled synthetic result.
        let results = resp.search_results.expect("expected search results");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].provider, "stub");

        // The prompt embedded the synthetic result and its provenance.
        let prompt = backend.last_prompt();
        assert!(prompt[0].content.contains("stub"));
        assert!(prompt.last().unwrap().content.contains("[simulated]"));
    }

    #[tokio::test]
    async fn test_search_disabled_skips_dispatch_and_discloses() {
        let mut config = test_config();
        config.tools.enable_web_search = false;
        let backend = RecordingBackend::new("ok");
        let orch = ChatOrchestrator::with_backend(config, backend.clone()).unwrap();

        let resp = orch.send_message("¿Qué es Claude?").await.unwrap();
        assert!(resp.search_results.is_none());

        // Search intent without a search run forces the disclosure line.
        let prompt = backend.last_prompt();
        assert!(prompt[0].content.contains("No web search was performed"));
    }

    #[tokio::test]
    async fn test_time_tool_disabled_never_invoked() {
        let mut config = test_config();
        config.tools.enable_time_tool = false;
        let orch = ChatOrchestrator::with_backend(config, RecordingBackend::new("ok")).unwrap();

        // Question mark gives wants_search, not wants_time; and even a time
        // keyword would be gated off by the flag.
        let resp = orch.send_message("Hola, ¿cómo estás?").await.unwrap();
        assert!(resp.tools.is_none());

        let resp = orch.send_message("dime la hora").await.unwrap();
        assert!(resp.tools.is_none());
    }

    #[tokio::test]
    async fn test_time_intent_attaches_tool_result() {
        let orch = orchestrator_with(RecordingBackend::new("Son las diez."));
        let resp = orch.send_message("dime la hora por favor").await.unwrap();
        let tools = resp.tools.expect("expected tool results");
        assert_eq!(tools.len(), 1);
        assert_eq!(tools[0].tool, "getCurrentTime");
    }

    #[tokio::test]
    async fn test_plain_message_has_no_augmentation() {
        let orch = orchestrator_with(RecordingBackend::new("igualmente"));
        let resp = orch.send_message("me gusta el helado").await.unwrap();
        assert!(resp.search_results.is_none());
        assert!(resp.tools.is_none());
    }

    // ---- Failure handling ----

    #[tokio::test]
    async fn test_completion_401_propagates_and_keeps_user_message() {
        let orch = orchestrator_with(Arc::new(FailingBackend { status: 401 }));
        let err = orch.send_message("hola, ¿qué tal?").await.unwrap_err();
        assert!(matches!(err, ChatError::Provider { status: 401, .. }));

        // User message kept for retry; no assistant message appended.
        let history = orch.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].content, "hola, ¿qué tal?");
    }

    // ---- History ----

    #[tokio::test]
    async fn test_history_ordering() {
        let orch = orchestrator_with(RecordingBackend::new("respuesta"));
        orch.send_message("primero").await.unwrap();
        orch.send_message("segundo").await.unwrap();

        let history = orch.history().await;
        assert_eq!(history.len(), 4);
        assert_eq!(history[0].content, "primero");
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[2].content, "segundo");
        assert_eq!(history[3].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_history_feeds_subsequent_prompts() {
        let backend = RecordingBackend::new("respuesta");
        let orch = orchestrator_with(backend.clone());
        orch.send_message("primero").await.unwrap();
        orch.send_message("segundo").await.unwrap();

        let prompt = backend.last_prompt();
        // system + 2 prior turns + current user message
        assert_eq!(prompt.len(), 4);
        assert_eq!(prompt[1].content, "primero");
        assert_eq!(prompt[2].content, "respuesta");
        assert_eq!(prompt[3].content, "segundo");
    }

    #[tokio::test]
    async fn test_clear_history() {
        let orch = orchestrator_with(RecordingBackend::new("ok"));
        orch.send_message("hola").await.unwrap();
        orch.clear_history().await;
        assert!(orch.history().await.is_empty());
    }

    #[tokio::test]
    async fn test_concurrent_sends_keep_paired_ordering() {
        let orch = Arc::new(orchestrator_with(RecordingBackend::new("ok")));
        let mut handles = Vec::new();
        for i in 0..8 {
            let orch = Arc::clone(&orch);
            handles.push(tokio::spawn(async move {
                orch.send_message(&format!("mensaje {}", i)).await.unwrap()
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        // Sends are serialized: every user message is directly followed by
        // its assistant reply.
        let history = orch.history().await;
        assert_eq!(history.len(), 16);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }

    // ---- Response envelope ----

    #[tokio::test]
    async fn test_response_never_contains_empty_arrays() {
        let orch = orchestrator_with(RecordingBackend::new("ok"));
        let resp = orch.send_message("me gusta el helado").await.unwrap();
        let json = serde_json::to_value(&resp).unwrap();
        assert!(json.get("search_results").is_none());
        assert!(json.get("tools").is_none());
    }
}
