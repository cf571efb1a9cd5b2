//! Message intent classification.
//!
//! Keyword/pattern heuristics deciding whether a user message warrants a
//! web-search lookup and/or a time lookup before completion. Deliberately
//! recall-biased: an unnecessary search is cheap, while a missed one leaves
//! the model answering without sources; the prompt instructions make the
//! model disclose explicitly when no search ran.

use std::sync::LazyLock;

use regex::Regex;
use tracing::debug;

use charla_core::types::Intent;

// =============================================================================
// Keyword and pattern sets (compiled once, reused across calls)
// =============================================================================

/// Substring matches against the lowercased message. Substrings on purpose:
/// "horario" and inflections of "buscar" should all hit.
static TIME_KEYWORDS: &[&str] = &[
    "hora",
    "tiempo",
    "reloj",
    "horario",
    "zona horaria",
    "timezone",
    "huso horario",
];

static SEARCH_KEYWORDS: &[&str] = &[
    "busca",
    "búsca",
    "buscar",
    "encuentra",
    "encuéntra",
    "investiga",
    "noticias",
    "precio",
    "cotización",
    "cotizacion",
    "últimas",
    "ultimas",
    "actualidad",
];

struct SearchPatterns {
    interrogative_start: Regex,
    named_entity: Regex,
}

static SEARCH_PATTERNS: LazyLock<SearchPatterns> = LazyLock::new(|| SearchPatterns {
    // Leading interrogative word (input is lowercased before matching).
    interrogative_start: Regex::new(
        r"^[¿\s]*(?:qué|que|quién|quiénes|quien|quienes|cuál|cuáles|cual|cuales|cómo|como|dónde|donde|cuándo|cuando|por\s+qué|por\s+que)\b",
    )
    .expect("Invalid interrogative regex"),
    // Fixed brand/technology list; mentioning one of these suggests the user
    // expects current external information.
    named_entity: Regex::new(
        r"(?i)\b(?:chatgpt|openai|claude|anthropic|gemini|google|microsoft|apple|amazon|meta|tesla|nvidia|bitcoin|ethereum|iphone|android|rust|python|javascript|typescript|linux|windows)\b",
    )
    .expect("Invalid entity regex"),
});

// =============================================================================
// IntentClassifier
// =============================================================================

/// Rule-based intent classifier. Deterministic, no side effects.
#[derive(Default)]
pub struct IntentClassifier;

impl IntentClassifier {
    pub fn new() -> Self {
        Self
    }

    /// Classify a raw user message.
    ///
    /// Empty (or whitespace-only) input wants neither search nor time.
    pub fn classify(&self, message: &str) -> Intent {
        let trimmed = message.trim();
        if trimmed.is_empty() {
            return Intent::default();
        }
        let lower = trimmed.to_lowercase();

        let wants_time = TIME_KEYWORDS.iter().any(|kw| lower.contains(kw));
        let wants_search = SEARCH_KEYWORDS.iter().any(|kw| lower.contains(kw))
            || lower.contains('?')
            || lower.contains('¿')
            || SEARCH_PATTERNS.interrogative_start.is_match(&lower)
            || SEARCH_PATTERNS.named_entity.is_match(&lower);

        let intent = Intent {
            wants_search,
            wants_time,
        };
        debug!(
            wants_search = intent.wants_search,
            wants_time = intent.wants_time,
            "Message classified"
        );
        intent
    }
}

// =============================================================================
// Tests
// =============================================================================
