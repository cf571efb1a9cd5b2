//! Conversational core of Charla.
//!
//! Provides message intent classification, the synthetic time tool, prompt
//! construction, and the chat orchestrator that ties them to the search and
//! completion providers.

pub mod error;
pub mod intent;
pub mod orchestrator;
pub mod prompt;
pub mod time_tool;

pub use error::ChatError;
pub use intent::IntentClassifier;
pub use orchestrator::ChatOrchestrator;
pub use prompt::{PromptBuilder, HISTORY_WINDOW};
pub use time_tool::{TimeTool, TOOL_CURRENT_TIME, TOOL_TIME_DIFFERENCE};
