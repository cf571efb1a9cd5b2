//! Canned time-lookup tool.
//!
//! Synthesizes a response describing the current local time or a
//! time-difference query. Performs NO real timezone arithmetic; the stub
//! semantics are intentional and preserved as-is.

use chrono::Local;
use tracing::debug;

use charla_core::types::ToolResult;

pub const TOOL_CURRENT_TIME: &str = "getCurrentTime";
pub const TOOL_TIME_DIFFERENCE: &str = "getTimeDifference";

/// Synthetic time tool. No I/O beyond reading the host clock.
#[derive(Default)]
pub struct TimeTool;

impl TimeTool {
    pub fn new() -> Self {
        Self
    }

    /// Handle a time-intent query, returning exactly one tool result.
    pub fn handle(&self, query: &str) -> Vec<ToolResult> {
        if query.to_lowercase().contains("diferencia") {
            debug!("Time tool answering a time-difference query");
            return vec![ToolResult {
                tool: TOOL_TIME_DIFFERENCE.to_string(),
                result: "Time-difference lookup is not supported yet.".to_string(),
                details: "Placeholder answer; no timezone arithmetic was performed.".to_string(),
            }];
        }

        let now = Local::now();
        debug!("Time tool answering a current-time query");
        vec![ToolResult {
            tool: TOOL_CURRENT_TIME.to_string(),
            result: now.format("%A, %d %B %Y %H:%M:%S").to_string(),
            details: "Local time of the assistant host; not adjusted to any requested timezone."
                .to_string(),
        }]
    }
}
