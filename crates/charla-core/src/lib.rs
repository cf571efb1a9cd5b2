pub mod config;
pub mod error;
pub mod types;

pub use config::{CharlaConfig, LlmConfig, RelayConfig, SearchConfig, SearchProviderKind, ToolsConfig};
pub use error::{CharlaError, Result};
pub use types::*;
