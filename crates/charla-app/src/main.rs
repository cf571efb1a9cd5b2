//! Charla application binary - composition root.
//!
//! Ties together all Charla crates into a single executable:
//! 1. Load configuration from TOML and validate credentials
//! 2. Build the chat orchestrator (intent -> tools -> search -> completion)
//! 3. Run a line-oriented REPL over stdin, printing replies and cited sources

use std::path::PathBuf;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use charla_chat::{ChatError, ChatOrchestrator};
use charla_core::config::CharlaConfig;

/// Resolve the config file path (CHARLA_CONFIG env, or ~/.charla/config.toml).
fn config_path() -> PathBuf {
    if let Ok(p) = std::env::var("CHARLA_CONFIG") {
        return PathBuf::from(p);
    }
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".charla").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".charla").join("config.toml");
    }
    PathBuf::from("config.toml")
}

/// Render one assistant reply, appending any sources cited by search.
fn render_reply(response: &charla_core::types::ChatResponse) -> String {
    let mut out = response.content.clone();
    if let Some(results) = &response.search_results {
        out.push_str("\n\nFuentes:");
        for result in results {
            out.push_str(&format!("\n  - {} ({})", result.title, result.url));
        }
    }
    out
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    tracing::info!("Starting Charla v{}", env!("CARGO_PKG_VERSION"));

    // Config.
    let config_file = config_path();
    let config = CharlaConfig::load_or_default(&config_file);
    tracing::info!(path = %config_file.display(), "Configuration loaded");

    // Orchestrator. Fails fast on missing credentials.
    let orchestrator = match ChatOrchestrator::new(config) {
        Ok(o) => o,
        Err(e) => {
            tracing::error!(error = %e, "Configuration invalid");
            tracing::error!(
                "Set llm.api_key in {} (and search.api_key if web search uses a direct provider)",
                config_file.display()
            );
            return Err(e.into());
        }
    };

    // === REPL ===

    let mut stdout = tokio::io::stdout();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    stdout
        .write_all(b"Charla listo. Escribe tu mensaje (Ctrl-D para salir).\n> ")
        .await?;
    stdout.flush().await?;

    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        if input.is_empty() {
            stdout.write_all(b"> ").await?;
            stdout.flush().await?;
            continue;
        }

        match orchestrator.send_message(input).await {
            Ok(response) => {
                let rendered = render_reply(&response);
                stdout.write_all(rendered.as_bytes()).await?;
                stdout.write_all(b"\n> ").await?;
            }
            Err(ChatError::EmptyMessage) => {
                stdout.write_all(b"> ").await?;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Message failed");
                stdout
                    .write_all(format!("[error] {}\n> ", e).as_bytes())
                    .await?;
            }
        }
        stdout.flush().await?;
    }

    tracing::info!("Charla shutting down");
    Ok(())
}
