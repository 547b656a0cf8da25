//! `stackd notify` command

use anyhow::{Context, Result};
use colored::Colorize;
use stackd_core::callback::{CallbackDispatcher, Delivery};
use stackd_core::types::CallbackPayload;
use std::path::Path;
use std::time::Duration;

/// Post a payload to a callback URL once
pub async fn notify(url: &str, payload: Option<&Path>, timeout: Duration) -> Result<()> {
    let body: serde_json::Value = match payload {
        Some(path) => {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read payload {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse payload {}", path.display()))?
        }
        None => serde_json::to_value(
            CallbackPayload::new("sample-request")
                .with("databaseUrl", "192.0.2.10")
                .with("databaseName", "sample"),
        )?,
    };

    let dispatcher = CallbackDispatcher::new(timeout)?;
    match dispatcher.dispatch(url, &body).await? {
        Delivery::Acknowledged => {
            println!("{} Callback acknowledged by {}", "✓".green().bold(), url.bold());
            Ok(())
        }
        Delivery::Rejected { status, body } => {
            println!("{} Callback rejected by {} (HTTP {})", "✗".red().bold(), url.bold(), status);
            if !body.is_empty() {
                println!("  {}", body.dimmed());
            }
            anyhow::bail!("callback was not acknowledged")
        }
    }
}
