use std::env;
use std::io::IsTerminal;
use std::path::Path;

use anyhow::{Context, Result};

use crate::cli_utils::prompt_private_key;
use crate::provisioning::shared::BatchReport;
use crate::utils::app_config::AppConfig;

/// Log filter from a `RUST_LOG` lookup, `info` when unset or blank
pub fn log_filter<F>(lookup: F) -> String
where
    F: Fn(&str) -> Option<String>,
{
    lookup("RUST_LOG")
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "info".to_string())
}

/// Initialize the tracing subscriber, honouring a `RUST_LOG` set in `.env`
pub fn init_tracing() {
    // must run before the filter is read
    let _ = dotenvy::dotenv();

    let filter = log_filter(|key| env::var(key).ok());
    tracing_subscriber::fmt()
        .with_env_filter(filter.as_str())
        .with_writer(std::io::stderr)
        .init();
}

/// Initialize AppConfig for CLI operations
pub fn initialize_app_config() -> Result<AppConfig> {
    Ok(AppConfig::from_env()?)
}

/// Make sure the config carries a source key, prompting on a terminal if it does not
pub fn ensure_source_key(config: AppConfig) -> Result<AppConfig> {
    if config.has_private_key() {
        return Ok(config);
    }

    if !std::io::stdin().is_terminal() {
        anyhow::bail!("PRIVATE_KEY must be set in .env file or environment variables");
    }

    let key = prompt_private_key()?;
    Ok(config.with_private_key(key))
}

/// Write a batch report as pretty JSON
pub fn save_report(report: &BatchReport, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(report).context("failed to serialize report")?;
    std::fs::write(path, json).with_context(|| format!("failed to write report to {}", path.display()))?;
    Ok(())
}
