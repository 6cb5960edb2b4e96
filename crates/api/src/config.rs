// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};

use crate::transport::Method;

/// Connection settings for the API client.
#[derive(Debug, Clone, clap::Args)]
pub struct ClientConfig {
    /// Backend base URL (e.g. https://api.wellvantage.app).
    #[arg(long, env = "WELLVANTAGE_API_URL", default_value = "http://127.0.0.1:3000")]
    pub api_url: String,

    /// Per-request timeout in milliseconds.
    #[arg(long, default_value_t = 30000, env = "WELLVANTAGE_TIMEOUT_MS")]
    pub timeout_ms: u64,

    /// Timeout for the token refresh exchange in milliseconds.
    #[arg(long, default_value_t = 30000, env = "WELLVANTAGE_REFRESH_TIMEOUT_MS")]
    pub refresh_timeout_ms: u64,

    /// Directory holding the persisted session file.
    #[arg(long, env = "WELLVANTAGE_STATE_DIR")]
    pub state_dir: Option<PathBuf>,
}

impl ClientConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    /// Path of the session file, under `--state-dir` or the default state dir.
    pub fn session_path(&self) -> PathBuf {
        self.state_dir.clone().unwrap_or_else(crate::store::state_dir).join("session.json")
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let url = self.api_url.trim();
        if url.is_empty() {
            anyhow::bail!("--api-url must not be empty");
        }
        if !url.starts_with("http://") && !url.starts_with("https://") {
            anyhow::bail!("--api-url must start with http:// or https://: {url}");
        }
        if self.timeout_ms == 0 {
            anyhow::bail!("--timeout-ms must be greater than zero");
        }
        if self.refresh_timeout_ms == 0 {
            anyhow::bail!("--refresh-timeout-ms must be greater than zero");
        }
        Ok(())
    }
}

/// Command-line client for the Wellvantage trainer API.
#[derive(Debug, Parser)]
#[command(name = "wellvantage", version, about)]
pub struct CliConfig {
    #[command(flatten)]
    pub client: ClientConfig,

    /// Log format (json or text).
    #[arg(long, env = "WELLVANTAGE_LOG_FORMAT", default_value = "text")]
    pub log_format: String,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, env = "WELLVANTAGE_LOG_LEVEL", default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

impl CliConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        self.client.validate()?;
        match self.log_format.as_str() {
            "json" | "text" => {}
            other => anyhow::bail!("invalid log format: {other}"),
        }
        if let Command::Request { body: Some(ref body), .. } = self.command {
            serde_json::from_str::<serde_json::Value>(body)
                .map_err(|e| anyhow::anyhow!("--body is not valid JSON: {e}"))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// Show the persisted session.
    Status,
    /// Exchange a Google ID token for a session.
    SignIn {
        /// Google ID token.
        #[arg(long, env = "WELLVANTAGE_ID_TOKEN")]
        id_token: String,
    },
    /// Clear the persisted session.
    SignOut,
    /// Issue an authenticated request and print the response body.
    Request {
        /// HTTP method.
        #[arg(value_parser = parse_method)]
        method: Method,
        /// Path relative to the API URL (e.g. /clients).
        path: String,
        /// JSON request body.
        #[arg(long)]
        body: Option<String>,
        /// Query parameter as key=value (repeatable).
        #[arg(long = "query", value_parser = parse_key_value)]
        query: Vec<(String, String)>,
    },
    /// List the trainer's clients.
    Clients,
    /// List the trainer's workout plans.
    Plans,
    /// List availability blocks for a trainer on a date.
    Availability {
        #[arg(long)]
        trainer_id: String,
        /// Date as YYYY-MM-DD.
        #[arg(long)]
        date: String,
    },
}

fn parse_method(s: &str) -> Result<Method, String> {
    s.parse::<Method>().map_err(|e| e.to_string())
}

fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((k, v)) if !k.is_empty() => Ok((k.to_owned(), v.to_owned())),
        _ => Err(format!("expected key=value, got: {s}")),
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
