// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::error;

use wellvantage::client::{ApiClient, RequestOptions};
use wellvantage::config::{CliConfig, Command};
use wellvantage::services::{availability, clients, workout};
use wellvantage::session::SessionController;
use wellvantage::store::FileStore;

#[tokio::main]
async fn main() {
    let config = CliConfig::parse();

    if let Err(e) = config.validate() {
        eprintln!("error: {e}");
        std::process::exit(2);
    }

    init_tracing(&config);

    if let Err(e) = run(config).await {
        error!("fatal: {e:#}");
        std::process::exit(1);
    }
}

fn init_tracing(config: &CliConfig) {
    use tracing_subscriber::fmt;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_new(&config.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));

    match config.log_format.as_str() {
        "json" => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).json().init();
        }
        _ => {
            fmt::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
        }
    }
}

async fn run(config: CliConfig) -> anyhow::Result<()> {
    let path = config.client.session_path();
    let store = FileStore::open(path.clone())
        .with_context(|| format!("failed to open session file {}", path.display()))?;
    let api = ApiClient::from_config(&config.client, Arc::new(store))?;
    let session = SessionController::new(api);

    let shutdown = CancellationToken::new();
    let listener = session.spawn_expiry_listener(shutdown.clone());
    session.restore().await;

    let result = dispatch(&session, config.command).await;

    shutdown.cancel();
    if let Err(e) = listener.await {
        tracing::debug!(err = %e, "expiry listener ended abnormally");
    }
    result
}

async fn dispatch(session: &SessionController, command: Command) -> anyhow::Result<()> {
    let api = session.api();
    match command {
        Command::Status => {
            let status = serde_json::json!({
                "authenticated": session.is_authenticated(),
                "user": session.user(),
                "hasRefreshToken": api.vault().refresh_token().await.is_some(),
                "refresh": api.coordinator().phase(),
            });
            print_json(&status)
        }
        Command::SignIn { id_token } => {
            let user = session.sign_in_with_google(&id_token).await?;
            print_json(&user)
        }
        Command::SignOut => {
            session.sign_out().await;
            Ok(())
        }
        Command::Request { method, path, body, query } => {
            let body = body.map(|b| serde_json::from_str(&b)).transpose()?;
            let options = RequestOptions { query, ..RequestOptions::default() };
            let value: serde_json::Value = api.request(method, &path, body, options).await?;
            print_json(&value)
        }
        Command::Clients => print_json(&clients::list(api).await?),
        Command::Plans => print_json(&workout::list_plans(api).await?),
        Command::Availability { trainer_id, date } => {
            print_json(&availability::list(api, &trainer_id, &date).await?)
        }
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
