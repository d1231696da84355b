//! Takeoff Worker - imports takeoff CSVs into project component tables
//!
//! This worker connects to NATS and handles import requests from the frontend.

mod auth;
mod cli;
mod config;
mod db;
mod handlers;
mod services;
mod types;

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, error};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};

use crate::cli::{Cli, Command};
use crate::config::{Config, ImportSettings};
use crate::services::takeoff::{create_component_store, validate_takeoff, ComponentStore};

#[tokio::main]
async fn main() -> Result<()> {
    let _guard = init_logging();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve().await,
        Command::Migrate => migrate().await,
        Command::Validate { file } => validate(&file).await,
    }
}

fn init_logging() -> WorkerGuard {
    // Logs directory - use LOGS_DIR env var or default to ../logs (relative to worker)
    let logs_dir = std::env::var("LOGS_DIR")
        .unwrap_or_else(|_| "../logs".to_string());
    std::fs::create_dir_all(&logs_dir).ok();

    // File appender for persistent logs (daily rotation)
    let file_appender = RollingFileAppender::new(
        Rotation::DAILY,
        &logs_dir,
        "takeoff-worker.log",
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Initialize logging - both stdout and file
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,takeoff_worker=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())  // stdout
        .with(tracing_subscriber::fmt::layer().with_writer(non_blocking).with_ansi(false))  // file
        .init();

    guard
}

async fn serve() -> Result<()> {
    info!("Starting Takeoff Worker...");

    let config = Config::from_env()?;
    info!("Configuration loaded");

    let pool = match config.database_url.as_deref() {
        Some(url) if config.component_store == "postgres" => {
            let pool = db::create_pool(url).await?;
            info!("Connected to PostgreSQL");
            db::run_migrations(&pool).await?;
            Some(pool)
        }
        _ => None,
    };

    let store: Arc<dyn ComponentStore> = Arc::from(create_component_store(&config.component_store, pool)?);

    // Connect to NATS (supports optional NATS_USER/NATS_PASSWORD auth).
    let nats_client = match (&config.nats_user, &config.nats_password) {
        (Some(user), Some(password)) if !user.is_empty() => {
            async_nats::ConnectOptions::new()
                .user_and_password(user.clone(), password.clone())
                .connect(&config.nats_url)
                .await?
        }
        _ => async_nats::connect(&config.nats_url).await?,
    };
    info!("Connected to NATS at {}", config.nats_url);

    // Start message handlers
    let handler_result = handlers::start_handlers(nats_client, store, &config).await;

    if let Err(e) = handler_result {
        error!("Handler error: {}", e);
        return Err(e);
    }

    Ok(())
}

async fn migrate() -> Result<()> {
    let config = Config::from_env()?;
    let database_url = config
        .database_url
        .as_deref()
        .context("DATABASE_URL must be set to run migrations")?;

    let pool = db::create_pool(database_url).await?;
    db::run_migrations(&pool).await
}

async fn validate(file: &Path) -> Result<()> {
    dotenvy::dotenv().ok();
    let settings = ImportSettings::from_env()?;

    let content = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;

    let result = validate_takeoff(&content, &settings, &settings.component_types);
    println!("{}", serde_json::to_string_pretty(&result)?);

    if !result.success {
        anyhow::bail!("{} has {} error(s)", file.display(), result.errors().len());
    }
    Ok(())
}
