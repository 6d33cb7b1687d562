//! platformctl
//!
//! Manages named platform connection profiles and their credentials:
//! 1. Loads configuration (TOML file plus environment overlay)
//! 2. Selects the profile storage backend (OS vault, encrypted files, memory)
//! 3. Runs one `profile ...` or `auth ...` command against the session

mod cli;
mod commands;

use std::sync::Arc;

use anyhow::{Context, Result};
use common::Config;
use secret_store::{OsVault, StoreBackend, Vault};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::cli::Command;

/// Logs go to stderr so command output on stdout stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_env("LOG_LEVEL")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("warn"));
    let json = std::env::var("LOG_FORMAT").is_ok_and(|f| f.eq_ignore_ascii_case("json"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let cli = cli::parse(&args)?;
    if cli.command == Command::Help {
        println!("{}", cli::USAGE);
        return Ok(());
    }

    let config_path = Config::resolve_path(cli.global.config.as_deref());
    let config = Config::load_or_default(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    debug!(
        path = %config_path.display(),
        driver = ?config.store.driver,
        "configuration loaded"
    );

    let vault: Arc<dyn Vault> = Arc::new(OsVault);

    // Migration opens both backends itself.
    if let Command::ProfileMigrate { from, to } = cli.command {
        return commands::migrate_profiles(&config, vault, from, to);
    }

    // Flag-supplied profiles never touch storage.
    if cli.global.wants_ephemeral() {
        return commands::run_ephemeral(&cli.global, &cli.command, &config).await;
    }

    let backend = StoreBackend::select(
        config.store.driver.as_deref(),
        config.store.profile_dir.as_deref(),
        common::APP_NAME,
        vault,
    )
    .context("failed to open profile storage")?;
    let mut session = profiles::Session::new(backend).context("failed to load profiles")?;

    commands::run(&mut session, &cli.global, cli.command, &config).await
}
