//! Spoolbox - mail server entry point

use anyhow::{bail, Context, Result};
use spoolbox_common::Config;
use spoolbox_core::{FileAuthenticator, MailServer};
use spoolbox_storage::MailboxStore;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();

    if args.first().map(String::as_str) == Some("--hash-password") {
        return hash_password_interactive();
    }

    init_logging();

    let (port, spool_dir) = match args.as_slice() {
        [port, dir, ..] => (
            port.parse::<u16>().context("Invalid port")?,
            PathBuf::from(dir),
        ),
        _ => bail!("Usage: spoolbox <port> <mail-spool-directory>"),
    };

    info!("Starting spoolbox mail server...");

    let mut config = Config::load()?;
    config.server.port = port;
    config.spool.path = spool_dir;

    let store = Arc::new(MailboxStore::open(&config.spool.path)?);
    let authenticator = Arc::new(FileAuthenticator::new(config.auth.users_file.clone()));

    let bind = format!("{}:{}", config.server.bind_address, config.server.port);
    let server = MailServer::bind(&bind, config.limits.clone(), store, authenticator).await?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let server_handle = tokio::spawn(server.run(shutdown_rx));

    tokio::signal::ctrl_c().await?;
    info!("Shutdown signal received");

    shutdown_tx.send(true)?;
    server_handle.await??;

    info!("Spoolbox shutdown complete");
    Ok(())
}

/// Generate an argon2 hash for the `[users]` table of the credential file.
fn hash_password_interactive() -> Result<()> {
    print!("Enter password: ");
    std::io::stdout().flush()?;

    let mut password = String::new();
    std::io::stdin().read_line(&mut password)?;
    let password = password.trim_end_matches(['\r', '\n']);

    if password.is_empty() {
        bail!("Password must not be empty");
    }

    let hash = spoolbox_core::hash_password(password)?;
    println!();
    println!("Add this to the [users] table of your users file:");
    println!("\"<username>\" = \"{}\"", hash);
    Ok(())
}

fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,spoolbox=debug"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_level(true))
        .with(filter)
        .init();
}
