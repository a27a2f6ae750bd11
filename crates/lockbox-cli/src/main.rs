mod cli;
mod config;
mod storage;

use std::{
    fs,
    io::{self, Read, Write},
    path::PathBuf,
};

use clap::Parser;
use color_eyre::{eyre::eyre, Result};
use lockbox_core::RecordStore;
use lockbox_net::{HttpTransport, Transport};
use lockbox_storage::{KeyProtector, SecureStorageService};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::cli::{Command, ConfigCommand};

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    init_tracing();

    let cli = cli::Cli::parse();
    let config = config::load()?;
    match cli.command {
        Command::Save { id, value, file } => {
            let value = read_value(value, file)?;
            storage::service_from_config(&config)?
                .save(&id, &value)
                .await?;
            info!(%id, "saved");
        }
        Command::Load { id, out } => {
            let value = storage::service_from_config(&config)?.load(&id).await?;
            write_value(&value, out)?;
        }
        Command::Delete { id } => {
            storage::service_from_config(&config)?.delete(&id).await?;
            info!(%id, "deleted");
        }
        Command::SaveRaw { key, value } => {
            storage::plain_store_from_config(&config)?
                .save_raw(&key, value.as_bytes())
                .await?;
        }
        Command::LoadRaw { key } => {
            let value = storage::plain_store_from_config(&config)?
                .load_raw(&key)
                .await?;
            write_value(&value, None)?;
        }
        Command::Fetch { url } => {
            let body = HttpTransport::new().get_raw(&url).await?;
            write_value(&body, None)?;
        }
        Command::Post { url, body } => {
            let reply = HttpTransport::new().post_raw(&url, body.as_bytes()).await?;
            write_value(&reply, None)?;
        }
        Command::Health => run_health_check(&config).await?,
        Command::Config(ConfigCommand::Init) => init_config(&config)?,
        Command::Version => print_version(),
    }

    Ok(())
}

fn init_tracing() {
    // Respect user-provided filters, default to info; logs go to stderr so stdout stays
    // reserved for loaded values.
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_target(false)
        .with_writer(io::stderr);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .init();
}

fn print_version() {
    println!("lockbox {}", env!("CARGO_PKG_VERSION"));
}

fn read_value(value: Option<String>, file: Option<PathBuf>) -> Result<Vec<u8>> {
    match (value, file) {
        (Some(value), _) => Ok(value.into_bytes()),
        (None, Some(path)) => Ok(fs::read(path)?),
        (None, None) => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            Ok(buf)
        }
    }
}

fn write_value(value: &[u8], out: Option<PathBuf>) -> Result<()> {
    match out {
        Some(path) => fs::write(path, value)?,
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(value)?;
            stdout.flush()?;
        }
    }
    Ok(())
}

/// Runs a quick health check of the encrypted storage path.
async fn run_health_check(config: &config::Config) -> Result<()> {
    let service = storage::service_from_config(config)?;
    run_store_health(&service).await?;
    println!("Storage: ok");
    Ok(())
}

async fn run_store_health<S: RecordStore, K: KeyProtector>(
    service: &SecureStorageService<S, K>,
) -> Result<()> {
    let check_id = "health/check";
    let payload = b"ok";
    service.save(check_id, payload).await?;
    let round_trip = service.load(check_id).await?;
    service.delete(check_id).await?;

    if round_trip != payload {
        return Err(eyre!("storage round-trip failed"));
    }
    Ok(())
}

fn init_config(config: &config::Config) -> Result<()> {
    let path = config::write_default_if_missing(config)?;
    println!("Config initialized at {}", path.display());
    Ok(())
}
