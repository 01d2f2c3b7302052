// src/main.rs

//! The main entry point for the Astra cache server binary.

use anyhow::Result;
use astra_cache::config::Config;
use astra_cache::server;
use std::env;
use std::sync::Arc;
use tracing::error;
use tracing_subscriber::{filter::EnvFilter, prelude::*, reload};

#[tokio::main]
async fn main() {
    match run_app().await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(e.downcast_ref::<ConfigError>().map_or(2, |_| 1));
        }
    }
}

/// Marks an error as a configuration-load failure so `main` can map it to
/// exit code 1 instead of the generic runtime-error code 2.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
struct ConfigError(String);

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");
    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("astra-cache version {VERSION}");
        return Ok(());
    }

    let config_path = flag_value(&args, "--config").unwrap_or("config.toml");

    let mut config = Config::from_file(config_path)
        .map_err(|e| ConfigError(format!("failed to load configuration from \"{config_path}\": {e}")))?;

    if let Some(port_str) = flag_value(&args, "--port") {
        config.port = port_str
            .parse::<u16>()
            .map_err(|_| ConfigError(format!("invalid port number: {port_str}")))?;
    }

    if let Some(loglevel) = flag_value(&args, "--loglevel") {
        config.log_level = normalize_loglevel(loglevel)
            .map_err(|_| ConfigError(format!("invalid --loglevel value: {loglevel}")))?;
    }

    if let Some(maxsize_str) = flag_value(&args, "--maxsize") {
        let maxsize = maxsize_str
            .parse::<u64>()
            .map_err(|_| ConfigError(format!("invalid --maxsize value: {maxsize_str}")))?;
        config.maxmemory = Some(maxsize as usize);
    }

    if let Some(coredump_path) = flag_value(&args, "--coredump") {
        config.snapshot.enabled = !coredump_path.is_empty();
        if !coredump_path.is_empty() {
            config.snapshot.path = coredump_path.to_string();
        }
    }

    let initial_log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    let (filter, reload_handle) = reload::Layer::new(EnvFilter::new(initial_log_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact().with_ansi(true))
        .init();

    let reload_handle = Arc::new(reload_handle);

    if let Err(e) = server::run(config, reload_handle).await {
        error!("server runtime error: {}", e);
        return Err(e);
    }

    Ok(())
}

/// Looks up `--flag value` in the raw argv, honoring the first occurrence.
fn flag_value<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.iter()
        .position(|arg| arg == flag)
        .and_then(|i| args.get(i + 1))
        .map(String::as_str)
}

/// `fatal` isn't a `tracing` level; it's accepted on the CLI for operator
/// convenience and mapped onto `error`, the closest level `EnvFilter` understands.
fn normalize_loglevel(raw: &str) -> Result<String, ()> {
    match raw.to_ascii_lowercase().as_str() {
        "trace" => Ok("trace".to_string()),
        "debug" => Ok("debug".to_string()),
        "info" => Ok("info".to_string()),
        "warn" => Ok("warn".to_string()),
        "error" => Ok("error".to_string()),
        "fatal" => Ok("error".to_string()),
        _ => Err(()),
    }
}
