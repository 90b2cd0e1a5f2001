// src/main.rs

//! The main entry point for the Nexron command listener.

use anyhow::Result;
use nexron::Server;
use nexron::config::Config;
use nexron::core::services::ActionServices;
use std::env;
use std::path::Path;
use tracing::{error, info};
use tracing_subscriber::{filter::EnvFilter, prelude::*};

/// Used when no `--config` flag is given; missing is fine, defaults apply.
const DEFAULT_CONFIG_PATH: &str = "nexron.toml";

#[tokio::main]
async fn main() -> Result<()> {
    run_app().await
}

async fn run_app() -> Result<()> {
    const VERSION: &str = env!("CARGO_PKG_VERSION");

    let args: Vec<String> = env::args().collect();

    if args.contains(&"--version".to_string()) {
        println!("Nexron version {VERSION}");
        return Ok(());
    }

    // An explicit --config must load; the default path is optional.
    let explicit_config = args
        .iter()
        .position(|arg| arg == "--config")
        .map(|i| args.get(i + 1).map(|s| s.as_str()));

    let mut config = match explicit_config {
        Some(Some(path)) => load_config_or_exit(path),
        Some(None) => {
            eprintln!("--config flag requires a value");
            std::process::exit(1);
        }
        None if Path::new(DEFAULT_CONFIG_PATH).exists() => load_config_or_exit(DEFAULT_CONFIG_PATH),
        None => Config::default(),
    };

    if let Some(port_index) = args.iter().position(|arg| arg == "--port") {
        if let Some(port_str) = args.get(port_index + 1) {
            match port_str.parse::<u16>() {
                Ok(port) if port != 0 => config.port = port,
                _ => {
                    eprintln!("Invalid port number: {port_str}");
                    std::process::exit(1);
                }
            }
        } else {
            eprintln!("--port flag requires a value");
            std::process::exit(1);
        }
    }

    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| config.log_level.clone());
    tracing_subscriber::registry()
        .with(EnvFilter::new(log_level))
        .with(
            tracing_subscriber::fmt::layer()
                .compact() // Use the compact, single-line format.
                .with_ansi(true),
        )
        .init();

    let services = ActionServices::system(&config.actions);
    let server = Server::new(config.clone(), services);
    server.events().log("Nexron command listener initialized");

    if let Err(e) = server.start(config.port).await {
        error!("Server runtime error: {}", e);
        server.events().flush().await;
        return Err(e.into());
    }

    wait_for_shutdown_signal().await?;

    server.stop().await;
    server.events().flush().await;
    info!("Server shutdown complete.");
    Ok(())
}

fn load_config_or_exit(path: &str) -> Config {
    match Config::from_file(path) {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration from \"{path}\": {e:#}");
            std::process::exit(1);
        }
    }
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut sigterm = signal(SignalKind::terminate())?;
    tokio::select! {
        res = tokio::signal::ctrl_c() => {
            res?;
            info!("SIGINT received, initiating graceful shutdown.");
        }
        _ = sigterm.recv() => {
            info!("SIGTERM received, initiating graceful shutdown.");
        }
    }
    Ok(())
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c().await?;
    info!("Ctrl-C received, initiating graceful shutdown.");
    Ok(())
}
