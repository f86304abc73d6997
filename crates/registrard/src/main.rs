//! registrard — the registrar daemon.
//!
//! Registers the services listed in a config file with Eureka, keeps
//! their status in line with their health endpoints, renews their leases
//! and removes them again on shutdown.
//!
//! # Usage
//!
//! ```text
//! registrard run --config /etc/registrar/registrar.toml
//! registrard ping --registry http://eureka:8761/eureka
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use registrar::EurekaAdapter;
use registrar_core::RegistrarConfig;
use registrar_eureka::EurekaClient;

#[derive(Parser)]
#[command(name = "registrard", about = "Eureka registrar daemon")]
struct Cli {
    /// Path to the registrar config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Registry base URL, overriding the config file.
    #[arg(long, global = true)]
    registry: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Register the configured services and keep them registered.
    Run,
    /// Fetch the registry's applications once and report how many exist.
    Ping,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,registrar=debug,registrard=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let client = EurekaClient::from_config(&config.registry)?;
    info!(registry = %client.base_url(), debug = config.registry.debug, "registry client ready");
    let adapter = EurekaAdapter::from_config(Arc::new(client), &config.adapter);

    match cli.command {
        Command::Run => run(adapter, config).await,
        Command::Ping => {
            let count = adapter.ping().await?;
            println!("{count} applications registered");
            Ok(())
        }
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<RegistrarConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let config = RegistrarConfig::from_file(path)?;
            info!(path = ?path, services = config.services.len(), "config loaded");
            config
        }
        None => RegistrarConfig::default(),
    };
    config.apply_env();
    if let Some(url) = &cli.registry {
        config.registry.url = url.clone();
    }
    Ok(config)
}

async fn run(adapter: EurekaAdapter, config: RegistrarConfig) -> anyhow::Result<()> {
    info!("registrar starting");

    if let Err(e) = adapter.ping().await {
        warn!(error = %e, "initial registry ping failed, ghost detection disabled");
    }

    for service in &config.services {
        if let Err(e) = adapter.register(service).await {
            error!(service = %service.name, error = %e, "registration failed");
        }
    }

    let mut ticker = tokio::time::interval(config.adapter.refresh_interval());
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for service in &config.services {
                    if let Err(e) = adapter.refresh(service).await {
                        warn!(service = %service.name, error = %e, "refresh failed");
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("shutdown requested");
                break;
            }
        }
    }

    adapter.shutdown().await;
    for service in &config.services {
        if let Err(e) = adapter.deregister(service).await {
            warn!(service = %service.name, error = %e, "deregistration failed");
        }
    }

    info!("registrar stopped");
    Ok(())
}
