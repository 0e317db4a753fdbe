//! `solace-server` entry point.
//!
//! Loads the layered configuration, builds the HTTP-backed services and
//! serves the edge endpoints until Ctrl+C.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use solace_core::{ConfigLoader, Endpoint, Gateway, Services};
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(version, about = "Serves the Solace account and completion endpoints")]
struct Cli {
    /// TOML file layered under the environment.
    #[arg(long, env = "SOLACE_CONFIG")]
    config: Option<PathBuf>,

    /// Address to listen on.
    #[arg(long, env = "SOLACE_BIND", default_value = "0.0.0.0:8080")]
    bind: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    tracing::info!("solace-server v{} starting", env!("CARGO_PKG_VERSION"));

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_file(path);
    }
    let config = loader.load().context("loading configuration")?;
    tracing::debug!("effective config: {config:?}");

    let services = Services::from_config(&config).context("building http clients")?;
    let gateway = Arc::new(Gateway::new(config, services));

    // Missing credentials are reported per request, so a partial config
    // still starts and answers with server_misconfigured.
    for endpoint in Endpoint::all() {
        let missing = gateway.config().missing(endpoint.required_settings());
        if !missing.is_empty() {
            tracing::warn!("{} is missing {}", endpoint.path(), missing.join(", "));
        }
    }

    let listener = TcpListener::bind(cli.bind)
        .await
        .with_context(|| format!("binding {}", cli.bind))?;

    solace_server::serve(listener, gateway, async {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("signal received, shutting down");
    })
    .await?;

    tracing::info!("solace-server exiting cleanly");
    Ok(())
}
