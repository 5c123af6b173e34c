use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{error, info};

use rollwatch_sample_app::{Metrics, app_router, metrics_router};

#[derive(Parser)]
#[command(name = "sample-app", about = "Hello-world service exposing Prometheus metrics")]
struct Cli {
    /// Address to listen on for application requests
    #[arg(long, default_value = "0.0.0.0:8080")]
    listen_address: SocketAddr,

    /// Address to listen on for Prometheus scrapes
    #[arg(long, default_value = "0.0.0.0:9101")]
    prometheus_address: SocketAddr,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let metrics = Arc::new(Metrics::new());

    let metrics_listener = tokio::net::TcpListener::bind(cli.prometheus_address)
        .await
        .with_context(|| format!("binding metrics listener on {}", cli.prometheus_address))?;
    info!(address = %cli.prometheus_address, "serving Prometheus metrics");

    let metrics_app = metrics_router(metrics.clone());
    tokio::spawn(async move {
        if let Err(e) = axum::serve(metrics_listener, metrics_app).await {
            error!(error = %e, "metrics listener failed");
        }
    });

    let listener = tokio::net::TcpListener::bind(cli.listen_address)
        .await
        .with_context(|| format!("binding application listener on {}", cli.listen_address))?;
    info!(address = %cli.listen_address, "serving application");

    axum::serve(listener, app_router(metrics))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("shutdown signal received");
        })
        .await
        .context("application listener failed")?;

    Ok(())
}
