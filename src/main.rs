// src/main.rs
use axum::{routing::get, Router};
use clap::Parser;
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::path::PathBuf;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use loggate::config::Config;
use loggate::handlers::health::{health_check, metrics_endpoint};
use loggate::handlers::items::{fail, get_item};
use loggate::observer::TracingObserver;
use loggate::{json_logger, JsonLogger};

#[derive(Parser, Debug)]
#[command(name = "loggate", about = "HTTP server with JSON request logging")]
struct Cli {
    /// Port to listen on (overrides `server.port`)
    #[arg(short, long)]
    port: Option<u16>,

    /// Directory for request log files; standard streams when omitted
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Expose error details in failed responses
    #[arg(long)]
    surface_errors: bool,
}

/// Main entry point
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    // Load configuration
    let mut cfg = Config::from_env()?;
    if let Some(port) = cli.port {
        cfg.server.port = port;
    }
    if cli.log_dir.is_some() {
        cfg.request_log.path = cli.log_dir;
    }
    cfg.request_log.surface_errors |= cli.surface_errors;

    // Diagnostics go to stderr; stdout belongs to the info channel.
    tracing_subscriber::registry()
        .with(EnvFilter::new(&cfg.logging.level))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("🚀 Server starting...");
    tracing::info!(?cfg, "⚙️ Loaded configuration");

    if let Some(dir) = &cfg.request_log.path {
        std::fs::create_dir_all(dir)?;
    }
    let logger = JsonLogger::builder(cfg.request_log.clone())
        .on_error(TracingObserver)
        .build();
    tracing::info!(?logger, "✅ Request logger ready");

    let metrics_handle = PrometheusBuilder::new().install_recorder()?;

    let app = Router::new()
        .route("/healthz", get(health_check))
        .route("/items/{id}", get(get_item))
        .route("/fail", get(fail))
        .route(
            "/metrics",
            get({
                let handle = metrics_handle.clone();
                move || async move { metrics_endpoint(handle.clone()).await }
            }),
        )
        .layer(
            ServiceBuilder::new()
                .layer(CorsLayer::permissive())
                .layer(axum::middleware::from_fn_with_state(logger, json_logger)),
        );

    let addr = SocketAddr::from(([0, 0, 0, 0], cfg.server.port));
    tracing::info!(%addr, "🌐 Server running");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to install Ctrl+C handler");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install terminate signal handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    #[cfg(not(unix))]
    ctrl_c.await;

    tracing::info!("⚡ Shutdown signal received");
}
