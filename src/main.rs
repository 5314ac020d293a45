//! Binary entrypoint: boots the Axum HTTP server, wiring the bias pipeline,
//! the retrieval layer, and middleware.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use newslens::api::{self, AppState};
use newslens::bias::source_map::SourceBiasTable;
use newslens::bias::worker::WorkerClassifier;
use newslens::bias::BiasService;
use newslens::config::AppConfig;
use newslens::metrics::Metrics;
use newslens::retrieval::NewsService;

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("newslens=info,warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cfg = AppConfig::from_env();
    let metrics = Metrics::init();

    let table = SourceBiasTable::load_default();
    tracing::info!(entries = table.len(), "source bias table loaded");

    let classifier = Arc::new(WorkerClassifier::new(cfg.worker.clone()));
    let bias = Arc::new(BiasService::new(table, cfg.cache_capacity, classifier));
    let news = Arc::new(NewsService::from_config(&cfg)?);

    let app = api::router(AppState { bias, news }).merge(metrics.router());

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], cfg.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
