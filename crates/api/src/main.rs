mod app;
mod config;
mod metrics;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use index::{DimensionAdapter, Embedder, GeminiEmbedder, QdrantIndex};
use provider::GeminiClient;
use query::{GeminiGenerator, RetrievalPipeline, TitleGenerator};

use crate::app::AppState;
use crate::config::AppConfig;
use crate::metrics::Metrics;

/// Set to `json` for one JSON object per log line.
const LOG_FORMAT_ENV: &str = "DOCCHAT_LOG_FORMAT";

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_FORMAT_ENV)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    init_tracing();

    let config = AppConfig::load().context("Failed to load configuration")?;

    // One Gemini client for embedding and generation, built on first use
    let gemini = GeminiClient::shared(config.gemini_settings());

    let embedder = DimensionAdapter::new(
        GeminiEmbedder::new(
            gemini.clone(),
            config.gemini.embedding_model.clone(),
            config.gemini.native_dimensions,
        ),
        config.retrieval.target_dimensions,
    );

    // Create Qdrant index (using REST API)
    let qdrant = QdrantIndex::new(
        config.qdrant.url.clone(),
        config.qdrant.collection.clone(),
        config.request_timeout(),
    )
    .context("Failed to create Qdrant client")?;

    if let Err(e) = qdrant.ensure_collection(embedder.dimensions()).await {
        tracing::warn!(
            collection = %qdrant.collection_name(),
            error = %e,
            "could not ensure collection, searches will fail until Qdrant is reachable"
        );
    }

    let generator = Arc::new(GeminiGenerator::new(
        gemini.clone(),
        config.gemini.generation_model.clone(),
    ));

    let pipeline = RetrievalPipeline::new(
        Arc::new(embedder),
        Arc::new(qdrant),
        generator.clone(),
        config.pipeline_config(),
    );

    let state = Arc::new(AppState {
        pipeline: Arc::new(pipeline),
        titles: TitleGenerator::new(generator, config.title_timeout()),
        gemini,
        metrics: Metrics::new(),
    });

    if config.server.enable_admin {
        tracing::warn!("admin routes enabled, keep this port off public networks");
    }
    let app = app::router(state, config.server.enable_admin);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.server.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.server.bind_addr))?;

    tracing::info!(
        addr = %config.server.bind_addr,
        collection = %config.qdrant.collection,
        "server listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "failed to listen for shutdown signal");
    }
    tracing::info!("shutting down");
}
