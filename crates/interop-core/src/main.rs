//! healthbridge interop-core server entry point.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{routing::get, Json, Router};
use interop_common::logging::{init_logging, LogConfig};
use serde_json::json;
use tokio::signal;
use tower_http::compression::CompressionLayer;
use tracing::info;

use interop_core::audit::AuditLayer;
use interop_core::catalog::JobCatalog;
use interop_core::config::Config;
use interop_core::features::{self, AppState};
use interop_core::ingestion::IngestionSupervisor;
use interop_core::mapping::{AiMappingEngine, HttpEmbeddingClient, HttpLlmClient, NullEmbeddingClient, NullLlmClient};
use interop_core::middleware;
use interop_core::omop::OmopEngine;
use interop_core::record_store::RecordStore;
use interop_core::vocabulary::VocabularyService;

#[tokio::main]
async fn main() -> Result<()> {
    let log_config = LogConfig::builder()
        .log_file_prefix("interop-core".to_string())
        .filter_directives("interop_core=debug,tower_http=debug,axum=trace,sqlx=info".to_string())
        .build();
    let log_config = LogConfig::from_env().unwrap_or(log_config);
    init_logging(&log_config)?;

    info!("Starting healthbridge interop-core");

    let config = Config::load()?;
    info!(host = %config.server.host, port = config.server.port, "configuration loaded");

    let catalog = JobCatalog::connect(&config.catalog).await?;
    let catalog_pool = catalog.pool().clone();
    info!("job catalog connected");

    let record_store = RecordStore::connect(&config.record_store).await?;
    info!("record store connected");

    let vocabulary = Arc::new(VocabularyService::new());

    let (embedding, llm): (Arc<dyn interop_core::mapping::EmbeddingClient>, Arc<dyn interop_core::mapping::LlmClient>) =
        match (&config.mapping.embedding_url, &config.mapping.llm_url) {
            (Some(embedding_url), Some(llm_url)) => {
                info!("mapping engine running with live embedding and LLM backends");
                (
                    Arc::new(HttpEmbeddingClient::new(embedding_url.clone())),
                    Arc::new(HttpLlmClient::new(llm_url.clone(), config.mapping.llm_model_name.clone())),
                )
            },
            (Some(embedding_url), None) => {
                info!("mapping engine running with a live embedding backend only (degraded LLM stage)");
                (Arc::new(HttpEmbeddingClient::new(embedding_url.clone())), Arc::new(NullLlmClient))
            },
            (None, Some(llm_url)) => {
                info!("mapping engine running with a live LLM backend only (degraded embedding stage)");
                (Arc::new(NullEmbeddingClient), Arc::new(HttpLlmClient::new(llm_url.clone(), config.mapping.llm_model_name.clone())))
            },
            (None, None) => {
                info!("no embedding/LLM backends configured, mapping engine running in degraded (lexical-only) mode");
                (Arc::new(NullEmbeddingClient), Arc::new(NullLlmClient))
            },
        };

    let mapping_engine = Arc::new(AiMappingEngine::new(Arc::clone(&embedding), Arc::clone(&llm)));
    let omop = Arc::new(OmopEngine::new(Arc::clone(&vocabulary), embedding, llm));

    let supervisor = Arc::new(IngestionSupervisor::new(catalog_pool.clone(), record_store.clone(), Arc::clone(&omop)));
    supervisor.rehydrate().await?;
    info!("ingestion supervisor rehydrated, all jobs start at IDLE");

    let state = AppState {
        catalog: catalog_pool.clone(),
        record_store,
        mapping_engine,
        vocabulary,
        omop,
        supervisor,
    };

    let app = build_router(state, &config);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal(config.server.shutdown_timeout_secs)).await?;

    info!("server shut down gracefully");
    Ok(())
}

fn build_router(state: AppState, config: &Config) -> Router {
    let catalog_for_audit = state.catalog.clone();
    let catalog_for_health = state.catalog.clone();

    Router::new()
        .route("/health", get(move || health_check(catalog_for_health.clone())))
        .nest("/api/v1", features::router(state))
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
        .layer(AuditLayer::new(catalog_for_audit))
}

async fn health_check(catalog: sqlx::SqlitePool) -> Json<serde_json::Value> {
    match sqlx::query("SELECT 1").fetch_one(&catalog).await {
        Ok(_) => Json(json!({ "status": "healthy", "catalog": "connected" })),
        Err(e) => {
            tracing::error!(error = %e, "job catalog health check failed");
            Json(json!({ "status": "unhealthy", "catalog": "disconnected" }))
        },
    }
}

/// Waits for Ctrl+C or SIGTERM, then gives in-flight requests a bounded
/// drain window before returning (spec.md §5).
async fn shutdown_signal(timeout_secs: u64) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {}", e);
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {}", e);
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("received terminate signal, starting graceful shutdown");
        },
    }

    info!(timeout_secs, "waiting for in-flight requests to drain");
    tokio::time::sleep(Duration::from_secs(timeout_secs.min(10))).await;
}
