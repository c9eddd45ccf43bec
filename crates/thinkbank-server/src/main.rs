//! thinkbank HTTP server.
//!
//! Accepts uploads, runs the normalize/embed pipeline in-process, and serves
//! hybrid search over the ingested assets.

mod config;
mod handlers;
mod logging;

use std::sync::Arc;

use axum::{
    extract::DefaultBodyLimit,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tower_http::{
    cors::CorsLayer, limit::RequestBodyLimitLayer, services::ServeDir, trace::TraceLayer,
};
use tracing::{error, info, warn};

use thinkbank_core::{AssetRepository, AssetSearchIndex, InferenceBackend, StorageService};
use thinkbank_db::{create_pool_with_config, Database, PoolConfig};
use thinkbank_inference::HttpInferenceBackend;
use thinkbank_jobs::{AssetPayload, IngestionPipeline, PipelineConfig, TopicQueue, UploadService};
use thinkbank_media::{ImageDecoder, HEIF_SUPPORTED};
use thinkbank_search::HybridSearchEngine;

use config::{ServerConfig, StorageLayout};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    assets: Arc<dyn AssetRepository>,
    uploads: Arc<UploadService>,
    search: Arc<HybridSearchEngine>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = logging::init();

    let config = ServerConfig::from_env();
    let pipeline_config = PipelineConfig::from_env();
    info!(
        host = %config.host,
        port = config.port,
        upload_root = %config.upload_root.display(),
        normalize_workers = pipeline_config.normalize_workers,
        embed_workers = pipeline_config.embed_workers,
        heif = HEIF_SUPPORTED,
        "Starting thinkbank server"
    );
    if !HEIF_SUPPORTED {
        warn!("Built without the `heif` feature; only mislabelled .heic/.heif uploads will decode");
    }

    let pool_config = PoolConfig::from_env().with_worker_headroom(
        pipeline_config.normalize_workers + pipeline_config.embed_workers,
    );
    let pool = create_pool_with_config(&config.database_url, pool_config).await?;
    let db = Database::new(pool);

    let layout = config.storage_layout();
    layout.validate().await?;

    let inference = HttpInferenceBackend::from_env();
    match inference.health_check().await {
        Ok(true) => info!("Model service is reachable"),
        Ok(false) => warn!("Model service reported unhealthy; captions will fail until it recovers"),
        Err(e) => warn!(error = %e, "Model service is unreachable; captions will fail until it recovers"),
    }
    let inference: Arc<dyn InferenceBackend> = Arc::new(inference);
    let assets: Arc<dyn AssetRepository> = Arc::new(db.assets.clone());
    let index: Arc<dyn AssetSearchIndex> = Arc::new(db.search.clone());

    let queue = TopicQueue::<AssetPayload>::new(pipeline_config.queue.clone());
    let pipeline = IngestionPipeline::new(
        pipeline_config,
        queue.clone(),
        assets.clone(),
        Arc::new(layout.normalized.clone()),
        Arc::new(ImageDecoder::new()),
        inference.clone(),
    );
    pipeline.start()?;

    let state = AppState {
        assets: assets.clone(),
        uploads: Arc::new(UploadService::new(
            assets.clone(),
            Arc::new(layout.original.clone()),
            queue,
        )),
        search: Arc::new(HybridSearchEngine::new(
            index,
            assets,
            inference,
            Arc::new(layout.tmp.clone()) as Arc<dyn StorageService>,
        )),
    };

    let app = build_router(state, &layout, config.max_upload_bytes);
    let addr = config.bind_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(%addr, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("HTTP server stopped, draining pipeline");
    pipeline.shutdown().await;
    info!("Shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
    }
}

fn build_router(state: AppState, layout: &StorageLayout, max_upload_bytes: usize) -> Router {
    let mut app = Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/upload", post(handlers::upload::upload_files))
        .route("/api/v1/files", get(handlers::files::list_files))
        .route("/api/v1/files/:id", get(handlers::files::get_file))
        .route("/api/v1/search", get(handlers::search::search_text))
        .route("/api/v1/search/image", post(handlers::search::search_image))
        .with_state(state);

    // The model service fetches normalized files and query images by URL.
    for (route, dir) in layout.routes() {
        app = app.nest_service(&route, ServeDir::new(dir));
    }

    app.layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(RequestBodyLimitLayer::new(max_upload_bytes))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// =============================================================================
// ERROR HANDLING
// =============================================================================

#[derive(Debug)]
enum ApiError {
    Internal(thinkbank_core::Error),
    NotFound(String),
    BadRequest(String),
    Unprocessable(String),
    BadGateway(String),
}

impl From<thinkbank_core::Error> for ApiError {
    fn from(err: thinkbank_core::Error) -> Self {
        use thinkbank_core::Error;
        match err {
            Error::NotFound(_) | Error::AssetNotFound(_) => ApiError::NotFound(err.to_string()),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Decode(_) => ApiError::Unprocessable(err.to_string()),
            Error::Upstream(_) | Error::Transport(_) => ApiError::BadGateway(err.to_string()),
            other => ApiError::Internal(other),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::Internal(err) => {
                error!(error = %err, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unprocessable(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body = Json(json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}
