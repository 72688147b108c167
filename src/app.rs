use crate::cli::Args;
use crate::AppState;
use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use clap::Parser;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tower_http::compression::predicate::{
    NotForContentType, Predicate, SizeAbove,
};
use tower_http::compression::CompressionLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{prelude::*, Registry};
use tracing_tree::HierarchicalLayer;

#[derive(Debug, Deserialize)]
pub struct VideoParams {
    file: Option<String>,
    index: Option<u64>,
}

// Health check endpoint
#[instrument]
pub async fn health_check() -> &'static str {
    debug!("Health check requested");
    "ok"
}

#[instrument(skip(state))]
async fn get_video(
    State(state): State<Arc<AppState>>,
    Query(params): Query<VideoParams>,
) -> Result<Response, (StatusCode, String)> {
    let file = params.file.unwrap_or_default();
    let index = params.index.unwrap_or(0);

    let result = state.pipeline.fetch(&file, index).await.map_err(|e| {
        error!("Fetching '{}' at index {} failed: {}", file, index, e);
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;
    let body = result
        .to_json_pretty()
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    Ok(([(header::CONTENT_TYPE, "application/json")], body).into_response())
}

/// Front-end configuration, re-read on every request so edits show up
/// without a restart.
async fn get_config(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Value>, (StatusCode, String)> {
    let path = &state.config_path;
    let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Could not read {}: {}", path.display(), e),
        )
    })?;
    let config: Value = serde_json::from_str(&contents).map_err(|e| {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("Invalid JSON in {}: {}", path.display(), e),
        )
    })?;
    Ok(Json(config))
}

pub fn routes(state: Arc<AppState>) -> Router {
    let predicate = SizeAbove::new(32)
        // don't compress images
        .and(NotForContentType::IMAGES);

    let compression_layer = CompressionLayer::new()
        .br(true)
        .deflate(true)
        .gzip(true)
        .zstd(true)
        .compress_when(predicate);

    // ServeDir maps directory requests, including `/`, to index.html.
    let static_files = ServeDir::new(&state.static_dir);

    Router::new()
        .route("/healthz", get(health_check))
        .route("/video", get(get_video))
        .route("/config.json", get(get_config))
        .fallback_service(static_files)
        .layer(compression_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn serve() -> Result<()> {
    // Initialize logging with tracing
    let subscriber = Registry::default()
        .with(
            HierarchicalLayer::new(2)
                .with_targets(true)
                .with_bracketed_fields(true),
        )
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,tower_http=debug".into()),
        );

    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    // Parse command line arguments
    let args = Args::parse();

    info!("Starting yt8m viewer");

    tokio::fs::create_dir_all(&args.root).await.with_context(|| {
        format!("Failed to create root directory {}", args.root.display())
    })?;

    let state = crate::create_app_state(crate::AppConfig {
        pipeline: args.pipeline_config(),
        static_dir: args.static_dir.clone(),
        config_path: args.config.clone(),
        http_timeout: args.http_timeout(),
    })?;

    // Requests fail until these show up, but the static site still works.
    if let Err(e) = state.pipeline.runner().check_dependencies() {
        warn!("Inference is unavailable: {}", e);
    }
    if args.config.exists() {
        info!("Serving front-end config from {}", args.config.display());
    } else {
        warn!("Front-end config {} not found", args.config.display());
    }
    info!("Serving static assets from {}", args.static_dir.display());

    let app = routes(state);
    let listener =
        tokio::net::TcpListener::bind((args.host.as_str(), args.port))
            .await
            .with_context(|| {
                format!("Failed to bind {}:{}", args.host, args.port)
            })?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL-C, initiating shutdown");
            }
        })
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
