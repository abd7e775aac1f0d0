//! REST API.
//!
//! All resource routes are mounted under the configured prefix
//! (`/api/v1` by default):
//!
//! | Path | Handler |
//! |------|---------|
//! | `/datasources/*` | [`datasources`] |
//! | `/llms/*` | [`llms`] |
//! | `/datasets/generators/*`, `/datasets/:generation_id/*` | [`datasets`] |
//! | `/generate` | [`generate`] |
//! | `/utils/*` | [`utils`] |
//! | `/config/settings` | [`settings`] |
//!
//! `/health` and `/metrics` sit at the root.

pub mod datasets;
pub mod datasources;
pub mod error;
pub mod generate;
pub mod llms;
mod plugins;
pub mod settings;
pub mod utils;

pub use error::{ApiError, ApiResult};

use std::sync::Arc;

use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::{ServerConfig, SettingsStore};
use crate::service::ForgeService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<ForgeService>,
    pub config: Arc<ServerConfig>,
    pub settings: Arc<SettingsStore>,
}

impl AppState {
    pub fn new(service: Arc<ForgeService>, config: ServerConfig) -> Self {
        let settings = Arc::new(SettingsStore::new(config.settings_file.clone()));
        Self {
            service,
            config: Arc::new(config),
            settings,
        }
    }
}

/// Routes below the API prefix, without layers.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/datasources", datasources::routes())
        .nest("/llms", llms::routes())
        .nest("/datasets", datasets::routes())
        .merge(generate::routes())
        .nest("/utils", utils::routes())
        .nest("/config", settings::routes())
}

/// The complete application.
pub fn router(state: AppState) -> Router {
    let prefix = state.config.api_prefix.clone();
    let api = if prefix == "/" {
        api_routes()
    } else {
        Router::new().nest(&prefix, api_routes())
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/metrics", get(crate::metrics::metrics_handler))
        .merge(api)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Binds `config.socket_addr()` and serves until the process is stopped.
pub async fn serve(state: AppState) -> anyhow::Result<()> {
    let addr = state.config.socket_addr()?;
    let prefix = state.config.api_prefix.clone();
    let app = router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, api_prefix = %prefix, "Server listening");
    axum::serve(listener, app).await?;
    Ok(())
}
