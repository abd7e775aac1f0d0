//! `/datasets` routes: generator instances, generation and export.

use axum::extract::{Path, Query, State};
use axum::http::header;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;

use super::{plugins, ApiResult, AppState};
use crate::export::ExportFormat;
use crate::generator::Dataset;
use crate::registry::PluginKind;
use crate::service::{GenerateRequest, GenerationRun};

pub fn routes() -> Router<AppState> {
    let generators = plugins::routes(PluginKind::Generator).route("/:instance_id/generate", post(generate));

    Router::new()
        .nest("/generators", generators)
        .route("/:generation_id", get(run))
        .route("/:generation_id/export", get(export))
}

/// POST /datasets/generators/:instance_id/generate
async fn generate(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    Json(req): Json<GenerateRequest>,
) -> ApiResult<Json<GenerationRun>> {
    let run = state.service.generate(&instance_id, req).await?;
    Ok(Json(run))
}

/// GET /datasets/:generation_id
async fn run(State(state): State<AppState>, Path(generation_id): Path<String>) -> ApiResult<Json<Dataset>> {
    let dataset = state.service.run(&generation_id).await?;
    Ok(Json(dataset.as_ref().clone()))
}

#[derive(Debug, Deserialize)]
pub struct ExportQuery {
    #[serde(default)]
    pub format: Option<String>,
}

/// GET /datasets/:generation_id/export?format=json|csv|text
async fn export(
    State(state): State<AppState>,
    Path(generation_id): Path<String>,
    Query(query): Query<ExportQuery>,
) -> ApiResult<impl IntoResponse> {
    let format = match query.format.as_deref() {
        Some(name) => name.parse::<ExportFormat>()?,
        None => ExportFormat::default(),
    };
    let body = state.service.export(&generation_id, format).await?;
    let disposition = format!("attachment; filename=\"{}.{}\"", generation_id, format.extension());
    Ok((
        [
            (header::CONTENT_TYPE, format.content_type().to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    ))
}
