//! `/datasources` routes.

use axum::extract::{Path, State};
use axum::routing::get;
use axum::{Json, Router};

use super::{plugins, ApiResult, AppState};
use crate::datasource::Document;
use crate::registry::PluginKind;

pub fn routes() -> Router<AppState> {
    plugins::routes(PluginKind::DataSource).route("/:instance_id/load", get(load))
}

/// GET /datasources/:instance_id/load
///
/// Extracts the documents again on every call.
async fn load(State(state): State<AppState>, Path(instance_id): Path<String>) -> ApiResult<Json<Vec<Document>>> {
    let documents = state.service.load_documents(&instance_id).await?;
    Ok(Json(documents))
}
