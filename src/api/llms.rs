//! `/llms` routes.

use axum::extract::{Path, State};
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};

use super::{plugins, ApiResult, AppState};
use crate::llm::CompletionOptions;
use crate::registry::PluginKind;

pub fn routes() -> Router<AppState> {
    plugins::routes(PluginKind::Llm).route("/:instance_id/generate", post(complete))
}

#[derive(Debug, Deserialize)]
pub struct CompleteRequest {
    pub prompt: String,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct CompleteResponse {
    pub text: String,
}

/// POST /llms/:instance_id/generate
async fn complete(
    State(state): State<AppState>,
    Path(instance_id): Path<String>,
    Json(req): Json<CompleteRequest>,
) -> ApiResult<Json<CompleteResponse>> {
    let options = CompletionOptions {
        temperature: req.temperature,
        max_tokens: req.max_tokens,
        seed: None,
    };
    let text = state.service.complete(&instance_id, &req.prompt, options).await?;
    Ok(Json(CompleteResponse { text }))
}
