//! `POST /generate`: one-shot generation.
//!
//! Creates the data source and the LLM from the request body, generates, and
//! answers with parsed records ready for display.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::{Map, Value};

use super::{ApiResult, AppState};
use crate::export::{parse_records, Record};
use crate::service::OneShotRequest;

pub fn routes() -> Router<AppState> {
    Router::new().route("/generate", post(generate))
}

#[derive(Debug, Serialize)]
pub struct OneShotResponse {
    pub data: Vec<Record>,
    pub metadata: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

async fn generate(State(state): State<AppState>, Json(req): Json<OneShotRequest>) -> ApiResult<Json<OneShotResponse>> {
    let (run, datasource_id, llm_id) = state.service.generate_once(req).await?;

    let mut metadata = run.dataset.metadata.clone();
    metadata.insert("generation_id".to_string(), Value::String(run.generation_id));
    metadata.insert("datasource_id".to_string(), Value::String(datasource_id));
    metadata.insert("llm_id".to_string(), Value::String(llm_id));
    metadata.insert("format".to_string(), Value::String(run.dataset.format.as_str().to_string()));

    Ok(Json(OneShotResponse {
        data: parse_records(&run.dataset),
        metadata,
        error: run.dataset.error,
    }))
}
