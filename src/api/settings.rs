//! `/config/settings` routes.
//!
//! Settings are stored as-is, API keys included. The server is meant to run
//! locally for a single user.

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};

use super::{ApiResult, AppState};
use crate::config::Settings;

pub fn routes() -> Router<AppState> {
    Router::new().route("/settings", get(get_settings).post(save_settings))
}

async fn get_settings(State(state): State<AppState>) -> ApiResult<Json<Settings>> {
    Ok(Json(state.settings.load().await?))
}

async fn save_settings(State(state): State<AppState>, Json(settings): Json<Settings>) -> ApiResult<Json<Settings>> {
    state.settings.save(&settings).await?;
    Ok(Json(settings))
}
