//! Catalog and instance routes shared by every plugin kind.
//!
//! Each kind exposes the same five routes below its own mount point:
//! `GET /plugins`, `GET /plugins/:plugin_id`, `GET /plugins/:plugin_id/form`,
//! `POST /create` and `GET /:instance_id/info`.

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};

use super::{ApiError, ApiResult, AppState};
use crate::registry::{InstanceInfo, PluginDescriptor, PluginKind};
use crate::schema::{render_form, ConfigMap, FormField};

pub(crate) fn routes(kind: PluginKind) -> Router<AppState> {
    Router::new()
        .route(
            "/plugins",
            get(move |State(state): State<AppState>| list(state, kind)),
        )
        .route(
            "/plugins/:plugin_id",
            get(move |State(state): State<AppState>, Path(plugin_id): Path<String>| describe(state, kind, plugin_id)),
        )
        .route(
            "/plugins/:plugin_id/form",
            get(move |State(state): State<AppState>, Path(plugin_id): Path<String>| form(state, kind, plugin_id)),
        )
        .route(
            "/create",
            post(move |State(state): State<AppState>, Json(config): Json<ConfigMap>| create(state, kind, config)),
        )
        .route(
            "/:instance_id/info",
            get(move |State(state): State<AppState>, Path(instance_id): Path<String>| info(state, kind, instance_id)),
        )
}

/// Response key carrying a new instance id.
pub(crate) fn id_field(kind: PluginKind) -> &'static str {
    match kind {
        PluginKind::DataSource => "datasource_id",
        PluginKind::Llm => "llm_id",
        PluginKind::Generator => "generator_id",
    }
}

/// Descriptors keyed by plugin id, in registration order.
pub(crate) fn descriptor_map(descriptors: Vec<&PluginDescriptor>) -> ApiResult<Map<String, Value>> {
    descriptors
        .into_iter()
        .map(|d| {
            serde_json::to_value(d)
                .map(|v| (d.id.clone(), v))
                .map_err(|e| ApiError::Internal(e.to_string()))
        })
        .collect()
}

async fn list(state: AppState, kind: PluginKind) -> ApiResult<Json<Map<String, Value>>> {
    Ok(Json(descriptor_map(state.service.catalog().list(kind))?))
}

async fn describe(state: AppState, kind: PluginKind, plugin_id: String) -> ApiResult<Json<PluginDescriptor>> {
    let descriptor = state
        .service
        .catalog()
        .describe(kind, &plugin_id)?;
    Ok(Json(descriptor.clone()))
}

async fn form(state: AppState, kind: PluginKind, plugin_id: String) -> ApiResult<Json<Vec<FormField>>> {
    let descriptor = state
        .service
        .catalog()
        .describe(kind, &plugin_id)?;
    Ok(Json(render_form(&descriptor.config_schema)?))
}

async fn create(state: AppState, kind: PluginKind, config: ConfigMap) -> ApiResult<Json<Value>> {
    let instance_id = state.service.create(kind, config).await?;
    let mut body = Map::new();
    body.insert("status".to_string(), json!("success"));
    body.insert(id_field(kind).to_string(), json!(instance_id));
    Ok(Json(Value::Object(body)))
}

async fn info(state: AppState, kind: PluginKind, instance_id: String) -> ApiResult<Json<InstanceInfo>> {
    Ok(Json(state.service.info(kind, &instance_id).await?))
}
