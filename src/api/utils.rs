//! `/utils` routes: file browsing and upload inside the data directory.

use std::path::{Path, PathBuf};

use axum::extract::{DefaultBodyLimit, Multipart, Query, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use walkdir::WalkDir;

use super::{ApiError, ApiResult, AppState};
use crate::datasource::{FileType, TextEncoding};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 64 * 1024 * 1024;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/files", get(list_files))
        .route(
            "/upload",
            post(upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)),
        )
        .route("/file-types", get(file_types))
        .route("/encodings", get(encodings))
}

#[derive(Debug, Default, Deserialize)]
pub struct FilesQuery {
    #[serde(default)]
    pub directory: String,
}

#[derive(Debug, Serialize)]
pub struct FileList {
    pub files: Vec<String>,
}

/// Lists the direct children of `directory` (relative to the data
/// directory). Paths are returned relative to the data directory;
/// directories carry a trailing `/`.
pub fn list_dir(data_dir: &Path, directory: &Path) -> std::io::Result<Vec<String>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(std::io::Error::other)?;
        let relative = entry.path().strip_prefix(data_dir).unwrap_or(entry.path());
        let mut name = relative.to_string_lossy().replace('\\', "/");
        if entry.file_type().is_dir() {
            name.push('/');
        }
        files.push(name);
    }
    Ok(files)
}

/// GET /utils/files?directory=
async fn list_files(State(state): State<AppState>, Query(query): Query<FilesQuery>) -> ApiResult<Json<FileList>> {
    let data_dir = state.config.data_dir.clone();
    let directory = state.config.resolve_in_data_dir(&query.directory)?;

    if directory == data_dir {
        tokio::fs::create_dir_all(&data_dir)
            .await
            .map_err(crate::error::ConfigError::from)?;
    } else if !tokio::fs::metadata(&directory).await.map(|m| m.is_dir()).unwrap_or(false) {
        return Err(ApiError::BadRequest(format!("'{}' is not a directory", query.directory)));
    }

    let files = tokio::task::spawn_blocking(move || list_dir(&data_dir, &directory))
        .await
        .map_err(|e| ApiError::Internal(e.to_string()))?
        .map_err(crate::error::ConfigError::from)?;
    Ok(Json(FileList { files }))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub filename: String,
    pub path: String,
    pub message: String,
}

/// The final component of a client-supplied file name.
fn sanitize_file_name(name: &str) -> Option<String> {
    let normalized = name.replace('\\', "/");
    Path::new(&normalized)
        .file_name()
        .and_then(|n| n.to_str())
        .filter(|n| !n.is_empty() && *n != "." && *n != "..")
        .map(String::from)
}

/// POST /utils/upload (multipart: `file`, optional `directory`)
async fn upload(State(state): State<AppState>, mut multipart: Multipart) -> ApiResult<Json<UploadResponse>> {
    let mut directory = String::new();
    let mut file: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(e.to_string()))?
    {
        match field.name() {
            Some("directory") => {
                directory = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
            }
            Some("file") => {
                let name = field
                    .file_name()
                    .and_then(sanitize_file_name)
                    .ok_or_else(|| ApiError::BadRequest("uploaded file has no usable name".to_string()))?;
                let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                file = Some((name, bytes.to_vec()));
            }
            _ => {}
        }
    }

    let (filename, bytes) = file.ok_or_else(|| ApiError::BadRequest("missing 'file' field".to_string()))?;
    let target_dir: PathBuf = state.config.resolve_in_data_dir(&directory)?;
    let target = target_dir.join(&filename);

    tokio::fs::create_dir_all(&target_dir)
        .await
        .map_err(crate::error::ConfigError::from)?;
    tokio::fs::write(&target, &bytes)
        .await
        .map_err(crate::error::ConfigError::from)?;

    let path = target
        .strip_prefix(&state.config.data_dir)
        .unwrap_or(&target)
        .to_string_lossy()
        .replace('\\', "/");
    tracing::info!(path = %path, bytes = bytes.len(), "Uploaded file");

    Ok(Json(UploadResponse {
        message: format!("File '{}' uploaded successfully", filename),
        filename,
        path,
    }))
}

/// GET /utils/file-types
async fn file_types() -> Json<Value> {
    Json(json!({ "types": FileType::NAMES }))
}

/// GET /utils/encodings
async fn encodings() -> Json<Value> {
    Json(json!({ "encodings": TextEncoding::NAMES }))
}
