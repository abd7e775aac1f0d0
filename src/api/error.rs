//! Mapping of service errors onto HTTP responses.
//!
//! Every failure leaves the server as `{"error": {"code", "message"}}`.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;

use crate::error::{ConfigError, ExportError, GenerationError, RegistryError, ServiceError};
use crate::schema::FormError;

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

/// An error returned by a REST handler.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Form(#[from] FormError),
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    /// Stable machine-readable code and the status it maps to.
    pub fn classify(&self) -> (StatusCode, &'static str) {
        const NOT_FOUND: (StatusCode, &str) = (StatusCode::NOT_FOUND, "not_found");
        const VALIDATION: (StatusCode, &str) = (StatusCode::UNPROCESSABLE_ENTITY, "validation_error");
        const EXTRACTION: (StatusCode, &str) = (StatusCode::UNPROCESSABLE_ENTITY, "extraction_error");
        const GENERATION: (StatusCode, &str) = (StatusCode::BAD_GATEWAY, "generation_error");
        const INTERNAL: (StatusCode, &str) = (StatusCode::INTERNAL_SERVER_ERROR, "internal");

        match self {
            Self::Service(err) => match err {
                ServiceError::Registry(e) if e.is_not_found() => NOT_FOUND,
                ServiceError::Registry(RegistryError::DuplicatePlugin { .. }) => INTERNAL,
                ServiceError::Registry(_) => VALIDATION,
                ServiceError::Extraction(_) => EXTRACTION,
                ServiceError::Generation(GenerationError::NoDocuments) => EXTRACTION,
                ServiceError::Generation(GenerationError::InvalidPlan(_)) => VALIDATION,
                ServiceError::Generation(GenerationError::Prompt(_)) => INTERNAL,
                ServiceError::Generation(_) | ServiceError::Llm(_) => GENERATION,
                ServiceError::Export(ExportError::InvalidFormat(_)) => VALIDATION,
                ServiceError::Export(_) => INTERNAL,
                ServiceError::InvalidRequest(_) => VALIDATION,
            },
            Self::Config(ConfigError::InvalidValue { .. } | ConfigError::PathOutsideDataDir(_)) => VALIDATION,
            Self::Config(_) => INTERNAL,
            Self::Form(_) => INTERNAL,
            Self::BadRequest(_) => VALIDATION,
            Self::Internal(_) => INTERNAL,
        }
    }

    pub fn code(&self) -> &'static str {
        self.classify().1
    }

    pub fn status(&self) -> StatusCode {
        self.classify().0
    }
}

impl From<RegistryError> for ApiError {
    fn from(err: RegistryError) -> Self {
        Self::Service(err.into())
    }
}

impl From<ExportError> for ApiError {
    fn from(err: ExportError) -> Self {
        Self::Service(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.classify();
        if status.is_server_error() {
            tracing::error!(code, error = %self, "Request failed");
        } else {
            tracing::debug!(code, error = %self, "Request rejected");
        }
        let body = ErrorEnvelope {
            error: ErrorBody {
                code: code.to_string(),
                message: self.to_string(),
            },
        };
        (status, Json(body)).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ExtractionError, LlmError, ValidationError};

    #[test]
    fn test_codes() {
        let not_found: ApiError = ServiceError::from(RegistryError::InstanceNotFound {
            kind: "LLM".to_string(),
            id: "llm_x".to_string(),
        })
        .into();
        assert_eq!(not_found.classify(), (StatusCode::NOT_FOUND, "not_found"));

        let invalid: ApiError = ServiceError::from(RegistryError::Validation(ValidationError::MissingRequired {
            property: "file_path".to_string(),
        }))
        .into();
        assert_eq!(invalid.code(), "validation_error");
        assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let extraction: ApiError = ServiceError::from(ExtractionError::FileNotFound("a.txt".to_string())).into();
        assert_eq!(extraction.code(), "extraction_error");

        let generation: ApiError = ServiceError::from(GenerationError::Provider {
            completed: 0,
            requested: 5,
            source: LlmError::ApiError {
                code: 401,
                message: "Invalid API key".to_string(),
            },
        })
        .into();
        assert_eq!(generation.status(), StatusCode::BAD_GATEWAY);

        let escape: ApiError = ConfigError::PathOutsideDataDir("../x".to_string()).into();
        assert_eq!(escape.code(), "validation_error");
        assert_eq!(ApiError::Internal("boom".to_string()).code(), "internal");
    }
}
