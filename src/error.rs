//! Error types for synth-forge operations.
//!
//! Defines one error enum per subsystem:
//! - Schema validation of plugin configuration
//! - Plugin registry and instance lookups
//! - Document extraction from data sources
//! - LLM API interactions
//! - Dataset generation and export
//! - Server configuration and persisted settings
//!
//! [`ServiceError`] gathers the subsystem errors at the service boundary.

use thiserror::Error;

/// Errors raised when a configuration object does not satisfy a schema.
///
/// Every variant except `InvalidSchema` names the offending property.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    #[error("Missing required property '{property}'")]
    MissingRequired { property: String },

    #[error("Property '{property}' must be of type {expected}, got {actual}")]
    TypeMismatch {
        property: String,
        expected: String,
        actual: String,
    },

    #[error("Property '{property}' has value '{value}', expected one of: {allowed:?}")]
    NotAllowed {
        property: String,
        value: String,
        allowed: Vec<String>,
    },

    #[error("Property '{property}' is {value}, outside the allowed range [{min}, {max}]")]
    OutOfRange {
        property: String,
        value: f64,
        min: String,
        max: String,
    },

    #[error("Invalid schema '{schema}': {reason}")]
    InvalidSchema { schema: String, reason: String },
}

impl ValidationError {
    /// Name of the property that failed validation, if any.
    pub fn property(&self) -> Option<&str> {
        match self {
            Self::MissingRequired { property }
            | Self::TypeMismatch { property, .. }
            | Self::NotAllowed { property, .. }
            | Self::OutOfRange { property, .. } => Some(property),
            Self::InvalidSchema { .. } => None,
        }
    }
}

/// Errors that can occur during plugin registry and instance operations.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("{kind} plugin '{id}' not found")]
    PluginNotFound { kind: String, id: String },

    #[error("{kind} instance '{id}' not found")]
    InstanceNotFound { kind: String, id: String },

    #[error("{kind} plugin '{id}' is already registered")]
    DuplicatePlugin { kind: String, id: String },

    #[error("Invalid configuration: {0}")]
    Validation(#[from] ValidationError),

    #[error("Failed to construct '{plugin}': {reason}")]
    Construction { plugin: String, reason: String },
}

impl RegistryError {
    /// Whether this error means an identifier could not be resolved.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::PluginNotFound { .. } | Self::InstanceNotFound { .. }
        )
    }
}

/// Errors that can occur while loading documents from a data source.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Failed to read '{path}': {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode '{path}' as {encoding}: {reason}")]
    Decode {
        path: String,
        encoding: String,
        reason: String,
    },

    #[error("Unsupported file type: {0}")]
    UnsupportedFileType(String),

    #[error("Unsupported encoding: {0}")]
    UnsupportedEncoding(String),

    #[error("Malformed JSON in '{path}': {reason}")]
    Json { path: String, reason: String },

    #[error("Malformed CSV in '{path}': {reason}")]
    Csv { path: String, reason: String },

    #[error("Failed to extract text from PDF '{path}': {reason}")]
    Pdf { path: String, reason: String },

    #[error("Failed to fetch '{url}': {reason}")]
    Http { url: String, reason: String },
}

/// Errors that can occur during LLM operations.
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Missing API key for provider '{0}'")]
    MissingApiKey(String),

    #[error("HTTP request failed: {0}")]
    RequestFailed(String),

    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("API error ({code}): {message}")]
    ApiError { code: u16, message: String },

    #[error("LLM returned no content")]
    EmptyResponse,
}

/// Errors that can occur while generating a dataset.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("No documents to generate from")]
    NoDocuments,

    #[error("Invalid generation parameters: {0}")]
    InvalidPlan(String),

    #[error("Generation failed after {completed} of {requested} items: {source}")]
    Provider {
        completed: usize,
        requested: usize,
        #[source]
        source: LlmError,
    },

    #[error("Generation stalled after {completed} of {requested} items: {attempts} consecutive batches produced nothing")]
    Stalled {
        completed: usize,
        requested: usize,
        attempts: usize,
    },

    #[error("Prompt rendering failed: {0}")]
    Prompt(#[from] tera::Error),
}

/// Errors that can occur during dataset export.
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("Invalid export format: {0}")]
    InvalidFormat(String),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors that can occur while loading configuration or persisted settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Path '{0}' escapes the data directory")]
    PathOutsideDataDir(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors surfaced by the service layer shared by the CLI, REST API and workflow.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    Export(#[from] ExportError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl From<ValidationError> for ServiceError {
    fn from(err: ValidationError) -> Self {
        Self::Registry(RegistryError::Validation(err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_error_names_property() {
        let err = ValidationError::MissingRequired {
            property: "model_id".to_string(),
        };
        assert_eq!(err.property(), Some("model_id"));
        assert!(err.to_string().contains("model_id"));

        let err = ValidationError::InvalidSchema {
            schema: "x".to_string(),
            reason: "bad".to_string(),
        };
        assert_eq!(err.property(), None);
    }

    #[test]
    fn test_registry_error_not_found() {
        let err = RegistryError::PluginNotFound {
            kind: "LLM".to_string(),
            id: "nope".to_string(),
        };
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "LLM plugin 'nope' not found");

        let err = RegistryError::from(ValidationError::MissingRequired {
            property: "file_path".to_string(),
        });
        assert!(!err.is_not_found());
    }
}
