//! synth-forge: synthetic training data generation from documents.
//!
//! Documents are loaded through data-source plugins, sent in batches to an
//! LLM plugin, and the responses are collected into a dataset of the chosen
//! format (QA pairs, instructions, conversations, classification examples or
//! plain text). The same operations back the REST API ([`api`]), the CLI
//! ([`cli`]) and the step-by-step wizard ([`workflow`]).

pub mod api;
pub mod cli;
pub mod config;
pub mod datasource;
pub mod error;
pub mod export;
pub mod generator;
pub mod llm;
pub mod metrics;
pub mod registry;
pub mod schema;
pub mod service;
pub mod utils;
pub mod workflow;

pub use error::{
    ConfigError, ExportError, ExtractionError, GenerationError, LlmError, RegistryError, ServiceError,
    ValidationError,
};
pub use service::ForgeService;
