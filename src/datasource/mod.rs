//! Data sources: where documents come from.
//!
//! A data source is built from a validated configuration by its plugin
//! factory and turns that configuration into an ordered list of
//! [`Document`]s when loaded. Built-in plugins:
//!
//! - `file_datasource`: plain text, JSON or CSV files ([`file`])
//! - `pdf_datasource`: PDF text extraction ([`pdf`])
//! - `web_datasource`: a bounded same-site crawl ([`web`])

pub mod file;
pub mod pdf;
pub mod web;

pub use file::{FileDataSource, FileType, TextEncoding};
pub use pdf::PdfDataSource;
pub use web::WebDataSource;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::resolve_within;
use crate::error::{ExtractionError, RegistryError};
use crate::registry::{PluginDescriptor, PluginRegistry};
use crate::schema::{PropertySpec, SchemaDescriptor};

/// One unit of extracted source content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

impl Document {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            metadata: serde_json::Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// A configured source of documents.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Short type tag, also written to document metadata.
    fn source_type(&self) -> &'static str;

    /// Extracts documents in source order.
    async fn load(&self) -> Result<Vec<Document>, ExtractionError>;
}

/// Resolves a configured path inside the data directory. Absolute paths and
/// `..` components are refused when the instance is created.
pub(crate) fn resolve_path(plugin: &str, data_dir: &Path, file_path: &str) -> Result<PathBuf, RegistryError> {
    resolve_within(data_dir, file_path).map_err(|e| RegistryError::Construction {
        plugin: plugin.to_string(),
        reason: e.to_string(),
    })
}

/// Properties every data source accepts.
fn base_schema(title: &str) -> SchemaDescriptor {
    SchemaDescriptor::new(title)
        .required_property(
            "source_id",
            PropertySpec::string()
                .title("Source ID")
                .description("Plugin identifier of the data source"),
        )
        .property(
            "name",
            PropertySpec::string()
                .title("Name")
                .description("Display name for the data source"),
        )
        .property(
            "description",
            PropertySpec::string()
                .title("Description")
                .description("Description of the data source"),
        )
}

pub fn file_schema() -> SchemaDescriptor {
    base_schema("File DataSource Configuration")
        .required_property(
            "file_path",
            PropertySpec::string().title("File Path").description("Path to the file"),
        )
        .property(
            "file_type",
            PropertySpec::string()
                .title("File Type")
                .choices(FileType::NAMES)
                .default_value("txt"),
        )
        .property(
            "encoding",
            PropertySpec::string()
                .title("Encoding")
                .choices(TextEncoding::NAMES)
                .default_value("utf-8"),
        )
}

pub fn pdf_schema() -> SchemaDescriptor {
    base_schema("PDF DataSource Configuration")
        .required_property(
            "file_path",
            PropertySpec::string()
                .title("File Path")
                .description("Path to the PDF file"),
        )
        .property(
            "combine_pages",
            PropertySpec::boolean()
                .title("Combine Pages")
                .description("Produce a single document for the whole file")
                .default_value(false),
        )
        .property(
            "page_separator",
            PropertySpec::string()
                .title("Page Separator")
                .description("Separator between pages when combining")
                .default_value("\n\n"),
        )
}

pub fn web_schema() -> SchemaDescriptor {
    base_schema("Web DataSource Configuration")
        .required_property(
            "url",
            PropertySpec::string().title("URL").description("Page the crawl starts from"),
        )
        .property(
            "max_pages",
            PropertySpec::integer()
                .title("Max Pages")
                .description("Maximum number of pages to fetch")
                .minimum(1.0)
                .maximum(web::MAX_PAGES_LIMIT as f64)
                .default_value(web::DEFAULT_MAX_PAGES),
        )
        .property(
            "depth",
            PropertySpec::integer()
                .title("Crawl Depth")
                .description("Link depth to follow (1 = just the given URL)")
                .minimum(1.0)
                .maximum(web::MAX_DEPTH_LIMIT as f64)
                .default_value(web::DEFAULT_DEPTH),
        )
        .property(
            "same_domain",
            PropertySpec::boolean()
                .title("Stay on Same Domain")
                .description("Only follow links to the starting host")
                .default_value(true),
        )
        .property(
            "timeout",
            PropertySpec::integer()
                .title("Timeout")
                .description("Request timeout in seconds")
                .minimum(1.0)
                .maximum(300.0)
                .default_value(30),
        )
}

/// Registers the built-in data sources.
pub fn register_builtin(
    registry: &mut PluginRegistry<Arc<dyn DataSource>>,
    data_dir: PathBuf,
) -> Result<(), RegistryError> {
    let dir = data_dir.clone();
    registry.register(
        PluginDescriptor::new("file_datasource", "File", file_schema())
            .with_description("Load documents from a text, JSON or CSV file"),
        move |config| Ok(Arc::new(FileDataSource::from_config(&dir, config)?) as Arc<dyn DataSource>),
    )?;

    let dir = data_dir;
    registry.register(
        PluginDescriptor::new("pdf_datasource", "PDF", pdf_schema())
            .with_description("Extract text from a PDF file, one document per page"),
        move |config| Ok(Arc::new(PdfDataSource::from_config(&dir, config)?) as Arc<dyn DataSource>),
    )?;

    registry.register(
        PluginDescriptor::new("web_datasource", "Web Crawler", web_schema())
            .with_description("Crawl a web site and extract the text of each page"),
        |config| Ok(Arc::new(WebDataSource::from_config(config)?) as Arc<dyn DataSource>),
    )?;

    Ok(())
}

/// Reads the value of a required string property the schema already checked.
pub(crate) fn required_str(plugin: &str, config: &crate::schema::ConfigMap, key: &str) -> Result<String, RegistryError> {
    crate::schema::config_str(config, key)
        .map(String::from)
        .ok_or_else(|| RegistryError::Construction {
            plugin: plugin.to_string(),
            reason: format!("'{}' must be a non-empty string", key),
        })
}
