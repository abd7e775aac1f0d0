//! PDF data source backed by the `pdf-extract` crate.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{required_str, resolve_path, DataSource, Document};
use crate::error::{ExtractionError, RegistryError};
use crate::schema::{config_bool, ConfigMap};

const PLUGIN_ID: &str = "pdf_datasource";

/// Form feed, emitted by the extractor between pages.
const PAGE_BREAK: char = '\u{c}';

#[derive(Debug, Clone)]
pub struct PdfDataSource {
    path: PathBuf,
    combine_pages: bool,
    page_separator: String,
}

impl PdfDataSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            combine_pages: false,
            page_separator: "\n\n".to_string(),
        }
    }

    /// Produce one document for the whole file, pages joined by `separator`.
    pub fn combined(mut self, separator: impl Into<String>) -> Self {
        self.combine_pages = true;
        self.page_separator = separator.into();
        self
    }

    pub(crate) fn from_config(data_dir: &Path, config: &ConfigMap) -> Result<Self, RegistryError> {
        let file_path = required_str(PLUGIN_ID, config, "file_path")?;
        let mut source = Self::new(resolve_path(PLUGIN_ID, data_dir, &file_path)?);
        if config_bool(config, "combine_pages").unwrap_or(false) {
            // An empty separator is legitimate here, so read it directly.
            let separator = config
                .get("page_separator")
                .and_then(|v| v.as_str())
                .unwrap_or("\n\n");
            source = source.combined(separator);
        }
        Ok(source)
    }

    fn documents_from_text(&self, text: &str) -> Vec<Document> {
        let source = self.path.display().to_string();
        let pages: Vec<&str> = text.split(PAGE_BREAK).collect();
        let total_pages = pages.len();
        let non_empty: Vec<(usize, &str)> = pages
            .into_iter()
            .enumerate()
            .filter(|(_, page)| !page.trim().is_empty())
            .map(|(i, page)| (i + 1, page.trim()))
            .collect();

        if self.combine_pages {
            if non_empty.is_empty() {
                return Vec::new();
            }
            let content = non_empty
                .iter()
                .map(|(_, page)| *page)
                .collect::<Vec<_>>()
                .join(&self.page_separator);
            return vec![Document::new(content)
                .with_metadata("source", source)
                .with_metadata("type", "pdf")
                .with_metadata("total_pages", total_pages)];
        }

        non_empty
            .into_iter()
            .map(|(page, content)| {
                Document::new(content)
                    .with_metadata("source", source.clone())
                    .with_metadata("type", "pdf")
                    .with_metadata("page", page)
                    .with_metadata("total_pages", total_pages)
            })
            .collect()
    }
}

#[async_trait]
impl DataSource for PdfDataSource {
    fn source_type(&self) -> &'static str {
        "pdf"
    }

    async fn load(&self) -> Result<Vec<Document>, ExtractionError> {
        let label = self.path.display().to_string();
        let bytes = tokio::fs::read(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExtractionError::FileNotFound(label.clone())
            } else {
                ExtractionError::Io {
                    path: label.clone(),
                    source: e,
                }
            }
        })?;

        // Extraction is CPU bound and may panic on malformed input.
        let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
            .await
            .map_err(|e| ExtractionError::Pdf {
                path: label.clone(),
                reason: format!("extractor aborted: {}", e),
            })?
            .map_err(|e| ExtractionError::Pdf {
                path: label.clone(),
                reason: e.to_string(),
            })?;

        let documents = self.documents_from_text(&text);
        if documents.is_empty() {
            return Err(ExtractionError::Pdf {
                path: label,
                reason: "no text content found".to_string(),
            });
        }
        tracing::debug!(path = %self.path.display(), documents = documents.len(), "Extracted PDF");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_pages_split_on_form_feed_and_skip_empty() {
        let source = PdfDataSource::new("/tmp/x.pdf");
        let docs = source.documents_from_text("Page one\u{c}   \u{c}Page three\n");
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "Page one");
        assert_eq!(docs[0].metadata["page"], 1);
        assert_eq!(docs[1].metadata["page"], 3);
        assert_eq!(docs[1].metadata["total_pages"], 3);
    }

    #[test]
    fn test_combined_pages() {
        let source = PdfDataSource::new("/tmp/x.pdf").combined("\n---\n");
        let docs = source.documents_from_text("A\u{c}B");
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "A\n---\nB");
    }

    #[tokio::test]
    async fn test_missing_and_corrupt_files() {
        let err = PdfDataSource::new("/no/such/file.pdf").load().await.unwrap_err();
        assert!(matches!(err, ExtractionError::FileNotFound(_)));

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("broken.pdf");
        std::fs::write(&path, b"this is not a pdf").unwrap();
        let err = PdfDataSource::new(&path).load().await.unwrap_err();
        assert!(matches!(err, ExtractionError::Pdf { .. }));
    }
}
