//! Dataset export.
//!
//! Raw items are parsed into flat records ([`parse_records`]) and rendered
//! as JSON, CSV or plain text.

pub mod records;
pub mod writers;

pub use records::{fallback_record, parse_item, parse_records, Record};
pub use writers::{columns, to_csv, to_json, to_text};

use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ExportError;
use crate::generator::Dataset;

/// Download formats.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Json,
    Csv,
    Text,
}

impl ExportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Text => "text",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Json => "application/json",
            Self::Csv => "text/csv; charset=utf-8",
            Self::Text => "text/plain; charset=utf-8",
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Csv => "csv",
            Self::Text => "txt",
        }
    }

    /// Format implied by a file name's extension.
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()?.to_str()?.parse().ok()
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExportFormat {
    type Err = ExportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            "text" | "txt" => Ok(Self::Text),
            other => Err(ExportError::InvalidFormat(other.to_string())),
        }
    }
}

/// Renders `dataset` in `format`.
pub fn export_dataset(dataset: &Dataset, format: ExportFormat) -> Result<String, ExportError> {
    let records = parse_records(dataset);
    match format {
        ExportFormat::Json => to_json(&records),
        ExportFormat::Csv => to_csv(&records),
        ExportFormat::Text => Ok(to_text(&records, dataset.format)),
    }
}

/// Writes `dataset` to `path`, creating parent directories.
pub fn write_dataset(dataset: &Dataset, path: &Path, format: ExportFormat) -> Result<(), ExportError> {
    let rendered = export_dataset(dataset, format)?;
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, rendered)?;
    tracing::info!(path = %path.display(), format = %format, items = dataset.len(), "Wrote dataset");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::{DatasetFormat, DatasetItem};
    use serde_json::Map;

    fn qa_dataset() -> Dataset {
        Dataset {
            format: DatasetFormat::Qa,
            items: vec![DatasetItem {
                content: "```json\n[{\"question\": \"Why?\", \"answer\": \"Because, \\\"reasons\\\"\"}]\n```".to_string(),
                metadata: Map::new(),
            }],
            metadata: Map::new(),
            error: None,
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("CSV".parse::<ExportFormat>().unwrap(), ExportFormat::Csv);
        assert_eq!("txt".parse::<ExportFormat>().unwrap(), ExportFormat::Text);
        assert!(matches!("xml".parse::<ExportFormat>(), Err(ExportError::InvalidFormat(_))));
        assert_eq!(ExportFormat::from_path(Path::new("out/data.csv")), Some(ExportFormat::Csv));
    }

    #[test]
    fn test_export_dataset_all_formats() {
        let ds = qa_dataset();
        assert_eq!(
            export_dataset(&ds, ExportFormat::Csv).unwrap(),
            "question,answer\n\"Why?\",\"Because, \"\"reasons\"\"\"\n"
        );
        assert_eq!(
            export_dataset(&ds, ExportFormat::Text).unwrap(),
            "Question: Why?\nAnswer: Because, \"reasons\"\n"
        );
        assert!(export_dataset(&ds, ExportFormat::Json).unwrap().contains("\"question\": \"Why?\""));
    }

    #[test]
    fn test_write_dataset_creates_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("out.txt");
        write_dataset(&qa_dataset(), &path, ExportFormat::Text).unwrap();
        assert!(fs::read_to_string(&path).unwrap().starts_with("Question: Why?"));
    }
}
