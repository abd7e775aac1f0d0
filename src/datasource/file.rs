//! File-backed data source for text, JSON and CSV files.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use super::{required_str, resolve_path, DataSource, Document};
use crate::error::{ExtractionError, RegistryError};
use crate::schema::{config_str, ConfigMap};

const PLUGIN_ID: &str = "file_datasource";

/// Supported file layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    Txt,
    Json,
    Csv,
}

impl FileType {
    pub const NAMES: [&'static str; 3] = ["txt", "json", "csv"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }
}

impl FromStr for FileType {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "txt" | "text" => Ok(Self::Txt),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            other => Err(ExtractionError::UnsupportedFileType(other.to_string())),
        }
    }
}

/// Text encodings a file may be decoded from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    /// Little-endian unless a big-endian byte order mark is present.
    Utf16,
    Ascii,
    Latin1,
}

impl TextEncoding {
    pub const NAMES: [&'static str; 4] = ["utf-8", "utf-16", "ascii", "latin-1"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Utf8 => "utf-8",
            Self::Utf16 => "utf-16",
            Self::Ascii => "ascii",
            Self::Latin1 => "latin-1",
        }
    }

    /// Decodes `bytes`, stripping a leading byte order mark.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, String> {
        match self {
            Self::Utf8 => {
                let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
                String::from_utf8(bytes.to_vec()).map_err(|e| e.to_string())
            }
            Self::Utf16 => {
                let (body, big_endian) = match bytes {
                    [0xFE, 0xFF, rest @ ..] => (rest, true),
                    [0xFF, 0xFE, rest @ ..] => (rest, false),
                    _ => (bytes, false),
                };
                if body.len() % 2 != 0 {
                    return Err("odd number of bytes".to_string());
                }
                let units = body.chunks_exact(2).map(|pair| {
                    if big_endian {
                        u16::from_be_bytes([pair[0], pair[1]])
                    } else {
                        u16::from_le_bytes([pair[0], pair[1]])
                    }
                });
                char::decode_utf16(units)
                    .collect::<Result<String, _>>()
                    .map_err(|e| e.to_string())
            }
            Self::Ascii => match bytes.iter().position(|b| !b.is_ascii()) {
                Some(pos) => Err(format!("non-ASCII byte 0x{:02x} at offset {}", bytes[pos], pos)),
                None => Ok(bytes.iter().map(|&b| b as char).collect()),
            },
            Self::Latin1 => Ok(bytes.iter().map(|&b| b as char).collect()),
        }
    }
}

impl FromStr for TextEncoding {
    type Err = ExtractionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('_', "-").as_str() {
            "utf-8" | "utf8" => Ok(Self::Utf8),
            "utf-16" | "utf16" => Ok(Self::Utf16),
            "ascii" | "us-ascii" => Ok(Self::Ascii),
            "latin-1" | "latin1" | "iso-8859-1" => Ok(Self::Latin1),
            other => Err(ExtractionError::UnsupportedEncoding(other.to_string())),
        }
    }
}

impl fmt::Display for TextEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Loads documents from one local file.
#[derive(Debug, Clone)]
pub struct FileDataSource {
    path: PathBuf,
    file_type: FileType,
    encoding: TextEncoding,
}

impl FileDataSource {
    pub fn new(path: impl Into<PathBuf>, file_type: FileType, encoding: TextEncoding) -> Self {
        Self {
            path: path.into(),
            file_type,
            encoding,
        }
    }

    pub(crate) fn from_config(data_dir: &Path, config: &ConfigMap) -> Result<Self, RegistryError> {
        let file_path = required_str(PLUGIN_ID, config, "file_path")?;
        let construction = |e: ExtractionError| RegistryError::Construction {
            plugin: PLUGIN_ID.to_string(),
            reason: e.to_string(),
        };
        let file_type = config_str(config, "file_type")
            .unwrap_or("txt")
            .parse()
            .map_err(construction)?;
        let encoding = config_str(config, "encoding")
            .unwrap_or("utf-8")
            .parse()
            .map_err(construction)?;
        Ok(Self::new(resolve_path(PLUGIN_ID, data_dir, &file_path)?, file_type, encoding))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn source_label(&self) -> String {
        self.path.display().to_string()
    }

    async fn read_text(&self) -> Result<String, ExtractionError> {
        let label = self.source_label();
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
        self.encoding
            .decode(&bytes)
            .map_err(|reason| ExtractionError::Decode {
                path: label,
                encoding: self.encoding.to_string(),
                reason,
            })
    }

    fn text_documents(&self, text: String) -> Vec<Document> {
        let checksum = hex::encode(Sha256::digest(text.as_bytes()));
        vec![Document::new(text)
            .with_metadata("source", self.source_label())
            .with_metadata("type", "txt")
            .with_metadata("checksum", checksum)]
    }

    fn json_documents(&self, text: &str) -> Result<Vec<Document>, ExtractionError> {
        let source = self.source_label();
        let data: Value = serde_json::from_str(text).map_err(|e| ExtractionError::Json {
            path: source.clone(),
            reason: e.to_string(),
        })?;

        let documents = match data {
            Value::Array(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| {
                    let mut doc = json_document(item);
                    doc.metadata.insert("source".to_string(), Value::from(source.clone()));
                    doc.metadata.insert("index".to_string(), Value::from(index));
                    doc.metadata.insert("type".to_string(), Value::from("json"));
                    doc
                })
                .collect(),
            other => {
                let mut doc = json_document(other);
                doc.metadata.insert("source".to_string(), Value::from(source));
                doc.metadata.insert("type".to_string(), Value::from("json"));
                vec![doc]
            }
        };
        Ok(documents)
    }

    fn csv_documents(&self, text: &str) -> Result<Vec<Document>, ExtractionError> {
        let source = self.source_label();
        let csv_error = |e: csv::Error| ExtractionError::Csv {
            path: source.clone(),
            reason: e.to_string(),
        };

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(text.as_bytes());
        let headers: Vec<String> = reader
            .headers()
            .map_err(csv_error)?
            .iter()
            .map(String::from)
            .collect();
        if headers.is_empty() {
            return Ok(Vec::new());
        }

        let mut documents = Vec::new();
        for (i, record) in reader.records().enumerate() {
            let record = record.map_err(csv_error)?;
            let values: Vec<String> = record.iter().map(String::from).collect();
            let content = headers
                .iter()
                .zip(values.iter())
                .map(|(h, v)| format!("{}: {}", h, v))
                .collect::<Vec<_>>()
                .join("\n");
            documents.push(
                Document::new(content)
                    .with_metadata("source", source.clone())
                    .with_metadata("row", i + 1)
                    .with_metadata("type", "csv")
                    .with_metadata("headers", headers.clone())
                    .with_metadata("values", values),
            );
        }
        Ok(documents)
    }
}

/// Builds a document from one JSON value: objects contribute their `content`
/// field and `metadata` object, anything else is serialized whole.
fn json_document(value: Value) -> Document {
    match value {
        Value::Object(mut object) => {
            let metadata = match object.remove("metadata") {
                Some(Value::Object(metadata)) => metadata,
                Some(other) => {
                    object.insert("metadata".to_string(), other);
                    serde_json::Map::new()
                }
                None => serde_json::Map::new(),
            };
            let content = match object.get("content") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => Value::Object(object).to_string(),
            };
            Document { content, metadata }
        }
        Value::String(s) => Document::new(s),
        other => Document::new(other.to_string()),
    }
}

#[async_trait]
impl DataSource for FileDataSource {
    fn source_type(&self) -> &'static str {
        self.file_type.as_str()
    }

    async fn load(&self) -> Result<Vec<Document>, ExtractionError> {
        let text = self.read_text().await?;
        let documents = match self.file_type {
            FileType::Txt => self.text_documents(text),
            FileType::Json => self.json_documents(&text)?,
            FileType::Csv => self.csv_documents(&text)?,
        };
        tracing::debug!(
            path = %self.path.display(),
            file_type = self.file_type.as_str(),
            documents = documents.len(),
            "Loaded file"
        );
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    #[tokio::test]
    async fn test_text_file_is_one_document() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "a.txt", b"Rust is a systems language.\nSecond line.");
        let source = FileDataSource::new(&path, FileType::Txt, TextEncoding::Utf8);

        let docs = source.load().await.unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Rust is a systems language.\nSecond line.");
        assert_eq!(docs[0].metadata["type"], "txt");
        assert_eq!(docs[0].metadata["checksum"].as_str().unwrap().len(), 64);
    }

    #[tokio::test]
    async fn test_missing_file() {
        let source = FileDataSource::new("/definitely/not/here.txt", FileType::Txt, TextEncoding::Utf8);
        let err = source.load().await.unwrap_err();
        assert!(matches!(err, ExtractionError::FileNotFound(ref p) if p.contains("here.txt")));
    }

    #[tokio::test]
    async fn test_json_array_and_object() {
        let dir = TempDir::new().unwrap();
        let array = write(
            &dir,
            "docs.json",
            json!([
                { "content": "first", "metadata": { "author": "kim" } },
                "second",
                { "title": "no content field" }
            ])
            .to_string()
            .as_bytes(),
        );
        let docs = FileDataSource::new(&array, FileType::Json, TextEncoding::Utf8)
            .load()
            .await
            .unwrap();
        assert_eq!(docs.len(), 3);
        assert_eq!(docs[0].content, "first");
        assert_eq!(docs[0].metadata["author"], "kim");
        assert_eq!(docs[0].metadata["index"], 0);
        assert_eq!(docs[1].content, "second");
        assert!(docs[2].content.contains("no content field"));

        let object = write(&dir, "one.json", br#"{"content": "solo"}"#);
        let docs = FileDataSource::new(&object, FileType::Json, TextEncoding::Utf8)
            .load()
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "solo");
        assert!(docs[0].metadata.get("index").is_none());
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "bad.json", b"{ not json");
        let err = FileDataSource::new(&path, FileType::Json, TextEncoding::Utf8)
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Json { .. }));
    }

    #[tokio::test]
    async fn test_csv_rows() {
        let dir = TempDir::new().unwrap();
        let path = write(&dir, "rows.csv", b"name,role\nAda,\"engineer, lead\"\nLin,analyst\n");
        let docs = FileDataSource::new(&path, FileType::Csv, TextEncoding::Utf8)
            .load()
            .await
            .unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "name: Ada\nrole: engineer, lead");
        assert_eq!(docs[1].metadata["row"], 2);
        assert_eq!(docs[1].metadata["headers"], json!(["name", "role"]));
    }

    #[tokio::test]
    async fn test_encodings() {
        let dir = TempDir::new().unwrap();
        let latin = write(&dir, "latin.txt", &[b'c', b'a', b'f', 0xE9]);
        let docs = FileDataSource::new(&latin, FileType::Txt, TextEncoding::Latin1)
            .load()
            .await
            .unwrap();
        assert_eq!(docs[0].content, "café");

        let err = FileDataSource::new(&latin, FileType::Txt, TextEncoding::Utf8)
            .load()
            .await
            .unwrap_err();
        assert!(matches!(err, ExtractionError::Decode { .. }));

        let utf16: Vec<u8> = [0xFF, 0xFE]
            .into_iter()
            .chain("hé".encode_utf16().flat_map(|u| u.to_le_bytes()))
            .collect();
        let path = write(&dir, "wide.txt", &utf16);
        let docs = FileDataSource::new(&path, FileType::Txt, TextEncoding::Utf16)
            .load()
            .await
            .unwrap();
        assert_eq!(docs[0].content, "hé");
    }

    #[test]
    fn test_parse_names() {
        assert_eq!("CSV".parse::<FileType>().unwrap(), FileType::Csv);
        assert!("xlsx".parse::<FileType>().is_err());
        assert_eq!("latin1".parse::<TextEncoding>().unwrap(), TextEncoding::Latin1);
        assert!(matches!(
            "ebcdic".parse::<TextEncoding>(),
            Err(ExtractionError::UnsupportedEncoding(_))
        ));
    }

    #[test]
    fn test_from_config_resolves_relative_paths() {
        let config = json!({ "source_id": "file_datasource", "file_path": "a.txt", "file_type": "json" });
        let source = FileDataSource::from_config(Path::new("/srv/data"), config.as_object().unwrap()).unwrap();
        assert_eq!(source.path(), Path::new("/srv/data/a.txt"));
        assert_eq!(source.source_type(), "json");
    }
}
