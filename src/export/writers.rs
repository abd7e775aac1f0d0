//! JSON, CSV and plain-text renderings of parsed records.

use std::io;

use csv::{QuoteStyle, Terminator, WriterBuilder};
use serde_json::Value;

use super::records::Record;
use crate::error::ExportError;
use crate::generator::DatasetFormat;

/// Pretty-printed JSON array of records.
pub fn to_json(records: &[Record]) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// Field value as it appears in flat exports.
fn cell(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}

/// Union of record keys in first-seen order.
pub fn columns(records: &[Record]) -> Vec<String> {
    let mut columns: Vec<String> = Vec::new();
    for record in records {
        for key in record.keys() {
            if !columns.iter().any(|c| c == key) {
                columns.push(key.clone());
            }
        }
    }
    columns
}

fn into_inner<W: io::Write>(writer: csv::Writer<W>) -> Result<W, ExportError> {
    writer
        .into_inner()
        .map_err(|e| ExportError::Io(io::Error::new(e.error().kind(), e.error().to_string())))
}

/// CSV with an unquoted header row and every data field quoted.
///
/// Embedded quotes are doubled. Nested values are written as compact JSON;
/// a record missing a column gets an empty field.
pub fn to_csv(records: &[Record]) -> Result<String, ExportError> {
    let columns = columns(records);
    if columns.is_empty() {
        return Ok(String::new());
    }

    let mut header = WriterBuilder::new()
        .quote_style(QuoteStyle::Necessary)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    header.write_record(&columns)?;
    let buffer = into_inner(header)?;

    let mut rows = WriterBuilder::new()
        .quote_style(QuoteStyle::Always)
        .terminator(Terminator::Any(b'\n'))
        .from_writer(buffer);
    for record in records {
        rows.write_record(columns.iter().map(|c| cell(record.get(c))))?;
    }
    let buffer = into_inner(rows)?;

    String::from_utf8(buffer).map_err(|e| ExportError::Io(io::Error::new(io::ErrorKind::InvalidData, e)))
}

fn field(record: &Record, key: &str) -> Option<String> {
    record.get(key).map(|v| cell(Some(v)))
}

fn key_value_lines(record: &Record) -> String {
    record
        .iter()
        .map(|(key, value)| format!("{}: {}", key, cell(Some(value))))
        .collect::<Vec<_>>()
        .join("\n")
}

fn conversation_lines(record: &Record) -> Option<String> {
    let messages = record.get("messages")?.as_array()?;
    let lines: Vec<String> = messages
        .iter()
        .filter_map(|m| {
            let role = m.get("role")?.as_str()?;
            let content = cell(m.get("content"));
            Some(format!("{}: {}", role, content))
        })
        .collect();
    Some(lines.join("\n"))
}

fn text_block(record: &Record, format: DatasetFormat) -> String {
    let labelled = |pairs: &[(&str, &str)]| -> Option<String> {
        let lines = pairs
            .iter()
            .map(|(key, label)| field(record, key).map(|value| format!("{}: {}", label, value)))
            .collect::<Option<Vec<_>>>()?;
        Some(lines.join("\n"))
    };

    let rendered = match format {
        DatasetFormat::Qa => labelled(&[("question", "Question"), ("answer", "Answer")]),
        DatasetFormat::Instruction => {
            let has_input = field(record, "input").is_some_and(|i| !i.is_empty());
            if has_input {
                labelled(&[("instruction", "Instruction"), ("input", "Input"), ("response", "Response")])
            } else {
                labelled(&[("instruction", "Instruction"), ("response", "Response")])
            }
        }
        DatasetFormat::Conversation => conversation_lines(record),
        DatasetFormat::Classification => labelled(&[("text", "Text"), ("label", "Label")]),
        DatasetFormat::Text => None,
    };
    rendered.unwrap_or_else(|| key_value_lines(record))
}

/// Plain text using a per-format template; records are separated by a blank line.
pub fn to_text(records: &[Record], format: DatasetFormat) -> String {
    let mut out = records
        .iter()
        .map(|r| text_block(r, format))
        .collect::<Vec<_>>()
        .join("\n\n");
    if !out.is_empty() {
        out.push('\n');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records(value: Value) -> Vec<Record> {
        value
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().cloned().unwrap())
            .collect()
    }

    #[test]
    fn test_csv_quotes_data_not_header() {
        let csv = to_csv(&records(json!([{ "q": "a,b", "ans": "c\"d" }]))).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["q,ans", r#""a,b","c""d""#]);
    }

    #[test]
    fn test_csv_union_of_columns() {
        let csv = to_csv(&records(json!([
            { "text": "x", "label": "pos" },
            { "text": "y", "tags": ["a", "b"] }
        ])))
        .unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "text,label,tags");
        assert_eq!(lines[1], r#""x","pos","""#);
        assert_eq!(lines[2], r#""y","","[""a"",""b""]""#);

        assert_eq!(to_csv(&[]).unwrap(), "");
    }

    #[test]
    fn test_text_templates() {
        let qa = records(json!([
            { "question": "Q1", "answer": "A1" },
            { "question": "Q2", "answer": "A2" }
        ]));
        assert_eq!(
            to_text(&qa, DatasetFormat::Qa),
            "Question: Q1\nAnswer: A1\n\nQuestion: Q2\nAnswer: A2\n"
        );

        let conv = records(json!([{ "messages": [
            { "role": "user", "content": "Hi" },
            { "role": "assistant", "content": "Hello" }
        ] }]));
        assert_eq!(to_text(&conv, DatasetFormat::Conversation), "user: Hi\nassistant: Hello\n");

        let inst = records(json!([{ "instruction": "Sum", "input": "1 2", "response": "3" }]));
        assert_eq!(
            to_text(&inst, DatasetFormat::Instruction),
            "Instruction: Sum\nInput: 1 2\nResponse: 3\n"
        );
    }

    #[test]
    fn test_text_falls_back_to_key_values() {
        let odd = records(json!([{ "prompt": "p", "completion": "c" }]));
        assert_eq!(to_text(&odd, DatasetFormat::Qa), "prompt: p\ncompletion: c\n");
    }

    #[test]
    fn test_json_is_pretty_array() {
        let json = to_json(&records(json!([{ "text": "t" }]))).unwrap();
        assert!(json.starts_with("[\n"));
        let back: Value = serde_json::from_str(&json).unwrap();
        assert_eq!(back, json!([{ "text": "t" }]));
    }
}
