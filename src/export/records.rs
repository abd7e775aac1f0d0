//! Structured records from raw dataset items.
//!
//! Generated items hold the model's text. Before display or export that
//! text is decoded into flat JSON objects; text that is not JSON falls back
//! to a per-format split.

use serde_json::{Map, Value};

use crate::generator::{Dataset, DatasetFormat};
use crate::utils::strip_code_fences;

/// One exported row: field name to value, in first-seen order.
pub type Record = Map<String, Value>;

/// Parses every item of `dataset` into records, preserving order.
pub fn parse_records(dataset: &Dataset) -> Vec<Record> {
    dataset
        .items
        .iter()
        .flat_map(|item| parse_item(&item.content, dataset.format))
        .collect()
}

/// Parses the text of one item. Arrays flatten into several records.
pub fn parse_item(content: &str, format: DatasetFormat) -> Vec<Record> {
    let stripped = strip_code_fences(content);
    if stripped.is_empty() {
        return Vec::new();
    }
    match serde_json::from_str::<Value>(&stripped) {
        Ok(Value::Object(map)) => vec![map],
        Ok(Value::Array(values)) => values
            .into_iter()
            .filter_map(|value| match value {
                Value::Object(map) => Some(map),
                Value::String(text) => Some(fallback_record(&text, format)),
                Value::Null => None,
                other => Some(fallback_record(&other.to_string(), format)),
            })
            .collect(),
        Ok(Value::String(text)) => vec![fallback_record(&text, format)],
        _ => vec![fallback_record(&stripped, format)],
    }
}

/// Removes a leading `Label:` (case-insensitive) from `line`.
fn strip_label<'a>(line: &'a str, labels: &[&str]) -> &'a str {
    let trimmed = line.trim();
    for label in labels {
        let Some(head) = trimmed.get(..label.len()) else {
            continue;
        };
        if !head.eq_ignore_ascii_case(label) {
            continue;
        }
        if let Some(value) = trimmed[label.len()..].trim_start().strip_prefix(':') {
            return value.trim();
        }
    }
    trimmed
}

/// First line / remaining lines, each stripped of its label.
fn split_pair(text: &str, first: &[&str], second: &[&str]) -> (String, String) {
    let text = text.trim();
    let (head, rest) = text.split_once('\n').unwrap_or((text, ""));
    (
        strip_label(head, first).to_string(),
        strip_label(rest, second).to_string(),
    )
}

fn record(pairs: [(&str, String); 2]) -> Record {
    pairs
        .into_iter()
        .map(|(key, value)| (key.to_string(), Value::String(value)))
        .collect()
}

/// Record for text that did not decode as a JSON object.
pub fn fallback_record(text: &str, format: DatasetFormat) -> Record {
    match format {
        DatasetFormat::Qa => {
            let (question, answer) = split_pair(text, &["question", "q"], &["answer", "a"]);
            record([("question", question), ("answer", answer)])
        }
        DatasetFormat::Instruction => {
            let (instruction, response) = split_pair(text, &["instruction"], &["response", "output"]);
            record([("instruction", instruction), ("response", response)])
        }
        DatasetFormat::Classification => {
            let text = text.trim();
            let (body, label) = match text.rsplit_once('\n') {
                Some((body, last)) if last.trim().to_ascii_lowercase().starts_with("label") => {
                    (body, strip_label(last, &["label"]))
                }
                _ => (text, ""),
            };
            record([
                ("text", strip_label(body, &["text"]).to_string()),
                ("label", label.to_string()),
            ])
        }
        DatasetFormat::Conversation | DatasetFormat::Text => {
            let mut record = Record::new();
            record.insert("generated".to_string(), Value::String(text.trim().to_string()));
            record
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::DatasetItem;
    use serde_json::json;

    fn dataset(format: DatasetFormat, contents: &[&str]) -> Dataset {
        Dataset {
            format,
            items: contents
                .iter()
                .map(|c| DatasetItem {
                    content: c.to_string(),
                    metadata: Map::new(),
                })
                .collect(),
            metadata: Map::new(),
            error: None,
        }
    }

    #[test]
    fn test_fenced_objects_and_arrays() {
        let ds = dataset(
            DatasetFormat::Qa,
            &[
                "```json\n{\"question\": \"Q1\", \"answer\": \"A1\"}\n```",
                "[{\"question\": \"Q2\", \"answer\": \"A2\"}, {\"question\": \"Q3\", \"answer\": \"A3\"}]",
            ],
        );
        let records = parse_records(&ds);
        assert_eq!(records.len(), 3);
        assert_eq!(records[2]["question"], "Q3");
    }

    #[test]
    fn test_qa_fallback_split() {
        let records = parse_item("Question: What is Rust?\nAnswer: A language.\nIt is fast.", DatasetFormat::Qa);
        assert_eq!(
            Value::Object(records[0].clone()),
            json!({ "question": "What is Rust?", "answer": "A language.\nIt is fast." })
        );
    }

    #[test]
    fn test_classification_fallback() {
        let records = parse_item("Text: Great movie!\nLabel: positive", DatasetFormat::Classification);
        assert_eq!(records[0]["text"], "Great movie!");
        assert_eq!(records[0]["label"], "positive");

        let records = parse_item("Just some text", DatasetFormat::Classification);
        assert_eq!(records[0]["label"], "");
    }

    #[test]
    fn test_other_formats_keep_text() {
        let records = parse_item("free-form output", DatasetFormat::Text);
        assert_eq!(records[0]["generated"], "free-form output");
        assert!(parse_item("   ", DatasetFormat::Text).is_empty());
    }
}
