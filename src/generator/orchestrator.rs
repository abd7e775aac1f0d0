//! Generation orchestrator.
//!
//! Turns documents, an LLM instance and a [`GenerationPlan`] into a
//! [`Dataset`]. The documents are packed into context chunks, then batches
//! of examples are requested until the plan's sample count is reached.

use chrono::Utc;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde_json::{json, Map, Value};
use tracing::{debug, info, warn};

use super::prompts::render_generation_prompt;
use super::{Dataset, DatasetFormat, DatasetItem, GenerationPlan};
use crate::datasource::Document;
use crate::error::GenerationError;
use crate::llm::{CompletionOptions, LlmInstance};
use crate::metrics::MetricsCollector;
use crate::utils::extract_json_array;

/// Consecutive empty batches tolerated before a run is declared stalled.
pub const MAX_EMPTY_BATCHES: usize = 3;

const CHUNK_SEPARATOR: &str = "\n\n";

/// Truncates `text` to at most `max_chars` characters.
fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

/// Packs document contents, in order, into chunks of at most `max_chars`
/// characters. A document longer than `max_chars` is truncated and gets a
/// chunk of its own. Blank documents are skipped.
pub fn pack_chunks(documents: &[Document], max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_chars = 0usize;
    let separator_chars = CHUNK_SEPARATOR.chars().count();

    for document in documents {
        let content = document.content.trim();
        if content.is_empty() {
            continue;
        }
        let content = truncate_chars(content, max_chars);
        let chars = content.chars().count();

        if !current.is_empty() && current_chars + separator_chars + chars > max_chars {
            chunks.push(std::mem::take(&mut current));
            current_chars = 0;
        }
        if !current.is_empty() {
            current.push_str(CHUNK_SEPARATOR);
            current_chars += separator_chars;
        }
        current.push_str(content);
        current_chars += chars;
    }

    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

/// One prompt context per non-blank document, each truncated to `max_chars`.
/// The second element is the document's `source` metadata, if any.
fn document_contexts(documents: &[Document], max_chars: usize) -> Vec<(String, Option<Value>)> {
    documents
        .iter()
        .filter_map(|document| {
            let content = document.content.trim();
            if content.is_empty() {
                return None;
            }
            let source = document.metadata.get("source").cloned();
            Some((truncate_chars(content, max_chars).to_string(), source))
        })
        .collect()
}

/// Chunk visiting order: sequential, or a seeded shuffle.
fn chunk_order(chunks: usize, seed: Option<u64>) -> Vec<usize> {
    let mut order: Vec<usize> = (0..chunks).collect();
    if let Some(seed) = seed {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        order.shuffle(&mut rng);
    }
    order
}

/// Splits one LLM response into item contents.
///
/// A JSON array contributes one item per element: strings as-is, anything
/// else re-serialised as compact JSON. Other non-blank text is a single item.
pub fn split_records(response: &str) -> Vec<String> {
    split_values(response).into_iter().map(record_content).collect()
}

fn split_values(response: &str) -> Vec<Value> {
    match extract_json_array(response) {
        Some(values) => values
            .into_iter()
            .filter(|value| match value {
                Value::String(s) => !s.trim().is_empty(),
                Value::Null => false,
                _ => true,
            })
            .collect(),
        None => {
            let trimmed = response.trim();
            if trimmed.is_empty() {
                Vec::new()
            } else {
                vec![Value::String(trimmed.to_string())]
            }
        }
    }
}

fn record_content(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

/// Applies the plan's question/answer templates and context field to an
/// object record. Other values pass through untouched.
pub fn shape_record(value: Value, plan: &GenerationPlan, context: &str) -> Value {
    let mut record = match value {
        Value::Object(record) => record,
        other => return other,
    };
    let templates = [
        ("question", "{{question}}", plan.question_template.as_deref()),
        ("answer", "{{answer}}", plan.answer_template.as_deref()),
    ];
    for (field, placeholder, template) in templates {
        if let (Some(template), Some(Value::String(text))) = (template, record.get(field)) {
            let wrapped = template.replace(placeholder, text);
            record.insert(field.to_string(), Value::String(wrapped));
        }
    }
    if plan.include_document_content {
        record.insert("context".to_string(), Value::String(context.to_string()));
    }
    Value::Object(record)
}

fn item_metadata(batch: usize, chunk: usize, index: usize, format: DatasetFormat) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("batch".to_string(), json!(batch));
    metadata.insert("chunk".to_string(), json!(chunk));
    metadata.insert("index".to_string(), json!(index));
    metadata.insert("format".to_string(), json!(format.as_str()));
    metadata
}

/// Generates a dataset from `documents` with `llm` according to `plan`.
///
/// Without `best_effort`, any LLM failure or stall fails the whole run.
/// With it, the items completed so far are returned and the failure is
/// recorded in [`Dataset::error`].
pub async fn generate(
    documents: &[Document],
    llm: &LlmInstance,
    plan: &GenerationPlan,
) -> Result<Dataset, GenerationError> {
    if documents.is_empty() {
        return Err(GenerationError::NoDocuments);
    }
    plan.validate()?;

    // Per-document runs keep each document's source; packed chunks have none.
    let (chunks, sources): (Vec<String>, Vec<Option<Value>>) = match plan.questions_per_document {
        Some(_) => document_contexts(documents, plan.max_context_chars).into_iter().unzip(),
        None => {
            let chunks = pack_chunks(documents, plan.max_context_chars);
            let sources = vec![None; chunks.len()];
            (chunks, sources)
        }
    };
    if chunks.is_empty() {
        return Err(GenerationError::NoDocuments);
    }
    let order = chunk_order(chunks.len(), plan.seed);
    let metrics = MetricsCollector::new();
    let format = plan.format;
    let requested = match plan.questions_per_document {
        Some(per_document) => plan.sample_count.min(per_document.saturating_mul(chunks.len())),
        None => plan.sample_count,
    };

    info!(
        format = %format,
        requested,
        batch_size = plan.batch_size,
        chunks = chunks.len(),
        per_document = ?plan.questions_per_document,
        model = %llm.model(),
        "Starting dataset generation"
    );

    let mut items: Vec<DatasetItem> = Vec::with_capacity(requested.min(plan.batch_size));
    let mut batch = 0usize;
    let mut cursor = 0usize;
    let mut from_current = 0usize;
    let mut empty_batches = 0usize;
    let mut failure: Option<GenerationError> = None;

    while items.len() < requested {
        let chunk = order[cursor % order.len()];
        let remaining = match plan.questions_per_document {
            Some(per_document) => (requested - items.len()).min(per_document - from_current),
            None => requested - items.len(),
        };
        let want = plan.batch_size.min(remaining);
        let prompt = render_generation_prompt(format, want, &chunks[chunk])?;
        let options = CompletionOptions {
            temperature: plan.temperature,
            max_tokens: plan.max_tokens,
            seed: plan.seed.map(|seed| seed.wrapping_add(batch as u64)),
        };

        let response = match llm.complete(&prompt, options).await {
            Ok(text) => text,
            Err(source) => {
                failure = Some(GenerationError::Provider {
                    completed: items.len(),
                    requested,
                    source,
                });
                batch += 1;
                break;
            }
        };

        let records = split_values(&response);
        let accepted = records.len().min(remaining);
        debug!(batch, chunk, requested = want, returned = records.len(), accepted, "Batch completed");

        for record in records.into_iter().take(remaining) {
            let index = items.len();
            let mut metadata = item_metadata(batch, chunk, index, format);
            if let Some(source) = &sources[chunk] {
                metadata.insert("source".to_string(), source.clone());
            }
            items.push(DatasetItem {
                content: record_content(shape_record(record, plan, &chunks[chunk])),
                metadata,
            });
        }
        batch += 1;

        match plan.questions_per_document {
            Some(per_document) => {
                from_current += accepted;
                if from_current >= per_document {
                    cursor += 1;
                    from_current = 0;
                }
            }
            None => cursor += 1,
        }

        if accepted == 0 {
            empty_batches += 1;
            if empty_batches >= MAX_EMPTY_BATCHES {
                failure = Some(GenerationError::Stalled {
                    completed: items.len(),
                    requested,
                    attempts: empty_batches,
                });
                break;
            }
        } else {
            empty_batches = 0;
        }
    }

    let error = match failure {
        Some(err) if !plan.best_effort => {
            warn!(format = %format, completed = items.len(), requested, error = %err, "Dataset generation failed");
            metrics.record_generation(format.as_str(), "failed", items.len());
            return Err(err);
        }
        Some(err) => {
            warn!(format = %format, completed = items.len(), requested, error = %err, "Returning partial dataset");
            Some(err.to_string())
        }
        None => None,
    };

    let mut metadata = Map::new();
    metadata.insert("total_batches".to_string(), json!(batch));
    metadata.insert("requested".to_string(), json!(requested));
    metadata.insert("generated".to_string(), json!(items.len()));
    metadata.insert("model".to_string(), json!(llm.model()));
    metadata.insert("llm_plugin".to_string(), json!(llm.plugin_id()));
    metadata.insert("seed".to_string(), json!(plan.seed));
    metadata.insert("chunks".to_string(), json!(chunks.len()));
    if let Some(per_document) = plan.questions_per_document {
        metadata.insert("questions_per_document".to_string(), json!(per_document));
    }
    metadata.insert("generated_at".to_string(), json!(Utc::now().to_rfc3339()));

    let status = if error.is_some() { "partial" } else { "success" };
    metrics.record_generation(format.as_str(), status, items.len());
    info!(format = %format, generated = items.len(), batches = batch, status, "Dataset generation finished");

    Ok(Dataset {
        format,
        items,
        metadata,
        error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::testing::{mock_instance, MockProvider};
    use std::sync::Arc;

    fn docs(contents: &[&str]) -> Vec<Document> {
        contents.iter().map(|c| Document::new(*c)).collect()
    }

    #[test]
    fn test_pack_chunks_respects_limit() {
        let chunks = pack_chunks(&docs(&["aaaa", "bbbb", "cccc"]), 10);
        assert_eq!(chunks, vec!["aaaa\n\nbbbb", "cccc"]);

        let chunks = pack_chunks(&docs(&["abcdefghijkl", "  ", "xy"]), 5);
        assert_eq!(chunks, vec!["abcde", "xy"]);
    }

    #[test]
    fn test_truncation_respects_char_boundaries() {
        let chunks = pack_chunks(&docs(&["héllo wörld"]), 7);
        assert_eq!(chunks, vec!["héllo w"]);
    }

    #[test]
    fn test_seeded_order_is_reproducible() {
        assert_eq!(chunk_order(8, Some(7)), chunk_order(8, Some(7)));
        assert_eq!(chunk_order(4, None), vec![0, 1, 2, 3]);
        let mut shuffled = chunk_order(8, Some(7));
        shuffled.sort_unstable();
        assert_eq!(shuffled, (0..8).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_records() {
        let records = split_records("```json\n[{\"question\": \"Q1\", \"answer\": \"A1\"}, \"plain\", null]\n```");
        assert_eq!(records, vec![r#"{"question":"Q1","answer":"A1"}"#, "plain"]);

        assert_eq!(split_records("Question: Q\nAnswer: A"), vec!["Question: Q\nAnswer: A"]);
        assert!(split_records("   ").is_empty());
        assert!(split_records("[]").is_empty());
    }

    #[tokio::test]
    async fn test_one_item_per_call() {
        let provider = Arc::new(MockProvider::new(vec![r#"[{"question": "Q", "answer": "A"}]"#]));
        let llm = mock_instance(provider.clone());
        let plan = GenerationPlan::new(DatasetFormat::Qa, 5);

        let dataset = generate(&docs(&["Some source text."]), &llm, &plan).await.unwrap();
        assert_eq!(provider.calls(), 5);
        assert_eq!(dataset.len(), 5);
        assert_eq!(dataset.format, DatasetFormat::Qa);
        assert!(dataset.items.iter().all(|i| i.metadata["format"] == "qa"));
        assert_eq!(dataset.metadata["total_batches"], 5);
        assert!(dataset.error.is_none());
    }

    #[tokio::test]
    async fn test_excess_items_dropped_and_batches_sized() {
        let many = r#"[{"text": "1"}, {"text": "2"}, {"text": "3"}, {"text": "4"}]"#;
        let provider = Arc::new(MockProvider::new(vec![many]));
        let llm = mock_instance(provider.clone());
        let plan = GenerationPlan::new(DatasetFormat::Text, 6).with_batch_size(4).with_seed(10);

        let dataset = generate(&docs(&["a", "b"]), &llm, &plan).await.unwrap();
        assert_eq!(dataset.len(), 6);
        assert_eq!(provider.calls(), 2);

        let requests = provider.requests.lock().unwrap();
        assert!(requests[0].user_prompt().starts_with("Generate 4 "));
        assert!(requests[1].user_prompt().starts_with("Generate 2 "));
        assert_eq!(requests[0].seed, Some(10));
        assert_eq!(requests[1].seed, Some(11));
    }

    #[tokio::test]
    async fn test_failure_is_reported_without_partial_results() {
        let provider = Arc::new(MockProvider::scripted(vec![
            Ok(r#"[{"question": "Q", "answer": "A"}]"#.to_string()),
            Err("quota exceeded".to_string()),
        ]));
        let llm = mock_instance(provider);
        let plan = GenerationPlan::new(DatasetFormat::Qa, 3).with_batch_size(1);

        let err = generate(&docs(&["text"]), &llm, &plan).await.unwrap_err();
        match err {
            GenerationError::Provider { completed, requested, source } => {
                assert_eq!(completed, 1);
                assert_eq!(requested, 3);
                assert!(source.to_string().contains("quota exceeded"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_best_effort_keeps_completed_items() {
        let provider = Arc::new(MockProvider::scripted(vec![
            Ok(r#"[{"question": "Q", "answer": "A"}]"#.to_string()),
            Err("quota exceeded".to_string()),
        ]));
        let llm = mock_instance(provider);
        let plan = GenerationPlan::new(DatasetFormat::Qa, 3)
            .with_batch_size(1)
            .with_best_effort(true);

        let dataset = generate(&docs(&["text"]), &llm, &plan).await.unwrap();
        assert_eq!(dataset.len(), 1);
        assert!(dataset.error.as_deref().unwrap().contains("quota exceeded"));
    }

    #[tokio::test]
    async fn test_stalls_after_empty_batches() {
        let provider = Arc::new(MockProvider::new(vec!["[]"]));
        let llm = mock_instance(provider.clone());
        let plan = GenerationPlan::new(DatasetFormat::Qa, 2);

        let err = generate(&docs(&["text"]), &llm, &plan).await.unwrap_err();
        assert!(matches!(err, GenerationError::Stalled { completed: 0, attempts: 3, .. }));
        assert_eq!(provider.calls(), MAX_EMPTY_BATCHES);
    }

    #[tokio::test]
    async fn test_oversized_plan_is_rejected_before_any_call() {
        let provider = Arc::new(MockProvider::new(vec!["[]"]));
        let llm = mock_instance(provider.clone());
        let plan = GenerationPlan::new(DatasetFormat::Qa, 1_000_000_000_000_000);

        let err = generate(&docs(&["text"]), &llm, &plan).await.unwrap_err();
        assert!(matches!(err, GenerationError::InvalidPlan(_)));
        assert_eq!(provider.calls(), 0);
    }

    #[tokio::test]
    async fn test_questions_per_document() {
        let provider = Arc::new(MockProvider::new(vec![
            r#"[{"question": "Q1", "answer": "A1"}, {"question": "Q2", "answer": "A2"}]"#,
        ]));
        let llm = mock_instance(provider.clone());
        let documents = vec![
            Document::new("First document.").with_metadata("source", "a.txt"),
            Document::new("   "),
            Document::new("Second document.").with_metadata("source", "b.txt"),
        ];
        let plan = GenerationPlan::new(DatasetFormat::Qa, 100)
            .with_questions_per_document(3)
            .with_batch_size(2)
            .with_document_content(true);

        let dataset = generate(&documents, &llm, &plan).await.unwrap();
        assert_eq!(dataset.len(), 6);
        assert_eq!(provider.calls(), 4);
        assert_eq!(dataset.metadata["questions_per_document"], 3);

        let per_source = |source: &str| {
            dataset
                .items
                .iter()
                .filter(|item| item.metadata["source"] == source)
                .count()
        };
        assert_eq!(per_source("a.txt"), 3);
        assert_eq!(per_source("b.txt"), 3);

        let first: Value = serde_json::from_str(&dataset.items[0].content).unwrap();
        assert_eq!(first["context"], "First document.");
        let last: Value = serde_json::from_str(&dataset.items[5].content).unwrap();
        assert_eq!(last["context"], "Second document.");

        let requests = provider.requests.lock().unwrap();
        assert!(requests[0].user_prompt().starts_with("Generate 2 "));
        assert!(requests[1].user_prompt().starts_with("Generate 1 "));
        assert!(requests[2].user_prompt().contains("Second document."));
    }

    #[tokio::test]
    async fn test_sample_count_caps_per_document_runs() {
        let provider = Arc::new(MockProvider::new(vec![r#"[{"question": "Q", "answer": "A"}]"#]));
        let llm = mock_instance(provider.clone());
        let plan = GenerationPlan::new(DatasetFormat::Qa, 2).with_questions_per_document(5);

        let dataset = generate(&docs(&["one", "two"]), &llm, &plan).await.unwrap();
        assert_eq!(dataset.len(), 2);
        assert!(dataset.items.iter().all(|item| item.metadata["chunk"] == 0));
    }

    #[test]
    fn test_shape_record_applies_templates() {
        let plan = GenerationPlan::new(DatasetFormat::Qa, 1)
            .with_templates(Some("Q: {{question}}".to_string()), Some("{{answer}} (source text)".to_string()))
            .with_document_content(true);
        let shaped = shape_record(json!({ "question": "Why?", "answer": "Because." }), &plan, "ctx");
        assert_eq!(
            shaped,
            json!({ "question": "Q: Why?", "answer": "Because. (source text)", "context": "ctx" })
        );

        let untouched = shape_record(json!("plain text"), &plan, "ctx");
        assert_eq!(untouched, json!("plain text"));

        let plain = GenerationPlan::new(DatasetFormat::Qa, 1);
        let record = json!({ "question": "Why?", "answer": "Because." });
        assert_eq!(shape_record(record.clone(), &plain, "ctx"), record);
    }

    #[tokio::test]
    async fn test_rejects_empty_input() {
        let llm = mock_instance(Arc::new(MockProvider::new(vec!["x"])));
        let plan = GenerationPlan::new(DatasetFormat::Qa, 1);
        assert!(matches!(
            generate(&[], &llm, &plan).await,
            Err(GenerationError::NoDocuments)
        ));
        assert!(matches!(
            generate(&docs(&["", " "]), &llm, &plan).await,
            Err(GenerationError::NoDocuments)
        ));

        let plan = GenerationPlan::new(DatasetFormat::Qa, 0);
        assert!(matches!(
            generate(&docs(&["x"]), &llm, &plan).await,
            Err(GenerationError::InvalidPlan(_))
        ));
    }
}
