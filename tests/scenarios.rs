//! End-to-end behaviour through the public library API.

mod common;

use common::{config, service, ScriptedProvider};
use serde_json::json;
use synth_forge::export::{export_dataset, ExportFormat};
use synth_forge::generator::{Dataset, DatasetFormat, DatasetItem};
use synth_forge::registry::PluginKind;
use synth_forge::service::{GenerateRequest, OneShotRequest};
use synth_forge::{RegistryError, ServiceError, ValidationError};

#[tokio::test]
async fn test_file_datasource_create_and_load() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.txt"), "Rust has no garbage collector.").unwrap();
    let service = service(dir.path(), ScriptedProvider::replying(&["[]"]));

    let first = service
        .create(
            PluginKind::DataSource,
            config(json!({ "source_id": "file_datasource", "file_path": "a.txt" })),
        )
        .await
        .unwrap();
    let second = service
        .create(
            PluginKind::DataSource,
            config(json!({ "source_id": "file_datasource", "file_path": "a.txt" })),
        )
        .await
        .unwrap();
    assert_ne!(first, second);

    let docs = service.load_documents(&first).await.unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].content, "Rust has no garbage collector.");

    let info = service.info(PluginKind::DataSource, &first).await.unwrap();
    assert_eq!(info.plugin_id, "file_datasource");
    assert_eq!(info.config["file_path"], "a.txt");
}

#[tokio::test]
async fn test_llm_missing_model_id() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path(), ScriptedProvider::replying(&["[]"]));

    let err = service
        .create(PluginKind::Llm, config(json!({ "provider": "openai", "api_key": "sk-test" })))
        .await
        .err()
        .unwrap();
    match err {
        ServiceError::Registry(RegistryError::Validation(ValidationError::MissingRequired { property })) => {
            assert_eq!(property, "model_id")
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(service.instances().is_empty().await);
}

#[tokio::test]
async fn test_generation_of_five_items() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("doc.txt"), "The borrow checker enforces aliasing rules.").unwrap();
    let provider = ScriptedProvider::replying(&[r#"[{"question": "What enforces aliasing?", "answer": "The borrow checker."}]"#]);
    let service = service(dir.path(), provider.clone());

    let ds = service
        .create(
            PluginKind::DataSource,
            config(json!({ "source_id": "file_datasource", "file_path": "doc.txt" })),
        )
        .await
        .unwrap();
    let llm = service
        .create(PluginKind::Llm, config(json!({ "provider": "mock", "model_id": "m" })))
        .await
        .unwrap();
    let generator = service
        .create(PluginKind::Generator, config(json!({ "generator_id": "qa_generator" })))
        .await
        .unwrap();

    let run = service
        .generate(
            &generator,
            GenerateRequest {
                datasource_id: ds,
                llm_id: llm,
                count: Some(5),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(provider.calls(), 5);
    assert_eq!(run.dataset.len(), 5);
    assert_eq!(run.dataset.format, DatasetFormat::Qa);
    assert!(run.dataset.items.iter().all(|item| item.metadata["format"] == "qa"));
    assert!(provider.prompts()[0].contains("The borrow checker enforces aliasing rules."));

    let stored = service.run(&run.generation_id).await.unwrap();
    assert_eq!(stored.len(), 5);
}

#[test]
fn test_csv_export_quoting() {
    let dataset = Dataset {
        format: DatasetFormat::Qa,
        items: vec![DatasetItem {
            content: r#"{"q": "a,b", "ans": "c\"d"}"#.to_string(),
            metadata: Default::default(),
        }],
        metadata: Default::default(),
        error: None,
    };
    let csv = export_dataset(&dataset, ExportFormat::Csv).unwrap();
    let lines: Vec<&str> = csv.lines().collect();
    assert_eq!(lines, ["q,ans", r#""a,b","c""d""#]);
}

#[tokio::test]
async fn test_describe_unknown_plugin_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let service = service(dir.path(), ScriptedProvider::replying(&["[]"]));
    for kind in [PluginKind::DataSource, PluginKind::Llm, PluginKind::Generator] {
        let err = service.catalog().describe(kind, "nonexistent").unwrap_err();
        assert!(err.is_not_found(), "{kind}: {err}");
    }
}

#[tokio::test]
async fn test_one_shot_best_effort_keeps_partial_items() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("doc.txt"), "Ownership moves values.").unwrap();
    let provider = ScriptedProvider::scripted(vec![
        Ok(r#"[{"instruction": "Explain moves", "response": "Values change owner."}]"#.to_string()),
        Err("quota exceeded".to_string()),
    ]);
    let service = service(dir.path(), provider.clone());

    let request = OneShotRequest {
        data_source_config: config(json!({ "source_id": "file_datasource", "file_path": "doc.txt" })),
        llm_config: config(json!({ "provider": "mock", "model_id": "m" })),
        dataset_type: DatasetFormat::Instruction,
        sample_size: 3,
        options: config(json!({ "batch_size": 1, "best_effort": true })),
    };
    let (run, datasource_id, llm_id) = service.generate_once(request).await.unwrap();

    assert_eq!(run.dataset.len(), 1);
    assert!(run.dataset.error.as_deref().unwrap().contains("quota exceeded"));
    assert!(datasource_id.starts_with("ds_"));
    assert!(llm_id.starts_with("llm_"));
    assert_eq!(provider.calls(), 2);
}
