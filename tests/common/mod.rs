//! Fixtures shared by the integration tests.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use synth_forge::llm::{Choice, GenerationRequest, GenerationResponse, LlmInstance, LlmProvider, Message, Usage};
use synth_forge::registry::{PluginCatalog, PluginDescriptor};
use synth_forge::schema::{ConfigMap, PropertySpec, SchemaDescriptor};
use synth_forge::{ForgeService, LlmError};

/// Replays scripted responses, repeating the last one. `Err` entries fail
/// with a 401 API error.
pub struct ScriptedProvider {
    responses: Vec<Result<String, String>>,
    prompts: Mutex<Vec<String>>,
    calls: AtomicUsize,
}

impl ScriptedProvider {
    pub fn replying(responses: &[&str]) -> Arc<Self> {
        Self::scripted(responses.iter().map(|r| Ok(r.to_string())).collect())
    }

    pub fn scripted(responses: Vec<Result<String, String>>) -> Arc<Self> {
        Arc::new(Self {
            responses,
            prompts: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn provider_name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let idx = self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(request.user_prompt());
        let scripted = self
            .responses
            .get(idx)
            .or_else(|| self.responses.last())
            .cloned()
            .unwrap_or_else(|| Ok(String::new()));
        let content = scripted.map_err(|message| LlmError::ApiError { code: 401, message })?;
        Ok(GenerationResponse {
            id: format!("scripted-{idx}"),
            model: request.model,
            choices: vec![Choice {
                index: 0,
                message: Message::assistant(content),
                finish_reason: "stop".to_string(),
            }],
            usage: Usage::default(),
        })
    }
}

/// Built-in data sources and generators over `data_dir`, plus a `mock` LLM
/// plugin backed by `provider`. The real LLM plugins are registered too so
/// their validation can be exercised.
pub fn catalog(data_dir: &Path, provider: Arc<ScriptedProvider>) -> PluginCatalog {
    let mut catalog = PluginCatalog::builtin(data_dir).unwrap();
    let schema = SchemaDescriptor::new("Mock LLM").required_property("model_id", PropertySpec::string());
    catalog
        .llms
        .register(PluginDescriptor::new("mock", "Mock", schema), move |_: &ConfigMap| {
            Ok(Arc::new(LlmInstance::new("mock", "mock-model", provider.clone())))
        })
        .unwrap();
    catalog
}

pub fn service(data_dir: &Path, provider: Arc<ScriptedProvider>) -> Arc<ForgeService> {
    Arc::new(ForgeService::new(Arc::new(catalog(data_dir, provider))))
}

pub fn config(value: serde_json::Value) -> ConfigMap {
    value.as_object().cloned().unwrap()
}
