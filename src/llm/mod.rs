//! LLM integration.
//!
//! Providers implement [`LlmProvider`] over their own wire format. An
//! [`LlmInstance`] is what the `llm` plugins construct: a provider plus the
//! model and default sampling options chosen at creation time.
//!
//! ```ignore
//! use synth_forge::llm::{CompletionOptions, LlmInstance, OpenAiCompatibleClient};
//! use std::sync::Arc;
//!
//! let client = OpenAiCompatibleClient::new("openai", "https://api.openai.com/v1", Some(key), "gpt-4o-mini")?;
//! let llm = LlmInstance::new("openai", "gpt-4o-mini", Arc::new(client));
//! let text = llm.complete("Say hi", CompletionOptions::default()).await?;
//! ```

pub mod catalog;
pub mod client;
pub mod providers;

pub use client::{
    Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, OpenAiCompatibleClient,
    Usage,
};
pub use providers::{GeminiProvider, OllamaProvider};

use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::metrics::{MetricsCollector, TokenUsage};

/// Per-call sampling options. Unset fields fall back to the instance defaults.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl CompletionOptions {
    /// Fields of `self` that are set win over `fallback`.
    pub fn or(self, fallback: CompletionOptions) -> Self {
        Self {
            temperature: self.temperature.or(fallback.temperature),
            max_tokens: self.max_tokens.or(fallback.max_tokens),
            seed: self.seed.or(fallback.seed),
        }
    }
}

/// A configured LLM: provider, model and defaults.
pub struct LlmInstance {
    plugin_id: String,
    model: String,
    system_prompt: Option<String>,
    defaults: CompletionOptions,
    provider: Arc<dyn LlmProvider>,
    metrics: MetricsCollector,
}

impl LlmInstance {
    pub fn new(plugin_id: impl Into<String>, model: impl Into<String>, provider: Arc<dyn LlmProvider>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            model: model.into(),
            system_prompt: None,
            defaults: CompletionOptions::default(),
            provider,
            metrics: MetricsCollector::new(),
        }
    }

    pub fn with_defaults(mut self, defaults: CompletionOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn with_system_prompt(mut self, system_prompt: Option<String>) -> Self {
        self.system_prompt = system_prompt.filter(|s| !s.trim().is_empty());
        self
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn defaults(&self) -> CompletionOptions {
        self.defaults
    }

    /// Sends `prompt` as a single user turn and returns the first choice's text.
    pub async fn complete(&self, prompt: &str, options: CompletionOptions) -> Result<String, LlmError> {
        let options = options.or(self.defaults);

        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system_prompt {
            messages.push(Message::system(system.clone()));
        }
        messages.push(Message::user(prompt));

        let request = GenerationRequest {
            model: self.model.clone(),
            messages,
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            seed: options.seed,
        };

        let provider = self.provider.provider_name().to_string();
        let started = Instant::now();
        let result = self.provider.generate(request).await;
        let latency = started.elapsed().as_secs_f64();

        match result {
            Ok(response) => {
                let tokens = TokenUsage::new(
                    response.usage.prompt_tokens as u64,
                    response.usage.completion_tokens as u64,
                );
                self.metrics.record_llm_request(&provider, true, latency, tokens);
                tracing::debug!(
                    provider = %provider,
                    model = %self.model,
                    latency_secs = latency,
                    total_tokens = response.usage.total_tokens,
                    "LLM completion succeeded"
                );
                response
                    .first_content()
                    .map(String::from)
                    .ok_or(LlmError::EmptyResponse)
            }
            Err(err) => {
                self.metrics
                    .record_llm_request(&provider, false, latency, TokenUsage::default());
                tracing::warn!(provider = %provider, model = %self.model, error = %err, "LLM completion failed");
                Err(err)
            }
        }
    }
}
