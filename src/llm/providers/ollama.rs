//! Local Ollama `/api/generate` provider.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::LlmError;
use crate::llm::client::{error_from_status, http_client};
use crate::llm::{Choice, GenerationRequest, GenerationResponse, LlmProvider, Message, Usage};

pub const OLLAMA_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3";

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    default_model: String,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        Ok(Self {
            client: http_client()?,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            default_model: model.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[derive(Debug, Serialize)]
struct ApiRequest {
    model: String,
    prompt: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    stream: bool,
    options: ApiOptions,
}

#[derive(Debug, Serialize)]
struct ApiOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    #[serde(default)]
    model: String,
    #[serde(default)]
    response: String,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: u32,
    #[serde(default)]
    eval_count: u32,
}

fn build_request(request: GenerationRequest, model: String) -> ApiRequest {
    ApiRequest {
        model,
        prompt: request.user_prompt(),
        system: request.system_prompt().map(String::from),
        stream: false,
        options: ApiOptions {
            temperature: request.temperature,
            num_predict: request.max_tokens,
            seed: request.seed,
        },
    }
}

fn into_response(api: ApiResponse, model: String) -> GenerationResponse {
    GenerationResponse {
        id: String::new(),
        model: if api.model.is_empty() { model } else { api.model },
        choices: vec![Choice {
            index: 0,
            message: Message::assistant(api.response),
            finish_reason: api.done_reason.unwrap_or_else(|| "stop".to_string()),
        }],
        usage: Usage {
            prompt_tokens: api.prompt_eval_count,
            completion_tokens: api.eval_count,
            total_tokens: api.prompt_eval_count + api.eval_count,
        },
    }
}

#[async_trait]
impl LlmProvider for OllamaProvider {
    fn provider_name(&self) -> &str {
        "ollama"
    }

    async fn generate(&self, request: GenerationRequest) -> Result<GenerationResponse, LlmError> {
        let model = if request.model.is_empty() {
            self.default_model.clone()
        } else {
            request.model.clone()
        };

        let http_response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&build_request(request, model.clone()))
            .send()
            .await
            .map_err(|e| LlmError::RequestFailed(e.to_string()))?;

        let status = http_response.status();
        if !status.is_success() {
            let error_text = http_response
                .text()
                .await
                .unwrap_or_else(|_| "Failed to read error response".to_string());
            return Err(error_from_status(status.as_u16(), error_text));
        }

        let api_response: ApiResponse = http_response
            .json()
            .await
            .map_err(|e| LlmError::ParseError(format!("Failed to parse Ollama response: {}", e)))?;

        Ok(into_response(api_response, model))
    }
}
