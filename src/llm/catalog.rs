//! Built-in LLM provider plugins.

use std::sync::Arc;

use super::providers::{gemini, ollama, GeminiProvider, OllamaProvider};
use super::{CompletionOptions, LlmInstance, LlmProvider, OpenAiCompatibleClient};
use crate::error::{LlmError, RegistryError};
use crate::registry::{PluginDescriptor, PluginRegistry};
use crate::schema::{config_f64, config_str, config_u64, ConfigMap, PropertySpec, SchemaDescriptor};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

const OPENAI_MODELS: [&str; 4] = ["gpt-4o-mini", "gpt-4o", "gpt-4-turbo", "gpt-3.5-turbo"];
const GROQ_MODELS: [&str; 4] = [
    "llama-3.1-8b-instant",
    "llama-3.3-70b-versatile",
    "mixtral-8x7b-32768",
    "gemma2-9b-it",
];
const GEMINI_MODELS: [&str; 3] = ["gemini-1.5-flash", "gemini-1.5-pro", "gemini-2.0-flash"];
const OLLAMA_MODELS: [&str; 4] = ["llama3", "mistral", "phi3", "gemma"];

/// Which credential or endpoint property a provider demands.
enum Requirement {
    ApiKey,
    BaseUrl,
    Nothing,
}

fn api_key_spec(provider: &str) -> PropertySpec {
    PropertySpec::string()
        .title("API Key")
        .description(format!("{} API key", provider))
}

fn base_url_spec(default: Option<&str>) -> PropertySpec {
    let spec = PropertySpec::string()
        .title("Base URL")
        .description("API endpoint base URL");
    match default {
        Some(url) => spec.default_value(url),
        None => spec,
    }
}

/// Schema shared by every provider, with provider-specific properties in
/// between the identity fields and the sampling defaults.
fn provider_schema(
    title: &str,
    requirement: Requirement,
    extra: Vec<(&str, PropertySpec)>,
    default_model: Option<&str>,
) -> SchemaDescriptor {
    let mut schema = SchemaDescriptor::new(title).required_property(
        "model_id",
        PropertySpec::string()
            .title("Model ID")
            .description("Identifier for this LLM configuration"),
    );

    for (name, spec) in extra {
        schema = match (&requirement, name) {
            (Requirement::ApiKey, "api_key") | (Requirement::BaseUrl, "base_url") => {
                schema.required_property(name, spec)
            }
            _ => schema.property(name, spec),
        };
    }

    let model = PropertySpec::string()
        .title("Model")
        .description("Model to request from the provider");
    let model = match default_model {
        Some(m) => model.default_value(m),
        None => model,
    };

    schema
        .property(
            "name",
            PropertySpec::string()
                .title("Name")
                .description("Display name for the LLM provider"),
        )
        .property(
            "description",
            PropertySpec::string()
                .title("Description")
                .description("Description of the LLM provider"),
        )
        .property("model", model)
        .property(
            "temperature",
            PropertySpec::number()
                .title("Temperature")
                .description("Sampling temperature")
                .minimum(0.0)
                .maximum(2.0)
                .default_value(0.7),
        )
        .property(
            "max_tokens",
            PropertySpec::integer()
                .title("Max Tokens")
                .description("Maximum number of tokens to generate")
                .minimum(1.0)
                .default_value(1024),
        )
        .property(
            "system_prompt",
            PropertySpec::string()
                .title("System Prompt")
                .description("System prompt sent with every request"),
        )
}

pub fn openai_schema() -> SchemaDescriptor {
    provider_schema(
        "OpenAI LLM Provider Configuration",
        Requirement::ApiKey,
        vec![
            ("api_key", api_key_spec("OpenAI")),
            ("base_url", base_url_spec(Some(OPENAI_BASE_URL))),
        ],
        Some(OPENAI_MODELS[0]),
    )
}

pub fn groq_schema() -> SchemaDescriptor {
    provider_schema(
        "Groq LLM Provider Configuration",
        Requirement::ApiKey,
        vec![
            ("api_key", api_key_spec("Groq")),
            ("base_url", base_url_spec(Some(GROQ_BASE_URL))),
        ],
        Some(GROQ_MODELS[0]),
    )
}

pub fn custom_schema() -> SchemaDescriptor {
    provider_schema(
        "Custom OpenAI-Compatible Provider Configuration",
        Requirement::BaseUrl,
        vec![
            ("base_url", base_url_spec(None)),
            ("api_key", api_key_spec("Endpoint")),
        ],
        None,
    )
}

pub fn gemini_schema() -> SchemaDescriptor {
    provider_schema(
        "Google Gemini LLM Provider Configuration",
        Requirement::ApiKey,
        vec![("api_key", api_key_spec("Google"))],
        Some(gemini::DEFAULT_MODEL),
    )
}

pub fn ollama_schema() -> SchemaDescriptor {
    provider_schema(
        "Ollama LLM Provider Configuration",
        Requirement::Nothing,
        vec![("base_url", base_url_spec(Some(ollama::OLLAMA_BASE_URL)))],
        Some(ollama::DEFAULT_MODEL),
    )
}

fn construction(plugin: &str) -> impl Fn(LlmError) -> RegistryError + '_ {
    move |e| RegistryError::Construction {
        plugin: plugin.to_string(),
        reason: e.to_string(),
    }
}

/// The model to request: `model` when given, else the configuration's `model_id`.
fn model_name(config: &ConfigMap) -> Result<String, RegistryError> {
    config_str(config, "model")
        .or_else(|| config_str(config, "model_id"))
        .map(String::from)
        .ok_or_else(|| RegistryError::Construction {
            plugin: "llm".to_string(),
            reason: "no model given".to_string(),
        })
}

fn instance(plugin_id: &str, config: &ConfigMap, provider: Arc<dyn LlmProvider>) -> Result<Arc<LlmInstance>, RegistryError> {
    let defaults = CompletionOptions {
        temperature: config_f64(config, "temperature"),
        max_tokens: config_u64(config, "max_tokens").map(|t| t.min(u32::MAX as u64) as u32),
        seed: None,
    };
    Ok(Arc::new(
        LlmInstance::new(plugin_id, model_name(config)?, provider)
            .with_defaults(defaults)
            .with_system_prompt(config_str(config, "system_prompt").map(String::from)),
    ))
}

fn required_key(plugin_id: &str, config: &ConfigMap) -> Result<String, RegistryError> {
    config_str(config, "api_key")
        .map(String::from)
        .ok_or_else(|| construction(plugin_id)(LlmError::MissingApiKey(plugin_id.to_string())))
}

fn build_openai_compatible(
    plugin_id: &'static str,
    default_base: Option<&'static str>,
    key_required: bool,
) -> impl Fn(&ConfigMap) -> Result<Arc<LlmInstance>, RegistryError> + Send + Sync + 'static {
    move |config: &ConfigMap| {
        let api_key = if key_required {
            Some(required_key(plugin_id, config)?)
        } else {
            config_str(config, "api_key").map(String::from)
        };
        let base_url = config_str(config, "base_url")
            .or(default_base)
            .ok_or_else(|| RegistryError::Construction {
                plugin: plugin_id.to_string(),
                reason: "'base_url' is required".to_string(),
            })?;
        let client = OpenAiCompatibleClient::new(plugin_id, base_url, api_key, model_name(config)?)
            .map_err(construction(plugin_id))?;
        instance(plugin_id, config, Arc::new(client))
    }
}

/// Registers the built-in LLM providers.
pub fn register_builtin(registry: &mut PluginRegistry<Arc<LlmInstance>>) -> Result<(), RegistryError> {
    registry.register(
        PluginDescriptor::new("openai", "OpenAI", openai_schema())
            .with_description("OpenAI chat completions API")
            .with_supported_models(OPENAI_MODELS),
        build_openai_compatible("openai", Some(OPENAI_BASE_URL), true),
    )?;

    registry.register(
        PluginDescriptor::new("groq", "Groq", groq_schema())
            .with_description("Groq's OpenAI-compatible API")
            .with_supported_models(GROQ_MODELS),
        build_openai_compatible("groq", Some(GROQ_BASE_URL), true),
    )?;

    registry.register(
        PluginDescriptor::new("custom", "Custom Endpoint", custom_schema())
            .with_description("Any OpenAI-compatible endpoint such as vLLM or LiteLLM")
            .with_supported_models(Vec::<String>::new()),
        build_openai_compatible("custom", None, false),
    )?;

    registry.register(
        PluginDescriptor::new("gemini", "Google Gemini", gemini_schema())
            .with_description("Google Gemini generateContent API")
            .with_supported_models(GEMINI_MODELS),
        |config: &ConfigMap| {
            let api_key = required_key("gemini", config)?;
            let provider =
                GeminiProvider::new(api_key, model_name(config)?).map_err(construction("gemini"))?;
            instance("gemini", config, Arc::new(provider))
        },
    )?;

    registry.register(
        PluginDescriptor::new("ollama", "Ollama", ollama_schema())
            .with_description("Locally hosted models served by Ollama")
            .with_supported_models(OLLAMA_MODELS),
        |config: &ConfigMap| {
            let base_url = config_str(config, "base_url").unwrap_or(ollama::OLLAMA_BASE_URL);
            let provider =
                OllamaProvider::new(base_url, model_name(config)?).map_err(construction("ollama"))?;
            instance("ollama", config, Arc::new(provider))
        },
    )?;

    Ok(())
}
