//! Dataset generation.
//!
//! A generator plugin does not call anything itself; it fixes the parameters
//! of a run (format, sample count, batching, seed). The
//! [`orchestrator`] combines those parameters with a data source's documents
//! and an LLM instance to produce a [`Dataset`].
//!
//! ```ignore
//! use synth_forge::generator::{orchestrator, GenerationPlan, DatasetFormat};
//!
//! let plan = GenerationPlan::new(DatasetFormat::Qa, 20).with_seed(42);
//! let dataset = orchestrator::generate(&documents, &llm, &plan).await?;
//! ```

pub mod orchestrator;
pub mod prompts;

pub use orchestrator::generate;

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GenerationError, RegistryError};
use crate::registry::{PluginDescriptor, PluginRegistry};
use crate::schema::{config_bool, config_f64, config_str, config_u64, ConfigMap, PropertySpec, SchemaDescriptor};

pub const DEFAULT_SAMPLE_COUNT: usize = 10;
pub const MAX_SAMPLE_COUNT: usize = 10_000;
pub const MAX_QUESTIONS_PER_DOCUMENT: usize = 100;
pub const DEFAULT_BATCH_SIZE: usize = 5;
pub const MAX_BATCH_SIZE: usize = 50;
pub const DEFAULT_MAX_TOKENS: u32 = 2048;
pub const DEFAULT_MAX_CONTEXT_CHARS: usize = 12_000;

/// Shape of the records a run asks the model for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetFormat {
    Qa,
    Instruction,
    Conversation,
    Classification,
    Text,
}

impl DatasetFormat {
    pub const ALL: [DatasetFormat; 5] = [
        Self::Qa,
        Self::Instruction,
        Self::Conversation,
        Self::Classification,
        Self::Text,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Qa => "qa",
            Self::Instruction => "instruction",
            Self::Conversation => "conversation",
            Self::Classification => "classification",
            Self::Text => "text",
        }
    }
}

impl fmt::Display for DatasetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetFormat {
    type Err = GenerationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| GenerationError::InvalidPlan(format!("unknown dataset format '{}'", s)))
    }
}

/// One generated example: the raw model text plus where it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetItem {
    pub content: String,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
}

/// The result of one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub format: DatasetFormat,
    pub items: Vec<DatasetItem>,
    #[serde(default)]
    pub metadata: serde_json::Map<String, Value>,
    /// Set only by best-effort runs that stopped early.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Fully resolved parameters of one generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationPlan {
    pub format: DatasetFormat,
    pub sample_count: usize,
    pub batch_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    pub max_context_chars: usize,
    /// Return completed items with an error note instead of failing.
    pub best_effort: bool,
    /// When set, each document is prompted on its own for this many items
    /// instead of packing documents into shared chunks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub questions_per_document: Option<usize>,
    /// Adds the prompted text as a `context` field on object records.
    #[serde(default)]
    pub include_document_content: bool,
    /// Wraps each `question`; `{{question}}` marks where it goes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_template: Option<String>,
    /// Wraps each `answer`; `{{answer}}` marks where it goes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer_template: Option<String>,
}

impl GenerationPlan {
    pub fn new(format: DatasetFormat, sample_count: usize) -> Self {
        Self {
            format,
            sample_count,
            batch_size: DEFAULT_BATCH_SIZE,
            seed: None,
            temperature: None,
            max_tokens: Some(DEFAULT_MAX_TOKENS),
            max_context_chars: DEFAULT_MAX_CONTEXT_CHARS,
            best_effort: false,
            questions_per_document: None,
            include_document_content: false,
            question_template: None,
            answer_template: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_best_effort(mut self, best_effort: bool) -> Self {
        self.best_effort = best_effort;
        self
    }

    pub fn with_max_context_chars(mut self, max_context_chars: usize) -> Self {
        self.max_context_chars = max_context_chars;
        self
    }

    pub fn with_questions_per_document(mut self, questions: usize) -> Self {
        self.questions_per_document = Some(questions);
        self
    }

    pub fn with_document_content(mut self, include: bool) -> Self {
        self.include_document_content = include;
        self
    }

    pub fn with_templates(mut self, question: Option<String>, answer: Option<String>) -> Self {
        self.question_template = question;
        self.answer_template = answer;
        self
    }

    /// Overrides fields present in `options`; unknown keys are ignored.
    pub fn apply_options(mut self, options: &ConfigMap) -> Result<Self, GenerationError> {
        if let Some(format) = config_str(options, "format") {
            self.format = format.parse()?;
        }
        if let Some(count) = config_u64(options, "sample_count") {
            self.sample_count = usize::try_from(count).unwrap_or(usize::MAX);
        }
        if let Some(batch_size) = config_u64(options, "batch_size") {
            self.batch_size = batch_size as usize;
        }
        if let Some(seed) = config_u64(options, "seed") {
            self.seed = Some(seed);
        }
        if let Some(temperature) = config_f64(options, "temperature") {
            self.temperature = Some(temperature);
        }
        if let Some(max_tokens) = config_u64(options, "max_tokens") {
            self.max_tokens = Some(max_tokens.min(u32::MAX as u64) as u32);
        }
        if let Some(max_chars) = config_u64(options, "max_context_chars") {
            self.max_context_chars = max_chars as usize;
        }
        if let Some(best_effort) = config_bool(options, "best_effort") {
            self.best_effort = best_effort;
        }
        if let Some(questions) = config_u64(options, "questions_per_document") {
            self.questions_per_document = Some(usize::try_from(questions).unwrap_or(usize::MAX));
        }
        if let Some(include) = config_bool(options, "include_document_content") {
            self.include_document_content = include;
        }
        if let Some(template) = config_str(options, "question_template") {
            self.question_template = Some(template.to_string());
        }
        if let Some(template) = config_str(options, "answer_template") {
            self.answer_template = Some(template.to_string());
        }
        Ok(self)
    }

    /// Checks the plan before any LLM call is made.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.sample_count == 0 || self.sample_count > MAX_SAMPLE_COUNT {
            return Err(GenerationError::InvalidPlan(format!(
                "sample_count must be between 1 and {}",
                MAX_SAMPLE_COUNT
            )));
        }
        if let Some(questions) = self.questions_per_document {
            if questions == 0 || questions > MAX_QUESTIONS_PER_DOCUMENT {
                return Err(GenerationError::InvalidPlan(format!(
                    "questions_per_document must be between 1 and {}",
                    MAX_QUESTIONS_PER_DOCUMENT
                )));
            }
        }
        if self.batch_size == 0 || self.batch_size > MAX_BATCH_SIZE {
            return Err(GenerationError::InvalidPlan(format!(
                "batch_size must be between 1 and {}",
                MAX_BATCH_SIZE
            )));
        }
        if self.max_context_chars == 0 {
            return Err(GenerationError::InvalidPlan(
                "max_context_chars must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

/// What a generator plugin instance holds: its default plan and the formats
/// it may produce.
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    pub plugin_id: String,
    pub allowed_formats: Vec<DatasetFormat>,
    pub defaults: GenerationPlan,
}

impl GeneratorSettings {
    /// Builds the plan for one run, applying request-time overrides.
    pub fn plan(
        &self,
        count: Option<usize>,
        format: Option<DatasetFormat>,
        options: Option<&ConfigMap>,
    ) -> Result<GenerationPlan, GenerationError> {
        let mut plan = self.defaults.clone();
        if let Some(options) = options {
            plan = plan.apply_options(options)?;
        }
        if let Some(count) = count {
            plan.sample_count = count;
        }
        if let Some(format) = format {
            plan.format = format;
        }
        if !self.allowed_formats.contains(&plan.format) {
            return Err(GenerationError::InvalidPlan(format!(
                "generator '{}' does not produce '{}' datasets",
                self.plugin_id, plan.format
            )));
        }
        plan.validate()?;
        Ok(plan)
    }
}

fn generator_schema(title: &str, formats: &[DatasetFormat]) -> SchemaDescriptor {
    SchemaDescriptor::new(title)
        .property(
            "generator_id",
            PropertySpec::string()
                .title("Generator ID")
                .description("Plugin identifier of the generator"),
        )
        .property("name", PropertySpec::string().title("Name"))
        .property("description", PropertySpec::string().title("Description"))
        .property(
            "format",
            PropertySpec::string()
                .title("Format")
                .choices(formats.iter().map(DatasetFormat::as_str))
                .default_value("qa"),
        )
        .property(
            "sample_count",
            PropertySpec::integer()
                .title("Sample Count")
                .description("Number of examples to generate")
                .minimum(1.0)
                .maximum(MAX_SAMPLE_COUNT as f64)
                .default_value(DEFAULT_SAMPLE_COUNT),
        )
        .property(
            "batch_size",
            PropertySpec::integer()
                .title("Batch Size")
                .description("Examples requested per LLM call")
                .minimum(1.0)
                .maximum(MAX_BATCH_SIZE as f64)
                .default_value(DEFAULT_BATCH_SIZE),
        )
        .property(
            "seed",
            PropertySpec::integer()
                .title("Seed")
                .description("Makes chunk order and provider sampling reproducible")
                .minimum(0.0),
        )
        .property(
            "temperature",
            PropertySpec::number()
                .title("Temperature")
                .description("Overrides the LLM instance's temperature")
                .minimum(0.0)
                .maximum(2.0),
        )
        .property(
            "max_tokens",
            PropertySpec::integer()
                .title("Max Tokens")
                .minimum(1.0)
                .default_value(DEFAULT_MAX_TOKENS),
        )
        .property(
            "max_context_chars",
            PropertySpec::integer()
                .title("Max Context Characters")
                .description("Document text embedded per prompt")
                .minimum(1.0)
                .default_value(DEFAULT_MAX_CONTEXT_CHARS)
                .hidden(),
        )
        .property(
            "best_effort",
            PropertySpec::boolean()
                .title("Best Effort")
                .description("Keep completed items when a later LLM call fails")
                .default_value(false),
        )
}

pub const QA_FORMATS: [DatasetFormat; 2] = [DatasetFormat::Qa, DatasetFormat::Instruction];

pub fn qa_schema() -> SchemaDescriptor {
    generator_schema("QA Dataset Generator Configuration", &QA_FORMATS)
        .property(
            "questions_per_document",
            PropertySpec::integer()
                .title("Questions Per Document")
                .description("Prompt each document separately for this many pairs")
                .minimum(1.0)
                .maximum(MAX_QUESTIONS_PER_DOCUMENT as f64),
        )
        .property(
            "include_document_content",
            PropertySpec::boolean()
                .title("Include Document Content")
                .description("Add the source text as a 'context' field on every pair")
                .default_value(true),
        )
        .property(
            "question_template",
            PropertySpec::string()
                .title("Question Template")
                .description("Template for questions (use {{question}} as placeholder)"),
        )
        .property(
            "answer_template",
            PropertySpec::string()
                .title("Answer Template")
                .description("Template for answers (use {{answer}} as placeholder)"),
        )
}

pub fn synthetic_schema() -> SchemaDescriptor {
    generator_schema("Synthetic Dataset Generator Configuration", &DatasetFormat::ALL)
}

fn settings_factory(
    plugin_id: &'static str,
    formats: &'static [DatasetFormat],
) -> impl Fn(&ConfigMap) -> Result<Arc<GeneratorSettings>, RegistryError> + Send + Sync + 'static {
    move |config: &ConfigMap| {
        let construction = |e: GenerationError| RegistryError::Construction {
            plugin: plugin_id.to_string(),
            reason: e.to_string(),
        };
        let defaults = GenerationPlan::new(DatasetFormat::Qa, DEFAULT_SAMPLE_COUNT)
            .apply_options(config)
            .map_err(construction)?;
        let settings = GeneratorSettings {
            plugin_id: plugin_id.to_string(),
            allowed_formats: formats.to_vec(),
            defaults,
        };
        settings.plan(None, None, None).map_err(construction)?;
        Ok(Arc::new(settings))
    }
}

/// Registers the built-in generators.
pub fn register_builtin(registry: &mut PluginRegistry<Arc<GeneratorSettings>>) -> Result<(), RegistryError> {
    registry.register(
        PluginDescriptor::new("qa_generator", "QA Generator", qa_schema())
            .with_description("Question-answer or instruction-response pairs grounded in the documents"),
        settings_factory("qa_generator", &QA_FORMATS),
    )?;
    registry.register(
        PluginDescriptor::new("synthetic_generator", "Synthetic Generator", synthetic_schema())
            .with_description("QA, instruction, conversation, classification or free-text examples"),
        settings_factory("synthetic_generator", &DatasetFormat::ALL),
    )?;
    Ok(())
}
