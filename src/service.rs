//! The service layer shared by the REST API, the CLI and the workflow
//! controller.
//!
//! [`ForgeService`] owns the plugin catalog (through its
//! [`InstanceManager`]) and the datasets produced so far. Every generation,
//! whether requested through a generator instance or in one shot, goes
//! through [`crate::generator::generate`].

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::datasource::Document;
use crate::error::{RegistryError, ServiceError, ValidationError};
use crate::export::{export_dataset, ExportFormat};
use crate::generator::{self, Dataset, DatasetFormat, GenerationPlan};
use crate::llm::CompletionOptions;
use crate::registry::{InstanceInfo, InstanceManager, PluginCatalog, PluginKind};
use crate::schema::ConfigMap;

/// Generator used by one-shot generation requests.
pub const ONE_SHOT_GENERATOR: &str = "synthetic_generator";

/// Finished runs kept for export before the oldest is dropped.
pub const DEFAULT_MAX_RUNS: usize = 100;

/// Finished runs in insertion order, bounded by `capacity`.
#[derive(Debug)]
struct RunStore {
    runs: HashMap<String, Arc<Dataset>>,
    order: VecDeque<String>,
    capacity: usize,
}

impl RunStore {
    fn new(capacity: usize) -> Self {
        Self {
            runs: HashMap::new(),
            order: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    fn insert(&mut self, generation_id: String, dataset: Arc<Dataset>) {
        while self.order.len() >= self.capacity {
            match self.order.pop_front() {
                Some(oldest) => {
                    self.runs.remove(&oldest);
                    debug!(generation_id = %oldest, "Evicted generation run");
                }
                None => break,
            }
        }
        self.order.push_back(generation_id.clone());
        self.runs.insert(generation_id, dataset);
    }

    fn get(&self, generation_id: &str) -> Option<Arc<Dataset>> {
        self.runs.get(generation_id).cloned()
    }
}

/// Body of a generate call against a generator instance.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenerateRequest {
    pub datasource_id: String,
    pub llm_id: String,
    #[serde(default)]
    pub count: Option<usize>,
    #[serde(default)]
    pub format: Option<DatasetFormat>,
    #[serde(default)]
    pub options: ConfigMap,
}

/// Body of a one-shot generation: create, load and generate in one call.
#[derive(Debug, Clone, Deserialize)]
pub struct OneShotRequest {
    pub data_source_config: ConfigMap,
    pub llm_config: ConfigMap,
    pub dataset_type: DatasetFormat,
    pub sample_size: usize,
    #[serde(default)]
    pub options: ConfigMap,
}

/// A finished generation kept for later export.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationRun {
    pub generation_id: String,
    #[serde(flatten)]
    pub dataset: Dataset,
}

/// Facade over the instance manager and the generation orchestrator.
pub struct ForgeService {
    instances: InstanceManager,
    runs: RwLock<RunStore>,
}

impl ForgeService {
    pub fn new(catalog: Arc<PluginCatalog>) -> Self {
        Self {
            instances: InstanceManager::new(catalog),
            runs: RwLock::new(RunStore::new(DEFAULT_MAX_RUNS)),
        }
    }

    /// Keeps at most `capacity` finished runs (at least one).
    pub fn with_run_capacity(mut self, capacity: usize) -> Self {
        self.runs = RwLock::new(RunStore::new(capacity));
        self
    }

    /// A service over the built-in plugins.
    pub fn with_builtin_plugins(data_dir: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        Ok(Self::new(Arc::new(PluginCatalog::builtin(data_dir)?)))
    }

    pub fn catalog(&self) -> &PluginCatalog {
        self.instances.catalog()
    }

    pub fn instances(&self) -> &InstanceManager {
        &self.instances
    }

    /// Configuration key naming the plugin in a create request body.
    pub fn plugin_key(kind: PluginKind) -> &'static str {
        match kind {
            PluginKind::DataSource => "source_id",
            PluginKind::Llm => "provider",
            PluginKind::Generator => "generator_id",
        }
    }

    /// Creates an instance from a request body that names its plugin.
    ///
    /// The plugin id is read from the kind's key (see [`plugin_key`](Self::plugin_key))
    /// or from a generic `plugin_id` key. The body is stored unchanged.
    pub async fn create(&self, kind: PluginKind, config: ConfigMap) -> Result<String, ServiceError> {
        let key = Self::plugin_key(kind);
        let plugin_id = config
            .get(key)
            .or_else(|| config.get("plugin_id"))
            .and_then(|v| v.as_str())
            .filter(|s| !s.is_empty())
            .map(String::from)
            .ok_or_else(|| ValidationError::MissingRequired {
                property: key.to_string(),
            })?;
        self.create_with_plugin(kind, &plugin_id, config).await
    }

    pub async fn create_with_plugin(
        &self,
        kind: PluginKind,
        plugin_id: &str,
        config: ConfigMap,
    ) -> Result<String, ServiceError> {
        Ok(self.instances.create(kind, plugin_id, config).await?)
    }

    pub async fn info(&self, kind: PluginKind, instance_id: &str) -> Result<InstanceInfo, ServiceError> {
        Ok(self.instances.get_info_of(kind, instance_id).await?)
    }

    pub async fn load_documents(&self, datasource_id: &str) -> Result<Vec<Document>, ServiceError> {
        self.instances.load_documents(datasource_id).await
    }

    /// Sends one prompt to an LLM instance.
    pub async fn complete(
        &self,
        llm_id: &str,
        prompt: &str,
        options: CompletionOptions,
    ) -> Result<String, ServiceError> {
        if prompt.trim().is_empty() {
            return Err(ServiceError::InvalidRequest("prompt must not be empty".to_string()));
        }
        let llm = self.instances.llm(llm_id).await?;
        Ok(llm.complete(prompt, options).await?)
    }

    /// Generates a dataset with a generator instance.
    pub async fn generate(&self, generator_id: &str, request: GenerateRequest) -> Result<GenerationRun, ServiceError> {
        let settings = self.instances.generator(generator_id).await?;
        let plan = settings.plan(request.count, request.format, Some(&request.options))?;
        self.run_plan(&request.datasource_id, &request.llm_id, &plan).await
    }

    /// Creates the data-source and LLM instances, then generates.
    ///
    /// Returns the run and the ids of the instances it created.
    pub async fn generate_once(&self, request: OneShotRequest) -> Result<(GenerationRun, String, String), ServiceError> {
        let mut generator_config = request.options;
        generator_config.insert("format".to_string(), request.dataset_type.as_str().into());
        generator_config.insert("sample_count".to_string(), request.sample_size.into());
        let settings = self
            .catalog()
            .generators
            .instantiate(ONE_SHOT_GENERATOR, &generator_config)?;
        let plan = settings.plan(None, None, None)?;

        let datasource_id = self.create(PluginKind::DataSource, request.data_source_config).await?;
        let llm_id = self.create(PluginKind::Llm, request.llm_config).await?;

        let run = self.run_plan(&datasource_id, &llm_id, &plan).await?;
        Ok((run, datasource_id, llm_id))
    }

    async fn run_plan(&self, datasource_id: &str, llm_id: &str, plan: &GenerationPlan) -> Result<GenerationRun, ServiceError> {
        let llm = self.instances.llm(llm_id).await?;
        let documents = self.instances.load_documents(datasource_id).await?;
        let dataset = generator::generate(&documents, &llm, plan).await?;

        let generation_id = format!("run_{}", Uuid::new_v4().simple());
        self.runs
            .write()
            .await
            .insert(generation_id.clone(), Arc::new(dataset.clone()));
        info!(
            generation_id = %generation_id,
            datasource_id = %datasource_id,
            llm_id = %llm_id,
            items = dataset.len(),
            "Stored generation run"
        );
        Ok(GenerationRun { generation_id, dataset })
    }

    /// A dataset produced earlier by this service.
    pub async fn run(&self, generation_id: &str) -> Result<Arc<Dataset>, ServiceError> {
        self.runs
            .read()
            .await
            .get(generation_id)
            .ok_or_else(|| {
                ServiceError::Registry(RegistryError::InstanceNotFound {
                    kind: "Generation".to_string(),
                    id: generation_id.to_string(),
                })
            })
    }

    pub async fn export(&self, generation_id: &str, format: ExportFormat) -> Result<String, ServiceError> {
        let dataset = self.run(generation_id).await?;
        Ok(export_dataset(&dataset, format)?)
    }
}
