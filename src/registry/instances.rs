//! Process-wide table of live plugin instances.
//!
//! The [`InstanceManager`] is the only owner of instances. Callers hold an
//! instance id and go back through the manager for every use. Instances are
//! never updated or removed; a different configuration means a new instance.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::{PluginCatalog, PluginKind};
use crate::datasource::{DataSource, Document};
use crate::error::{RegistryError, ServiceError};
use crate::generator::GeneratorSettings;
use crate::llm::LlmInstance;
use crate::metrics::MetricsCollector;
use crate::schema::ConfigMap;

/// A constructed instance of one of the three concerns.
#[derive(Clone)]
pub enum LiveInstance {
    DataSource(Arc<dyn DataSource>),
    Llm(Arc<LlmInstance>),
    Generator(Arc<GeneratorSettings>),
}

impl LiveInstance {
    pub fn kind(&self) -> PluginKind {
        match self {
            Self::DataSource(_) => PluginKind::DataSource,
            Self::Llm(_) => PluginKind::Llm,
            Self::Generator(_) => PluginKind::Generator,
        }
    }
}

struct InstanceRecord {
    plugin_id: String,
    /// Configuration exactly as the caller sent it.
    config: ConfigMap,
    created_at: DateTime<Utc>,
    instance: LiveInstance,
}

/// What callers may learn about an instance.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstanceInfo {
    pub instance_id: String,
    pub kind: PluginKind,
    pub plugin_id: String,
    pub config: ConfigMap,
    pub created_at: DateTime<Utc>,
}

/// Owns every live instance created from the plugin catalog.
pub struct InstanceManager {
    catalog: Arc<PluginCatalog>,
    table: RwLock<HashMap<String, InstanceRecord>>,
    metrics: MetricsCollector,
}

impl InstanceManager {
    pub fn new(catalog: Arc<PluginCatalog>) -> Self {
        Self {
            catalog,
            table: RwLock::new(HashMap::new()),
            metrics: MetricsCollector::new(),
        }
    }

    pub fn catalog(&self) -> &PluginCatalog {
        &self.catalog
    }

    /// Instantiates `plugin_id` from the registry of `kind` and stores it
    /// under a fresh id.
    ///
    /// Construction happens outside the table lock. Id generation and
    /// insertion happen under one write lock, so concurrent creates never
    /// share an id.
    pub async fn create(&self, kind: PluginKind, plugin_id: &str, config: ConfigMap) -> Result<String, RegistryError> {
        let instance = match kind {
            PluginKind::DataSource => {
                LiveInstance::DataSource(self.catalog.datasources.instantiate(plugin_id, &config)?)
            }
            PluginKind::Llm => LiveInstance::Llm(self.catalog.llms.instantiate(plugin_id, &config)?),
            PluginKind::Generator => {
                LiveInstance::Generator(self.catalog.generators.instantiate(plugin_id, &config)?)
            }
        };

        let (instance_id, live_of_kind) = {
            let mut table = self.table.write().await;
            let mut instance_id = new_instance_id(kind);
            while table.contains_key(&instance_id) {
                instance_id = new_instance_id(kind);
            }
            table.insert(
                instance_id.clone(),
                InstanceRecord {
                    plugin_id: plugin_id.to_string(),
                    config,
                    created_at: Utc::now(),
                    instance,
                },
            );
            let live_of_kind = table.values().filter(|r| r.instance.kind() == kind).count();
            (instance_id, live_of_kind)
        };

        self.metrics.set_live_instances(kind.as_str(), live_of_kind);
        info!(kind = %kind, plugin_id = %plugin_id, instance_id = %instance_id, "Created instance");
        Ok(instance_id)
    }

    /// Plugin id and original configuration of an instance of any kind.
    pub async fn get_info(&self, instance_id: &str) -> Result<InstanceInfo, RegistryError> {
        let table = self.table.read().await;
        let record = table
            .get(instance_id)
            .ok_or_else(|| RegistryError::InstanceNotFound {
                kind: "Plugin".to_string(),
                id: instance_id.to_string(),
            })?;
        Ok(InstanceInfo {
            instance_id: instance_id.to_string(),
            kind: record.instance.kind(),
            plugin_id: record.plugin_id.clone(),
            config: record.config.clone(),
            created_at: record.created_at,
        })
    }

    /// Like [`get_info`](Self::get_info) but only matches instances of `kind`.
    pub async fn get_info_of(&self, kind: PluginKind, instance_id: &str) -> Result<InstanceInfo, RegistryError> {
        let info = self.get_info(instance_id).await.map_err(|_| not_found(kind, instance_id))?;
        if info.kind != kind {
            return Err(not_found(kind, instance_id));
        }
        Ok(info)
    }

    async fn lookup(&self, kind: PluginKind, instance_id: &str) -> Result<LiveInstance, RegistryError> {
        let table = self.table.read().await;
        match table.get(instance_id) {
            Some(record) if record.instance.kind() == kind => Ok(record.instance.clone()),
            _ => Err(not_found(kind, instance_id)),
        }
    }

    pub async fn datasource(&self, instance_id: &str) -> Result<Arc<dyn DataSource>, RegistryError> {
        match self.lookup(PluginKind::DataSource, instance_id).await? {
            LiveInstance::DataSource(source) => Ok(source),
            _ => Err(not_found(PluginKind::DataSource, instance_id)),
        }
    }

    pub async fn llm(&self, instance_id: &str) -> Result<Arc<LlmInstance>, RegistryError> {
        match self.lookup(PluginKind::Llm, instance_id).await? {
            LiveInstance::Llm(llm) => Ok(llm),
            _ => Err(not_found(PluginKind::Llm, instance_id)),
        }
    }

    pub async fn generator(&self, instance_id: &str) -> Result<Arc<GeneratorSettings>, RegistryError> {
        match self.lookup(PluginKind::Generator, instance_id).await? {
            LiveInstance::Generator(generator) => Ok(generator),
            _ => Err(not_found(PluginKind::Generator, instance_id)),
        }
    }

    /// Loads documents from a data-source instance.
    ///
    /// The table lock is released before extraction starts.
    pub async fn load_documents(&self, instance_id: &str) -> Result<Vec<Document>, ServiceError> {
        let source = self.datasource(instance_id).await?;
        let documents = source.load().await?;
        debug!(instance_id = %instance_id, documents = documents.len(), "Loaded documents");
        Ok(documents)
    }

    /// Number of live instances across all kinds.
    pub async fn len(&self) -> usize {
        self.table.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.table.read().await.is_empty()
    }
}

fn new_instance_id(kind: PluginKind) -> String {
    format!("{}_{}", kind.id_prefix(), Uuid::new_v4().simple())
}

fn not_found(kind: PluginKind, instance_id: &str) -> RegistryError {
    RegistryError::InstanceNotFound {
        kind: kind.label().to_string(),
        id: instance_id.to_string(),
    }
}
