//! Plugin registries.
//!
//! Each concern (data sources, LLM providers, dataset generators) has its own
//! [`PluginRegistry`], populated once at startup with a [`PluginDescriptor`]
//! and a factory per plugin. After startup a registry is only read, so it is
//! shared behind an `Arc` without locking.
//!
//! Live instances built from these registries are tracked by
//! [`instances::InstanceManager`].

pub mod instances;

pub use instances::{InstanceInfo, InstanceManager, LiveInstance};

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::datasource::DataSource;
use crate::error::RegistryError;
use crate::generator::GeneratorSettings;
use crate::llm::LlmInstance;
use crate::schema::{ConfigMap, SchemaDescriptor};

/// The three pluggable concerns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    DataSource,
    Llm,
    Generator,
}

impl PluginKind {
    /// Human-readable name used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::DataSource => "Data source",
            Self::Llm => "LLM",
            Self::Generator => "Generator",
        }
    }

    /// Prefix for generated instance ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::DataSource => "ds",
            Self::Llm => "llm",
            Self::Generator => "gen",
        }
    }

    /// Metric label value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DataSource => "datasource",
            Self::Llm => "llm",
            Self::Generator => "generator",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Catalog metadata for one registered plugin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PluginDescriptor {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub config_schema: SchemaDescriptor,
    /// Only advertised by LLM providers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supported_models: Option<Vec<String>>,
}

impl PluginDescriptor {
    pub fn new(id: impl Into<String>, name: impl Into<String>, config_schema: SchemaDescriptor) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: None,
            config_schema,
            supported_models: None,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_supported_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.supported_models = Some(models.into_iter().map(Into::into).collect());
        self
    }
}

/// Builds a live instance from a configuration that already passed schema
/// validation and had its defaults filled in.
pub type Factory<T> = Arc<dyn Fn(&ConfigMap) -> Result<T, RegistryError> + Send + Sync>;

struct PluginEntry<T> {
    descriptor: PluginDescriptor,
    factory: Factory<T>,
}

/// Catalog of the plugins available for one concern.
pub struct PluginRegistry<T> {
    kind: PluginKind,
    entries: Vec<PluginEntry<T>>,
}

impl<T> PluginRegistry<T> {
    /// Creates an empty registry.
    pub fn new(kind: PluginKind) -> Self {
        Self {
            kind,
            entries: Vec::new(),
        }
    }

    pub fn kind(&self) -> PluginKind {
        self.kind
    }

    /// Registers a plugin.
    ///
    /// Fails if the id is taken or the descriptor's schema is inconsistent.
    pub fn register<F>(&mut self, descriptor: PluginDescriptor, factory: F) -> Result<(), RegistryError>
    where
        F: Fn(&ConfigMap) -> Result<T, RegistryError> + Send + Sync + 'static,
    {
        if self.entries.iter().any(|e| e.descriptor.id == descriptor.id) {
            return Err(RegistryError::DuplicatePlugin {
                kind: self.kind.label().to_string(),
                id: descriptor.id,
            });
        }
        descriptor.config_schema.check()?;

        tracing::debug!(kind = %self.kind, plugin_id = %descriptor.id, "Registered plugin");
        self.entries.push(PluginEntry {
            descriptor,
            factory: Arc::new(factory),
        });
        Ok(())
    }

    /// All descriptors in registration order. Empty when nothing is registered.
    pub fn list(&self) -> Vec<&PluginDescriptor> {
        self.entries.iter().map(|e| &e.descriptor).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, plugin_id: &str) -> bool {
        self.entries.iter().any(|e| e.descriptor.id == plugin_id)
    }

    fn entry(&self, plugin_id: &str) -> Result<&PluginEntry<T>, RegistryError> {
        self.entries
            .iter()
            .find(|e| e.descriptor.id == plugin_id)
            .ok_or_else(|| RegistryError::PluginNotFound {
                kind: self.kind.label().to_string(),
                id: plugin_id.to_string(),
            })
    }

    /// Looks up a descriptor. Unknown ids are an error, never a fallback.
    pub fn describe(&self, plugin_id: &str) -> Result<&PluginDescriptor, RegistryError> {
        self.entry(plugin_id).map(|e| &e.descriptor)
    }

    /// Validates `config` against the plugin's schema and constructs an instance.
    ///
    /// Unknown properties are passed through to the factory. The returned
    /// instance is not tracked anywhere; see [`InstanceManager::create`].
    pub fn instantiate(&self, plugin_id: &str, config: &ConfigMap) -> Result<T, RegistryError> {
        let entry = self.entry(plugin_id)?;
        let resolved = entry.descriptor.config_schema.resolve(config)?;
        (entry.factory)(&resolved)
    }
}

/// The three registries with every built-in plugin registered.
pub struct PluginCatalog {
    pub datasources: PluginRegistry<Arc<dyn DataSource>>,
    pub llms: PluginRegistry<Arc<LlmInstance>>,
    pub generators: PluginRegistry<Arc<GeneratorSettings>>,
}

impl PluginCatalog {
    /// Empty registries, for tests that register their own plugins.
    pub fn empty() -> Self {
        Self {
            datasources: PluginRegistry::new(PluginKind::DataSource),
            llms: PluginRegistry::new(PluginKind::Llm),
            generators: PluginRegistry::new(PluginKind::Generator),
        }
    }

    /// Registers the built-in plugins. Relative file paths given to file-based
    /// data sources are resolved against `data_dir`.
    pub fn builtin(data_dir: impl Into<PathBuf>) -> Result<Self, RegistryError> {
        let mut catalog = Self::empty();
        crate::datasource::register_builtin(&mut catalog.datasources, data_dir.into())?;
        crate::llm::catalog::register_builtin(&mut catalog.llms)?;
        crate::generator::register_builtin(&mut catalog.generators)?;

        tracing::info!(
            datasources = catalog.datasources.len(),
            llms = catalog.llms.len(),
            generators = catalog.generators.len(),
            "Plugin catalog initialized"
        );
        Ok(catalog)
    }

    /// Descriptor lookup across registries.
    pub fn describe(&self, kind: PluginKind, plugin_id: &str) -> Result<&PluginDescriptor, RegistryError> {
        match kind {
            PluginKind::DataSource => self.datasources.describe(plugin_id),
            PluginKind::Llm => self.llms.describe(plugin_id),
            PluginKind::Generator => self.generators.describe(plugin_id),
        }
    }

    pub fn list(&self, kind: PluginKind) -> Vec<&PluginDescriptor> {
        match kind {
            PluginKind::DataSource => self.datasources.list(),
            PluginKind::Llm => self.llms.list(),
            PluginKind::Generator => self.generators.list(),
        }
    }
}
