//! Drives a [`WorkflowState`] against the service.
//!
//! Each wizard action is one service call followed by one state update. A
//! failed call leaves the step where it was and records the message in
//! [`WorkflowState::error`].

use std::sync::Arc;

use tracing::{debug, warn};

use super::{progress, Progress, Step, WorkflowState};
use crate::error::ServiceError;
use crate::export::ExportFormat;
use crate::generator::{Dataset, DatasetFormat};
use crate::registry::PluginKind;
use crate::schema::ConfigMap;
use crate::service::{ForgeService, GenerateRequest};

/// One wizard session bound to a service.
pub struct WorkflowController {
    service: Arc<ForgeService>,
    state: WorkflowState,
}

impl WorkflowController {
    pub fn new(service: Arc<ForgeService>) -> Self {
        Self {
            service,
            state: WorkflowState::new(),
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    pub fn progress(&self) -> Progress {
        progress(&self.state)
    }

    fn record<T>(&mut self, result: Result<T, ServiceError>) -> Result<T, ServiceError> {
        if let Err(err) = &result {
            warn!(step = self.state.step.number(), error = %err, "Workflow step failed");
            self.state.error = Some(err.to_string());
        }
        result
    }

    /// Creates a data-source instance and loads its documents. Returns the
    /// number of documents loaded.
    pub async fn choose_data_source(&mut self, plugin_id: &str, config: ConfigMap) -> Result<usize, ServiceError> {
        let result = async {
            let id = self
                .service
                .create_with_plugin(PluginKind::DataSource, plugin_id, config)
                .await?;
            let documents = self.service.load_documents(&id).await?;
            Ok::<_, ServiceError>((id, documents))
        }
        .await;

        let (id, documents) = self.record(result)?;
        let count = documents.len();
        debug!(instance_id = %id, documents = count, "Data source selected");
        self.state.select_data_source(id, documents);
        Ok(count)
    }

    pub async fn choose_llm(&mut self, plugin_id: &str, config: ConfigMap) -> Result<String, ServiceError> {
        let result = self.service.create_with_plugin(PluginKind::Llm, plugin_id, config).await;
        let id = self.record(result)?;
        self.state.select_llm(id.clone());
        Ok(id)
    }

    pub async fn choose_generator(&mut self, plugin_id: &str, config: ConfigMap) -> Result<String, ServiceError> {
        let result = self
            .service
            .create_with_plugin(PluginKind::Generator, plugin_id, config)
            .await;
        let id = self.record(result)?;
        self.state.select_generator(id.clone());
        Ok(id)
    }

    /// Moves forward from steps 1 and 2. Step 3 is left through
    /// [`generate`](Self::generate).
    pub fn advance(&mut self) -> bool {
        if self.state.step == Step::ConfigureGenerator {
            return false;
        }
        self.state.advance()
    }

    pub fn back(&mut self) -> bool {
        self.state.back()
    }

    pub fn reset(&mut self) {
        self.state.reset();
    }

    pub fn dismiss_error(&mut self) {
        self.state.dismiss_error();
    }

    /// Runs generation from step 3, or retries it from step 4 after a failure.
    ///
    /// Success moves to step 5. Failure stays at step 4 with the error set.
    pub async fn generate(
        &mut self,
        count: Option<usize>,
        format: Option<DatasetFormat>,
        options: ConfigMap,
    ) -> Result<&Dataset, ServiceError> {
        let retrying = self.state.step == Step::Generating && self.state.generated_dataset.is_none();
        if !retrying && !self.state.begin_generation() {
            return Err(ServiceError::InvalidRequest(format!(
                "cannot generate from step {}",
                self.state.step.number()
            )));
        }
        self.state.dismiss_error();

        let (Some(generator_id), Some(datasource_id), Some(llm_id)) = (
            self.state.active_generator.clone(),
            self.state.active_data_source.clone(),
            self.state.active_llm.clone(),
        ) else {
            let err = ServiceError::InvalidRequest("a data source, LLM and generator must be selected".to_string());
            self.state.finish_generation(Err(err.to_string()));
            return Err(err);
        };

        let request = GenerateRequest {
            datasource_id,
            llm_id,
            count,
            format,
            options,
        };
        match self.service.generate(&generator_id, request).await {
            Ok(run) => {
                self.state.finish_generation(Ok(run.dataset));
                self.state
                    .generated_dataset
                    .as_ref()
                    .ok_or_else(|| ServiceError::InvalidRequest("generation produced no dataset".to_string()))
            }
            Err(err) => {
                warn!(error = %err, "Generation failed");
                self.state.finish_generation(Err(err.to_string()));
                Err(err)
            }
        }
    }

    /// Renders the generated dataset for download.
    pub fn export(&self, format: ExportFormat) -> Result<String, ServiceError> {
        let dataset = self
            .state
            .generated_dataset
            .as_ref()
            .ok_or_else(|| ServiceError::InvalidRequest("nothing has been generated yet".to_string()))?;
        Ok(crate::export::export_dataset(dataset, format)?)
    }
}
