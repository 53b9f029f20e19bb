use std::sync::Arc;

use anyhow::{anyhow, bail, Result};
use tracing::{debug, info, warn};
use vistrita_contracts::models::{ModelSelector, TEXT_CAPABILITY, VISION_CAPABILITY};
use vistrita_contracts::{
    AttributeRecord, ClientInputError, CopyRequest, EntrySource, GenerationOutcome, ImagePayload,
    PersistenceOutcome, ProductLog, ProductLogEntry, ProductStore, Tone,
};

use crate::backend::{default_backend_registry, GenerativeBackend};
use crate::bulk::{BulkReport, BulkRunner};
use crate::config::EngineConfig;
use crate::extractor::AttributeExtractor;
use crate::generator::CopyGenerator;
use crate::persistence::persist;
use crate::pipeline::{Composition, CompositionPipeline, PipelineError};

/// A result together with what happened when it was written to the product log.
#[derive(Debug, Clone, PartialEq)]
pub struct Recorded<T> {
    pub value: T,
    pub persistence: PersistenceOutcome,
}

/// Entry point for every operation: wires the backend, models and product store together.
#[derive(Clone)]
pub struct VistritaEngine {
    config: EngineConfig,
    backend_name: String,
    extractor: AttributeExtractor,
    generator: CopyGenerator,
    store: Option<Arc<dyn ProductStore>>,
    user: Option<String>,
}

impl VistritaEngine {
    pub fn new(config: EngineConfig, backend: Arc<dyn GenerativeBackend>) -> Result<Self> {
        let selector = ModelSelector::new(None);
        let backend_name = backend.name().to_string();
        let vision_model = resolve_model(
            &selector,
            config.vision_model.as_deref(),
            &backend_name,
            VISION_CAPABILITY,
        )?;
        let text_model = resolve_model(
            &selector,
            config.text_model.as_deref(),
            &backend_name,
            TEXT_CAPABILITY,
        )?;
        info!(
            backend = %backend_name,
            vision_model = %vision_model,
            text_model = %text_model,
            "engine ready"
        );

        Ok(Self {
            extractor: AttributeExtractor::new(backend.clone(), vision_model),
            generator: CopyGenerator::new(backend, text_model)
                .with_max_output_tokens(config.copy_max_output_tokens),
            backend_name,
            config,
            store: None,
            user: None,
        })
    }

    /// Picks the backend named in `config` and opens the configured product log, if any.
    pub fn from_config(config: EngineConfig) -> Result<Self> {
        let registry = default_backend_registry(&config);
        let backend = registry.get(&config.backend).ok_or_else(|| {
            anyhow!(
                "unknown backend '{}' (available: {})",
                config.backend,
                registry.names().join(", ")
            )
        })?;
        let product_log = config.product_log.clone();
        let engine = Self::new(config, backend)?;
        Ok(match product_log {
            Some(path) => engine.with_store(Arc::new(ProductLog::new(path))),
            None => engine,
        })
    }

    pub fn with_store(mut self, store: Arc<dyn ProductStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_user(mut self, user: impl Into<String>) -> Self {
        self.user = Some(user.into());
        self
    }

    pub fn backend_name(&self) -> &str {
        &self.backend_name
    }

    pub fn vision_model(&self) -> &str {
        self.extractor.model()
    }

    pub fn text_model(&self) -> &str {
        self.generator.model()
    }

    pub fn extract(&self, image: &ImagePayload) -> AttributeRecord {
        self.extractor.extract(image)
    }

    pub fn extract_encoded(&self, raw: &str) -> Result<AttributeRecord, ClientInputError> {
        self.extractor.extract_encoded(raw)
    }

    pub fn generate(&self, request: &CopyRequest) -> Recorded<GenerationOutcome> {
        let generation = self.generator.generate(request);
        let entry = ProductLogEntry::from_generation(
            EntrySource::Generate,
            request,
            &generation,
            self.user.as_deref(),
        );
        Recorded {
            persistence: persist(self.store.as_deref(), &entry),
            value: generation,
        }
    }

    pub fn compose(
        &self,
        image: ImagePayload,
        tone: Tone,
    ) -> Result<Recorded<Composition>, PipelineError> {
        let composition = self.pipeline().compose(image, tone)?;
        Ok(self.record_composition(composition))
    }

    pub fn compose_encoded(
        &self,
        raw: &str,
        tone: Tone,
    ) -> Result<Recorded<Composition>, PipelineError> {
        let composition = self.pipeline().compose_encoded(raw, tone)?;
        Ok(self.record_composition(composition))
    }

    pub fn bulk(&self, requests: &[CopyRequest]) -> BulkReport {
        BulkRunner::new(self.generator.clone())
            .with_concurrency(self.config.bulk_concurrency)
            .run(requests, self.store.as_deref(), self.user.as_deref())
    }

    fn pipeline(&self) -> CompositionPipeline {
        CompositionPipeline::new(self.extractor.clone(), self.generator.clone())
    }

    fn record_composition(&self, composition: Composition) -> Recorded<Composition> {
        let entry = ProductLogEntry::from_generation(
            EntrySource::Vision,
            &composition.request,
            &composition.generation,
            self.user.as_deref(),
        )
        .with_keywords(&composition.attributes.keywords);
        Recorded {
            persistence: persist(self.store.as_deref(), &entry),
            value: composition,
        }
    }
}

/// Catalog lookup with a pass-through for backends the catalog does not know.
fn resolve_model(
    selector: &ModelSelector,
    requested: Option<&str>,
    backend: &str,
    capability: &str,
) -> Result<String> {
    match selector.select(requested, backend, capability) {
        Ok(selection) => {
            if let Some(reason) = selection.fallback_reason.as_deref() {
                if selection.requested.is_some() {
                    warn!(capability, model = %selection.model.name, "{reason}");
                } else {
                    debug!(capability, model = %selection.model.name, "{reason}");
                }
            }
            Ok(selection.model.name)
        }
        Err(reason) => match requested.map(str::trim).filter(|value| !value.is_empty()) {
            Some(model) => {
                debug!(backend, capability, model, "backend not in catalog; using requested model");
                Ok(model.to_string())
            }
            None => bail!(reason),
        },
    }
}
