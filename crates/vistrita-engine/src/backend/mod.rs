use std::collections::BTreeMap;
use std::sync::Arc;

use anyhow::Result;
use vistrita_contracts::{ImagePayload, SchemaContract};

use crate::config::EngineConfig;

mod dryrun;
mod gemini;

pub use dryrun::DryrunBackend;
pub use gemini::GeminiBackend;

/// One piece of multimodal input.
#[derive(Debug, Clone, Copy)]
pub enum ContentPart<'a> {
    Text(&'a str),
    Image(&'a ImagePayload),
}

/// A schema-constrained generation request.
#[derive(Debug, Clone)]
pub struct StructuredCall<'a> {
    pub model: &'a str,
    pub parts: Vec<ContentPart<'a>>,
    pub contract: &'a SchemaContract,
    pub temperature: f64,
    pub max_output_tokens: Option<u32>,
}

impl<'a> StructuredCall<'a> {
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter_map(|part| match part {
                ContentPart::Text(text) => Some(*text),
                ContentPart::Image(_) => None,
            })
            .collect::<Vec<&str>>()
            .join("\n")
    }

    pub fn images(&self) -> impl Iterator<Item = &'a ImagePayload> + '_ {
        self.parts.iter().filter_map(|part| match part {
            ContentPart::Image(image) => Some(*image),
            ContentPart::Text(_) => None,
        })
    }
}

/// A generative model endpoint that answers with the raw response text.
///
/// Every failure (transport, quota, auth, empty answer) is an error; callers do not
/// distinguish between them.
pub trait GenerativeBackend: Send + Sync {
    fn name(&self) -> &str;
    fn invoke(&self, call: &StructuredCall<'_>) -> Result<String>;
}

#[derive(Default)]
pub struct BackendRegistry {
    backends: BTreeMap<String, Arc<dyn GenerativeBackend>>,
}

impl BackendRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<B: GenerativeBackend + 'static>(&mut self, backend: B) {
        self.backends
            .insert(backend.name().to_string(), Arc::new(backend));
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn GenerativeBackend>> {
        self.backends.get(name.trim()).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.backends.keys().cloned().collect()
    }
}

pub fn default_backend_registry(config: &EngineConfig) -> BackendRegistry {
    let mut registry = BackendRegistry::new();
    registry.register(DryrunBackend);
    registry.register(GeminiBackend::new(config));
    registry
}
