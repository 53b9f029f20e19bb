use indexmap::IndexMap;

pub const VISION_CAPABILITY: &str = "vision";
pub const TEXT_CAPABILITY: &str = "text";

const GEMINI_BACKEND: &str = "gemini";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSpec {
    pub name: String,
    pub backend: String,
    pub capabilities: Vec<String>,
}

impl ModelSpec {
    pub fn supports(&self, capability: &str) -> bool {
        self.capabilities.iter().any(|item| item == capability)
    }
}

/// Known models in preference order. The first model supporting a capability on a
/// backend is that backend's default for it.
#[derive(Debug, Clone)]
pub struct ModelCatalog {
    models: IndexMap<String, ModelSpec>,
}

impl ModelCatalog {
    pub fn new(models: Option<IndexMap<String, ModelSpec>>) -> Self {
        Self {
            models: models.unwrap_or_else(default_models),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ModelSpec> {
        self.models.get(name)
    }

    pub fn by_capability(&self, backend: &str, capability: &str) -> Vec<ModelSpec> {
        self.models
            .values()
            .filter(|model| model.backend == backend && model.supports(capability))
            .cloned()
            .collect()
    }

    pub fn default_for(&self, backend: &str, capability: &str) -> Option<ModelSpec> {
        self.models
            .values()
            .find(|model| model.backend == backend && model.supports(capability))
            .cloned()
    }

    /// Resolves `name` for `backend`.
    ///
    /// Gemini model ids missing from the catalog are accepted as-is so newly released
    /// models work without a catalog update.
    pub fn ensure(&self, name: &str, backend: &str, capability: &str) -> Option<ModelSpec> {
        let trimmed = name.trim().trim_start_matches("models/");
        if let Some(model) = self.get(trimmed) {
            if model.backend == backend && model.supports(capability) {
                return Some(model.clone());
            }
            return None;
        }
        if backend == GEMINI_BACKEND && trimmed.starts_with("gemini-") {
            return Some(ModelSpec {
                name: trimmed.to_string(),
                backend: backend.to_string(),
                capabilities: vec![capability.to_string()],
            });
        }
        None
    }
}

fn default_models() -> IndexMap<String, ModelSpec> {
    let mut map = IndexMap::new();

    let mut insert = |name: &str, backend: &str, capabilities: &[&str]| {
        map.insert(
            name.to_string(),
            ModelSpec {
                name: name.to_string(),
                backend: backend.to_string(),
                capabilities: capabilities
                    .iter()
                    .map(|item| (*item).to_string())
                    .collect(),
            },
        );
    };

    insert("dryrun-vision-1", "dryrun", &[VISION_CAPABILITY]);
    insert("dryrun-text-1", "dryrun", &[TEXT_CAPABILITY]);
    insert("gemini-2.0-flash-lite", GEMINI_BACKEND, &[VISION_CAPABILITY]);
    insert(
        "gemini-2.5-flash",
        GEMINI_BACKEND,
        &[TEXT_CAPABILITY, VISION_CAPABILITY],
    );
    insert(
        "gemini-2.5-flash-lite",
        GEMINI_BACKEND,
        &[TEXT_CAPABILITY, VISION_CAPABILITY],
    );
    insert(
        "gemini-2.0-flash",
        GEMINI_BACKEND,
        &[TEXT_CAPABILITY, VISION_CAPABILITY],
    );
    insert(
        "gemini-2.5-pro",
        GEMINI_BACKEND,
        &[TEXT_CAPABILITY, VISION_CAPABILITY],
    );

    map
}
