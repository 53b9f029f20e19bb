use super::registry::{ModelCatalog, ModelSpec};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSelection {
    pub model: ModelSpec,
    pub requested: Option<String>,
    pub fallback_reason: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ModelSelector {
    pub catalog: ModelCatalog,
}

impl ModelSelector {
    pub fn new(catalog: Option<ModelCatalog>) -> Self {
        Self {
            catalog: catalog.unwrap_or_else(|| ModelCatalog::new(None)),
        }
    }

    /// Resolves `requested` for `backend`, falling back to the backend's default for
    /// `capability`. The reason for any fallback is reported, not logged.
    pub fn select(
        &self,
        requested: Option<&str>,
        backend: &str,
        capability: &str,
    ) -> Result<ModelSelection, String> {
        let requested = requested.map(str::trim).filter(|value| !value.is_empty());
        if let Some(model) =
            requested.and_then(|name| self.catalog.ensure(name, backend, capability))
        {
            return Ok(ModelSelection {
                model,
                requested: requested.map(str::to_string),
                fallback_reason: None,
            });
        }

        let fallback_reason = match requested {
            Some(name) => format!(
                "Requested model '{name}' unavailable for capability '{capability}' on backend '{backend}'."
            ),
            None => "No model specified; using default.".to_string(),
        };
        let model = self.catalog.default_for(backend, capability).ok_or_else(|| {
            format!("No models available for capability '{capability}' on backend '{backend}'.")
        })?;
        Ok(ModelSelection {
            model,
            requested: requested.map(str::to_string),
            fallback_reason: Some(fallback_reason),
        })
    }
}
