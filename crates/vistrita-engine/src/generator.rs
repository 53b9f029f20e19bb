use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use vistrita_contracts::{copy_contract, ContractError, CopyRequest, CopyResult, GenerationOutcome};

use crate::backend::{ContentPart, GenerativeBackend, StructuredCall};
use crate::text::error_chain_text;

pub const COPY_TEMPERATURE: f64 = 0.2;
pub const DEFAULT_COPY_MAX_OUTPUT_TOKENS: u32 = 512;
const FAILURE_DETAIL_MAX_CHARS: usize = 512;

/// Writes marketing copy for a validated request.
///
/// `generate` never fails: any backend, JSON or contract error produces
/// [`GenerationOutcome::Failed`] carrying the fallback payload.
#[derive(Clone)]
pub struct CopyGenerator {
    backend: Arc<dyn GenerativeBackend>,
    model: String,
    max_output_tokens: u32,
}

impl CopyGenerator {
    pub fn new(backend: Arc<dyn GenerativeBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
            max_output_tokens: DEFAULT_COPY_MAX_OUTPUT_TOKENS,
        }
    }

    pub fn with_max_output_tokens(mut self, max_output_tokens: u32) -> Self {
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn generate(&self, request: &CopyRequest) -> GenerationOutcome {
        match self.try_generate(request) {
            Ok(result) => {
                debug!(
                    model = %self.model,
                    title = %request.title,
                    titles = result.titles.len(),
                    "copy generated"
                );
                GenerationOutcome::Generated(result)
            }
            Err(err) => {
                let reason = error_chain_text(&err, FAILURE_DETAIL_MAX_CHARS);
                warn!(
                    backend = self.backend.name(),
                    model = %self.model,
                    title = %request.title,
                    schema_violation = is_schema_violation(&err),
                    error = %reason,
                    "copy generation failed; returning fallback copy"
                );
                GenerationOutcome::failed(reason)
            }
        }
    }

    fn try_generate(&self, request: &CopyRequest) -> Result<CopyResult> {
        let contract = copy_contract();
        let prompt = build_prompt(request);
        let call = StructuredCall {
            model: &self.model,
            parts: vec![ContentPart::Text(&prompt)],
            contract,
            temperature: COPY_TEMPERATURE,
            max_output_tokens: Some(self.max_output_tokens),
        };
        let raw = self
            .backend
            .invoke(&call)
            .context("text backend call failed")?;
        Ok(contract.parse(&raw)?)
    }
}

/// The backend answered, but not with what the contract asks for.
pub(crate) fn is_schema_violation(err: &anyhow::Error) -> bool {
    err.downcast_ref::<ContractError>()
        .is_some_and(ContractError::is_schema_violation)
}

pub fn build_prompt(request: &CopyRequest) -> String {
    let features = if request.features.is_empty() {
        "None".to_string()
    } else {
        request.features.join(", ")
    };
    format!(
        "You are an expert e-commerce copywriter.

Generate product description content using:

- Title: {title}
- Category: {category}
- Key Features: {features}
- Tone: {tone}

Return ONLY valid JSON following the following schema:

{schema}

Output JSON ONLY.
",
        title = request.title,
        category = request.category,
        tone = request.tone,
        schema = copy_contract().pretty(),
    )
}
