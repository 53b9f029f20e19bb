use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, warn};
use vistrita_contracts::{
    attribute_contract, AttributeEnvelope, AttributeRecord, ClientInputError, ImagePayload,
};

use crate::backend::{ContentPart, GenerativeBackend, StructuredCall};
use crate::generator::is_schema_violation;
use crate::text::error_chain_text;

pub const EXTRACTION_INSTRUCTION: &str = "Analyze this product image.
Extract visual attributes like color, material, shape, and style.
Generate 5 relevant keywords for search optimization.
Return strictly valid JSON.";
pub const EXTRACTION_TEMPERATURE: f64 = 0.1;

/// Pulls visual attributes out of a product image.
///
/// Backend and parse failures never escape: they are logged and answered with
/// [`AttributeRecord::sentinel`].
#[derive(Clone)]
pub struct AttributeExtractor {
    backend: Arc<dyn GenerativeBackend>,
    model: String,
}

impl AttributeExtractor {
    pub fn new(backend: Arc<dyn GenerativeBackend>, model: impl Into<String>) -> Self {
        Self {
            backend,
            model: model.into(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn extract(&self, image: &ImagePayload) -> AttributeRecord {
        match self.try_extract(image) {
            Ok(record) => {
                debug!(
                    model = %self.model,
                    keywords = record.keywords.len(),
                    "attributes extracted"
                );
                record
            }
            Err(err) => {
                warn!(
                    backend = self.backend.name(),
                    model = %self.model,
                    image_bytes = image.byte_len(),
                    schema_violation = is_schema_violation(&err),
                    error = %error_chain_text(&err, 512),
                    "attribute extraction failed; returning sentinel record"
                );
                AttributeRecord::sentinel()
            }
        }
    }

    /// Decodes a base64 or data-URL image, then extracts. Only decoding can fail.
    pub fn extract_encoded(&self, raw: &str) -> Result<AttributeRecord, ClientInputError> {
        let image = ImagePayload::decode_text(raw)?;
        Ok(self.extract(&image))
    }

    fn try_extract(&self, image: &ImagePayload) -> Result<AttributeRecord> {
        let contract = attribute_contract();
        let call = StructuredCall {
            model: &self.model,
            parts: vec![
                ContentPart::Image(image),
                ContentPart::Text(EXTRACTION_INSTRUCTION),
            ],
            contract,
            temperature: EXTRACTION_TEMPERATURE,
            max_output_tokens: None,
        };
        let raw = self
            .backend
            .invoke(&call)
            .context("vision backend call failed")?;
        let envelope: AttributeEnvelope = contract
            .parse(&raw)
            .context("vision response did not match the attribute contract")?;
        Ok(envelope.attributes)
    }
}
