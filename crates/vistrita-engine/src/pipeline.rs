use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

use serde::ser::{Serialize, SerializeStruct, Serializer};
use thiserror::Error;
use tracing::{info, warn};
use vistrita_contracts::{
    AttributeRecord, ClientInputError, CopyRequest, CopyResult, GenerationOutcome, ImagePayload,
    Tone,
};

use crate::extractor::AttributeExtractor;
use crate::generator::CopyGenerator;
use crate::mapper::map_request;

/// Errors surfaced by the image-to-copy pipeline. Stage fallbacks are not errors.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Input(#[from] ClientInputError),
    #[error("Composite generation failed: {0}")]
    Composite(String),
}

/// Everything one composition produced.
#[derive(Debug, Clone, PartialEq)]
pub struct Composition {
    pub attributes: AttributeRecord,
    pub request: CopyRequest,
    pub generation: GenerationOutcome,
}

impl Composition {
    pub fn generated(&self) -> &CopyResult {
        self.generation.result()
    }
}

// Wire shape: `{"attributes": {...}, "generated": {...}}`.
impl Serialize for Composition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut state = serializer.serialize_struct("Composition", 2)?;
        state.serialize_field("attributes", &self.attributes)?;
        state.serialize_field("generated", self.generated())?;
        state.end()
    }
}

/// Image to attributes to request to copy.
#[derive(Clone)]
pub struct CompositionPipeline {
    extractor: AttributeExtractor,
    generator: CopyGenerator,
}

impl CompositionPipeline {
    pub fn new(extractor: AttributeExtractor, generator: CopyGenerator) -> Self {
        Self {
            extractor,
            generator,
        }
    }

    /// Runs every stage. Stage failures fall back inside the stage; only a panic
    /// escaping a stage aborts the composition, as [`PipelineError::Composite`].
    pub fn compose(&self, image: ImagePayload, tone: Tone) -> Result<Composition, PipelineError> {
        let image_bytes = image.byte_len();
        let composition = panic::catch_unwind(AssertUnwindSafe(|| self.run_stages(image, tone)))
            .map_err(|payload| {
                let detail = panic_detail(payload.as_ref());
                warn!(image_bytes, error = %detail, "composition aborted by a panicking stage");
                PipelineError::Composite(detail)
            })?;

        info!(
            title = %composition.request.title,
            tone = %tone,
            sentinel_attributes = composition.attributes.is_sentinel(),
            copy_failed = composition.generation.is_failed(),
            "composition finished"
        );
        Ok(composition)
    }

    pub fn compose_encoded(&self, raw: &str, tone: Tone) -> Result<Composition, PipelineError> {
        let image = ImagePayload::decode_text(raw).map_err(ClientInputError::from)?;
        self.compose(image, tone)
    }

    fn run_stages(&self, image: ImagePayload, tone: Tone) -> Composition {
        let attributes = self.extractor.extract(&image);
        let request = map_request(&attributes, tone, Some(image));
        let generation = self.generator.generate(&request);
        Composition {
            attributes,
            request,
            generation,
        }
    }
}

fn panic_detail(payload: &(dyn Any + Send)) -> String {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    format!("stage panicked: {message}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;
    use vistrita_contracts::{ClientInputError, ImagePayload, Tone};

    use super::{CompositionPipeline, PipelineError};
    use crate::backend::{DryrunBackend, GenerativeBackend};
    use crate::extractor::AttributeExtractor;
    use crate::generator::CopyGenerator;
    use crate::test_support::{ScriptedBackend, VALID_COPY};

    fn pipeline(
        vision: Arc<dyn GenerativeBackend>,
        text: Arc<dyn GenerativeBackend>,
    ) -> CompositionPipeline {
        CompositionPipeline::new(
            AttributeExtractor::new(vision, "vision"),
            CopyGenerator::new(text, "text"),
        )
    }

    fn image() -> ImagePayload {
        ImagePayload::from_bytes(b"photo".to_vec()).expect("non-empty image")
    }

    #[test]
    fn failed_extraction_still_composes_generic_product() -> anyhow::Result<()> {
        let text = Arc::new(ScriptedBackend::replying(VALID_COPY));
        let composition = pipeline(ScriptedBackend::failing("vision down").shared(), text.clone())
            .compose(image(), Tone::Playful)?;

        assert!(composition.attributes.is_sentinel());
        assert_eq!(composition.request.title, "Generic Product");
        assert_eq!(composition.request.category, "Error processing image");
        assert_eq!(composition.request.features, vec![String::new()]);
        assert!(!composition.generation.is_failed());

        let prompts = text.prompts();
        assert!(prompts[0].contains("- Title: Generic Product"));
        assert!(prompts[0].contains("- Category: Error processing image"));
        Ok(())
    }

    #[test]
    fn partial_attributes_proceed() -> anyhow::Result<()> {
        let vision = ScriptedBackend::replying(
            r#"{"attributes":{"color":"Teal","material":"","style":"","keywords":[]}}"#,
        );
        let composition = pipeline(vision.shared(), ScriptedBackend::replying(VALID_COPY).shared())
            .compose(image(), Tone::Neutral)?;
        assert_eq!(composition.request.title, "Teal Product");
        assert_eq!(composition.request.category, "General");
        Ok(())
    }

    #[test]
    fn blank_attributes_proceed_as_generic_product() -> anyhow::Result<()> {
        let vision = ScriptedBackend::replying(
            r#"{"attributes":{"color":"","material":"","shape":"","style":"","keywords":[]}}"#,
        );
        let text = Arc::new(ScriptedBackend::replying(VALID_COPY));
        let composition = pipeline(vision.shared(), text.clone()).compose(image(), Tone::Neutral)?;

        assert_eq!(composition.request.title, "Generic Product");
        assert_eq!(composition.request.category, "General");
        assert_eq!(composition.request.features, vec![String::new()]);
        assert!(!composition.generation.is_failed());
        assert_eq!(text.calls(), 1);
        Ok(())
    }

    #[test]
    fn panicking_stage_is_a_composite_failure() {
        let text = ScriptedBackend::new(|_| panic!("backend bug"));
        let result = pipeline(Arc::new(DryrunBackend), text.shared()).compose(image(), Tone::Neutral);
        match result {
            Err(PipelineError::Composite(detail)) => {
                assert_eq!(detail, "stage panicked: backend bug");
            }
            other => panic!("expected composite failure, got {other:?}"),
        }

        let vision = ScriptedBackend::new(|_| panic!("vision {} failed", 7));
        let result = pipeline(vision.shared(), Arc::new(DryrunBackend)).compose(image(), Tone::Neutral);
        assert!(matches!(
            result,
            Err(PipelineError::Composite(ref detail)) if detail == "stage panicked: vision 7 failed"
        ));
    }

    #[test]
    fn copy_failure_is_reported_in_the_outcome_not_as_error() -> anyhow::Result<()> {
        let composition = pipeline(
            Arc::new(DryrunBackend),
            ScriptedBackend::failing("quota").shared(),
        )
        .compose(image(), Tone::Formal)?;
        assert!(composition.generation.is_failed());
        assert!(composition.generated().looks_like_failure());
        Ok(())
    }

    #[test]
    fn encoded_input_errors_are_client_errors() {
        let backend = Arc::new(ScriptedBackend::failing("unexpected call"));
        let result = pipeline(backend.clone(), backend.clone()).compose_encoded("%%%", Tone::Neutral);
        assert!(matches!(
            result,
            Err(PipelineError::Input(ClientInputError::Decode(_)))
        ));
        assert_eq!(backend.calls(), 0);
    }

    #[test]
    fn serializes_attributes_and_generated() -> anyhow::Result<()> {
        let composition = pipeline(Arc::new(DryrunBackend), Arc::new(DryrunBackend))
            .compose(image(), Tone::Minimalist)?;
        let value = serde_json::to_value(&composition)?;
        let keys: Vec<&String> = value.as_object().map(|map| map.keys().collect()).unwrap_or_default();
        assert_eq!(keys.len(), 2);
        assert_eq!(value["attributes"]["color"], json!(composition.attributes.color));
        assert_eq!(value["generated"]["titles"], json!(composition.generated().titles));
        Ok(())
    }
}
