use serde::{Deserialize, Serialize};

use crate::errors::ClientInputError;
use crate::image::ImagePayload;
use crate::tone::Tone;

pub const FALLBACK_TITLE: &str = "Error generating titles";
pub const FALLBACK_SHORT_DESCRIPTION: &str = "Could not generate content.";
pub const FALLBACK_WARNING: &str =
    "Please check API Key, model name, schema validity, or Internet Connection";
const LEGACY_FAILURE_PREFIX: &str = "Error";

/// Validated input to the copy generator.
///
/// `title` and `category` are non-empty for every request built through
/// [`ProductInput::into_request`] or the request mapper.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyRequest {
    pub title: String,
    pub category: String,
    pub features: Vec<String>,
    pub tone: Tone,
    pub source_image: Option<ImagePayload>,
}

/// Marketing copy as returned by the copy-generation contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopyResult {
    pub titles: Vec<String>,
    pub description_short: String,
    pub description_long: String,
    pub bullets: Vec<String>,
    pub warnings: Vec<String>,
}

impl CopyResult {
    /// Well-formed placeholder returned when generation fails.
    pub fn fallback(detail: &str) -> Self {
        Self {
            titles: vec![FALLBACK_TITLE.to_string()],
            description_short: FALLBACK_SHORT_DESCRIPTION.to_string(),
            description_long: format!("System Error: {detail}"),
            bullets: Vec::new(),
            warnings: vec![FALLBACK_WARNING.to_string()],
        }
    }

    /// String-prefix classification used by older callers that only see the payload.
    ///
    /// An empty `titles` list is not a failure under this rule.
    pub fn looks_like_failure(&self) -> bool {
        self.titles
            .first()
            .map(|title| title.starts_with(LEGACY_FAILURE_PREFIX))
            .unwrap_or(false)
    }
}

/// Copy generation result tagged with whether the backend actually produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated(CopyResult),
    Failed { result: CopyResult, reason: String },
}

impl GenerationOutcome {
    pub fn failed(reason: impl Into<String>) -> Self {
        let reason = reason.into();
        GenerationOutcome::Failed {
            result: CopyResult::fallback(&reason),
            reason,
        }
    }

    pub fn result(&self) -> &CopyResult {
        match self {
            GenerationOutcome::Generated(result) | GenerationOutcome::Failed { result, .. } => {
                result
            }
        }
    }

    pub fn into_result(self) -> CopyResult {
        match self {
            GenerationOutcome::Generated(result) | GenerationOutcome::Failed { result, .. } => {
                result
            }
        }
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, GenerationOutcome::Failed { .. })
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match self {
            GenerationOutcome::Generated(_) => None,
            GenerationOutcome::Failed { reason, .. } => Some(reason.as_str()),
        }
    }
}

/// Unvalidated product request as submitted by a caller.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProductInput {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub tone: Option<String>,
    #[serde(default)]
    pub image: Option<String>,
}

impl ProductInput {
    pub fn into_request(self) -> Result<CopyRequest, ClientInputError> {
        let title = required_field("title", &self.title)?;
        let category = required_field("category", &self.category)?;
        let tone = match self.tone.as_deref().map(str::trim) {
            None | Some("") => Tone::default(),
            Some(raw) => raw.parse()?,
        };
        let source_image = match self.image.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(ImagePayload::decode_text(raw)?),
        };
        Ok(CopyRequest {
            title,
            category,
            features: self.features,
            tone,
            source_image,
        })
    }
}

fn required_field(name: &'static str, value: &str) -> Result<String, ClientInputError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ClientInputError::MissingField(name));
    }
    Ok(trimmed.to_string())
}
