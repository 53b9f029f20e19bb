//! Errors that reach the caller instead of being folded into a sentinel payload.

use thiserror::Error;

/// Malformed textual image input.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid Base64 image data: {0}")]
    InvalidBase64(#[from] base64::DecodeError),
    #[error("Image data is empty")]
    Empty,
}

/// Missing or invalid caller input. Raised before any generation call is made.
#[derive(Debug, Error)]
pub enum ClientInputError {
    #[error("{0} is required")]
    MissingField(&'static str),
    #[error("unrecognized tone '{0}' (expected one of neutral, formal, playful, luxury, minimalist)")]
    UnknownTone(String),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("invalid JSON input: {0}")]
    InvalidJson(String),
    #[error("batch contains no products")]
    EmptyBatch,
    #[error("product {index}: {source}")]
    BatchItem {
        index: usize,
        #[source]
        source: Box<ClientInputError>,
    },
}

impl ClientInputError {
    pub fn at_index(self, index: usize) -> Self {
        ClientInputError::BatchItem {
            index,
            source: Box::new(self),
        }
    }
}
