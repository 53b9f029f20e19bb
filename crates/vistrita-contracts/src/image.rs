use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};

use crate::errors::DecodeError;

const FALLBACK_MIME: &str = "image/jpeg";

/// Raw image bytes plus the media type sent alongside them to a multimodal backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    bytes: Vec<u8>,
    mime_type: String,
}

impl ImagePayload {
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, DecodeError> {
        if bytes.is_empty() {
            return Err(DecodeError::Empty);
        }
        let mime_type = sniff_mime(&bytes).unwrap_or(FALLBACK_MIME).to_string();
        Ok(Self { bytes, mime_type })
    }

    /// Decodes base64 text, accepting an optional `data:<mime>;base64,` prefix.
    ///
    /// Everything up to the first comma is treated as the prefix. A media type
    /// declared there wins over sniffing; whitespace inside the payload is ignored.
    pub fn decode_text(raw: &str) -> Result<Self, DecodeError> {
        let trimmed = raw.trim();
        let (declared_mime, encoded) = match trimmed.split_once(',') {
            Some((prefix, rest)) => (mime_from_data_url_prefix(prefix), rest),
            None => (None, trimmed),
        };
        let compact: String = encoded
            .chars()
            .filter(|ch| !ch.is_ascii_whitespace())
            .collect();
        let bytes = BASE64.decode(compact.as_bytes())?;
        let mut payload = Self::from_bytes(bytes)?;
        if let Some(mime) = declared_mime {
            payload.mime_type = mime;
        }
        Ok(payload)
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn mime_type(&self) -> &str {
        &self.mime_type
    }

    /// Size of the blob. Never zero: the constructors reject empty input.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn to_base64(&self) -> String {
        BASE64.encode(&self.bytes)
    }

    /// Stable reference used in logs and product log entries instead of the blob itself.
    pub fn sha256_hex(&self) -> String {
        hex::encode(Sha256::digest(&self.bytes))
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    let format = image::guess_format(bytes).ok()?;
    let mime = match format {
        image::ImageFormat::Png => "image/png",
        image::ImageFormat::Jpeg => "image/jpeg",
        image::ImageFormat::WebP => "image/webp",
        image::ImageFormat::Gif => "image/gif",
        _ => return None,
    };
    Some(mime)
}

fn mime_from_data_url_prefix(prefix: &str) -> Option<String> {
    let rest = prefix.trim().strip_prefix("data:")?;
    let mime = rest.split(';').next().unwrap_or_default().trim();
    if mime.is_empty() {
        return None;
    }
    Some(mime.to_ascii_lowercase())
}
