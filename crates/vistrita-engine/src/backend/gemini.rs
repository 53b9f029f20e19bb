use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::{ContentPart, GenerativeBackend, StructuredCall};
use crate::config::EngineConfig;
use crate::text::truncate_text;

/// Gemini `generateContent` over REST with JSON-mode structured output.
pub struct GeminiBackend {
    api_base: String,
    api_key: Option<String>,
    http: HttpClient,
    request_timeout_s: f64,
    transport_retries: usize,
    retry_backoff_s: f64,
}

impl GeminiBackend {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            http: HttpClient::new(),
            request_timeout_s: config.request_timeout_s,
            transport_retries: config.transport_retries,
            retry_backoff_s: config.retry_backoff_s,
        }
    }

    fn endpoint_for_model(&self, model: &str) -> String {
        let trimmed = model.trim();
        let model_path = if trimmed.starts_with("models/") {
            trimmed.to_string()
        } else {
            format!("models/{trimmed}")
        };
        format!("{}/{}:generateContent", self.api_base, model_path)
    }

    fn build_payload(call: &StructuredCall<'_>) -> Value {
        let parts: Vec<Value> = call
            .parts
            .iter()
            .map(|part| match part {
                ContentPart::Text(text) => json!({ "text": text }),
                ContentPart::Image(image) => json!({
                    "inlineData": {
                        "mimeType": image.mime_type(),
                        "data": image.to_base64(),
                    }
                }),
            })
            .collect();

        let mut generation_config = Map::new();
        generation_config.insert(
            "responseMimeType".to_string(),
            Value::String("application/json".to_string()),
        );
        generation_config.insert(
            "responseSchema".to_string(),
            to_gemini_schema(call.contract.schema()),
        );
        generation_config.insert("temperature".to_string(), json!(call.temperature));
        if let Some(max_output_tokens) = call.max_output_tokens {
            generation_config.insert("maxOutputTokens".to_string(), json!(max_output_tokens));
        }

        json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": Value::Object(generation_config),
        })
    }

    fn post_with_transport_retries(
        &self,
        endpoint: &str,
        api_key: &str,
        payload: &Value,
    ) -> Result<HttpResponse> {
        for attempt in 0..=self.transport_retries {
            let response = self
                .http
                .post(endpoint)
                .query(&[("key", api_key)])
                .timeout(Duration::from_secs_f64(self.request_timeout_s))
                .json(payload)
                .send();

            match response {
                Ok(ok) => return Ok(ok),
                Err(raw) => {
                    let err = anyhow::Error::new(raw)
                        .context(format!("Gemini request failed ({endpoint})"));
                    if !is_retryable_transport_error(&err) || attempt >= self.transport_retries {
                        return Err(err);
                    }
                    let delay_s = self.retry_backoff_s * (attempt as f64 + 1.0);
                    warn!(
                        attempt = attempt + 1,
                        max_retries = self.transport_retries,
                        delay_s,
                        "Gemini transport retry after transient request failure"
                    );
                    thread::sleep(Duration::from_secs_f64(delay_s));
                }
            }
        }

        unreachable!("Gemini transport retry loop should always return a response or error")
    }

    /// Concatenated text parts of the first candidate.
    fn extract_text(response_payload: &Value) -> Result<String> {
        let candidate = response_payload
            .get("candidates")
            .and_then(Value::as_array)
            .and_then(|candidates| candidates.first());
        let Some(candidate) = candidate else {
            let block_reason = response_payload
                .get("promptFeedback")
                .and_then(|feedback| feedback.get("blockReason"))
                .and_then(Value::as_str)
                .unwrap_or("none");
            bail!("Gemini returned no candidates (block reason: {block_reason})");
        };

        let text: String = candidate
            .get("content")
            .and_then(|content| content.get("parts"))
            .and_then(Value::as_array)
            .map(|parts| {
                parts
                    .iter()
                    .filter_map(|part| part.get("text").and_then(Value::as_str))
                    .collect()
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            let finish_reason = candidate
                .get("finishReason")
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            bail!("Gemini returned an empty response (finish reason: {finish_reason})");
        }
        Ok(text)
    }
}

impl GenerativeBackend for GeminiBackend {
    fn name(&self) -> &str {
        "gemini"
    }

    fn invoke(&self, call: &StructuredCall<'_>) -> Result<String> {
        let Some(api_key) = self.api_key.as_deref() else {
            bail!("GEMINI_API_KEY or GOOGLE_API_KEY not set");
        };
        let endpoint = self.endpoint_for_model(call.model);
        let payload = Self::build_payload(call);
        debug!(
            model = call.model,
            contract = call.contract.name(),
            temperature = call.temperature,
            "invoking Gemini"
        );

        let response = self.post_with_transport_retries(&endpoint, api_key, &payload)?;
        let response_payload = response_json_or_error("Gemini", response)?;
        Self::extract_text(&response_payload)
    }
}

/// Rewrites a JSON-Schema style contract into Gemini's `responseSchema` dialect,
/// which spells type names in upper case.
pub(crate) fn to_gemini_schema(schema: &Value) -> Value {
    match schema {
        Value::Object(map) => {
            let mut out = Map::new();
            for (key, value) in map {
                let converted = match (key.as_str(), value) {
                    ("type", Value::String(type_name)) => {
                        Value::String(type_name.to_ascii_uppercase())
                    }
                    _ => to_gemini_schema(value),
                };
                out.insert(key.clone(), converted);
            }
            Value::Object(out)
        }
        Value::Array(rows) => Value::Array(rows.iter().map(to_gemini_schema).collect()),
        other => other.clone(),
    }
}

fn response_json_or_error(backend: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{backend} response body read failed"))?;
    if !status.is_success() {
        bail!(
            "{backend} request failed ({code}): {}",
            truncate_text(&body, 512)
        );
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{backend} returned invalid JSON payload"))?;
    Ok(parsed)
}

fn is_retryable_transport_error(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        cause
            .downcast_ref::<reqwest::Error>()
            .map(|reqwest_err| {
                reqwest_err.is_timeout() || reqwest_err.is_connect() || reqwest_err.is_request()
            })
            .unwrap_or(false)
    })
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use vistrita_contracts::{attribute_contract, copy_contract, ImagePayload};

    use super::{to_gemini_schema, GeminiBackend};
    use crate::backend::{ContentPart, GenerativeBackend, StructuredCall};
    use crate::config::EngineConfig;

    #[test]
    fn endpoint_accepts_bare_and_prefixed_model_names() {
        let config = EngineConfig {
            api_base: "http://localhost:8080/v1beta/".to_string(),
            ..EngineConfig::default()
        };
        let backend = GeminiBackend::new(&config);
        assert_eq!(
            backend.endpoint_for_model("gemini-2.5-flash"),
            "http://localhost:8080/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            backend.endpoint_for_model(" models/gemini-2.0-flash-lite "),
            "http://localhost:8080/v1beta/models/gemini-2.0-flash-lite:generateContent"
        );
    }

    #[test]
    fn schema_types_are_uppercased_recursively() {
        let converted = to_gemini_schema(attribute_contract().schema());
        assert_eq!(converted["type"], json!("OBJECT"));
        let attributes = &converted["properties"]["attributes"];
        assert_eq!(attributes["type"], json!("OBJECT"));
        assert_eq!(attributes["properties"]["keywords"]["type"], json!("ARRAY"));
        assert_eq!(
            attributes["properties"]["keywords"]["items"]["type"],
            json!("STRING")
        );
        assert_eq!(
            attributes["required"],
            json!(["color", "material", "style", "keywords"])
        );
    }

    #[test]
    fn payload_carries_inline_image_and_generation_config() -> anyhow::Result<()> {
        let image = ImagePayload::from_bytes(b"abc".to_vec())?;
        let call = StructuredCall {
            model: "gemini-2.0-flash-lite",
            parts: vec![ContentPart::Image(&image), ContentPart::Text("describe")],
            contract: attribute_contract(),
            temperature: 0.1,
            max_output_tokens: None,
        };
        let payload = GeminiBackend::build_payload(&call);
        let parts = &payload["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], json!("image/jpeg"));
        assert_eq!(parts[0]["inlineData"]["data"], json!("YWJj"));
        assert_eq!(parts[1]["text"], json!("describe"));

        let config = &payload["generationConfig"];
        assert_eq!(config["responseMimeType"], json!("application/json"));
        assert_eq!(config["temperature"], json!(0.1));
        assert!(config.get("maxOutputTokens").is_none());
        Ok(())
    }

    #[test]
    fn payload_includes_output_ceiling_when_set() {
        let call = StructuredCall {
            model: "gemini-2.5-flash",
            parts: vec![ContentPart::Text("write copy")],
            contract: copy_contract(),
            temperature: 0.2,
            max_output_tokens: Some(512),
        };
        let payload = GeminiBackend::build_payload(&call);
        assert_eq!(payload["generationConfig"]["maxOutputTokens"], json!(512));
    }

    #[test]
    fn extract_text_joins_parts_of_first_candidate() -> anyhow::Result<()> {
        let response = json!({
            "candidates": [
                { "content": { "parts": [{ "text": "{\"a\":" }, { "text": "1}" }] } },
                { "content": { "parts": [{ "text": "ignored" }] } }
            ]
        });
        assert_eq!(GeminiBackend::extract_text(&response)?, "{\"a\":1}");
        Ok(())
    }

    #[test]
    fn extract_text_reports_blocks_and_empty_answers() {
        let blocked = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = GeminiBackend::extract_text(&blocked).err().map(|err| err.to_string());
        assert_eq!(
            err.as_deref(),
            Some("Gemini returned no candidates (block reason: SAFETY)")
        );

        let empty = json!({ "candidates": [{ "finishReason": "MAX_TOKENS", "content": { "parts": [] } }] });
        let err = GeminiBackend::extract_text(&empty).err().map(|err| err.to_string());
        assert_eq!(
            err.as_deref(),
            Some("Gemini returned an empty response (finish reason: MAX_TOKENS)")
        );
    }

    #[test]
    fn missing_api_key_fails_without_network() {
        let backend = GeminiBackend::new(&EngineConfig::default());
        let call = StructuredCall {
            model: "gemini-2.5-flash",
            parts: vec![ContentPart::Text("hello")],
            contract: copy_contract(),
            temperature: 0.2,
            max_output_tokens: Some(512),
        };
        let err = backend.invoke(&call).err().map(|err| err.to_string());
        assert_eq!(
            err.as_deref(),
            Some("GEMINI_API_KEY or GOOGLE_API_KEY not set")
        );
    }
}
