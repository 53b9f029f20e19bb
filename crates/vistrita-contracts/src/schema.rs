//! Structured-output contracts for the two generation calls.
//!
//! Each contract is sent to the backend as an output constraint and then used to
//! check the parsed response locally. Presence of required keys is checked by walking
//! the schema; value types are enforced when the payload is deserialized.

use std::sync::OnceLock;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use thiserror::Error;

use crate::tone::{Tone, CANONICAL_TONES};

pub const ATTRIBUTE_CONTRACT_NAME: &str = "attribute_extraction";
pub const COPY_CONTRACT_NAME: &str = "copy_generation";

pub const ATTRIBUTE_REQUIRED: [&str; 4] = ["color", "material", "style", "keywords"];
pub const COPY_REQUIRED: [&str; 5] = [
    "titles",
    "description_short",
    "description_long",
    "bullets",
    "warnings",
];

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("response is not valid JSON: {0}")]
    InvalidJson(#[source] serde_json::Error),
    #[error("{contract}: expected an object at '{path}'")]
    NotAnObject { contract: &'static str, path: String },
    #[error("Missing key in generated JSON: {path}")]
    MissingKey { contract: &'static str, path: String },
    #[error("{contract}: {source}")]
    Shape {
        contract: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl ContractError {
    /// True when the payload parsed as JSON but does not satisfy the contract.
    pub fn is_schema_violation(&self) -> bool {
        !matches!(self, ContractError::InvalidJson(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SchemaContract {
    name: &'static str,
    schema: Value,
}

impl SchemaContract {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn schema(&self) -> &Value {
        &self.schema
    }

    pub fn pretty(&self) -> String {
        serde_json::to_string_pretty(&self.schema).unwrap_or_else(|_| self.schema.to_string())
    }

    pub fn check(&self, value: &Value) -> Result<(), ContractError> {
        check_node(self.name, &self.schema, value, "")
    }

    pub fn parse<T: DeserializeOwned>(&self, raw: &str) -> Result<T, ContractError> {
        let value: Value = serde_json::from_str(raw.trim()).map_err(ContractError::InvalidJson)?;
        self.check(&value)?;
        serde_json::from_value(value).map_err(|source| ContractError::Shape {
            contract: self.name,
            source,
        })
    }
}

pub fn attribute_contract() -> &'static SchemaContract {
    static CONTRACT: OnceLock<SchemaContract> = OnceLock::new();
    CONTRACT.get_or_init(|| SchemaContract {
        name: ATTRIBUTE_CONTRACT_NAME,
        schema: json!({
            "type": "object",
            "properties": {
                "attributes": {
                    "type": "object",
                    "properties": {
                        "color": { "type": "string" },
                        "material": { "type": "string" },
                        "shape": { "type": "string" },
                        "style": { "type": "string" },
                        "keywords": { "type": "array", "items": { "type": "string" } }
                    },
                    "required": ATTRIBUTE_REQUIRED
                }
            },
            "required": ["attributes"]
        }),
    })
}

pub fn copy_contract() -> &'static SchemaContract {
    static CONTRACT: OnceLock<SchemaContract> = OnceLock::new();
    CONTRACT.get_or_init(|| SchemaContract {
        name: COPY_CONTRACT_NAME,
        schema: json!({
            "type": "object",
            "properties": {
                "titles": { "type": "array", "items": { "type": "string" } },
                "description_short": { "type": "string" },
                "description_long": { "type": "string" },
                "bullets": { "type": "array", "items": { "type": "string" } },
                "warnings": { "type": "array", "items": { "type": "string" } }
            },
            "required": COPY_REQUIRED
        }),
    })
}

/// Input and output shapes advertised to callers of the generate operation.
pub fn sample_shapes() -> Value {
    json!({
        "input_schema": {
            "title": "string",
            "category": "string",
            "features": ["string"],
            "tone": CANONICAL_TONES.map(Tone::as_str),
            "image": "base64 string or null"
        },
        "output_schema": {
            "titles": ["string"],
            "description_short": "string",
            "description_long": "string",
            "bullets": ["string"],
            "warnings": ["string"]
        }
    })
}

fn check_node(
    contract: &'static str,
    schema: &Value,
    value: &Value,
    path: &str,
) -> Result<(), ContractError> {
    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return Ok(());
    }
    let Some(object) = value.as_object() else {
        return Err(ContractError::NotAnObject {
            contract,
            path: display_path(path),
        });
    };

    for key in required_keys(schema) {
        if !object.contains_key(key) {
            return Err(ContractError::MissingKey {
                contract,
                path: join_path(path, key),
            });
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return Ok(());
    };
    for (key, child_schema) in properties {
        if let Some(child) = object.get(key) {
            check_node(contract, child_schema, child, &join_path(path, key))?;
        }
    }
    Ok(())
}

fn required_keys(schema: &Value) -> impl Iterator<Item = &str> {
    schema
        .get("required")
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_str)
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

fn display_path(path: &str) -> String {
    if path.is_empty() {
        "$".to_string()
    } else {
        path.to_string()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{json, Value};

    use super::{attribute_contract, copy_contract, sample_shapes, ContractError};
    use crate::copy::CopyResult;

    #[test]
    fn copy_contract_requires_all_five_keys() {
        let required = copy_contract().schema()["required"].clone();
        assert_eq!(
            required,
            json!([
                "titles",
                "description_short",
                "description_long",
                "bullets",
                "warnings"
            ])
        );
    }

    #[test]
    fn attribute_contract_nests_record_under_attributes() {
        let schema = attribute_contract().schema();
        assert_eq!(schema["required"], json!(["attributes"]));
        assert_eq!(
            schema["properties"]["attributes"]["required"],
            json!(["color", "material", "style", "keywords"])
        );
        assert_eq!(
            schema["properties"]["attributes"]["properties"]["keywords"]["type"],
            json!("array")
        );
    }

    #[test]
    fn missing_top_level_key_is_a_schema_violation() {
        let raw = r#"{"titles":["A"],"description_short":"s","description_long":"l","bullets":[]}"#;
        let err = copy_contract().parse::<CopyResult>(raw).err();
        match err {
            Some(ContractError::MissingKey { path, .. }) => assert_eq!(path, "warnings"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn missing_nested_key_reports_dotted_path() {
        let value = json!({ "attributes": { "color": "red", "style": "retro", "keywords": [] } });
        let err = attribute_contract().check(&value).err();
        match err {
            Some(err @ ContractError::MissingKey { .. }) => {
                assert!(err.is_schema_violation());
                assert_eq!(
                    err.to_string(),
                    "Missing key in generated JSON: attributes.material"
                );
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn non_object_payloads_are_rejected() {
        let err = copy_contract().check(&json!(["titles"])).err();
        assert!(matches!(err, Some(ContractError::NotAnObject { ref path, .. }) if path == "$"));

        let err = attribute_contract()
            .check(&json!({ "attributes": "red" }))
            .err();
        assert!(
            matches!(err, Some(ContractError::NotAnObject { ref path, .. }) if path == "attributes")
        );
    }

    #[test]
    fn invalid_json_is_not_a_schema_violation() {
        let err = copy_contract().parse::<Value>("Sure! Here is your copy:").err();
        match err {
            Some(err @ ContractError::InvalidJson(_)) => assert!(!err.is_schema_violation()),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn wrong_value_type_fails_deserialization() {
        let raw = r#"{"titles":"A","description_short":"s","description_long":"l","bullets":[],"warnings":[]}"#;
        let err = copy_contract().parse::<CopyResult>(raw).err();
        assert!(matches!(err, Some(ContractError::Shape { .. })));
    }

    #[test]
    fn pretty_rendering_is_valid_json() -> anyhow::Result<()> {
        let rendered = copy_contract().pretty();
        let reparsed: Value = serde_json::from_str(&rendered)?;
        assert_eq!(&reparsed, copy_contract().schema());
        Ok(())
    }

    #[test]
    fn sample_shapes_list_canonical_tones() {
        let shapes = sample_shapes();
        assert_eq!(
            shapes["input_schema"]["tone"],
            json!(["neutral", "formal", "playful", "luxury", "minimalist"])
        );
        let output_keys: Vec<String> = shapes["output_schema"]
            .as_object()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default();
        let required = copy_contract().schema()["required"]
            .as_array()
            .map(Vec::len)
            .unwrap_or(0);
        assert_eq!(output_keys.len(), required);
    }
}
