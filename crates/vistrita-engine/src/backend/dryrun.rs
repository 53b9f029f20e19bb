use anyhow::{bail, Result};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use vistrita_contracts::schema::{ATTRIBUTE_CONTRACT_NAME, COPY_CONTRACT_NAME};

use super::{GenerativeBackend, StructuredCall};

const COLORS: [&str; 6] = ["Red", "Navy", "Ivory", "Charcoal", "Olive", "Amber"];
const MATERIALS: [&str; 5] = ["Leather", "Cotton", "Ceramic", "Oak", "Stainless steel"];
const SHAPES: [&str; 5] = ["Sneaker", "Tote", "Mug", "Lamp", "Chair"];
const STYLES: [&str; 5] = ["Minimalist", "Vintage", "Sporty", "Scandinavian", "Industrial"];

/// Offline backend answering both contracts deterministically from the request.
pub struct DryrunBackend;

impl DryrunBackend {
    fn attributes(call: &StructuredCall<'_>) -> Value {
        let mut hasher = Sha256::new();
        for image in call.images() {
            hasher.update(image.bytes());
        }
        if call.images().next().is_none() {
            hasher.update(call.text().as_bytes());
        }
        let digest = hasher.finalize();
        let pick = |palette: &[&'static str], idx: usize| palette[digest[idx] as usize % palette.len()];

        let color = pick(&COLORS, 0);
        let material = pick(&MATERIALS, 1);
        let shape = pick(&SHAPES, 2);
        let style = pick(&STYLES, 3);
        json!({
            "attributes": {
                "color": color,
                "material": material,
                "shape": shape,
                "style": style,
                "keywords": [
                    format!("{color} {shape}").to_lowercase(),
                    material.to_lowercase(),
                    style.to_lowercase(),
                    format!("{style} {shape}").to_lowercase(),
                    format!("{} #{}", shape.to_lowercase(), hex::encode(&digest[..3])),
                ],
            }
        })
    }

    fn copy(call: &StructuredCall<'_>) -> Value {
        let text = call.text();
        let title = prompt_field(&text, "Title").unwrap_or("Product");
        let category = prompt_field(&text, "Category").unwrap_or("General");
        let tone = prompt_field(&text, "Tone").unwrap_or("neutral");
        let features: Vec<&str> = prompt_field(&text, "Key Features")
            .filter(|value| *value != "None")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|feature| !feature.is_empty())
                    .collect()
            })
            .unwrap_or_default();

        let feature_line = if features.is_empty() {
            "thoughtful details".to_string()
        } else {
            features.join(", ")
        };
        json!({
            "titles": [
                title.to_string(),
                format!("{title} | {category}"),
                format!("The {tone} {title}"),
            ],
            "description_short": format!("A {tone} take on {category}: the {title}."),
            "description_long": format!(
                "Meet the {title}. Designed for {category} lovers, it brings {feature_line} together in one piece."
            ),
            "bullets": features,
            "warnings": [],
        })
    }
}

impl GenerativeBackend for DryrunBackend {
    fn name(&self) -> &str {
        "dryrun"
    }

    fn invoke(&self, call: &StructuredCall<'_>) -> Result<String> {
        let answer = match call.contract.name() {
            ATTRIBUTE_CONTRACT_NAME => Self::attributes(call),
            COPY_CONTRACT_NAME => Self::copy(call),
            other => bail!("dryrun backend has no answer for contract '{other}'"),
        };
        Ok(answer.to_string())
    }
}

/// Value of a `- Label: value` line in a prompt.
fn prompt_field<'a>(text: &'a str, label: &str) -> Option<&'a str> {
    text.lines().find_map(|line| {
        line.trim()
            .strip_prefix("- ")
            .and_then(|rest| rest.strip_prefix(label))
            .and_then(|rest| rest.strip_prefix(':'))
            .map(str::trim)
    })
}
