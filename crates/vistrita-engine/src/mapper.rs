use vistrita_contracts::{AttributeRecord, CopyRequest, ImagePayload, Tone};

const GENERIC_COLOR: &str = "Generic";
const GENERIC_SHAPE: &str = "Product";
const GENERIC_CATEGORY: &str = "General";

/// Turns extracted attributes into a copy request.
///
/// The sentinel record's "Unknown" color, shape and material are treated as
/// absent, so a failed extraction maps to "Generic Product" with a single empty
/// feature. Style passes through as the category either way.
pub fn map_request(
    attributes: &AttributeRecord,
    tone: Tone,
    source_image: Option<ImagePayload>,
) -> CopyRequest {
    let sentinel = attributes.is_sentinel();
    let known = |value: &str| -> Option<String> {
        let trimmed = value.trim();
        (!sentinel && !trimmed.is_empty()).then(|| trimmed.to_string())
    };

    let color = known(&attributes.color).unwrap_or_else(|| GENERIC_COLOR.to_string());
    let shape = known(&attributes.shape).unwrap_or_else(|| GENERIC_SHAPE.to_string());
    let category = match attributes.style.trim() {
        "" => GENERIC_CATEGORY.to_string(),
        style => style.to_string(),
    };

    let mut features = Vec::with_capacity(attributes.keywords.len() + 1);
    features.push(known(&attributes.material).unwrap_or_default());
    features.extend(attributes.keywords.iter().cloned());

    CopyRequest {
        title: format!("{color} {shape}"),
        category,
        features,
        tone,
        source_image,
    }
}
