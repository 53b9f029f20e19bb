use serde::{Deserialize, Serialize};

pub const UNKNOWN_ATTRIBUTE: &str = "Unknown";
pub const ATTRIBUTE_ERROR_STYLE: &str = "Error processing image";

/// Visual attributes extracted from a product image.
///
/// Fields the backend omits deserialize to empty values, so a record always
/// carries all five fields.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AttributeRecord {
    #[serde(default)]
    pub color: String,
    #[serde(default)]
    pub material: String,
    #[serde(default)]
    pub shape: String,
    #[serde(default)]
    pub style: String,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// Wire shape of the attribute-extraction response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeEnvelope {
    pub attributes: AttributeRecord,
}

impl AttributeRecord {
    /// Fixed record returned when extraction fails for any reason.
    pub fn sentinel() -> Self {
        Self {
            color: UNKNOWN_ATTRIBUTE.to_string(),
            material: UNKNOWN_ATTRIBUTE.to_string(),
            shape: UNKNOWN_ATTRIBUTE.to_string(),
            style: ATTRIBUTE_ERROR_STYLE.to_string(),
            keywords: Vec::new(),
        }
    }

    pub fn is_sentinel(&self) -> bool {
        *self == Self::sentinel()
    }
}
