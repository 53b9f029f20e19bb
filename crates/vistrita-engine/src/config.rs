use std::env;
use std::path::PathBuf;

pub const DEFAULT_BACKEND: &str = "gemini";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Backend client settings and model choices, built once and shared read-only.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub backend: String,
    pub api_key: Option<String>,
    pub api_base: String,
    pub vision_model: Option<String>,
    pub text_model: Option<String>,
    pub request_timeout_s: f64,
    pub transport_retries: usize,
    pub retry_backoff_s: f64,
    pub copy_max_output_tokens: u32,
    pub bulk_concurrency: usize,
    pub product_log: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            backend: DEFAULT_BACKEND.to_string(),
            api_key: None,
            api_base: DEFAULT_API_BASE.to_string(),
            vision_model: None,
            text_model: None,
            request_timeout_s: 90.0,
            transport_retries: 2,
            retry_backoff_s: 1.2,
            copy_max_output_tokens: 512,
            bulk_concurrency: 1,
            product_log: None,
        }
    }
}

impl EngineConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds a config from `lookup`, which returns the raw value of a variable.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let defaults = Self::default();

        Self {
            backend: non_empty("VISTRITA_BACKEND")
                .map(|value| value.to_ascii_lowercase())
                .unwrap_or(defaults.backend),
            api_key: non_empty("GEMINI_API_KEY").or_else(|| non_empty("GOOGLE_API_KEY")),
            api_base: non_empty("GEMINI_API_BASE")
                .map(|value| value.trim_end_matches('/').to_string())
                .filter(|value| !value.is_empty())
                .unwrap_or(defaults.api_base),
            vision_model: non_empty("VISTRITA_VISION_MODEL"),
            text_model: non_empty("GEMINI_MODEL"),
            request_timeout_s: clamped_f64(
                non_empty("VISTRITA_REQUEST_TIMEOUT"),
                defaults.request_timeout_s,
                5.0,
                300.0,
            ),
            transport_retries: clamped_f64(
                non_empty("VISTRITA_TRANSPORT_RETRIES"),
                defaults.transport_retries as f64,
                0.0,
                4.0,
            )
            .round() as usize,
            retry_backoff_s: clamped_f64(
                non_empty("VISTRITA_RETRY_BACKOFF"),
                defaults.retry_backoff_s,
                0.1,
                10.0,
            ),
            copy_max_output_tokens: clamped_f64(
                non_empty("VISTRITA_MAX_OUTPUT_TOKENS"),
                defaults.copy_max_output_tokens as f64,
                64.0,
                8192.0,
            )
            .round() as u32,
            bulk_concurrency: clamped_f64(
                non_empty("VISTRITA_BULK_CONCURRENCY"),
                defaults.bulk_concurrency as f64,
                1.0,
                16.0,
            )
            .round() as usize,
            product_log: non_empty("VISTRITA_PRODUCT_LOG").map(PathBuf::from),
        }
    }
}

fn clamped_f64(raw: Option<String>, default: f64, min: f64, max: f64) -> f64 {
    raw.and_then(|value| value.parse::<f64>().ok())
        .filter(|value| value.is_finite())
        .unwrap_or(default)
        .clamp(min, max)
}
