use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::copy::{CopyRequest, GenerationOutcome};
use crate::tone::Tone;

/// Which operation produced a log entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntrySource {
    Generate,
    Vision,
    Bulk,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryStatus {
    Generated,
    Failed,
}

/// Flattened copy result plus request metadata, one per generation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductLogEntry {
    pub id: String,
    pub created_at: String,
    pub user: Option<String>,
    pub source: EntrySource,
    pub status: EntryStatus,
    pub product_name: String,
    pub category: String,
    pub tone: Tone,
    pub titles: Vec<String>,
    pub description_short: String,
    pub description_long: String,
    #[serde(default)]
    pub bullets: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
    pub image_sha256: Option<String>,
    pub failure_reason: Option<String>,
}

impl ProductLogEntry {
    pub fn from_generation(
        source: EntrySource,
        request: &CopyRequest,
        outcome: &GenerationOutcome,
        user: Option<&str>,
    ) -> Self {
        let result = outcome.result();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: now_utc_iso(),
            user: user.map(str::to_string),
            source,
            status: if outcome.is_failed() {
                EntryStatus::Failed
            } else {
                EntryStatus::Generated
            },
            product_name: request.title.clone(),
            category: request.category.clone(),
            tone: request.tone,
            titles: result.titles.clone(),
            description_short: result.description_short.clone(),
            description_long: result.description_long.clone(),
            bullets: result.bullets.clone(),
            warnings: result.warnings.clone(),
            keywords: Vec::new(),
            image_sha256: request
                .source_image
                .as_ref()
                .map(|image| image.sha256_hex()),
            failure_reason: outcome.failure_reason().map(str::to_string),
        }
    }

    pub fn with_keywords(mut self, keywords: &[String]) -> Self {
        self.keywords = keywords.to_vec();
        self
    }
}

/// Append-only sink for generated copy.
pub trait ProductStore: Send + Sync {
    fn append(&self, entry: &ProductLogEntry) -> anyhow::Result<()>;
}

/// Result of handing one entry to the store, reported next to the generation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum PersistenceOutcome {
    Stored,
    Failed(String),
    Skipped,
}

impl PersistenceOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, PersistenceOutcome::Failed(_))
    }
}

/// `ProductStore` backed by a JSONL file: one compact object per line.
#[derive(Debug, Clone)]
pub struct ProductLog {
    inner: Arc<ProductLogInner>,
}

#[derive(Debug)]
struct ProductLogInner {
    path: PathBuf,
    lock: Mutex<()>,
}

impl ProductLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(ProductLogInner {
                path: path.into(),
                lock: Mutex::new(()),
            }),
        }
    }

    pub fn path(&self) -> &Path {
        &self.inner.path
    }

    /// Entries in append order. Lines that do not parse are skipped.
    pub fn read_entries(&self) -> anyhow::Result<Vec<ProductLogEntry>> {
        if !self.inner.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.inner.path)?;
        Ok(raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| serde_json::from_str::<ProductLogEntry>(line).ok())
            .collect())
    }
}

impl ProductStore for ProductLog {
    fn append(&self, entry: &ProductLogEntry) -> anyhow::Result<()> {
        if let Some(parent) = self.inner.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let line = serde_json::to_string(entry)?;
        let _guard = self
            .inner
            .lock
            .lock()
            .map_err(|_| anyhow::anyhow!("product log lock poisoned"))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.inner.path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        Ok(())
    }
}

fn now_utc_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, false)
}
