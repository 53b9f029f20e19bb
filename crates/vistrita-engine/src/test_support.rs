use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{bail, Result};
use vistrita_contracts::{ProductLogEntry, ProductStore};

use crate::backend::{GenerativeBackend, StructuredCall};

type Answer = dyn Fn(&StructuredCall<'_>) -> Result<String> + Send + Sync;

/// In-memory backend whose answers come from a closure; records every prompt it sees.
pub(crate) struct ScriptedBackend {
    answer: Box<Answer>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub(crate) fn new(
        answer: impl Fn(&StructuredCall<'_>) -> Result<String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            answer: Box::new(answer),
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn replying(raw: &str) -> Self {
        let raw = raw.to_string();
        Self::new(move |_| Ok(raw.clone()))
    }

    pub(crate) fn failing(message: &str) -> Self {
        let message = message.to_string();
        Self::new(move |_| bail!("{message}"))
    }

    pub(crate) fn shared(self) -> Arc<dyn GenerativeBackend> {
        Arc::new(self)
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|prompts| prompts.clone())
            .unwrap_or_default()
    }
}

impl GenerativeBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn invoke(&self, call: &StructuredCall<'_>) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(call.text());
        }
        (self.answer)(call)
    }
}

/// Store that keeps entries in memory, or refuses every append.
#[derive(Default)]
pub(crate) struct MemoryStore {
    pub(crate) entries: Mutex<Vec<ProductLogEntry>>,
    pub(crate) refuse: bool,
}

impl MemoryStore {
    pub(crate) fn refusing() -> Self {
        Self {
            refuse: true,
            ..Self::default()
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }
}

impl ProductStore for MemoryStore {
    fn append(&self, entry: &ProductLogEntry) -> Result<()> {
        if self.refuse {
            bail!("disk full");
        }
        match self.entries.lock() {
            Ok(mut entries) => {
                entries.push(entry.clone());
                Ok(())
            }
            Err(_) => bail!("memory store poisoned"),
        }
    }
}

pub(crate) const VALID_COPY: &str = r#"{
    "titles": ["Velvet Armchair", "Armchair | Living"],
    "description_short": "Soft and sturdy.",
    "description_long": "A velvet armchair for long evenings.",
    "bullets": ["Velvet"],
    "warnings": []
}"#;

pub(crate) const VALID_ATTRIBUTES: &str = r#"{
    "attributes": {
        "color": "Red",
        "material": "Leather",
        "shape": "Sneaker",
        "style": "Sporty",
        "keywords": ["running", "shoe", "red", "leather", "sport"]
    }
}"#;
