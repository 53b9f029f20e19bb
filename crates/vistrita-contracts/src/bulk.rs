use serde::{Deserialize, Serialize};

use crate::copy::{CopyResult, GenerationOutcome};

/// Aggregate over an ordered batch; `results[i]` answers request `i`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub results: Vec<CopyResult>,
    pub total: usize,
    pub successful: usize,
    pub failed: usize,
}

impl BulkOutcome {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a GenerationOutcome>) -> Self {
        let mut results = Vec::new();
        let mut failed = 0;
        for outcome in outcomes {
            if outcome.is_failed() {
                failed += 1;
            }
            results.push(outcome.result().clone());
        }
        let total = results.len();
        Self {
            results,
            total,
            successful: total - failed,
            failed,
        }
    }
}
