use std::thread;

use serde::Serialize;
use tracing::{info, warn};
use vistrita_contracts::{
    BulkOutcome, CopyRequest, EntrySource, GenerationOutcome, PersistenceOutcome, ProductLogEntry,
    ProductStore,
};

use crate::generator::CopyGenerator;
use crate::persistence::persist;

/// Per-item detail next to the aggregate counts.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkItemReport {
    pub index: usize,
    pub failed: bool,
    pub failure_reason: Option<String>,
    pub persistence: PersistenceOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BulkReport {
    #[serde(flatten)]
    pub outcome: BulkOutcome,
    pub items: Vec<BulkItemReport>,
}

/// Runs the copy generator over an ordered batch.
///
/// With `concurrency > 1` the batch is split into contiguous chunks, one scoped
/// thread each. Results are reassembled in input order before anything is persisted.
#[derive(Clone)]
pub struct BulkRunner {
    generator: CopyGenerator,
    concurrency: usize,
}

impl BulkRunner {
    pub fn new(generator: CopyGenerator) -> Self {
        Self {
            generator,
            concurrency: 1,
        }
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn run(
        &self,
        requests: &[CopyRequest],
        store: Option<&dyn ProductStore>,
        user: Option<&str>,
    ) -> BulkReport {
        let outcomes = self.generate_all(requests);

        let items: Vec<BulkItemReport> = requests
            .iter()
            .zip(&outcomes)
            .enumerate()
            .map(|(index, (request, outcome))| {
                let entry =
                    ProductLogEntry::from_generation(EntrySource::Bulk, request, outcome, user);
                BulkItemReport {
                    index,
                    failed: outcome.is_failed(),
                    failure_reason: outcome.failure_reason().map(str::to_string),
                    persistence: persist(store, &entry),
                }
            })
            .collect();

        let outcome = BulkOutcome::from_outcomes(&outcomes);
        info!(
            total = outcome.total,
            successful = outcome.successful,
            failed = outcome.failed,
            persistence_failures = items.iter().filter(|item| item.persistence.is_failed()).count(),
            "bulk generation finished"
        );
        BulkReport { outcome, items }
    }

    fn generate_all(&self, requests: &[CopyRequest]) -> Vec<GenerationOutcome> {
        if self.concurrency <= 1 || requests.len() <= 1 {
            return requests
                .iter()
                .map(|request| self.generator.generate(request))
                .collect();
        }

        let chunk_size = requests.len().div_ceil(self.concurrency);
        let generator = &self.generator;
        thread::scope(|scope| {
            let handles: Vec<_> = requests
                .chunks(chunk_size)
                .map(|chunk| {
                    let handle = scope.spawn(move || {
                        chunk
                            .iter()
                            .map(|request| generator.generate(request))
                            .collect::<Vec<_>>()
                    });
                    (chunk.len(), handle)
                })
                .collect();

            let mut outcomes = Vec::with_capacity(requests.len());
            for (len, handle) in handles {
                match handle.join() {
                    Ok(chunk_outcomes) => outcomes.extend(chunk_outcomes),
                    Err(_) => {
                        warn!(items = len, "bulk worker panicked; marking its items failed");
                        outcomes.extend(
                            (0..len).map(|_| GenerationOutcome::failed("bulk worker panicked")),
                        );
                    }
                }
            }
            outcomes
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use serde_json::json;
    use vistrita_contracts::{CopyRequest, EntryStatus, PersistenceOutcome, Tone};

    use super::BulkRunner;
    use crate::backend::DryrunBackend;
    use crate::generator::CopyGenerator;
    use crate::test_support::{MemoryStore, ScriptedBackend};

    fn requests(titles: &[&str]) -> Vec<CopyRequest> {
        titles
            .iter()
            .map(|title| CopyRequest {
                title: title.to_string(),
                category: "Home".to_string(),
                features: Vec::new(),
                tone: Tone::Neutral,
                source_image: None,
            })
            .collect()
    }

    /// Echoes the title from the prompt as the only title, failing for titles starting with "bad".
    fn echo_backend(delay: bool) -> ScriptedBackend {
        ScriptedBackend::new(move |call| {
            let text = call.text();
            let title = text
                .lines()
                .find_map(|line| line.strip_prefix("- Title: "))
                .unwrap_or_default()
                .to_string();
            if delay {
                // Earlier items sleep longer so completion order is reversed.
                let rank = title.trim_start_matches(|c: char| !c.is_ascii_digit());
                let rank: u64 = rank.parse().unwrap_or(0);
                thread::sleep(Duration::from_millis(40u64.saturating_sub(rank * 5)));
            }
            if title.starts_with("bad") {
                anyhow::bail!("rejected {title}");
            }
            Ok(json!({
                "titles": [title],
                "description_short": "s",
                "description_long": "l",
                "bullets": [],
                "warnings": []
            })
            .to_string())
        })
    }

    #[test]
    fn results_follow_input_order_and_counts_add_up() {
        let runner = BulkRunner::new(CopyGenerator::new(echo_backend(false).shared(), "m"));
        let report = runner.run(&requests(&["lamp", "bad chair", "mug"]), None, None);

        assert_eq!(report.outcome.total, 3);
        assert_eq!(report.outcome.successful, 2);
        assert_eq!(report.outcome.failed, 1);
        assert_eq!(report.outcome.results[0].titles, vec!["lamp".to_string()]);
        assert_eq!(report.outcome.results[1].titles[0], "Error generating titles");
        assert_eq!(report.outcome.results[2].titles, vec!["mug".to_string()]);
        assert!(report.items[1].failed);
        assert!(report
            .items
            .iter()
            .all(|item| item.persistence == PersistenceOutcome::Skipped));
    }

    #[test]
    fn persistence_failures_do_not_change_counts() {
        let runner = BulkRunner::new(CopyGenerator::new(Arc::new(DryrunBackend), "dryrun-text-1"));
        let store = MemoryStore::refusing();
        let report = runner.run(&requests(&["lamp", "mug"]), Some(&store), None);

        assert_eq!(report.outcome.total, 2);
        assert_eq!(report.outcome.successful, 2);
        assert_eq!(report.outcome.failed, 0);
        assert!(report.items.iter().all(|item| item.persistence.is_failed()));
    }

    #[test]
    fn every_item_is_persisted_in_order() -> anyhow::Result<()> {
        let runner = BulkRunner::new(CopyGenerator::new(echo_backend(false).shared(), "m"))
            .with_concurrency(3);
        let store = MemoryStore::default();
        let report = runner.run(&requests(&["a1", "bad2", "c3", "d4"]), Some(&store), Some("ops"));

        assert!(report
            .items
            .iter()
            .all(|item| item.persistence == PersistenceOutcome::Stored));
        let entries = store
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .clone();
        let names: Vec<&str> = entries.iter().map(|entry| entry.product_name.as_str()).collect();
        assert_eq!(names, vec!["a1", "bad2", "c3", "d4"]);
        assert_eq!(entries[1].status, EntryStatus::Failed);
        assert_eq!(entries[0].user.as_deref(), Some("ops"));
        Ok(())
    }

    #[test]
    fn concurrent_run_matches_sequential_run() {
        let titles = ["item1", "item2", "bad3", "item4", "item5", "item6", "item7"];
        let sequential = BulkRunner::new(CopyGenerator::new(echo_backend(false).shared(), "m"))
            .run(&requests(&titles), None, None);
        let concurrent = BulkRunner::new(CopyGenerator::new(echo_backend(true).shared(), "m"))
            .with_concurrency(4)
            .run(&requests(&titles), None, None);

        assert_eq!(concurrent.outcome.results.len(), titles.len());
        assert_eq!(concurrent.outcome.successful, sequential.outcome.successful);
        assert_eq!(concurrent.outcome.failed, 1);
        for (index, title) in titles.iter().enumerate() {
            if index == 2 {
                assert!(concurrent.outcome.results[index].looks_like_failure());
            } else {
                assert_eq!(concurrent.outcome.results[index].titles[0], *title);
            }
        }
    }

    #[test]
    fn empty_titles_count_as_successful() {
        let backend = ScriptedBackend::replying(
            r#"{"titles":[],"description_short":"","description_long":"","bullets":[],"warnings":[]}"#,
        );
        let report = BulkRunner::new(CopyGenerator::new(backend.shared(), "m"))
            .run(&requests(&["x"]), None, None);
        assert_eq!(report.outcome.successful, 1);
        assert_eq!(report.outcome.failed, 0);
    }

    #[test]
    fn report_serializes_flat_counts_with_items() -> anyhow::Result<()> {
        let report = BulkRunner::new(CopyGenerator::new(Arc::new(DryrunBackend), "dryrun-text-1"))
            .run(&requests(&["lamp"]), None, None);
        let value = serde_json::to_value(&report)?;
        assert_eq!(value["total"], json!(1));
        assert_eq!(value["successful"], json!(1));
        assert_eq!(value["items"][0]["persistence"], json!({ "status": "skipped" }));
        Ok(())
    }
}
