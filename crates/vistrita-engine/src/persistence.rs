use tracing::{debug, warn};
use vistrita_contracts::{PersistenceOutcome, ProductLogEntry, ProductStore};

use crate::text::error_chain_text;

/// Hands `entry` to the store. A store failure is logged and reported, never raised.
pub fn persist(store: Option<&dyn ProductStore>, entry: &ProductLogEntry) -> PersistenceOutcome {
    let Some(store) = store else {
        return PersistenceOutcome::Skipped;
    };
    match store.append(entry) {
        Ok(()) => {
            debug!(entry_id = %entry.id, product = %entry.product_name, "product log entry stored");
            PersistenceOutcome::Stored
        }
        Err(err) => {
            let reason = error_chain_text(&err, 512);
            warn!(
                entry_id = %entry.id,
                product = %entry.product_name,
                error = %reason,
                "failed to persist product log entry"
            );
            PersistenceOutcome::Failed(reason)
        }
    }
}
