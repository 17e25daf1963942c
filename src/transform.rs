use tracing::{debug, warn};

use crate::normalize::normalize_record;
use crate::types::{LineItem, RawRecord, RecordKind};
use crate::CostdropError;

/// Result of running the normalizer across a record set: the successfully
/// normalized line-items in input order, plus the per-record failures.
#[derive(Debug, Default)]
pub struct TransformOutcome {
    pub items: Vec<LineItem>,
    pub failures: Vec<CostdropError>,
}

impl TransformOutcome {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Normalize every record of one declared kind. A malformed record never
/// aborts the batch; it is recorded in `failures` with its index and the
/// remaining records are still processed.
pub fn transform_records(records: &[RawRecord], kind: RecordKind) -> TransformOutcome {
    let mut outcome = TransformOutcome::default();

    for (index, record) in records.iter().enumerate() {
        match normalize_record(record, kind, index) {
            Ok(item) => outcome.items.push(item),
            Err(err) => {
                warn!(%kind, index, %err, "skipping malformed record");
                outcome.failures.push(err);
            }
        }
    }

    debug!(
        %kind,
        records = records.len(),
        items = outcome.items.len(),
        failures = outcome.failures.len(),
        "transformed record batch"
    );
    outcome
}
