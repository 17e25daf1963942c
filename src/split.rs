//! Payload splitting: partition a line-item sequence into groups whose
//! serialized upload body stays under the destination's size limit.

use serde_json::json;
use tracing::debug;

use crate::types::LineItem;
use crate::{CostdropError, Result};

/// Hard request-body limit enforced by the ingestion API.
pub const MAX_PAYLOAD_BYTES: usize = 5 * 1024 * 1024;

/// Per-item allowance for JSON separators between array elements.
const ITEM_PADDING_BYTES: usize = 10;

#[derive(Debug, Clone)]
pub struct PayloadGroup {
    pub items: Vec<LineItem>,
    /// Estimated serialized size of the full upload body for this group.
    pub bytes: usize,
}

#[derive(Debug, Default)]
pub struct SplitOutcome {
    pub groups: Vec<PayloadGroup>,
    /// Items that can never fit in a payload on their own; the rest of the
    /// input is still grouped.
    pub oversized: Vec<CostdropError>,
}

impl SplitOutcome {
    pub fn is_clean(&self) -> bool {
        self.oversized.is_empty()
    }
}

/// Split `items` into ordered groups, each with an estimated body size of at
/// most `max_bytes`. Groups normally close at a working ceiling 10% below the
/// limit; a single item may claim the full limit for itself. Relative item
/// order is preserved across groups.
pub fn split_line_items(items: Vec<LineItem>, max_bytes: usize) -> Result<SplitOutcome> {
    let base_bytes = envelope_bytes()?;
    let working_limit = max_bytes - max_bytes / 10;

    let mut outcome = SplitOutcome::default();
    let mut current: Vec<LineItem> = Vec::new();
    let mut current_bytes = 0usize;

    for (index, item) in items.into_iter().enumerate() {
        let item_bytes = serde_json::to_vec(&item)?.len() + ITEM_PADDING_BYTES;

        if base_bytes + item_bytes > max_bytes {
            outcome.oversized.push(CostdropError::PayloadTooLarge {
                index,
                bytes: base_bytes + item_bytes,
                limit: max_bytes,
            });
            continue;
        }

        if !current.is_empty() && base_bytes + current_bytes + item_bytes > working_limit {
            outcome.groups.push(PayloadGroup {
                items: std::mem::take(&mut current),
                bytes: base_bytes + current_bytes,
            });
            current_bytes = 0;
        }

        current.push(item);
        current_bytes += item_bytes;
    }

    if !current.is_empty() {
        outcome.groups.push(PayloadGroup {
            items: current,
            bytes: base_bytes + current_bytes,
        });
    }

    debug!(
        groups = outcome.groups.len(),
        oversized = outcome.oversized.len(),
        "split line items into payload groups"
    );
    Ok(outcome)
}

/// Size of an upload body with no line items, measured with the longest
/// operation value so the estimate stays conservative.
fn envelope_bytes() -> Result<usize> {
    let empty = json!({
        "month": "2000-01",
        "operation": "replace_hourly",
        "data": [],
    });
    Ok(serde_json::to_vec(&empty)?.len())
}
