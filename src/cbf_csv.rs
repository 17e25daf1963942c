//! Delimited I/O: reading provider CSV rows into raw records, and writing
//! the CBF side-channel CSV used for audit and debugging.

use std::collections::{BTreeMap, BTreeSet};
use std::io;

use csv::{ReaderBuilder, WriterBuilder};
use serde_json::Value;

use crate::types::{LineItem, RawRecord};
use crate::Result;

/// Canonical columns every CBF row carries, in output order. Optional and
/// tag columns present in the dataset follow, sorted.
pub const CORE_COLUMNS: [&str; 6] = [
    "lineitem/type",
    "resource/service",
    "resource/id",
    "time/usage_start",
    "cost/cost",
    "cost/discounted_cost",
];

/// Read a header-keyed CSV into raw records. Values are kept verbatim,
/// including empty cells; the normalizer decides what is missing.
pub fn read_raw_records<R: io::Read>(reader: R) -> Result<Vec<RawRecord>> {
    let mut rdr = ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let mut records = Vec::new();
    for row in rdr.records() {
        let row = row?;
        let mut record = RawRecord::new();
        for (header, value) in headers.iter().zip(row.iter()) {
            record.insert(header.to_string(), value.to_string());
        }
        records.push(record);
    }
    Ok(records)
}

/// Write line-items as CSV: fixed core columns first, then whatever optional
/// and tag columns appear anywhere in the dataset.
pub fn write_line_items<W: io::Write>(writer: W, items: &[LineItem]) -> Result<()> {
    let flat: Vec<BTreeMap<String, String>> =
        items.iter().map(flatten_item).collect::<Result<_>>()?;

    let mut extras = BTreeSet::new();
    for map in &flat {
        for key in map.keys() {
            if !CORE_COLUMNS.contains(&key.as_str()) {
                extras.insert(key.clone());
            }
        }
    }

    let mut header: Vec<&str> = CORE_COLUMNS.to_vec();
    header.extend(extras.iter().map(String::as_str));

    let mut wtr = WriterBuilder::new().from_writer(writer);
    wtr.write_record(&header)?;
    for map in &flat {
        let row: Vec<&str> = header
            .iter()
            .map(|column| map.get(*column).map(String::as_str).unwrap_or(""))
            .collect();
        wtr.write_record(&row)?;
    }
    wtr.flush()?;
    Ok(())
}

fn flatten_item(item: &LineItem) -> Result<BTreeMap<String, String>> {
    let Value::Object(map) = serde_json::to_value(item)? else {
        return Ok(BTreeMap::new());
    };
    Ok(map
        .into_iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            (key, rendered)
        })
        .collect())
}
