//! Record normalization: one raw provider record in, one canonical CBF
//! line-item out. Pure; all validation failures name the offending field
//! and the record index.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use tracing::debug;

use crate::types::{LineItem, LineItemKind, RawRecord, RecordKind};
use crate::{CostdropError, Result};

pub fn normalize_record(record: &RawRecord, kind: RecordKind, index: usize) -> Result<LineItem> {
    let mut item = match kind {
        RecordKind::Usage => normalize_usage(record, index)?,
        RecordKind::Commitment => normalize_commitment(record, index)?,
        RecordKind::Discount => normalize_discount(record, index)?,
    };
    apply_optional_fields(record, &mut item, index);
    Ok(item)
}

fn normalize_usage(record: &RawRecord, index: usize) -> Result<LineItem> {
    let service = require(record, "sku", index)?;
    let instance_id = require(record, "instance_id", index)?;
    let usage_start = parse_usage_start(require(record, "usage_date", index)?, "usage_date", index)?;
    let cost = parse_cost(require(record, "cost", index)?, "cost", index)?;
    let discount = parse_cost(require(record, "discount", index)?, "discount", index)?;
    let discounted = cost - discount.abs();

    Ok(LineItem::new(
        classify_usage(service, cost),
        service,
        format!("instance-{instance_id}"),
        usage_start,
        render_cost(cost),
        render_cost(discounted),
    ))
}

fn normalize_commitment(record: &RawRecord, index: usize) -> Result<LineItem> {
    let commitment_id = require(record, "commitment_id", index)?;
    let usage_start = parse_usage_start(
        require(record, "commitment_date", index)?,
        "commitment_date",
        index,
    )?;
    let cost = render_cost(parse_cost(require(record, "cost", index)?, "cost", index)?);

    Ok(LineItem::new(
        LineItemKind::CommittedUsePurchase,
        "CommittedUse",
        format!("commit-{commitment_id}"),
        usage_start,
        cost.clone(),
        cost,
    ))
}

fn normalize_discount(record: &RawRecord, index: usize) -> Result<LineItem> {
    let discount_id = require(record, "discount_id", index)?;
    let service = require(record, "discount_type", index)?;
    let usage_start = parse_usage_start(require(record, "usage_date", index)?, "usage_date", index)?;
    let amount = render_cost(parse_cost(
        require(record, "discount", index)?,
        "discount",
        index,
    )?);

    Ok(LineItem::new(
        LineItemKind::Discount,
        service,
        format!("discount-{discount_id}"),
        usage_start,
        amount.clone(),
        amount,
    ))
}

/// Negative amounts are credits regardless of service; otherwise the service
/// name decides between support, committed-use, credit, and plain usage rows.
fn classify_usage(service: &str, cost: Decimal) -> LineItemKind {
    if cost.is_sign_negative() && !cost.is_zero() {
        return LineItemKind::Discount;
    }
    let service = service.to_lowercase();
    if service.contains("support") {
        LineItemKind::Support
    } else if service.contains("reserved") || service.contains("commitment") {
        LineItemKind::CommittedUsePurchase
    } else if service.contains("credit") {
        LineItemKind::Discount
    } else {
        LineItemKind::Usage
    }
}

fn apply_optional_fields(record: &RawRecord, item: &mut LineItem, index: usize) {
    item.region = optional(record, "region");
    item.compartment = optional(record, "compartment_name");
    item.shape = optional(record, "shape");
    item.unit = optional(record, "unit");

    if let Some(quantity) = optional(record, "quantity") {
        match parse_decimal(&quantity) {
            Some(value) => item.amount = Some(render_cost(value)),
            None => debug!(index, quantity = %quantity, "skipping unparseable quantity"),
        }
    }

    for (key, value) in record {
        let Some(name) = key.strip_prefix("tag:").or_else(|| key.strip_prefix("tag/")) else {
            continue;
        };
        let name = name.trim();
        if name.is_empty() || value.trim().is_empty() {
            continue;
        }
        item.tags
            .insert(format!("tag/{}", name.to_lowercase()), value.clone());
    }
}

fn require<'a>(record: &'a RawRecord, field: &str, index: usize) -> Result<&'a str> {
    record
        .get(field)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CostdropError::RecordValidation {
            index,
            field: field.to_string(),
            reason: "required field is missing or empty".to_string(),
        })
}

fn optional(record: &RawRecord, field: &str) -> Option<String> {
    record
        .get(field)
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw)
        .or_else(|_| Decimal::from_scientific(raw))
        .ok()
}

fn parse_cost(raw: &str, field: &str, index: usize) -> Result<Decimal> {
    parse_decimal(raw).ok_or_else(|| CostdropError::RecordValidation {
        index,
        field: field.to_string(),
        reason: format!("'{raw}' is not a valid decimal amount"),
    })
}

/// Fixed-point rendering; `1e-05` in a source field comes out as `0.00001`.
fn render_cost(value: Decimal) -> String {
    value.normalize().to_string()
}

fn parse_usage_start(raw: &str, field: &str, index: usize) -> Result<String> {
    if NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok()
        || DateTime::parse_from_rfc3339(raw).is_ok()
    {
        return Ok(raw.to_string());
    }
    // Naive timestamps are taken as UTC.
    if let Ok(naive) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(format!("{}Z", naive.format("%Y-%m-%dT%H:%M:%S%.f")));
    }
    Err(CostdropError::RecordValidation {
        index,
        field: field.to_string(),
        reason: format!("'{raw}' is not an ISO 8601 date or timestamp"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn usage_record() -> RawRecord {
        RawRecord::from([
            ("sku".to_string(), "Compute".to_string()),
            ("instance_id".to_string(), "i-42".to_string()),
            ("usage_date".to_string(), "2024-08-01".to_string()),
            ("cost".to_string(), "12.50".to_string()),
            ("discount".to_string(), "2.5".to_string()),
        ])
    }

    #[test]
    fn normalizes_usage_record() -> Result<()> {
        let item = normalize_record(&usage_record(), RecordKind::Usage, 0)?;
        assert_eq!(item.kind, LineItemKind::Usage);
        assert_eq!(item.service, "Compute");
        assert_eq!(item.resource_id, "instance-i-42");
        assert_eq!(item.usage_start, "2024-08-01");
        assert_eq!(item.cost, "12.5");
        assert_eq!(item.discounted_cost, "10");
        Ok(())
    }

    #[test]
    fn normalization_is_idempotent() -> Result<()> {
        let record = usage_record();
        let first = normalize_record(&record, RecordKind::Usage, 0)?;
        let second = normalize_record(&record, RecordKind::Usage, 0)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn renders_tiny_costs_without_scientific_notation() -> Result<()> {
        let mut record = usage_record();
        record.insert("cost".to_string(), "0.00001".to_string());
        record.insert("discount".to_string(), "0".to_string());
        let item = normalize_record(&record, RecordKind::Usage, 0)?;
        assert_eq!(item.cost, "0.00001");

        record.insert("cost".to_string(), "1e-05".to_string());
        let item = normalize_record(&record, RecordKind::Usage, 0)?;
        assert_eq!(item.cost, "0.00001");
        Ok(())
    }

    #[test]
    fn missing_field_names_the_field() {
        let mut record = usage_record();
        record.remove("instance_id");
        let err = normalize_record(&record, RecordKind::Usage, 7).expect_err("should fail");
        match err {
            CostdropError::RecordValidation { index, field, .. } => {
                assert_eq!(index, 7);
                assert_eq!(field, "instance_id");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn empty_field_counts_as_missing() {
        let mut record = usage_record();
        record.insert("cost".to_string(), "  ".to_string());
        assert!(matches!(
            normalize_record(&record, RecordKind::Usage, 0),
            Err(CostdropError::RecordValidation { .. })
        ));
    }

    #[test]
    fn rejects_unparseable_date() {
        let mut record = usage_record();
        record.insert("usage_date".to_string(), "08/01/2024".to_string());
        let err = normalize_record(&record, RecordKind::Usage, 0).expect_err("should fail");
        match err {
            CostdropError::RecordValidation { field, .. } => assert_eq!(field, "usage_date"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn accepts_rfc3339_timestamps_unchanged() -> Result<()> {
        let mut record = usage_record();
        record.insert(
            "usage_date".to_string(),
            "2024-08-01T12:30:00+00:00".to_string(),
        );
        let item = normalize_record(&record, RecordKind::Usage, 0)?;
        assert_eq!(item.usage_start, "2024-08-01T12:30:00+00:00");
        Ok(())
    }

    #[test]
    fn naive_timestamps_are_rendered_as_utc() -> Result<()> {
        let mut record = usage_record();
        record.insert("usage_date".to_string(), "2024-08-01T12:30:00".to_string());
        let item = normalize_record(&record, RecordKind::Usage, 0)?;
        assert_eq!(item.usage_start, "2024-08-01T12:30:00Z");
        Ok(())
    }

    #[test]
    fn negative_usage_cost_becomes_discount() -> Result<()> {
        let mut record = usage_record();
        record.insert("cost".to_string(), "-3.25".to_string());
        record.insert("discount".to_string(), "0".to_string());
        let item = normalize_record(&record, RecordKind::Usage, 0)?;
        assert_eq!(item.kind, LineItemKind::Discount);
        assert_eq!(item.cost, "-3.25");
        Ok(())
    }

    #[test]
    fn classifies_support_and_reserved_services() -> Result<()> {
        let mut record = usage_record();
        record.insert("sku".to_string(), "Premium Support".to_string());
        let item = normalize_record(&record, RecordKind::Usage, 0)?;
        assert_eq!(item.kind, LineItemKind::Support);

        record.insert("sku".to_string(), "Reserved Capacity".to_string());
        let item = normalize_record(&record, RecordKind::Usage, 0)?;
        assert_eq!(item.kind, LineItemKind::CommittedUsePurchase);
        Ok(())
    }

    #[test]
    fn normalizes_commitment_record() -> Result<()> {
        let record = RawRecord::from([
            ("commitment_id".to_string(), "annual-1".to_string()),
            ("commitment_date".to_string(), "2024-08-01".to_string()),
            ("cost".to_string(), "1000".to_string()),
        ]);
        let item = normalize_record(&record, RecordKind::Commitment, 0)?;
        assert_eq!(item.kind, LineItemKind::CommittedUsePurchase);
        assert_eq!(item.service, "CommittedUse");
        assert_eq!(item.resource_id, "commit-annual-1");
        assert_eq!(item.cost, item.discounted_cost);
        Ok(())
    }

    #[test]
    fn normalizes_discount_record_with_negative_amount() -> Result<()> {
        let record = RawRecord::from([
            ("discount_id".to_string(), "promo-9".to_string()),
            ("discount_type".to_string(), "PromoCredit".to_string()),
            ("discount".to_string(), "-15.00".to_string()),
            ("usage_date".to_string(), "2024-08-03".to_string()),
        ]);
        let item = normalize_record(&record, RecordKind::Discount, 0)?;
        assert_eq!(item.kind, LineItemKind::Discount);
        assert_eq!(item.service, "PromoCredit");
        assert_eq!(item.resource_id, "discount-promo-9");
        assert_eq!(item.cost, "-15");
        Ok(())
    }

    #[test]
    fn carries_optional_fields_and_tags() -> Result<()> {
        let mut record = usage_record();
        record.insert("region".to_string(), "eu-frankfurt-1".to_string());
        record.insert("shape".to_string(), "VM.Standard3".to_string());
        record.insert("unit".to_string(), "GB_HOURS".to_string());
        record.insert("quantity".to_string(), "744.000".to_string());
        record.insert("tag:Team".to_string(), "payments".to_string());
        record.insert("tag/env".to_string(), "prod".to_string());
        record.insert("tag:empty".to_string(), " ".to_string());

        let item = normalize_record(&record, RecordKind::Usage, 0)?;
        assert_eq!(item.region.as_deref(), Some("eu-frankfurt-1"));
        assert_eq!(item.shape.as_deref(), Some("VM.Standard3"));
        assert_eq!(item.unit.as_deref(), Some("GB_HOURS"));
        assert_eq!(item.amount.as_deref(), Some("744"));
        assert_eq!(item.tags.get("tag/team").map(String::as_str), Some("payments"));
        assert_eq!(item.tags.get("tag/env").map(String::as_str), Some("prod"));
        assert!(!item.tags.contains_key("tag/empty"));
        Ok(())
    }
}
