use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// One raw billing record as produced by a CSV row or a usage API result:
/// provider field names mapped to their string values.
pub type RawRecord = BTreeMap<String, String>;

/// Declared type of a raw record set, selecting the normalization contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Usage,
    Commitment,
    Discount,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Usage => "usage",
            RecordKind::Commitment => "commitment",
            RecordKind::Discount => "discount",
        }
    }
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// CBF `lineitem/type` wire values.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LineItemKind {
    Usage,
    CommittedUsePurchase,
    Discount,
    Support,
}

impl LineItemKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineItemKind::Usage => "Usage",
            LineItemKind::CommittedUsePurchase => "CommittedUsePurchase",
            LineItemKind::Discount => "Discount",
            LineItemKind::Support => "Support",
        }
    }
}

impl fmt::Display for LineItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the destination merges a payload into the month's existing data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
#[value(rename_all = "snake_case")]
pub enum Operation {
    #[default]
    ReplaceDrop,
    ReplaceHourly,
    Sum,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::ReplaceDrop => "replace_drop",
            Operation::ReplaceHourly => "replace_hourly",
            Operation::Sum => "sum",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One canonical billable event in Common Bill Format. Cost fields are
/// decimal-formatted strings; the destination rejects scientific notation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    #[serde(rename = "lineitem/type")]
    pub kind: LineItemKind,
    #[serde(rename = "resource/service")]
    pub service: String,
    #[serde(rename = "resource/id")]
    pub resource_id: String,
    #[serde(rename = "time/usage_start")]
    pub usage_start: String,
    #[serde(rename = "cost/cost")]
    pub cost: String,
    #[serde(rename = "cost/discounted_cost")]
    pub discounted_cost: String,
    #[serde(rename = "resource/region", skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(rename = "resource/compartment", skip_serializing_if = "Option::is_none")]
    pub compartment: Option<String>,
    #[serde(rename = "resource/shape", skip_serializing_if = "Option::is_none")]
    pub shape: Option<String>,
    #[serde(rename = "billing/unit", skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
    #[serde(rename = "usage/amount", skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    /// Keys already carry the `tag/` prefix.
    #[serde(flatten)]
    pub tags: BTreeMap<String, String>,
}

impl LineItem {
    pub fn new(
        kind: LineItemKind,
        service: impl Into<String>,
        resource_id: impl Into<String>,
        usage_start: impl Into<String>,
        cost: impl Into<String>,
        discounted_cost: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            service: service.into(),
            resource_id: resource_id.into(),
            usage_start: usage_start.into(),
            cost: cost.into(),
            discounted_cost: discounted_cost.into(),
            region: None,
            compartment: None,
            shape: None,
            unit: None,
            amount: None,
            tags: BTreeMap::new(),
        }
    }
}
