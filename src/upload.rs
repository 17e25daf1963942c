//! Delivery to the AnyCost ingestion endpoint: one POST per payload group
//! per billing month, with per-request outcome classification and failure
//! isolation across both months and groups.

use std::time::Duration;

use futures_util::StreamExt;
use serde::Serialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::config::Env;
use crate::month::Month;
use crate::split::{MAX_PAYLOAD_BYTES, PayloadGroup};
use crate::types::{LineItem, Operation};
use crate::{CostdropError, Result};

pub const DEFAULT_BASE_URL: &str = "https://api.cloudzero.com";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const MAX_ERROR_BODY_BYTES: usize = 64 * 1024;

/// Classified result of one upload request. Delivery failures are data, not
/// propagated errors; the orchestrator records them and moves on.
#[derive(Debug, Clone)]
pub enum SendOutcome {
    Accepted { status: u16, response: Value },
    Timeout,
    Connection { detail: String },
    Api { status: u16, message: String },
    Unexpected { detail: String },
}

impl SendOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, SendOutcome::Accepted { .. })
    }

    /// Human-readable reason for a failed outcome; `None` when accepted.
    pub fn failure_reason(&self) -> Option<String> {
        match self {
            SendOutcome::Accepted { .. } => None,
            SendOutcome::Timeout => Some("request timed out".to_string()),
            SendOutcome::Connection { detail } => Some(format!("connection failed: {detail}")),
            SendOutcome::Api { status, message } => Some(format!("api error ({status}): {message}")),
            SendOutcome::Unexpected { detail } => Some(format!("unexpected failure: {detail}")),
        }
    }
}

#[derive(Serialize)]
struct BillingDrop<'a> {
    month: String,
    operation: &'static str,
    data: &'a [LineItem],
}

/// Client for an AnyCost Stream connection. The HTTP client is injected so
/// callers can share a pool or point the uploader at a test server.
#[derive(Debug, Clone)]
pub struct StreamClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    connection_id: String,
    timeout: Duration,
    max_payload_bytes: usize,
}

impl StreamClient {
    pub fn new(api_key: impl Into<String>, connection_id: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: api_key.into(),
            connection_id: connection_id.into(),
            timeout: DEFAULT_TIMEOUT,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
        }
    }

    /// Build a client from `CLOUDZERO_API_KEY`, `CLOUDZERO_CONNECTION_ID`
    /// and (optionally) `CLOUDZERO_API_URL`.
    pub fn from_env(env: &Env) -> Result<Self> {
        let api_key = env
            .get("CLOUDZERO_API_KEY")
            .ok_or(CostdropError::MissingConfig("CLOUDZERO_API_KEY"))?;
        let connection_id = env
            .get("CLOUDZERO_CONNECTION_ID")
            .ok_or(CostdropError::MissingConfig("CLOUDZERO_CONNECTION_ID"))?;
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            base_url: env
                .get("CLOUDZERO_API_URL")
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            api_key,
            connection_id,
            timeout: DEFAULT_TIMEOUT,
            max_payload_bytes: MAX_PAYLOAD_BYTES,
        })
    }

    pub fn with_http_client(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_payload_bytes(mut self, max_bytes: usize) -> Self {
        self.max_payload_bytes = max_bytes;
        self
    }

    pub fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    fn drops_url(&self) -> String {
        format!(
            "{}/v2/connections/billing/anycost/{}/billing_drops",
            self.base_url.trim_end_matches('/'),
            self.connection_id
        )
    }

    /// Send one payload group for one month and classify the outcome.
    pub async fn send_group(
        &self,
        month: Month,
        operation: Operation,
        items: &[LineItem],
    ) -> SendOutcome {
        let payload = BillingDrop {
            month: month.to_string(),
            operation: operation.as_str(),
            data: items,
        };

        let request = self
            .http
            .post(self.drops_url())
            .header(reqwest::header::AUTHORIZATION, &self.api_key)
            .json(&payload)
            .timeout(self.timeout);

        let response = match request.send().await {
            Ok(response) => response,
            Err(err) if err.is_timeout() => return SendOutcome::Timeout,
            Err(err) if err.is_connect() => {
                return SendOutcome::Connection {
                    detail: err.to_string(),
                };
            }
            Err(err) => {
                return SendOutcome::Unexpected {
                    detail: err.to_string(),
                };
            }
        };

        let status = response.status();
        let body = response_text_truncated(response, MAX_ERROR_BODY_BYTES).await;
        if status.is_success() {
            let response = serde_json::from_str(&body).unwrap_or(Value::Null);
            SendOutcome::Accepted {
                status: status.as_u16(),
                response,
            }
        } else {
            SendOutcome::Api {
                status: status.as_u16(),
                message: extract_api_message(&body),
            }
        }
    }

    /// Deliver every payload group to every target month, sequentially and in
    /// order. A failed group or month never prevents the remaining ones from
    /// being attempted. When a month's data spans several groups, the first
    /// group carries the requested operation and later groups are sent with
    /// `sum` so they append rather than replace.
    pub async fn upload_months(
        &self,
        months: &[Month],
        operation: Operation,
        groups: &[PayloadGroup],
        dry_run: bool,
    ) -> UploadReport {
        let mut report = UploadReport::default();

        for &month in months {
            let mut month_report = MonthReport::new(month);

            for (group_index, group) in groups.iter().enumerate() {
                let group_operation = if group_index == 0 {
                    operation
                } else {
                    Operation::Sum
                };
                month_report.groups_attempted += 1;

                if dry_run {
                    info!(
                        %month,
                        group = group_index,
                        operation = %group_operation,
                        records = group.items.len(),
                        bytes = group.bytes,
                        "dry run: prepared group, not sending"
                    );
                    month_report.groups_succeeded += 1;
                    continue;
                }

                info!(
                    %month,
                    group = group_index,
                    operation = %group_operation,
                    records = group.items.len(),
                    "uploading payload group"
                );
                let outcome = self.send_group(month, group_operation, &group.items).await;
                match outcome.failure_reason() {
                    None => month_report.groups_succeeded += 1,
                    Some(reason) => {
                        warn!(%month, group = group_index, %reason, "payload group failed");
                        month_report.groups_failed += 1;
                        if month_report.first_error.is_none() {
                            month_report.first_error = Some(reason);
                        }
                    }
                }
            }

            info!(
                %month,
                attempted = month_report.groups_attempted,
                succeeded = month_report.groups_succeeded,
                failed = month_report.groups_failed,
                "month upload complete"
            );
            report.months.push(month_report);
        }

        report
    }
}

/// Per-month delivery summary.
#[derive(Debug, Clone)]
pub struct MonthReport {
    pub month: Month,
    pub groups_attempted: usize,
    pub groups_succeeded: usize,
    pub groups_failed: usize,
    pub first_error: Option<String>,
}

impl MonthReport {
    fn new(month: Month) -> Self {
        Self {
            month,
            groups_attempted: 0,
            groups_succeeded: 0,
            groups_failed: 0,
            first_error: None,
        }
    }

    pub fn succeeded(&self) -> bool {
        self.groups_failed == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct UploadReport {
    pub months: Vec<MonthReport>,
}

impl UploadReport {
    pub fn succeeded(&self) -> bool {
        self.months.iter().all(MonthReport::succeeded)
    }

    pub fn failed_months(&self) -> impl Iterator<Item = &MonthReport> {
        self.months.iter().filter(|month| !month.succeeded())
    }

    pub fn groups_attempted(&self) -> usize {
        self.months.iter().map(|m| m.groups_attempted).sum()
    }

    pub fn groups_succeeded(&self) -> usize {
        self.months.iter().map(|m| m.groups_succeeded).sum()
    }
}

/// Pull the structured `message` out of a JSON error body when there is one;
/// otherwise fall back to the raw (truncated) body text.
fn extract_api_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        if let Some(message) = map.get("message").and_then(Value::as_str) {
            return message.to_string();
        }
    }
    body.to_string()
}

async fn response_text_truncated(response: reqwest::Response, max_bytes: usize) -> String {
    let mut out = Vec::<u8>::new();
    let mut truncated = false;

    let mut stream = response.bytes_stream();
    while let Some(next) = stream.next().await {
        let Ok(chunk) = next else {
            break;
        };
        let remaining = max_bytes.saturating_sub(out.len());
        if remaining == 0 {
            truncated = true;
            break;
        }
        if chunk.len() <= remaining {
            out.extend_from_slice(chunk.as_ref());
        } else {
            out.extend_from_slice(&chunk.as_ref()[..remaining]);
            truncated = true;
            break;
        }
    }

    let mut body = String::from_utf8_lossy(&out).to_string();
    if truncated {
        body.push_str("...(truncated)");
    }
    body
}
