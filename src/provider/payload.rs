//! Wire types for the Hide My Email web API and failure classification.
//!
//! Every response is wrapped in the same envelope:
//!
//! ```text
//! {"success": true,  "result": {...}}
//! {"success": false, "error": {"errorCode": "...", "errorMessage": "..."}}
//! {"success": false, "error": 1, "reason": "..."}
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{Operation, ProviderError};

/// Fallback reason when a failure envelope carries no message.
const UNKNOWN_REASON: &str = "Unknown";

#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub(crate) success: bool,
    pub(crate) result: Option<T>,
    pub(crate) error: Option<ErrorField>,
    pub(crate) reason: Option<String>,
}

impl<T> Envelope<T> {
    /// Human-readable reason for a failed envelope.
    pub(crate) fn failure_reason(&self) -> String {
        let (message, code) = match &self.error {
            Some(ErrorField::Detail(detail)) => (
                detail.error_message.clone(),
                detail.error_code.as_ref().map(|code| format!("error code {code}")),
            ),
            Some(ErrorField::Code(code)) => (None, Some(format!("error code {code}"))),
            Some(ErrorField::Other(value)) => (value.as_str().map(str::to_string), None),
            None => (None, None),
        };
        message
            .or_else(|| self.reason.clone())
            .or(code)
            .filter(|reason| !reason.trim().is_empty())
            .unwrap_or_else(|| UNKNOWN_REASON.to_string())
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ErrorField {
    Code(i64),
    Detail(ErrorDetail),
    Other(serde_json::Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ErrorDetail {
    pub(crate) error_code: Option<serde_json::Value>,
    pub(crate) error_message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct GenerateRequest<'a> {
    pub(crate) lang_code: &'a str,
}

#[derive(Debug, Deserialize)]
pub(crate) struct GenerateResult {
    pub(crate) hme: Option<String>,
    pub(crate) token: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct ReserveRequest<'a> {
    pub(crate) hme: &'a str,
    pub(crate) label: &'a str,
    pub(crate) note: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) token: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReserveResult {
    pub(crate) hme: Option<ReservedHme>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ReservedHme {
    pub(crate) hme: String,
    pub(crate) create_timestamp: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ListResult {
    #[serde(default)]
    pub(crate) hme_emails: Vec<HmeEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct HmeEntry {
    pub(crate) hme: String,
    #[serde(default)]
    pub(crate) label: String,
    pub(crate) create_timestamp: Option<i64>,
    #[serde(default)]
    pub(crate) is_active: bool,
}

/// Classifies a `success: false` envelope.
///
/// Session complaints are fatal, "already taken" answers to a reservation mean
/// the candidate is gone, and everything else is treated as throttling.
pub(crate) fn classify_failure_reason(
    operation: Operation,
    address: Option<&str>,
    reason: &str,
    retry_after: Option<Duration>,
) -> ProviderError {
    let lower = reason.to_ascii_lowercase();

    if mentions_invalid_session(&lower) {
        return ProviderError::auth(operation, 0, reason);
    }

    if operation == Operation::Reserve && mentions_already_taken(&lower) {
        return ProviderError::already_reserved(address.unwrap_or_default(), reason);
    }

    ProviderError::rate_limited(operation, retry_after, reason)
}

fn mentions_invalid_session(lower: &str) -> bool {
    (lower.contains("session") && (lower.contains("invalid") || lower.contains("expired")))
        || lower.contains("not authenticated")
        || lower.contains("unauthorized")
        || lower.contains("authentication required")
}

fn mentions_already_taken(lower: &str) -> bool {
    ["already reserved", "already in use", "already taken", "already been taken"]
        .iter()
        .any(|phrase| lower.contains(phrase))
}
