//! Push message shapes and delivery bookkeeping

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Upper bound on tokens addressed in one delivery batch
pub const MAX_TOKENS_PER_BATCH: usize = 500;

/// Error codes meaning the token will never work again
const INVALID_TOKEN_CODES: &[&str] = &[
    "messaging/registration-token-not-registered",
    "messaging/invalid-registration-token",
    "registration-token-not-registered",
    "invalid-registration-token",
    "UNREGISTERED",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub title: String,
    pub body: String,
    pub data: BTreeMap<String, String>,
}

impl PushMessage {
    pub fn new(title: &str, body: impl Into<String>) -> Self {
        Self {
            title: title.to_string(),
            body: body.into(),
            data: BTreeMap::new(),
        }
    }

    pub fn with_data(mut self, key: &str, value: impl Into<String>) -> Self {
        self.data.insert(key.to_string(), value.into());
        self
    }

    pub fn work_assigned(order_id: &str) -> Self {
        Self::new(
            "New Work Assignment",
            format!("Order {} has been assigned to you.", order_id),
        )
        .with_data("type", "WORK_ASSIGNED")
        .with_data("orderId", order_id)
    }

    pub fn transfer_approved(order_id: &str) -> Self {
        Self::new(
            "Project Transfer Request Approved",
            format!("Your transfer request for order {} has been approved.", order_id),
        )
        .with_data("type", "TRANSFER_APPROVED")
        .with_data("orderId", order_id)
    }

    pub fn bill_rejected(bill_number: &str, reason: &str) -> Self {
        Self::new(
            "Bill Rejected",
            format!("Bill {} was rejected: {}", bill_number, reason),
        )
        .with_data("type", "BILL_REJECTED")
        .with_data("billNumber", bill_number)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReport {
    pub success_count: usize,
    pub failure_count: usize,
    pub invalid_tokens: Vec<String>,
}

impl SendReport {
    pub fn absorb(&mut self, other: SendReport) {
        self.success_count += other.success_count;
        self.failure_count += other.failure_count;
        self.invalid_tokens.extend(other.invalid_tokens);
    }
}

pub fn chunk_tokens(tokens: &[String]) -> std::slice::Chunks<'_, String> {
    tokens.chunks(MAX_TOKENS_PER_BATCH)
}

pub fn is_invalid_token_error(code: &str) -> bool {
    INVALID_TOKEN_CODES.contains(&code)
}
