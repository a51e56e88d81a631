//! Inputs and results of the lifecycle operations, independent of transport.

use super::payment::PaymentStatus;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuthorizeRequest {
    #[serde(default)]
    pub order_id: Option<String>,
    pub amount_cents: i64,
    pub currency: String,
    pub payment_method_token: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuthorizeResponse {
    pub payment_id: String,
    pub status: PaymentStatus,
    pub authorization_expires_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureResponse {
    pub payment_id: String,
    pub captured_amount_cents: i64,
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefundResponse {
    pub refund_id: u64,
    pub payment_id: String,
    pub refunded_amount_cents: i64,
    pub status: PaymentStatus,
}
