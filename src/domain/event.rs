use super::payment::{Currency, PaymentStatus};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "payment.authorized")]
    Authorized,
    #[serde(rename = "payment.captured")]
    Captured,
    #[serde(rename = "payment.refunded")]
    Refunded,
}

/// Denormalized snapshot handed to the event publisher after a state change.
///
/// The wire shape is one JSON object per event; `order_id` and `currency` are
/// omitted when the operation did not read them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub payment_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order_id: Option<String>,
    pub amount_cents: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<Currency>,
    pub status: PaymentStatus,
    /// RFC3339 UTC with second precision.
    pub occurred_at: String,
}

impl PaymentEvent {
    pub fn authorized(
        payment_id: &str,
        order_id: &str,
        amount_cents: i64,
        currency: &Currency,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            event_type: EventType::Authorized,
            payment_id: payment_id.to_string(),
            order_id: Some(order_id.to_string()),
            amount_cents,
            currency: Some(currency.clone()),
            status: PaymentStatus::Authorized,
            occurred_at: format_occurred_at(at),
        }
    }

    pub fn captured(payment_id: &str, amount_cents: i64, at: DateTime<Utc>) -> Self {
        Self {
            event_type: EventType::Captured,
            payment_id: payment_id.to_string(),
            order_id: None,
            amount_cents,
            currency: None,
            status: PaymentStatus::Captured,
            occurred_at: format_occurred_at(at),
        }
    }

    pub fn refunded(payment_id: &str, amount_cents: i64, at: DateTime<Utc>) -> Self {
        Self {
            event_type: EventType::Refunded,
            payment_id: payment_id.to_string(),
            order_id: None,
            amount_cents,
            currency: None,
            status: PaymentStatus::Refunded,
            occurred_at: format_occurred_at(at),
        }
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}

fn format_occurred_at(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Secs, true)
}
