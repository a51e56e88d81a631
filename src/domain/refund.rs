use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A full refund of a captured payment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Refund {
    /// Sequential id assigned by the store.
    pub id: u64,
    pub payment_id: String,
    /// Copied from the payment's captured amount when the refund is recorded.
    pub amount_cents: i64,
    pub created_at: DateTime<Utc>,
}
