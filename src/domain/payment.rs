use crate::error::PaymentError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How long an authorization hold stays valid before it expires.
pub const AUTHORIZATION_TTL_DAYS: i64 = 7;

/// Prefix marking an opaque id as a payment id.
pub const PAYMENT_ID_PREFIX: &str = "pay_";

/// A strictly positive amount in minor currency units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub struct AmountCents(i64);

impl AmountCents {
    pub fn new(value: i64) -> Result<Self, PaymentError> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(PaymentError::InvalidRequest(
                "amount_cents must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> i64 {
        self.0
    }
}

impl TryFrom<i64> for AmountCents {
    type Error = PaymentError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<AmountCents> for i64 {
    fn from(amount: AmountCents) -> Self {
        amount.0
    }
}

/// A three-letter currency code, always stored upper-cased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    pub fn parse(code: &str) -> Result<Self, PaymentError> {
        if code.len() != 3 {
            return Err(PaymentError::InvalidRequest(format!(
                "currency must be a 3-letter code, got {code:?}"
            )));
        }
        Ok(Self(code.to_ascii_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for Currency {
    type Error = PaymentError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.0
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Authorized,
    Captured,
    /// Declared for partial refunds; no operation enters it.
    PartiallyRefunded,
    Refunded,
    /// Declared for failed authorizations; no operation enters it.
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Authorized => "authorized",
            Self::Captured => "captured",
            Self::PartiallyRefunded => "partially_refunded",
            Self::Refunded => "refunded",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Refunded | Self::PartiallyRefunded | Self::Failed
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A guarded status change. Each transition is only legal from exactly one
/// status; stores apply it as a single-row compare-and-swap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Capture { amount_cents: AmountCents },
    Refund,
}

impl Transition {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Capture { .. } => "capture",
            Self::Refund => "refund",
        }
    }

    pub fn expected(&self) -> PaymentStatus {
        match self {
            Self::Capture { .. } => PaymentStatus::Authorized,
            Self::Refund => PaymentStatus::Captured,
        }
    }

    pub fn target(&self) -> PaymentStatus {
        match self {
            Self::Capture { .. } => PaymentStatus::Captured,
            Self::Refund => PaymentStatus::Refunded,
        }
    }
}

/// The payment aggregate as persisted by the payment store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: String,
    pub order_id: String,
    pub amount_cents: AmountCents,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub authorized_at: DateTime<Utc>,
    pub authorization_expires_at: DateTime<Utc>,
    /// Zero until the payment is captured.
    pub captured_amount_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    /// Builds a freshly authorized payment whose hold expires
    /// `AUTHORIZATION_TTL_DAYS` after `now`.
    pub fn authorize(
        id: String,
        order_id: String,
        amount_cents: AmountCents,
        currency: Currency,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            order_id,
            amount_cents,
            currency,
            status: PaymentStatus::Authorized,
            authorized_at: now,
            authorization_expires_at: now + Duration::days(AUTHORIZATION_TTL_DAYS),
            captured_amount_cents: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Applies `transition` if the predicate holds and reports whether the
    /// row changed. Leaves the payment untouched otherwise.
    pub fn apply(&mut self, transition: Transition, now: DateTime<Utc>) -> bool {
        if self.status != transition.expected() {
            return false;
        }
        match transition {
            Transition::Capture { amount_cents } => {
                if amount_cents > self.amount_cents {
                    return false;
                }
                self.captured_amount_cents = amount_cents.value();
            }
            Transition::Refund => {}
        }
        self.status = transition.target();
        self.updated_at = now;
        true
    }
}
