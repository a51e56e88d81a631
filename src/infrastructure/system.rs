use crate::domain::payment::PAYMENT_ID_PREFIX;
use crate::domain::ports::{Clock, PaymentIdGenerator};
use chrono::{DateTime, Duration, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use uuid::Uuid;

/// Wall-clock time in UTC.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: RwLock::new(start),
        }
    }

    pub fn set(&self, at: DateTime<Utc>) {
        *self.now.write().unwrap_or_else(|e| e.into_inner()) = at;
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.write().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Generates `pay_<uuid-v4>` ids.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidPaymentIds;

impl PaymentIdGenerator for UuidPaymentIds {
    fn next_id(&self) -> String {
        format!("{PAYMENT_ID_PREFIX}{}", Uuid::new_v4())
    }
}

/// Generates `pay_1`, `pay_2`, ... Deterministic ids for tests and replays.
#[derive(Debug, Default)]
pub struct SequentialPaymentIds {
    next: AtomicU64,
}

impl SequentialPaymentIds {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PaymentIdGenerator for SequentialPaymentIds {
    fn next_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{PAYMENT_ID_PREFIX}{n}")
    }
}
