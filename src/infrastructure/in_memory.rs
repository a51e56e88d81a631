use crate::domain::idempotency::{IdempotencyEntry, IdempotencyKey, Reservation};
use crate::domain::payment::{Payment, Transition};
use crate::domain::ports::{IdempotencyStore, OrderSequence, PaymentStore};
use crate::domain::refund::Refund;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;

#[derive(Default)]
struct PaymentTables {
    payments: HashMap<String, Payment>,
    refunds: Vec<Refund>,
    last_refund_id: u64,
}

/// A thread-safe in-memory store for payments and their refunds.
///
/// Every mutation runs under the write lock, which gives the same
/// single-row atomicity a relational store gives a conditional UPDATE.
#[derive(Default, Clone)]
pub struct InMemoryPaymentStore {
    tables: Arc<RwLock<PaymentTables>>,
}

impl InMemoryPaymentStore {
    /// Creates a new, empty in-memory payment store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PaymentStore for InMemoryPaymentStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.payments.entry(payment.id.clone()) {
            Entry::Occupied(_) => Err(PaymentError::Conflict(format!(
                "payment {} already exists",
                payment.id
            ))),
            Entry::Vacant(slot) => {
                slot.insert(payment);
                Ok(())
            }
        }
    }

    async fn get(&self, payment_id: &str) -> Result<Option<Payment>> {
        let tables = self.tables.read().await;
        Ok(tables.payments.get(payment_id).cloned())
    }

    async fn apply(
        &self,
        payment_id: &str,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables
            .payments
            .get_mut(payment_id)
            .is_some_and(|payment| payment.apply(transition, now)))
    }

    async fn insert_refund(&self, payment_id: &str, now: DateTime<Utc>) -> Result<Refund> {
        let mut tables = self.tables.write().await;
        let amount_cents = tables
            .payments
            .get(payment_id)
            .map(|p| p.captured_amount_cents)
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))?;

        tables.last_refund_id += 1;
        let refund = Refund {
            id: tables.last_refund_id,
            payment_id: payment_id.to_string(),
            amount_cents,
            created_at: now,
        };
        tables.refunds.push(refund.clone());
        Ok(refund)
    }

    async fn captured_amount(&self, payment_id: &str) -> Result<Option<i64>> {
        let tables = self.tables.read().await;
        Ok(tables
            .payments
            .get(payment_id)
            .map(|p| p.captured_amount_cents))
    }

    async fn refunds(&self, payment_id: &str) -> Result<Vec<Refund>> {
        let tables = self.tables.read().await;
        Ok(tables
            .refunds
            .iter()
            .filter(|r| r.payment_id == payment_id)
            .cloned()
            .collect())
    }
}

/// A thread-safe in-memory idempotency cache keyed by `(key, endpoint)`.
#[derive(Default, Clone)]
pub struct InMemoryIdempotencyStore {
    entries: Arc<RwLock<HashMap<IdempotencyKey, IdempotencyEntry>>>,
}

impl InMemoryIdempotencyStore {
    /// Creates a new, empty in-memory idempotency store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IdempotencyStore for InMemoryIdempotencyStore {
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<String>> {
        let entries = self.entries.read().await;
        Ok(entries.get(key).and_then(|e| e.response.clone()))
    }

    async fn put(&self, key: &IdempotencyKey, response: String, now: DateTime<Utc>) -> Result<()> {
        let mut entries = self.entries.write().await;
        match entries.entry(key.clone()) {
            Entry::Occupied(mut slot) => slot.get_mut().complete(response, now),
            Entry::Vacant(slot) => {
                slot.insert(IdempotencyEntry::completed(response, now));
            }
        }
        Ok(())
    }

    async fn reserve(&self, key: &IdempotencyKey, now: DateTime<Utc>) -> Result<Reservation> {
        let mut entries = self.entries.write().await;
        match entries.entry(key.clone()) {
            Entry::Occupied(mut slot) => {
                if slot.get().is_abandoned(now) {
                    slot.insert(IdempotencyEntry::pending(now));
                    return Ok(Reservation::Acquired);
                }
                Ok(slot.get().reservation())
            }
            Entry::Vacant(slot) => {
                slot.insert(IdempotencyEntry::pending(now));
                Ok(Reservation::Acquired)
            }
        }
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<()> {
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|e| e.response.is_none()) {
            entries.remove(key);
        }
        Ok(())
    }
}

/// A process-local order sequence starting at 1.
#[derive(Default, Clone)]
pub struct InMemoryOrderSequence {
    last: Arc<AtomicU64>,
}

impl InMemoryOrderSequence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderSequence for InMemoryOrderSequence {
    async fn next(&self) -> Result<u64> {
        Ok(self.last.fetch_add(1, Ordering::SeqCst) + 1)
    }
}
