use super::idempotency::{IdempotencyKey, Reservation};
use super::payment::{Payment, Transition};
use super::refund::Refund;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

#[async_trait]
pub trait PaymentStore: Send + Sync {
    /// Inserts a new aggregate. Fails with `Conflict` if the id is taken.
    async fn insert(&self, payment: Payment) -> Result<()>;
    async fn get(&self, payment_id: &str) -> Result<Option<Payment>>;
    /// Conditional single-row update. Returns `false` when no row matched
    /// the transition's predicate, including when the id does not exist.
    async fn apply(
        &self,
        payment_id: &str,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<bool>;
    /// Records a refund whose amount is the payment's stored captured amount.
    async fn insert_refund(&self, payment_id: &str, now: DateTime<Utc>) -> Result<Refund>;
    async fn captured_amount(&self, payment_id: &str) -> Result<Option<i64>>;
    async fn refunds(&self, payment_id: &str) -> Result<Vec<Refund>>;
}

#[async_trait]
pub trait IdempotencyStore: Send + Sync {
    /// Returns the stored response of a completed call.
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<String>>;
    /// Upsert. An existing completed entry keeps its response and only has
    /// its timestamp refreshed.
    async fn put(&self, key: &IdempotencyKey, response: String, now: DateTime<Utc>) -> Result<()>;
    /// Claims `key` atomically; the check and the claim are one operation.
    /// A pending claim older than the reservation lease counts as free.
    async fn reserve(&self, key: &IdempotencyKey, now: DateTime<Utc>) -> Result<Reservation>;
    /// Drops an unfinished claim so the key can be retried.
    async fn release(&self, key: &IdempotencyKey) -> Result<()>;
}

#[async_trait]
pub trait OrderSequence: Send + Sync {
    /// Atomically allocates the next value. Values are never reused.
    async fn next(&self) -> Result<u64>;
}

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()>;

    /// Flushes and releases the underlying client.
    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub trait PaymentIdGenerator: Send + Sync {
    fn next_id(&self) -> String;
}

pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type IdempotencyStoreBox = Box<dyn IdempotencyStore>;
pub type OrderSequenceBox = Box<dyn OrderSequence>;

pub type PaymentStoreFactory = Box<dyn Fn() -> PaymentStoreBox + Send + Sync>;
pub type IdempotencyStoreFactory = Box<dyn Fn() -> IdempotencyStoreBox + Send + Sync>;
pub type OrderSequenceFactory = Box<dyn Fn() -> OrderSequenceBox + Send + Sync>;
