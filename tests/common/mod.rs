#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use payment_lifecycle::application::engine::{LifecycleEngine, Stores};
use payment_lifecycle::domain::idempotency::{IdempotencyKey, Reservation};
use payment_lifecycle::domain::operation::AuthorizeRequest;
use payment_lifecycle::domain::payment::{Payment, Transition};
use payment_lifecycle::domain::ports::{EventPublisher, IdempotencyStore, PaymentStore};
use payment_lifecycle::domain::refund::Refund;
use payment_lifecycle::error::{PaymentError, Result};
use payment_lifecycle::infrastructure::events::InMemoryEventBus;
use payment_lifecycle::infrastructure::in_memory::{
    InMemoryIdempotencyStore, InMemoryOrderSequence, InMemoryPaymentStore,
};
use payment_lifecycle::infrastructure::system::{ManualClock, SequentialPaymentIds};
use std::sync::Arc;
use tokio::sync::Notify;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 10, 0, 0).unwrap()
}

/// Engine over shared in-memory stores, so tests can inspect them directly.
pub struct Harness {
    pub engine: Arc<LifecycleEngine>,
    pub bus: InMemoryEventBus,
    pub payments: InMemoryPaymentStore,
    pub idempotency: InMemoryIdempotencyStore,
    pub clock: Arc<ManualClock>,
}

pub fn harness() -> Harness {
    let payments = InMemoryPaymentStore::new();
    harness_with(Box::new(payments.clone()), payments)
}

/// Like [`harness`] but with a custom payment store in front of the engine.
pub fn harness_with(
    payment_store: Box<dyn PaymentStore>,
    payments: InMemoryPaymentStore,
) -> Harness {
    let bus = InMemoryEventBus::new();
    let idempotency = InMemoryIdempotencyStore::new();
    let clock = Arc::new(ManualClock::new(start_time()));
    let stores = Stores {
        payments: payment_store,
        idempotency: Box::new(idempotency.clone()),
        sequence: Box::new(InMemoryOrderSequence::new()),
    };
    let engine = LifecycleEngine::new(stores, Arc::new(bus.clone()))
        .with_clock(clock.clone())
        .with_id_generator(Arc::new(SequentialPaymentIds::new()));
    Harness {
        engine: Arc::new(engine),
        bus,
        payments,
        idempotency,
        clock,
    }
}

pub fn authorize_request(amount_cents: i64, currency: &str, token: &str) -> AuthorizeRequest {
    AuthorizeRequest {
        order_id: None,
        amount_cents,
        currency: currency.to_string(),
        payment_method_token: token.to_string(),
        idempotency_key: None,
    }
}

pub fn keyed_request(amount_cents: i64, key: &str) -> AuthorizeRequest {
    AuthorizeRequest {
        idempotency_key: Some(key.to_string()),
        ..authorize_request(amount_cents, "usd", "tok_1")
    }
}

/// A message bus that is always down.
pub struct FailingPublisher;

#[async_trait]
impl EventPublisher for FailingPublisher {
    async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<()> {
        Err(PaymentError::Publish("broker unavailable".to_string()))
    }
}

/// An idempotency store whose backend is down.
pub struct FailingIdempotencyStore;

#[async_trait]
impl IdempotencyStore for FailingIdempotencyStore {
    async fn get(&self, _key: &IdempotencyKey) -> Result<Option<String>> {
        Err(backend_down())
    }

    async fn put(&self, _key: &IdempotencyKey, _response: String, _now: DateTime<Utc>) -> Result<()> {
        Err(backend_down())
    }

    async fn reserve(&self, _key: &IdempotencyKey, _now: DateTime<Utc>) -> Result<Reservation> {
        Err(backend_down())
    }

    async fn release(&self, _key: &IdempotencyKey) -> Result<()> {
        Err(backend_down())
    }
}

/// A working idempotency store that cannot record results.
pub struct ReadOnlyIdempotencyStore {
    pub inner: InMemoryIdempotencyStore,
}

#[async_trait]
impl IdempotencyStore for ReadOnlyIdempotencyStore {
    async fn get(&self, key: &IdempotencyKey) -> Result<Option<String>> {
        self.inner.get(key).await
    }

    async fn put(&self, _key: &IdempotencyKey, _response: String, _now: DateTime<Utc>) -> Result<()> {
        Err(backend_down())
    }

    async fn reserve(&self, key: &IdempotencyKey, now: DateTime<Utc>) -> Result<Reservation> {
        self.inner.reserve(key, now).await
    }

    async fn release(&self, key: &IdempotencyKey) -> Result<()> {
        self.inner.release(key).await
    }
}

fn backend_down() -> PaymentError {
    PaymentError::internal("connection refused")
}

/// A payment store whose inserts wait until the test lets them through.
pub struct GatedPaymentStore {
    pub inner: InMemoryPaymentStore,
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

#[async_trait]
impl PaymentStore for GatedPaymentStore {
    async fn insert(&self, payment: Payment) -> Result<()> {
        self.entered.notify_one();
        self.release.notified().await;
        self.inner.insert(payment).await
    }

    async fn get(&self, payment_id: &str) -> Result<Option<Payment>> {
        self.inner.get(payment_id).await
    }

    async fn apply(
        &self,
        payment_id: &str,
        transition: Transition,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        self.inner.apply(payment_id, transition, now).await
    }

    async fn insert_refund(&self, payment_id: &str, now: DateTime<Utc>) -> Result<Refund> {
        self.inner.insert_refund(payment_id, now).await
    }

    async fn captured_amount(&self, payment_id: &str) -> Result<Option<i64>> {
        self.inner.captured_amount(payment_id).await
    }

    async fn refunds(&self, payment_id: &str) -> Result<Vec<Refund>> {
        self.inner.refunds(payment_id).await
    }
}
