use crate::config::Topics;
use crate::domain::event::PaymentEvent;
use crate::domain::idempotency::{AUTHORIZE_ENDPOINT, IdempotencyKey, Reservation};
use crate::domain::operation::{AuthorizeRequest, AuthorizeResponse, CaptureResponse, RefundResponse};
use crate::domain::payment::{AmountCents, Currency, Payment, PaymentStatus, Transition};
use crate::domain::ports::{
    Clock, EventPublisher, IdempotencyStoreBox, OrderSequenceBox, PaymentIdGenerator,
    PaymentStoreBox,
};
use crate::domain::refund::Refund;
use crate::error::{PaymentError, Result};
use crate::infrastructure::in_memory::{
    InMemoryIdempotencyStore, InMemoryOrderSequence, InMemoryPaymentStore,
};
use crate::infrastructure::system::{SystemClock, UuidPaymentIds};
use std::sync::Arc;

/// The durable collaborators of the engine.
pub struct Stores {
    pub payments: PaymentStoreBox,
    pub idempotency: IdempotencyStoreBox,
    pub sequence: OrderSequenceBox,
}

impl Stores {
    /// Fresh, empty in-memory stores.
    pub fn in_memory() -> Self {
        Self {
            payments: Box::new(InMemoryPaymentStore::new()),
            idempotency: Box::new(InMemoryIdempotencyStore::new()),
            sequence: Box::new(InMemoryOrderSequence::new()),
        }
    }
}

/// Orchestrates Authorize, Capture and Refund over the payment store.
///
/// The engine holds no payment state of its own: every operation goes to the
/// store, and status changes are expressed as conditional updates so that
/// concurrent callers race on the store rather than on the engine. Share it
/// across tasks with an `Arc`.
///
/// Events are published after the store write succeeds. Publishing is
/// best-effort: failures are logged and never reach the caller.
pub struct LifecycleEngine {
    payments: PaymentStoreBox,
    idempotency: IdempotencyStoreBox,
    sequence: OrderSequenceBox,
    publisher: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    ids: Arc<dyn PaymentIdGenerator>,
    topics: Topics,
}

impl LifecycleEngine {
    /// Creates an engine using the system clock, uuid payment ids and the
    /// default topics.
    ///
    /// # Arguments
    ///
    /// * `stores` - Payment, idempotency and order-sequence stores.
    /// * `publisher` - Message-bus handle. Its lifecycle belongs to the caller.
    pub fn new(stores: Stores, publisher: Arc<dyn EventPublisher>) -> Self {
        Self {
            payments: stores.payments,
            idempotency: stores.idempotency,
            sequence: stores.sequence,
            publisher,
            clock: Arc::new(SystemClock),
            ids: Arc::new(UuidPaymentIds),
            topics: Topics::default(),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_id_generator(mut self, ids: Arc<dyn PaymentIdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_topics(mut self, topics: Topics) -> Self {
        self.topics = topics;
        self
    }

    /// Places an authorization hold and records a new payment.
    ///
    /// With an idempotency key, a completed earlier call under the same key
    /// is answered from the cache without side effects, whatever the current
    /// request body says. A call that finds the key still in flight fails
    /// with [`PaymentError::IdempotencyInFlight`] until the owner finishes or
    /// its reservation lease runs out.
    pub async fn authorize(&self, req: AuthorizeRequest) -> Result<AuthorizeResponse> {
        let amount = AmountCents::new(req.amount_cents)?;
        let currency = Currency::parse(&req.currency)?;
        if req.payment_method_token.trim().is_empty() {
            return Err(PaymentError::InvalidRequest(
                "payment_method_token must not be blank".to_string(),
            ));
        }

        let Some(key) = req
            .idempotency_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .map(|k| IdempotencyKey::new(k, AUTHORIZE_ENDPOINT))
        else {
            return self.place_hold(req.order_id.as_deref(), amount, currency).await;
        };

        let owned = match self.idempotency.reserve(&key, self.clock.now()).await {
            Ok(Reservation::Acquired) => true,
            Ok(Reservation::Completed(cached)) => {
                tracing::debug!(%key, "Replaying cached authorize response");
                return Ok(serde_json::from_str(&cached)?);
            }
            Ok(Reservation::InFlight) => {
                return Err(PaymentError::IdempotencyInFlight(key.key));
            }
            Err(e) => {
                tracing::warn!(%key, error = %e, "Idempotency lookup failed, executing uncached");
                false
            }
        };

        let response = match self
            .place_hold(req.order_id.as_deref(), amount, currency)
            .await
        {
            Ok(response) => response,
            Err(e) => {
                if owned {
                    self.release(&key).await;
                }
                return Err(e);
            }
        };

        // The payment is written; caching failures leave the key retryable
        // instead of failing the call.
        let cached = match serde_json::to_string(&response) {
            Ok(serialized) => self.idempotency.put(&key, serialized, self.clock.now()).await,
            Err(e) => Err(e.into()),
        };
        if let Err(e) = cached {
            tracing::warn!(%key, error = %e, "Failed to cache authorize response");
            if owned {
                self.release(&key).await;
            }
        }

        Ok(response)
    }

    async fn release(&self, key: &IdempotencyKey) {
        if let Err(e) = self.idempotency.release(key).await {
            tracing::warn!(%key, error = %e, "Failed to release idempotency key");
        }
    }

    async fn place_hold(
        &self,
        order_id: Option<&str>,
        amount: AmountCents,
        currency: Currency,
    ) -> Result<AuthorizeResponse> {
        let order_id = match order_id.map(str::trim).filter(|o| !o.is_empty()) {
            Some(order_id) => order_id.to_string(),
            None => format!("ORD-{}", self.sequence.next().await?),
        };

        let now = self.clock.now();
        let payment = Payment::authorize(self.ids.next_id(), order_id, amount, currency, now);
        let response = AuthorizeResponse {
            payment_id: payment.id.clone(),
            status: payment.status,
            authorization_expires_at: payment.authorization_expires_at,
        };
        let event = PaymentEvent::authorized(
            &payment.id,
            &payment.order_id,
            amount.value(),
            &payment.currency,
            now,
        );

        tracing::info!(
            payment_id = %payment.id,
            order_id = %payment.order_id,
            amount_cents = amount.value(),
            currency = %payment.currency,
            "Payment authorized"
        );
        self.payments.insert(payment).await?;
        self.publish(&self.topics.authorized, event).await;

        Ok(response)
    }

    /// Captures an authorized payment.
    ///
    /// Only a payment currently `authorized` with an authorized amount of at
    /// least `amount_cents` is eligible. Unknown ids are reported as
    /// [`PaymentError::NotEligible`] too, since the conditional update cannot
    /// tell the two apart.
    pub async fn capture(&self, payment_id: &str, amount_cents: i64) -> Result<CaptureResponse> {
        let amount = AmountCents::new(amount_cents)?;
        let transition = Transition::Capture {
            amount_cents: amount,
        };

        let now = self.clock.now();
        if !self.payments.apply(payment_id, transition, now).await? {
            return Err(PaymentError::not_eligible(transition.name(), payment_id));
        }
        tracing::info!(payment_id, amount_cents, "Payment captured");

        self.publish(
            &self.topics.captured,
            PaymentEvent::captured(payment_id, amount_cents, now),
        )
        .await;

        Ok(CaptureResponse {
            payment_id: payment_id.to_string(),
            captured_amount_cents: amount_cents,
            status: PaymentStatus::Captured,
        })
    }

    /// Refunds the full captured amount of a captured payment.
    pub async fn refund(&self, payment_id: &str) -> Result<RefundResponse> {
        let transition = Transition::Refund;
        let now = self.clock.now();
        if !self.payments.apply(payment_id, transition, now).await? {
            return Err(PaymentError::not_eligible(transition.name(), payment_id));
        }

        let refund = self.payments.insert_refund(payment_id, now).await?;
        let refunded = self
            .payments
            .captured_amount(payment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))?;
        tracing::info!(payment_id, refund_id = refund.id, refunded, "Payment refunded");

        self.publish(
            &self.topics.refunded,
            PaymentEvent::refunded(payment_id, refunded, now),
        )
        .await;

        Ok(RefundResponse {
            refund_id: refund.id,
            payment_id: payment_id.to_string(),
            refunded_amount_cents: refunded,
            status: PaymentStatus::Refunded,
        })
    }

    pub async fn payment(&self, payment_id: &str) -> Result<Payment> {
        self.payments
            .get(payment_id)
            .await?
            .ok_or_else(|| PaymentError::NotFound(payment_id.to_string()))
    }

    pub async fn refunds(&self, payment_id: &str) -> Result<Vec<Refund>> {
        self.payments.refunds(payment_id).await
    }

    async fn publish(&self, topic: &str, event: PaymentEvent) {
        let payload = match event.to_bytes() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(topic, payment_id = %event.payment_id, error = %e, "Failed to encode event");
                return;
            }
        };
        if let Err(e) = self.publisher.publish(topic, payload).await {
            tracing::warn!(topic, payment_id = %event.payment_id, error = %e, "Event publish failed");
        }
    }
}
