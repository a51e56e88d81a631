use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Endpoint name under which Authorize responses are cached.
pub const AUTHORIZE_ENDPOINT: &str = "authorize";

/// How long an unfinished claim blocks other callers. After that the owner
/// is presumed gone and the key can be claimed again.
pub const RESERVATION_LEASE_SECONDS: i64 = 30;

/// Cache key scoping a stored response to one client key and one endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct IdempotencyKey {
    pub key: String,
    pub endpoint: String,
}

impl IdempotencyKey {
    pub fn new(key: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            endpoint: endpoint.into(),
        }
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.endpoint, self.key)
    }
}

/// Outcome of trying to claim an idempotency key before executing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reservation {
    /// The caller owns the key and must `put` or `release` it.
    Acquired,
    /// A previous call finished; this is its serialized response.
    Completed(String),
    /// Another call holds the key and has not finished yet.
    InFlight,
}

/// Stored value of an idempotency key. `response` is `None` while the
/// owning call is still executing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdempotencyEntry {
    pub response: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl IdempotencyEntry {
    pub fn pending(now: DateTime<Utc>) -> Self {
        Self {
            response: None,
            created_at: now,
        }
    }

    pub fn completed(response: String, now: DateTime<Utc>) -> Self {
        Self {
            response: Some(response),
            created_at: now,
        }
    }

    /// What a second caller sees when it finds this entry already present.
    pub fn reservation(&self) -> Reservation {
        match &self.response {
            Some(response) => Reservation::Completed(response.clone()),
            None => Reservation::InFlight,
        }
    }

    /// A pending claim whose lease ran out. Stores hand such keys to the
    /// next caller as if they were free.
    pub fn is_abandoned(&self, now: DateTime<Utc>) -> bool {
        self.response.is_none()
            && now - self.created_at >= Duration::seconds(RESERVATION_LEASE_SECONDS)
    }

    /// First write wins on the payload; the timestamp always moves.
    pub fn complete(&mut self, response: String, now: DateTime<Utc>) {
        if self.response.is_none() {
            self.response = Some(response);
        }
        self.created_at = now;
    }
}
