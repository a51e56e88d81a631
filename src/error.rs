use thiserror::Error;

#[derive(Error, Debug)]
pub enum PaymentError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Payment {payment_id} not eligible for {operation}")]
    NotEligible {
        operation: &'static str,
        payment_id: String,
    },
    #[error("Payment {0} not found")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Idempotency key {0} is already being processed")]
    IdempotencyInFlight(String),
    #[error("Publish error: {0}")]
    Publish(String),
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
    #[cfg(feature = "storage-rocksdb")]
    #[error("Storage error: {0}")]
    StorageError(#[from] rocksdb::Error),
    #[error("Internal error: {0}")]
    InternalError(Box<dyn std::error::Error + Send + Sync>),
}

impl PaymentError {
    pub(crate) fn not_eligible(operation: &'static str, payment_id: &str) -> Self {
        Self::NotEligible {
            operation,
            payment_id: payment_id.to_string(),
        }
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::InternalError(Box::new(std::io::Error::other(msg.into())))
    }

    /// Errors caused by the caller's input. Never worth retrying.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidRequest(_))
    }

    /// Errors a transport layer would surface as a conflict.
    pub fn is_conflict(&self) -> bool {
        matches!(
            self,
            Self::NotEligible { .. } | Self::Conflict(_) | Self::IdempotencyInFlight(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, PaymentError>;
