//! Domain model of the payment lifecycle and the ports through which the
//! engine reaches its collaborators.

pub mod event;
pub mod idempotency;
pub mod operation;
pub mod payment;
pub mod ports;
pub mod refund;
