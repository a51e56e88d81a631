//! Application layer containing the payment lifecycle orchestration.
//!
//! This module defines the `LifecycleEngine`, the entry point for
//! authorizing, capturing and refunding payments. Concurrent requests share
//! one engine; the stores are the only serialization point.

pub mod engine;
