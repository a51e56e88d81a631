//! Engine configuration.

use serde::{Deserialize, Serialize};

pub const DEFAULT_TOPIC_AUTHORIZED: &str = "payments_authorized";
pub const DEFAULT_TOPIC_CAPTURED: &str = "payments_captured";
pub const DEFAULT_TOPIC_REFUNDED: &str = "payments_refunded";

/// Message-bus topics, one per domain event type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topics {
    #[serde(default = "default_authorized")]
    pub authorized: String,
    #[serde(default = "default_captured")]
    pub captured: String,
    #[serde(default = "default_refunded")]
    pub refunded: String,
}

fn default_authorized() -> String {
    DEFAULT_TOPIC_AUTHORIZED.to_owned()
}

fn default_captured() -> String {
    DEFAULT_TOPIC_CAPTURED.to_owned()
}

fn default_refunded() -> String {
    DEFAULT_TOPIC_REFUNDED.to_owned()
}

impl Default for Topics {
    fn default() -> Self {
        Self {
            authorized: default_authorized(),
            captured: default_captured(),
            refunded: default_refunded(),
        }
    }
}
