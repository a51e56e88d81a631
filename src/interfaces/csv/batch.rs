use super::command_reader::Command;
use crate::application::engine::LifecycleEngine;
use crate::domain::operation::{AuthorizeResponse, CaptureResponse, RefundResponse};
use crate::error::Result;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outcome {
    Authorized(AuthorizeResponse),
    Captured(CaptureResponse),
    Refunded(RefundResponse),
}

/// Runs batch commands against an engine, remembering which payment each
/// order id authorized so later rows can refer to it by order id.
pub struct BatchRunner<'a> {
    engine: &'a LifecycleEngine,
    payments_by_order: HashMap<String, String>,
}

impl<'a> BatchRunner<'a> {
    pub fn new(engine: &'a LifecycleEngine) -> Self {
        Self {
            engine,
            payments_by_order: HashMap::new(),
        }
    }

    pub async fn run(&mut self, command: Command) -> Result<Outcome> {
        match command {
            Command::Authorize(req) => {
                let resp = self.engine.authorize(req).await?;
                let payment = self.engine.payment(&resp.payment_id).await?;
                self.payments_by_order
                    .insert(payment.order_id, resp.payment_id.clone());
                Ok(Outcome::Authorized(resp))
            }
            Command::Capture {
                payment,
                amount_cents,
            } => {
                let payment_id = self.resolve(&payment);
                Ok(Outcome::Captured(
                    self.engine.capture(payment_id, amount_cents).await?,
                ))
            }
            Command::Refund { payment } => {
                let payment_id = self.resolve(&payment);
                Ok(Outcome::Refunded(self.engine.refund(payment_id).await?))
            }
        }
    }

    fn resolve<'r>(&'r self, reference: &'r str) -> &'r str {
        self.payments_by_order
            .get(reference)
            .map(String::as_str)
            .unwrap_or(reference)
    }
}
