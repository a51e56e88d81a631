use crate::domain::operation::AuthorizeRequest;
use crate::error::{PaymentError, Result};
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum Op {
    Authorize,
    Capture,
    Refund,
}

/// One CSV row: `op,payment,order_id,amount_cents,currency,token,idempotency_key`.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct CommandRecord {
    pub op: Op,
    pub payment: Option<String>,
    pub order_id: Option<String>,
    pub amount_cents: Option<i64>,
    pub currency: Option<String>,
    pub token: Option<String>,
    pub idempotency_key: Option<String>,
}

#[derive(Debug, PartialEq, Clone)]
pub enum Command {
    Authorize(AuthorizeRequest),
    /// `payment` is a payment id or an order id authorized earlier in the batch.
    Capture { payment: String, amount_cents: i64 },
    Refund { payment: String },
}

impl TryFrom<CommandRecord> for Command {
    type Error = PaymentError;

    fn try_from(record: CommandRecord) -> Result<Self> {
        let missing = |field: &str| PaymentError::InvalidRequest(format!("missing {field}"));
        match record.op {
            Op::Authorize => Ok(Command::Authorize(AuthorizeRequest {
                order_id: record.order_id,
                amount_cents: record.amount_cents.ok_or_else(|| missing("amount_cents"))?,
                currency: record.currency.unwrap_or_default(),
                payment_method_token: record.token.unwrap_or_default(),
                idempotency_key: record.idempotency_key,
            })),
            Op::Capture => Ok(Command::Capture {
                payment: record
                    .payment
                    .or(record.order_id)
                    .ok_or_else(|| missing("payment"))?,
                amount_cents: record.amount_cents.ok_or_else(|| missing("amount_cents"))?,
            }),
            Op::Refund => Ok(Command::Refund {
                payment: record
                    .payment
                    .or(record.order_id)
                    .ok_or_else(|| missing("payment"))?,
            }),
        }
    }
}

/// Reads lifecycle commands from a CSV source.
///
/// Handles whitespace trimming and flexible record lengths, so trailing
/// empty columns may be left out.
pub struct CommandReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CommandReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily reads and converts rows. A bad row yields an error and does
    /// not stop the iterator.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.reader.into_deserialize().map(|result| {
            let record: CommandRecord = result?;
            Command::try_from(record)
        })
    }
}
