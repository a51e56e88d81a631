use crate::domain::ports::EventPublisher;
use crate::error::{PaymentError, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio::sync::{Mutex, RwLock};

/// One message as handed to the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub topic: String,
    pub payload: Vec<u8>,
}

/// An in-process message bus that keeps every published message.
///
/// Publishing after `close` fails, like a shut-down producer would.
#[derive(Default, Clone)]
pub struct InMemoryEventBus {
    messages: Arc<RwLock<Vec<PublishedMessage>>>,
    closed: Arc<AtomicBool>,
}

impl InMemoryEventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn messages(&self) -> Vec<PublishedMessage> {
        self.messages.read().await.clone()
    }

    pub async fn messages_on(&self, topic: &str) -> Vec<PublishedMessage> {
        self.messages
            .read()
            .await
            .iter()
            .filter(|m| m.topic == topic)
            .cloned()
            .collect()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        if self.is_closed() {
            return Err(PaymentError::Publish("event bus is closed".to_string()));
        }
        self.messages.write().await.push(PublishedMessage {
            topic: topic.to_string(),
            payload,
        });
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Writes every published message to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventPublisher;

#[async_trait]
impl EventPublisher for TracingEventPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        tracing::info!(
            target: "payments::events",
            topic,
            payload = %String::from_utf8_lossy(&payload),
            "Event published"
        );
        Ok(())
    }
}

/// Line format of [`JsonLinesEventPublisher`].
#[derive(Debug, Serialize, Deserialize)]
pub struct EventEnvelope {
    pub topic: String,
    pub message: serde_json::Value,
}

/// Appends each message as one JSON line to a file.
pub struct JsonLinesEventPublisher {
    writer: Mutex<Option<BufWriter<File>>>,
}

impl JsonLinesEventPublisher {
    /// Opens `path` for appending, creating it when missing.
    pub async fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        Ok(Self {
            writer: Mutex::new(Some(BufWriter::new(file))),
        })
    }
}

#[async_trait]
impl EventPublisher for JsonLinesEventPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<()> {
        let envelope = EventEnvelope {
            topic: topic.to_string(),
            message: serde_json::from_slice(&payload)?,
        };
        let mut line = serde_json::to_vec(&envelope)?;
        line.push(b'\n');

        let mut guard = self.writer.lock().await;
        let writer = guard
            .as_mut()
            .ok_or_else(|| PaymentError::Publish("publisher is closed".to_string()))?;
        writer.write_all(&line).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Some(mut writer) = self.writer.lock().await.take() {
            writer.flush().await?;
            writer.into_inner().sync_all().await?;
        }
        Ok(())
    }
}
