//! Publish-only channel abstraction.
//!
//! The concrete message broker is an external collaborator; the engine
//! only needs fire-and-forget publish to a subject. Payloads are opaque
//! bytes (serialized tasks or cancel signals).

use async_trait::async_trait;
use foreman_core::ForemanResult;
use tokio::sync::Mutex;

/// Publish-only channel to the worker transport.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Publish a payload to a subject.
    async fn publish(&self, subject: &str, payload: &[u8]) -> ForemanResult<()>;
}

/// Publisher that records every message, for tests and dry wiring.
#[derive(Default)]
pub struct RecordingPublisher {
    messages: Mutex<Vec<(String, Vec<u8>)>>,
}

impl RecordingPublisher {
    /// Create an empty recording publisher.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages published so far, in order.
    pub async fn messages(&self) -> Vec<(String, Vec<u8>)> {
        self.messages.lock().await.clone()
    }

    /// Subjects published so far, in order.
    pub async fn subjects(&self) -> Vec<String> {
        self.messages
            .lock()
            .await
            .iter()
            .map(|(subject, _)| subject.clone())
            .collect()
    }
}

#[async_trait]
impl Publisher for RecordingPublisher {
    async fn publish(&self, subject: &str, payload: &[u8]) -> ForemanResult<()> {
        self.messages
            .lock()
            .await
            .push((subject.to_string(), payload.to_vec()));
        Ok(())
    }
}
