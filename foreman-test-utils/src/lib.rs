//! FOREMAN Test Utilities
//!
//! Centralized test infrastructure for the FOREMAN workspace:
//! - Mock backends and notifiers
//! - A deterministic embedding generator for experience tests
//! - Fixtures for common entities
//!
//! The in-memory doubles that double as production fallbacks live with
//! their traits and are re-exported here for convenience.

pub use foreman_dispatch::RecordingPublisher;
pub use foreman_events::InMemoryEventLog;
pub use foreman_gate::InMemoryAuditStore;

pub use foreman_core::{
    new_entity_id, AgentEvent, EmbeddingVector, EntityId, EventKind, FeedbackDecision,
    FeedbackRequest, FeedbackResult, ForemanResult, HandoffMessage, Notifier, Task,
};

use async_trait::async_trait;
use foreman_dispatch::{Backend, Capabilities};
use tokio::sync::Mutex;

// ============================================================================
// MOCK BACKEND
// ============================================================================

/// Backend that records every executed task and stopped task id.
pub struct MockBackend {
    name: String,
    capabilities: Capabilities,
    executed: Mutex<Vec<Task>>,
    stopped: Mutex<Vec<EntityId>>,
}

impl MockBackend {
    /// Create a mock backend advertising the given capabilities.
    pub fn new(name: impl Into<String>, capabilities: Capabilities) -> Self {
        Self {
            name: name.into(),
            capabilities,
            executed: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
        }
    }

    /// Tasks executed so far, in order.
    pub async fn executed(&self) -> Vec<Task> {
        self.executed.lock().await.clone()
    }

    /// Task ids stopped so far, in order.
    pub async fn stopped(&self) -> Vec<EntityId> {
        self.stopped.lock().await.clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    async fn execute(&self, task: &Task) -> ForemanResult<()> {
        self.executed.lock().await.push(task.clone());
        Ok(())
    }

    async fn stop(&self, task_id: EntityId) -> ForemanResult<()> {
        self.stopped.lock().await.push(task_id);
        Ok(())
    }
}

// ============================================================================
// MOCK NOTIFIER
// ============================================================================

/// Notifier that records every message instead of delivering it.
pub struct MockNotifier {
    name: String,
    sent: Mutex<Vec<(String, String, String)>>,
}

impl MockNotifier {
    /// Create a mock notifier with the given channel name.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Messages sent so far as `(recipient, subject, body)`.
    pub async fn sent(&self) -> Vec<(String, String, String)> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, recipient: &str, subject: &str, body: &str) -> ForemanResult<()> {
        self.sent.lock().await.push((
            recipient.to_string(),
            subject.to_string(),
            body.to_string(),
        ));
        Ok(())
    }
}

// ============================================================================
// DETERMINISTIC EMBEDDINGS
// ============================================================================

/// Deterministic stand-in for an embedding model.
///
/// Hashes bytes of the input into a fixed number of normalized dimensions;
/// equal inputs always produce equal vectors.
pub fn mock_embedding(text: &str, dimensions: usize) -> EmbeddingVector {
    if dimensions == 0 {
        return EmbeddingVector::new(Vec::new(), "mock-embedder".to_string());
    }
    let mut data = vec![0.0f32; dimensions];
    for (i, byte) in text.bytes().enumerate() {
        data[i % dimensions] += (byte as f32) / 255.0;
    }

    let norm: f32 = data.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in &mut data {
            *x /= norm;
        }
    }
    EmbeddingVector::new(data, "mock-embedder".to_string())
}

// ============================================================================
// FIXTURES
// ============================================================================

/// A pending task with plausible content.
pub fn sample_task() -> Task {
    Task::new(
        new_entity_id(),
        "fix flaky integration test",
        "Investigate the flaky storage integration test and make it deterministic.",
    )
}

/// A feedback request for a sensitive shell call.
pub fn sample_feedback_request() -> FeedbackRequest {
    FeedbackRequest {
        run_id: new_entity_id(),
        call_id: new_entity_id(),
        tool: "shell".to_string(),
        command: "rm -rf target".to_string(),
        path: Some("/workspace".to_string()),
    }
}

/// A valid handoff between two named agents.
pub fn sample_handoff() -> HandoffMessage {
    HandoffMessage::new(
        "planner",
        "coder",
        "Plan approved; implement step 1 (add the retry wrapper).",
    )
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_records_executions() {
        let backend = MockBackend::new("mock", Capabilities::EDIT);
        let task = sample_task();
        backend.execute(&task).await.unwrap();
        backend.stop(task.id).await.unwrap();

        assert_eq!(backend.executed().await.len(), 1);
        assert_eq!(backend.stopped().await, vec![task.id]);
    }

    #[tokio::test]
    async fn test_mock_notifier_records_sends() {
        let notifier = MockNotifier::new("chat");
        notifier.send("ops", "subject", "body").await.unwrap();
        let sent = notifier.sent().await;
        assert_eq!(sent[0].0, "ops");
        assert_eq!(notifier.name(), "chat");
    }

    #[test]
    fn test_mock_embedding_is_deterministic_and_normalized() {
        let a = mock_embedding("add CI cache", 8);
        let b = mock_embedding("add CI cache", 8);
        assert_eq!(a, b);

        let norm: f32 = a.data.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);

        let c = mock_embedding("completely different text", 8);
        assert_ne!(a, c);
    }

    #[test]
    fn test_mock_embedding_zero_dimensions_is_empty() {
        let v = mock_embedding("nonempty input", 0);
        assert!(v.data.is_empty());
    }

    #[test]
    fn test_fixtures_are_valid() {
        assert!(sample_handoff().validate().is_ok());
        let request = sample_feedback_request();
        assert_eq!(request.tool, "shell");
    }
}
