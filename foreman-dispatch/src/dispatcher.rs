//! Capability-matched task dispatch.
//!
//! The dispatcher records its intent in the event log before the publish
//! is attempted, so the log always explains what was meant to happen even
//! when the subsequent external call fails. Publishes pass through a
//! per-backend circuit breaker.

use crate::{Backend, Capabilities, Publisher};
use foreman_core::{
    AgentEvent, DispatchError, EntityId, EventKind, ForemanResult, Task,
};
use foreman_events::EventLog;
use foreman_resilience::{BreakerConfig, BreakerError, CircuitBreaker};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;

// ============================================================================
// CONFIG
// ============================================================================

/// Dispatcher configuration.
#[derive(Debug, Clone)]
pub struct DispatchConfig {
    /// Subject prefix for task dispatch (`<prefix>.<backend>`).
    pub subject_prefix: String,
    /// Single shared subject for cancellation signals.
    pub cancel_subject: String,
    /// Breaker settings applied per backend.
    pub breaker: BreakerConfig,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            subject_prefix: "agents.dispatch".to_string(),
            cancel_subject: "agents.cancel".to_string(),
            breaker: BreakerConfig::default(),
        }
    }
}

impl DispatchConfig {
    /// Build from the engine configuration's subject settings.
    pub fn from_engine(config: &foreman_core::EngineConfig) -> Self {
        Self {
            subject_prefix: config.dispatch_prefix.clone(),
            cancel_subject: config.cancel_subject.clone(),
            breaker: BreakerConfig::default(),
        }
    }

    /// Set the breaker settings applied per backend.
    pub fn with_breaker(mut self, breaker: BreakerConfig) -> Self {
        self.breaker = breaker;
        self
    }
}

// ============================================================================
// CANCEL SIGNAL
// ============================================================================

/// Wire payload for the shared cancellation subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CancelSignal {
    /// Task to cancel.
    pub task_id: EntityId,
    /// Always `"cancel"`.
    pub action: String,
}

impl CancelSignal {
    /// Create a cancel signal for a task.
    pub fn new(task_id: EntityId) -> Self {
        Self {
            task_id,
            action: "cancel".to_string(),
        }
    }
}

// ============================================================================
// DISPATCHER
// ============================================================================

/// Routes tasks to capability-matched backends over the publish channel.
pub struct Dispatcher {
    backends: Vec<Arc<dyn Backend>>,
    publisher: Arc<dyn Publisher>,
    event_log: Arc<dyn EventLog>,
    breakers: HashMap<String, CircuitBreaker>,
    cancel_breaker: CircuitBreaker,
    config: DispatchConfig,
}

impl Dispatcher {
    /// Create a dispatcher over a fixed set of backends.
    ///
    /// Backends come from the backend registry at startup; the set does
    /// not change at request time.
    pub fn new(
        backends: Vec<Arc<dyn Backend>>,
        publisher: Arc<dyn Publisher>,
        event_log: Arc<dyn EventLog>,
        config: DispatchConfig,
    ) -> Self {
        let breakers = backends
            .iter()
            .map(|b| {
                (
                    b.name().to_string(),
                    CircuitBreaker::new(format!("publish:{}", b.name()), config.breaker.clone()),
                )
            })
            .collect();
        let cancel_breaker = CircuitBreaker::new("publish:cancel", config.breaker.clone());
        Self {
            backends,
            publisher,
            event_log,
            breakers,
            cancel_breaker,
            config,
        }
    }

    /// Names of the registered backends.
    pub fn backends(&self) -> Vec<&str> {
        self.backends.iter().map(|b| b.name()).collect()
    }

    /// Select the first backend advertising all required capabilities.
    fn route(&self, required: Capabilities) -> ForemanResult<&Arc<dyn Backend>> {
        self.backends
            .iter()
            .find(|b| b.capabilities().contains(required))
            .ok_or_else(|| {
                DispatchError::NoCapableBackend {
                    required: required.describe(),
                }
                .into()
            })
    }

    /// Route and publish a task.
    ///
    /// Returns `Ok(())` when the task was enqueued; the result arrives
    /// later as an event. The dispatch event is appended before the
    /// publish so intent is always on record.
    pub async fn dispatch(
        &self,
        run_id: EntityId,
        agent_id: &str,
        task: &Task,
        required: Capabilities,
    ) -> ForemanResult<()> {
        let backend = self.route(required)?;
        let subject = format!("{}.{}", self.config.subject_prefix, backend.name());

        let event = AgentEvent::builder(EventKind::DispatchRequested, run_id)
            .agent(agent_id)
            .task(task.id)
            .project(task.project_id)
            .payload(json!({
                "backend": backend.name(),
                "subject": subject,
                "capabilities": required.describe(),
            }))
            .build();
        self.event_log.append(event).await?;

        let payload = serde_json::to_vec(task).map_err(|e| DispatchError::PublishFailed {
            backend: backend.name().to_string(),
            reason: e.to_string(),
        })?;

        let breaker = self
            .breakers
            .get(backend.name())
            .unwrap_or(&self.cancel_breaker);
        let result = breaker
            .call_async(self.publisher.publish(&subject, &payload))
            .await;

        match result {
            Ok(()) => {
                tracing::info!(
                    run_id = %run_id,
                    backend = backend.name(),
                    subject = %subject,
                    "task dispatched"
                );
                Ok(())
            }
            Err(BreakerError::Open) => Err(breaker.open_error().into()),
            Err(BreakerError::Inner(e)) => Err(DispatchError::PublishFailed {
                backend: backend.name().to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }

    /// Issue a best-effort cancellation signal for a task.
    pub async fn cancel(&self, task_id: EntityId) -> ForemanResult<()> {
        let signal = CancelSignal::new(task_id);
        let payload = serde_json::to_vec(&signal).map_err(|e| DispatchError::PublishFailed {
            backend: "cancel".to_string(),
            reason: e.to_string(),
        })?;

        let result = self
            .cancel_breaker
            .call_async(self.publisher.publish(&self.config.cancel_subject, &payload))
            .await;

        match result {
            Ok(()) => {
                tracing::info!(task_id = %task_id, "cancellation signal published");
                Ok(())
            }
            Err(BreakerError::Open) => Err(self.cancel_breaker.open_error().into()),
            Err(BreakerError::Inner(e)) => Err(DispatchError::PublishFailed {
                backend: "cancel".to_string(),
                reason: e.to_string(),
            }
            .into()),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RecordingPublisher;
    use async_trait::async_trait;
    use foreman_core::{new_entity_id, ForemanError, ResilienceError};
    use foreman_events::{AuditFilter, InMemoryEventLog};

    struct StubBackend {
        name: &'static str,
        caps: Capabilities,
    }

    #[async_trait]
    impl Backend for StubBackend {
        fn name(&self) -> &str {
            self.name
        }

        fn capabilities(&self) -> Capabilities {
            self.caps
        }

        async fn execute(&self, _task: &Task) -> ForemanResult<()> {
            Ok(())
        }

        async fn stop(&self, _task_id: EntityId) -> ForemanResult<()> {
            Ok(())
        }
    }

    struct DownPublisher;

    #[async_trait]
    impl Publisher for DownPublisher {
        async fn publish(&self, _subject: &str, _payload: &[u8]) -> ForemanResult<()> {
            Err(DispatchError::PublishFailed {
                backend: "broker".to_string(),
                reason: "connection refused".to_string(),
            }
            .into())
        }
    }

    fn dispatcher_with(
        publisher: Arc<dyn Publisher>,
        breaker: BreakerConfig,
    ) -> (Dispatcher, Arc<InMemoryEventLog>) {
        let log = Arc::new(InMemoryEventLog::new());
        let backends: Vec<Arc<dyn Backend>> = vec![
            Arc::new(StubBackend {
                name: "planner-worker",
                caps: Capabilities::PLANNER,
            }),
            Arc::new(StubBackend {
                name: "claude-worker",
                caps: Capabilities::EDIT | Capabilities::TERMINAL,
            }),
        ];
        let config = DispatchConfig {
            breaker,
            ..DispatchConfig::default()
        };
        (
            Dispatcher::new(backends, publisher, log.clone(), config),
            log,
        )
    }

    #[tokio::test]
    async fn test_dispatch_routes_by_capability() {
        let publisher = Arc::new(RecordingPublisher::new());
        let (dispatcher, _log) = dispatcher_with(publisher.clone(), BreakerConfig::default());
        let task = Task::new(new_entity_id(), "t", "p");

        dispatcher
            .dispatch(new_entity_id(), "orchestrator", &task, Capabilities::EDIT)
            .await
            .unwrap();

        let subjects = publisher.subjects().await;
        assert_eq!(subjects, vec!["agents.dispatch.claude-worker"]);
    }

    #[tokio::test]
    async fn test_no_capable_backend_is_rejected() {
        let publisher = Arc::new(RecordingPublisher::new());
        let (dispatcher, log) = dispatcher_with(publisher.clone(), BreakerConfig::default());
        let task = Task::new(new_entity_id(), "t", "p");
        let run_id = new_entity_id();

        let err = dispatcher
            .dispatch(run_id, "orchestrator", &task, Capabilities::REVIEW)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ForemanError::Dispatch(DispatchError::NoCapableBackend { .. })
        ));
        // Rejected before any event or publish.
        assert!(publisher.messages().await.is_empty());
        assert!(log.read(run_id, None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_dispatch_event_recorded_before_publish_failure() {
        let (dispatcher, log) = dispatcher_with(Arc::new(DownPublisher), BreakerConfig::default());
        let task = Task::new(new_entity_id(), "t", "p");
        let run_id = new_entity_id();

        let err = dispatcher
            .dispatch(run_id, "orchestrator", &task, Capabilities::PLANNER)
            .await
            .unwrap_err();
        let msg = format!("{err}");
        assert!(msg.contains("planner-worker: publish task:"));
        assert!(msg.contains("connection refused"));

        // Intent is on record even though the publish failed.
        let events = log.read(run_id, None, None).await.unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::DispatchRequested);
    }

    #[tokio::test]
    async fn test_open_circuit_surfaces_as_circuit_open() {
        let breaker = BreakerConfig::new()
            .with_max_failures(1)
            .with_timeout(std::time::Duration::from_secs(60));
        let (dispatcher, _log) = dispatcher_with(Arc::new(DownPublisher), breaker);
        let task = Task::new(new_entity_id(), "t", "p");

        // First failure opens the per-backend circuit.
        let _ = dispatcher
            .dispatch(new_entity_id(), "orchestrator", &task, Capabilities::EDIT)
            .await;
        let err = dispatcher
            .dispatch(new_entity_id(), "orchestrator", &task, Capabilities::EDIT)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            ForemanError::Resilience(ResilienceError::CircuitOpen { .. })
        ));
    }

    #[tokio::test]
    async fn test_subjects_come_from_engine_config() {
        let engine_config = foreman_core::EngineConfig::new().with_dispatch_prefix("workers");
        let publisher = Arc::new(RecordingPublisher::new());
        let log = Arc::new(InMemoryEventLog::new());
        let backends: Vec<Arc<dyn Backend>> = vec![Arc::new(StubBackend {
            name: "claude-worker",
            caps: Capabilities::EDIT,
        })];
        let dispatcher = Dispatcher::new(
            backends,
            publisher.clone(),
            log,
            DispatchConfig::from_engine(&engine_config),
        );

        let task = Task::new(new_entity_id(), "t", "p");
        dispatcher
            .dispatch(new_entity_id(), "orchestrator", &task, Capabilities::EDIT)
            .await
            .unwrap();
        assert_eq!(publisher.subjects().await, vec!["workers.claude-worker"]);
    }

    #[tokio::test]
    async fn test_cancel_uses_shared_subject() {
        let publisher = Arc::new(RecordingPublisher::new());
        let (dispatcher, _log) = dispatcher_with(publisher.clone(), BreakerConfig::default());
        let task_id = new_entity_id();

        dispatcher.cancel(task_id).await.unwrap();

        let messages = publisher.messages().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "agents.cancel");
        let signal: CancelSignal = serde_json::from_slice(&messages[0].1).unwrap();
        assert_eq!(signal.task_id, task_id);
        assert_eq!(signal.action, "cancel");
    }

    #[tokio::test]
    async fn test_dispatch_audit_trail() {
        let publisher = Arc::new(RecordingPublisher::new());
        let (dispatcher, log) = dispatcher_with(publisher, BreakerConfig::default());
        let task = Task::new(new_entity_id(), "t", "p");
        let run_id = new_entity_id();

        dispatcher
            .dispatch(run_id, "orchestrator", &task, Capabilities::TERMINAL)
            .await
            .unwrap();

        let page = log
            .audit(&AuditFilter::new().with_action("run.dispatch.requested"))
            .await
            .unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.entries[0].payload["backend"], "claude-worker");
    }
}
