//! The orchestration engine: event-driven coordinator over the log, the
//! dispatcher, and the feedback gate.
//!
//! Control flow is event-driven, not call-and-wait: the engine appends an
//! event, folds it into the run's snapshot, and only then performs side
//! effects. A dispatch or gate failure after the append therefore never
//! leaves the log unaware of what was attempted.

use crate::{Reducer, RunState};
use chrono::Utc;
use foreman_core::{
    new_entity_id, AgentEvent, EngineConfig, EntityId, EventKind, EventLogError, FeedbackDecision,
    FeedbackRequest, ForemanResult, HandoffMessage, Task, ToolPolicy, ValidationError,
};
use foreman_dispatch::{Capabilities, Dispatcher};
use foreman_events::{EventLog, ReplayRequest};
use foreman_gate::FeedbackGate;
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Agent identity the engine itself records events under.
const ENGINE_AGENT: &str = "orchestrator";

/// The run/plan state machine.
///
/// Snapshots held here are a derived cache; [`Engine::replay`] can rebuild
/// any of them from the event sequence alone.
pub struct Engine {
    event_log: Arc<dyn EventLog>,
    dispatcher: Arc<Dispatcher>,
    gate: Arc<FeedbackGate>,
    reducer: Reducer,
    config: EngineConfig,
    snapshots: Mutex<HashMap<EntityId, RunState>>,
    tasks: Mutex<HashMap<EntityId, Task>>,
}

impl Engine {
    /// Create an engine over its collaborators.
    pub fn new(
        event_log: Arc<dyn EventLog>,
        dispatcher: Arc<Dispatcher>,
        gate: Arc<FeedbackGate>,
        tool_policy: Arc<dyn ToolPolicy>,
        config: EngineConfig,
    ) -> Self {
        let reducer = Reducer::new(tool_policy, &config);
        Self {
            event_log,
            dispatcher,
            gate,
            reducer,
            config,
            snapshots: Mutex::new(HashMap::new()),
            tasks: Mutex::new(HashMap::new()),
        }
    }

    /// Current snapshot of a run, when one is materialized.
    pub async fn snapshot(&self, run_id: EntityId) -> Option<RunState> {
        self.snapshots.lock().await.get(&run_id).cloned()
    }

    /// Append an event, assign its sequence number, and fold it into the
    /// run's snapshot.
    ///
    /// Sequence assignment and the snapshot fold happen under different
    /// locks, so a concurrent appender can win a lower sequence number and
    /// fold after us. The snapshot only ever advances by exactly one
    /// sequence step; on any gap it is re-derived from the log, which
    /// holds the assigned total order.
    async fn apply(&self, mut event: AgentEvent) -> ForemanResult<RunState> {
        let sequence = self.event_log.append(event.clone()).await?;
        event.version = sequence;

        let mut snapshots = self.snapshots.lock().await;
        let prior = snapshots
            .get(&event.run_id)
            .cloned()
            .unwrap_or_else(|| RunState::new(event.run_id));
        let next = if sequence == prior.last_version + 1 {
            self.reducer.reduce(&prior, &event)
        } else {
            let events = self.event_log.read(event.run_id, None, None).await?;
            events.iter().fold(RunState::new(event.run_id), |s, e| {
                self.reducer.reduce(&s, e)
            })
        };
        snapshots.insert(event.run_id, next.clone());
        Ok(next)
    }

    /// Submit a task: create a run, record its start, then dispatch.
    ///
    /// The `RunStarted` event is on record before the dispatch attempt; a
    /// dispatch failure fails the run with a recorded `DispatchFailed`
    /// event, never a silent drop.
    pub async fn submit(&self, task: Task, required: Capabilities) -> ForemanResult<EntityId> {
        let run_id = new_entity_id();
        let started = AgentEvent::builder(EventKind::RunStarted, run_id)
            .agent(ENGINE_AGENT)
            .task(task.id)
            .project(task.project_id)
            .payload(json!({"title": task.title}))
            .build();
        self.apply(started).await?;
        self.tasks.lock().await.insert(run_id, task.clone());

        if let Err(e) = self
            .dispatcher
            .dispatch(run_id, ENGINE_AGENT, &task, required)
            .await
        {
            self.record_dispatch_failure(run_id, &task, &e.to_string())
                .await?;
            return Err(e);
        }

        tracing::info!(run_id = %run_id, task_id = %task.id, "run submitted");
        Ok(run_id)
    }

    async fn record_dispatch_failure(
        &self,
        run_id: EntityId,
        task: &Task,
        reason: &str,
    ) -> ForemanResult<RunState> {
        let failed = AgentEvent::builder(EventKind::DispatchFailed, run_id)
            .agent(ENGINE_AGENT)
            .task(task.id)
            .project(task.project_id)
            .payload(json!({"reason": reason}))
            .build();
        self.apply(failed).await
    }

    /// Consume one event: append, fold, then perform the transition's side
    /// effects.
    ///
    /// A sensitive tool call routes through the feedback gate and resolves
    /// with an approved/denied event carrying the same correlation id.
    pub async fn handle_event(&self, event: AgentEvent) -> ForemanResult<RunState> {
        let kind = event.kind;
        let run_id = event.run_id;
        let request_id = event.request_id;
        let tool = event.tool_name.clone();
        let command = event.payload["command"].as_str().map(str::to_string);
        let path = event.payload["path"].as_str().map(str::to_string);
        let task_id = event.task_id;
        let project_id = event.project_id;

        let state = self.apply(event).await?;

        if kind == EventKind::ToolCallRequested
            && state.status == crate::RunStatus::AwaitingApproval
        {
            let request = FeedbackRequest {
                run_id,
                call_id: request_id,
                tool: tool.unwrap_or_default(),
                command: command.unwrap_or_default(),
                path,
            };
            let result = self.gate.request_feedback(&request).await?;
            let resolution = match result.decision {
                FeedbackDecision::Allow => EventKind::ToolCallApproved,
                FeedbackDecision::Deny => EventKind::ToolCallDenied,
            };
            let resolved = AgentEvent::builder(resolution, run_id)
                .agent(ENGINE_AGENT)
                .task(task_id)
                .project(project_id)
                .request(request_id)
                .tool(request.tool.clone())
                .payload(json!({
                    "responder": result.responder,
                    "provider": result.provider,
                }))
                .build();
            return self.apply(resolved).await;
        }

        Ok(state)
    }

    /// Transfer control between agents: validate, record, re-dispatch.
    ///
    /// An invalid handoff is rejected before any event is emitted.
    pub async fn handoff(
        &self,
        run_id: EntityId,
        message: HandoffMessage,
        required: Capabilities,
    ) -> ForemanResult<RunState> {
        message.validate()?;

        let task = self
            .tasks
            .lock()
            .await
            .get(&run_id)
            .cloned()
            .ok_or(EventLogError::NotFound { run_id })?;

        let payload =
            serde_json::to_value(&message).map_err(|e| ValidationError::InvalidValue {
                field: "handoff".to_string(),
                reason: e.to_string(),
            })?;
        let event = AgentEvent::builder(EventKind::Handoff, run_id)
            .agent(&message.source_agent_id)
            .task(task.id)
            .project(task.project_id)
            .payload(payload)
            .build();
        let state = self.apply(event).await?;

        if let Err(e) = self
            .dispatcher
            .dispatch(run_id, &message.target_agent_id, &task, required)
            .await
        {
            self.record_dispatch_failure(run_id, &task, &e.to_string())
                .await?;
            return Err(e);
        }

        tracing::info!(
            run_id = %run_id,
            source = %message.source_agent_id,
            target = %message.target_agent_id,
            "handoff dispatched"
        );
        Ok(state)
    }

    /// Re-derive a run's state by folding its event window.
    ///
    /// With `dry_run` the materialized snapshot is untouched; otherwise the
    /// snapshot is rewound to the replayed state, which is how crash
    /// recovery and rewind-to-an-earlier-point work.
    pub async fn replay(&self, request: ReplayRequest) -> ForemanResult<RunState> {
        let events = self
            .event_log
            .read(request.run_id, request.from_event, request.to_event)
            .await?;

        let state = events.iter().fold(RunState::new(request.run_id), |s, e| {
            self.reducer.reduce(&s, e)
        });

        if !request.dry_run {
            self.snapshots
                .lock()
                .await
                .insert(request.run_id, state.clone());
        }
        Ok(state)
    }

    /// Flag runs with no forward progress inside the stall window.
    ///
    /// Emits one `StallDetected` per newly stalled run and returns their
    /// ids. Terminal and already-stalled runs are skipped.
    pub async fn sweep_stalls(&self) -> ForemanResult<Vec<EntityId>> {
        let now = Utc::now();
        let window = chrono::Duration::from_std(self.config.stall_window)
            .unwrap_or_else(|_| chrono::Duration::seconds(i64::MAX / 2));

        let stalled: Vec<EntityId> = {
            let snapshots = self.snapshots.lock().await;
            snapshots
                .values()
                .filter(|s| !s.status.is_terminal() && s.status != crate::RunStatus::Stalled)
                .filter(|s| {
                    s.last_event_at
                        .is_some_and(|at| now.signed_duration_since(at) > window)
                })
                .map(|s| s.run_id)
                .collect()
        };

        for run_id in &stalled {
            let task = self.tasks.lock().await.get(run_id).cloned();
            let mut builder = AgentEvent::builder(EventKind::StallDetected, *run_id)
                .agent(ENGINE_AGENT)
                .payload(json!({"window_secs": self.config.stall_window.as_secs()}));
            if let Some(task) = task {
                builder = builder.task(task.id).project(task.project_id);
            }
            self.apply(builder.build()).await?;
            tracing::warn!(run_id = %run_id, "stall detected");
        }
        Ok(stalled)
    }
}

// =============================================================================
// TESTS
// =============================================================================
