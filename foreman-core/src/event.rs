//! Event types for the append-only run log.
//!
//! An [`AgentEvent`] is an immutable fact about a run. The event sequence for
//! a run is the authoritative record of its state: every transition the
//! engine makes is caused by exactly one event, and the current state of a
//! run is the fold of its events (see `foreman-engine`).
//!
//! Events are appended with `version == 0` and receive their per-run
//! monotonic sequence number from the event log at append time. Once
//! acknowledged by the log an event is never mutated or deleted.

use crate::{new_entity_id, EntityId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// EVENT KIND
// ============================================================================

/// Discriminator for every event the engine can record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A run was created and started.
    RunStarted,
    /// A run reached successful completion.
    RunCompleted,
    /// A run failed terminally.
    RunFailed,
    /// A run was cancelled by an operator or policy.
    RunCancelled,
    /// A plan was created for the run's task.
    PlanCreated,
    /// Plan execution started.
    PlanStarted,
    /// All plan steps completed.
    PlanCompleted,
    /// A plan step exhausted its retry budget.
    PlanFailed,
    /// Plan execution was cancelled.
    PlanCancelled,
    /// A plan step started executing.
    StepStarted,
    /// A plan step completed.
    StepCompleted,
    /// A plan step failed.
    StepFailed,
    /// The task was routed to a backend.
    DispatchRequested,
    /// The dispatch publish itself failed.
    DispatchFailed,
    /// A backend delivered a result for the run.
    ResultReceived,
    /// A tool call was requested by a worker.
    ToolCallRequested,
    /// A human approved a pending tool call.
    ToolCallApproved,
    /// A human denied a pending tool call.
    ToolCallDenied,
    /// Artifact validation started.
    QualityGateStarted,
    /// Artifact validation passed.
    QualityGatePassed,
    /// Artifact validation failed.
    QualityGateFailed,
    /// Final artifact hand-off started.
    DeliveryStarted,
    /// Final artifact hand-off completed.
    DeliveryCompleted,
    /// Control transferred from one agent to another.
    Handoff,
    /// No forward-progress event within the configured window.
    StallDetected,
}

impl EventKind {
    /// String form used in audit queries and log fields.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::RunStarted => "run.started",
            EventKind::RunCompleted => "run.completed",
            EventKind::RunFailed => "run.failed",
            EventKind::RunCancelled => "run.cancelled",
            EventKind::PlanCreated => "plan.created",
            EventKind::PlanStarted => "plan.started",
            EventKind::PlanCompleted => "plan.completed",
            EventKind::PlanFailed => "plan.failed",
            EventKind::PlanCancelled => "plan.cancelled",
            EventKind::StepStarted => "plan.step.started",
            EventKind::StepCompleted => "plan.step.completed",
            EventKind::StepFailed => "plan.step.failed",
            EventKind::DispatchRequested => "run.dispatch.requested",
            EventKind::DispatchFailed => "run.dispatch.failed",
            EventKind::ResultReceived => "run.result.received",
            EventKind::ToolCallRequested => "run.toolcall.requested",
            EventKind::ToolCallApproved => "run.toolcall.approved",
            EventKind::ToolCallDenied => "run.toolcall.denied",
            EventKind::QualityGateStarted => "run.qualitygate.started",
            EventKind::QualityGatePassed => "run.qualitygate.passed",
            EventKind::QualityGateFailed => "run.qualitygate.failed",
            EventKind::DeliveryStarted => "run.delivery.started",
            EventKind::DeliveryCompleted => "run.delivery.completed",
            EventKind::Handoff => "run.handoff",
            EventKind::StallDetected => "run.stall_detected",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// AGENT EVENT
// ============================================================================

/// An immutable fact recorded against a run.
///
/// `version` is the per-run sequence number assigned by the event log;
/// events created by callers carry `version == 0` until appended. All
/// payload data beyond the typed fields travels in `payload` as an opaque
/// structured blob.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentEvent {
    /// Unique identifier for this event.
    pub id: EntityId,
    /// Agent that produced (or is the subject of) the event.
    pub agent_id: String,
    /// Task this run executes.
    pub task_id: EntityId,
    /// Project the task belongs to.
    pub project_id: EntityId,
    /// Run this event is scoped to.
    pub run_id: EntityId,
    /// Event discriminator.
    pub kind: EventKind,
    /// Opaque structured payload.
    pub payload: serde_json::Value,
    /// Correlation key for dispatch/result matching and deduplication.
    pub request_id: EntityId,
    /// Per-run monotonic sequence number, assigned at append time.
    pub version: i64,
    /// When the event was created.
    pub created_at: Timestamp,

    /// Tool involved, for tool-call events.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Model that produced the underlying output, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Prompt tokens consumed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_in: Option<i64>,
    /// Completion tokens produced.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tokens_out: Option<i64>,
    /// Cost attributed to the underlying call, in USD.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl AgentEvent {
    /// Start building an event of the given kind for a run.
    pub fn builder(kind: EventKind, run_id: EntityId) -> AgentEventBuilder {
        AgentEventBuilder::new(kind, run_id)
    }

    /// Whether this event kind moves a run to a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.kind,
            EventKind::RunCompleted | EventKind::RunFailed | EventKind::RunCancelled
        )
    }
}

// ============================================================================
// EVENT BUILDER
// ============================================================================

/// Builder for [`AgentEvent`].
///
/// Fills in identity, correlation, and timestamp defaults so call sites only
/// state what differs from the common case.
#[derive(Debug, Clone)]
pub struct AgentEventBuilder {
    event: AgentEvent,
}

impl AgentEventBuilder {
    /// Create a builder with fresh identifiers and the current time.
    pub fn new(kind: EventKind, run_id: EntityId) -> Self {
        Self {
            event: AgentEvent {
                id: new_entity_id(),
                agent_id: String::new(),
                task_id: EntityId::nil(),
                project_id: EntityId::nil(),
                run_id,
                kind,
                payload: serde_json::Value::Null,
                request_id: new_entity_id(),
                version: 0,
                created_at: Utc::now(),
                tool_name: None,
                model: None,
                tokens_in: None,
                tokens_out: None,
                cost_usd: None,
            },
        }
    }

    /// Set the producing agent.
    pub fn agent(mut self, agent_id: impl Into<String>) -> Self {
        self.event.agent_id = agent_id.into();
        self
    }

    /// Set the task this run executes.
    pub fn task(mut self, task_id: EntityId) -> Self {
        self.event.task_id = task_id;
        self
    }

    /// Set the owning project.
    pub fn project(mut self, project_id: EntityId) -> Self {
        self.event.project_id = project_id;
        self
    }

    /// Set the structured payload.
    pub fn payload(mut self, payload: serde_json::Value) -> Self {
        self.event.payload = payload;
        self
    }

    /// Set the correlation key (defaults to a fresh id).
    pub fn request(mut self, request_id: EntityId) -> Self {
        self.event.request_id = request_id;
        self
    }

    /// Set the tool involved.
    pub fn tool(mut self, tool_name: impl Into<String>) -> Self {
        self.event.tool_name = Some(tool_name.into());
        self
    }

    /// Attach model/token/cost accounting.
    pub fn usage(mut self, model: impl Into<String>, tokens_in: i64, tokens_out: i64, cost_usd: f64) -> Self {
        self.event.model = Some(model.into());
        self.event.tokens_in = Some(tokens_in);
        self.event.tokens_out = Some(tokens_out);
        self.event.cost_usd = Some(cost_usd);
        self
    }

    /// Finish building.
    pub fn build(self) -> AgentEvent {
        self.event
    }
}

// =============================================================================
// TESTS
// =============================================================================
