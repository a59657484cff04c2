//! Derived run state.
//!
//! A [`RunState`] is never stored authoritatively: it is the fold of a
//! run's event sequence, and any materialized snapshot can be discarded
//! and rebuilt from event 0 without data loss.

use foreman_core::{EntityId, PlanStatus, StepStatus, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// RUN STATUS
// ============================================================================

/// Lifecycle status of a run, including the gated sub-states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Created, no events applied yet.
    Pending,
    /// Executing normally.
    Running,
    /// A sensitive tool call is pending a human decision.
    AwaitingApproval,
    /// Artifact validation in progress.
    QualityGate,
    /// Final artifact hand-off in progress.
    Delivering,
    /// No forward progress within the configured window. Not terminal;
    /// surfaced for operator intervention.
    Stalled,
    /// Finished successfully.
    Completed,
    /// Finished with a terminal failure.
    Failed,
    /// Cancelled by an operator or policy.
    Cancelled,
}

impl RunStatus {
    /// Whether this status is terminal. Events arriving against a terminal
    /// run are no-ops.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RunStatus::Completed | RunStatus::Failed | RunStatus::Cancelled
        )
    }
}

// ============================================================================
// PLAN STATE
// ============================================================================

/// Derived state of one plan step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepState {
    /// Position in the plan.
    pub index: u32,
    /// Current status.
    pub status: StepStatus,
    /// Execution attempts consumed so far.
    pub attempts: u32,
}

/// Derived state of the run's plan, mirrored from plan-scoped events.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanState {
    /// Plan identifier carried by the creating event.
    pub plan_id: EntityId,
    /// Current plan status.
    pub status: PlanStatus,
    /// Per-step derived state, in plan order.
    pub steps: Vec<StepState>,
}

impl PlanState {
    /// Initial state for a plan with the given number of steps.
    pub fn new(plan_id: EntityId, step_count: usize) -> Self {
        Self {
            plan_id,
            status: PlanStatus::Created,
            steps: (0..step_count)
                .map(|i| StepState {
                    index: i as u32,
                    status: StepStatus::Pending,
                    attempts: 0,
                })
                .collect(),
        }
    }

    /// Whether every step has completed.
    pub fn all_steps_completed(&self) -> bool {
        !self.steps.is_empty()
            && self
                .steps
                .iter()
                .all(|s| s.status == StepStatus::Completed)
    }
}

// ============================================================================
// RUN STATE
// ============================================================================

/// Snapshot of a run, derived by folding its event sequence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Run this snapshot describes.
    pub run_id: EntityId,
    /// Current status.
    pub status: RunStatus,
    /// Plan state, once a plan has been created.
    pub plan: Option<PlanState>,
    /// Quality-gate re-attempts consumed.
    pub quality_gate_attempts: u32,
    /// Result correlation keys already applied, for duplicate suppression.
    pub seen_results: HashSet<EntityId>,
    /// Tool call awaiting approval, keyed by its correlation id.
    pub pending_call: Option<EntityId>,
    /// Sequence number of the last applied event.
    pub last_version: i64,
    /// Creation time of the last applied event.
    pub last_event_at: Option<Timestamp>,
    /// Human-readable reason, set when the run failed.
    pub failure_reason: Option<String>,
}

impl RunState {
    /// Empty state for a run with no events applied.
    pub fn new(run_id: EntityId) -> Self {
        Self {
            run_id,
            status: RunStatus::Pending,
            plan: None,
            quality_gate_attempts: 0,
            seen_results: HashSet::new(),
            pending_call: None,
            last_version: 0,
            last_event_at: None,
            failure_reason: None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
