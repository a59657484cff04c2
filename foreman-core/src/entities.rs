//! Task, plan, experience, and review entities.
//!
//! `Task` status here is informational for dispatch; the authoritative
//! status of a run is always derived from its event sequence.

use crate::{new_entity_id, EmbeddingVector, EntityId, Timestamp};
use chrono::Utc;
use serde::{Deserialize, Serialize};

// ============================================================================
// TASK
// ============================================================================

/// Lifecycle status of a submitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

/// A unit of work submitted for execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Unique identifier for this task.
    pub id: EntityId,
    /// Project the task belongs to.
    pub project_id: EntityId,
    /// Short human-readable title.
    pub title: String,
    /// Full prompt handed to the executing agent.
    pub prompt: String,
    /// Informational status; the run's event fold is authoritative.
    pub status: TaskStatus,
}

impl Task {
    /// Create a new pending task.
    pub fn new(project_id: EntityId, title: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            project_id,
            title: title.into(),
            prompt: prompt.into(),
            status: TaskStatus::Pending,
        }
    }
}

// ============================================================================
// PLAN / PLAN STEP
// ============================================================================

/// Plan lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanStatus {
    Created,
    Started,
    Completed,
    Failed,
    Cancelled,
}

/// Step lifecycle, mirroring run transitions at step granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// One independently dispatchable, independently approvable unit of work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Unique identifier for this step.
    pub id: EntityId,
    /// Owning plan.
    pub plan_id: EntityId,
    /// Position in the plan's ordered sequence.
    pub index: u32,
    /// What this step is supposed to do.
    pub description: String,
    /// Agent that executed (or is executing) this step.
    pub agent_id: Option<String>,
    /// Handoff context passed to the next agent.
    pub handoff_context: Option<String>,
    /// Current status.
    pub status: StepStatus,
    /// Execution attempts so far.
    pub attempts: u32,
}

impl PlanStep {
    /// Create a pending step at the given position.
    pub fn new(plan_id: EntityId, index: u32, description: impl Into<String>) -> Self {
        Self {
            id: new_entity_id(),
            plan_id,
            index,
            description: description.into(),
            agent_id: None,
            handoff_context: None,
            status: StepStatus::Pending,
            attempts: 0,
        }
    }
}

/// An ordered decomposition of a task into steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    /// Unique identifier for this plan.
    pub id: EntityId,
    /// Task this plan decomposes.
    pub task_id: EntityId,
    /// Ordered steps.
    pub steps: Vec<PlanStep>,
    /// Current status.
    pub status: PlanStatus,
}

impl Plan {
    /// Create a plan from ordered step descriptions.
    pub fn new(task_id: EntityId, descriptions: &[&str]) -> Self {
        let id = new_entity_id();
        let steps = descriptions
            .iter()
            .enumerate()
            .map(|(i, d)| PlanStep::new(id, i as u32, *d))
            .collect();
        Self {
            id,
            task_id,
            steps,
            status: PlanStatus::Created,
        }
    }
}

// ============================================================================
// EXPERIENCE ENTRY
// ============================================================================

/// A cached prior run outcome keyed by task similarity.
///
/// Pure acceleration structure: never authoritative for run state, and
/// mutated only through [`ExperienceEntry::record_hit`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperienceEntry {
    /// Description of the task that produced this outcome.
    pub task_description: String,
    /// Embedding of the task description, used for similarity lookup.
    pub task_embedding: EmbeddingVector,
    /// Output the prior run produced.
    pub result_output: String,
    /// Cost of the prior run in USD.
    pub result_cost: f64,
    /// Terminal status of the prior run.
    pub result_status: TaskStatus,
    /// Run that produced this outcome.
    pub run_id: EntityId,
    /// Confidence that reuse is appropriate, 0.0 to 1.0.
    pub confidence: f32,
    /// Times this entry has been reused.
    pub hit_count: u64,
    /// When this entry was last reused.
    pub last_used_at: Timestamp,
}

impl ExperienceEntry {
    /// Record a reuse of this entry.
    pub fn record_hit(&mut self) {
        self.hit_count += 1;
        self.last_used_at = Utc::now();
    }
}

// ============================================================================
// REVIEW DECISION
// ============================================================================

/// Whether a step needs moderated review, computed fresh on each evaluation.
/// Never stored; advisory input to the feedback gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewDecision {
    /// Whether human review is needed at all.
    pub needs_review: bool,
    /// Confidence in the automated outcome, 0.0 to 1.0.
    pub confidence: f32,
    /// Human-readable reason for the decision.
    pub reason: String,
    /// Reviewers suggested for this step, most relevant first.
    pub suggested_reviewers: Vec<String>,
}

// =============================================================================
// TESTS
// =============================================================================
