//! Event log trait and audit query types.

use async_trait::async_trait;
use foreman_core::{AgentEvent, EntityId, ForemanResult, Timestamp};
use serde::{Deserialize, Serialize};

// ============================================================================
// EVENT LOG TRAIT
// ============================================================================

/// The append-only event log.
///
/// Every other component only appends or reads; events are never mutated
/// or deleted once acknowledged.
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Append an event, assigning the next sequence number for its run.
    ///
    /// Returns the assigned sequence number. Atomic and strictly ordered
    /// per run.
    ///
    /// # Errors
    ///
    /// Returns [`foreman_core::EventLogError::WriteFailed`] when the
    /// backing store is unavailable; callers retry with backoff since a
    /// lost event breaks replay correctness.
    async fn append(&self, event: AgentEvent) -> ForemanResult<i64>;

    /// Read the ordered event sequence for a run, bounded by sequence
    /// number (inclusive on both ends when given).
    ///
    /// # Errors
    ///
    /// Returns [`foreman_core::EventLogError::NotFound`] when the run has
    /// no events at all.
    async fn read(
        &self,
        run_id: EntityId,
        from: Option<i64>,
        to: Option<i64>,
    ) -> ForemanResult<Vec<AgentEvent>>;

    /// Cursor-paginated audit query across runs.
    async fn audit(&self, filter: &AuditFilter) -> ForemanResult<AuditPage>;
}

// ============================================================================
// AUDIT QUERIES
// ============================================================================

/// Filter for audit queries. All criteria are optional and conjunctive.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AuditFilter {
    /// Restrict to one project.
    pub project_id: Option<EntityId>,
    /// Restrict to one run.
    pub run_id: Option<EntityId>,
    /// Restrict to one agent.
    pub agent_id: Option<String>,
    /// Restrict to one action, matched against the event kind string
    /// (e.g. `run.toolcall.denied`).
    pub action: Option<String>,
    /// Only events created strictly after this time.
    pub after: Option<Timestamp>,
    /// Only events created strictly before this time.
    pub before: Option<Timestamp>,
    /// Opaque cursor from a previous page.
    pub cursor: Option<String>,
    /// Page size. Zero means the default of 50.
    pub limit: usize,
}

impl AuditFilter {
    /// Create an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict to one project.
    pub fn with_project(mut self, project_id: EntityId) -> Self {
        self.project_id = Some(project_id);
        self
    }

    /// Restrict to one run.
    pub fn with_run(mut self, run_id: EntityId) -> Self {
        self.run_id = Some(run_id);
        self
    }

    /// Restrict to one agent.
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    /// Restrict to one action string.
    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    /// Set the page size.
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = limit;
        self
    }

    /// Continue from a previous page's cursor.
    pub fn with_cursor(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    /// Effective page size.
    pub fn effective_limit(&self) -> usize {
        if self.limit == 0 {
            50
        } else {
            self.limit
        }
    }
}

/// One page of audit results.
///
/// `cursor` keys the page by the last entry's event id, which is assigned
/// once and never changes, so concurrent appends (which always sort after
/// existing events) cannot shift earlier pages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditPage {
    /// Matching events, oldest first.
    pub entries: Vec<AgentEvent>,
    /// Cursor for the next page, when there is one.
    pub cursor: Option<String>,
    /// Whether more entries match beyond this page.
    pub has_more: bool,
    /// Total number of matching entries.
    pub total: u64,
}

// ============================================================================
// REPLAY
// ============================================================================

/// Request to reconstruct a bounded event window for a run.
///
/// When `dry_run` is false, replay re-drives the run state machine with
/// the same events to reproduce a deterministic end state; this is how
/// crash recovery and rewind are implemented.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplayRequest {
    /// Run to replay.
    pub run_id: EntityId,
    /// First sequence number to include (inclusive; None = from 0).
    pub from_event: Option<i64>,
    /// Last sequence number to include (inclusive; None = to the end).
    pub to_event: Option<i64>,
    /// When true, derive the state without touching materialized snapshots.
    pub dry_run: bool,
}

impl ReplayRequest {
    /// Replay the full event sequence for a run.
    pub fn full(run_id: EntityId) -> Self {
        Self {
            run_id,
            from_event: None,
            to_event: None,
            dry_run: false,
        }
    }

    /// Replay up to and including the given sequence number.
    pub fn until(run_id: EntityId, to_event: i64) -> Self {
        Self {
            run_id,
            from_event: None,
            to_event: Some(to_event),
            dry_run: false,
        }
    }

    /// Mark this replay as a dry run.
    pub fn dry(mut self) -> Self {
        self.dry_run = true;
        self
    }
}

// =============================================================================
// TESTS
// =============================================================================
