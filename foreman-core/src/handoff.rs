//! Handoff messages: explicit transfer of control between two agents.
//!
//! A handoff is validated before any event is emitted or any dispatch is
//! attempted. A message with a missing source, target, or context never
//! reaches the log.

use crate::{EntityId, ForemanResult, ValidationError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Explicit transfer of execution context from one agent to another.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandoffMessage {
    /// Agent handing off.
    pub source_agent_id: String,
    /// Agent taking over.
    pub target_agent_id: String,
    /// Mode the target agent should run in, if any.
    pub target_mode_id: Option<String>,
    /// Context the target needs to continue the work.
    pub context: String,
    /// Artifacts carried across the handoff.
    pub artifacts: Vec<EntityId>,
    /// Plan this handoff belongs to, when step-scoped.
    pub plan_id: Option<EntityId>,
    /// Step this handoff belongs to, when step-scoped.
    pub step_id: Option<EntityId>,
    /// Free-form metadata.
    pub metadata: HashMap<String, String>,
}

impl HandoffMessage {
    /// Create a handoff with the three required fields.
    pub fn new(
        source_agent_id: impl Into<String>,
        target_agent_id: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            source_agent_id: source_agent_id.into(),
            target_agent_id: target_agent_id.into(),
            target_mode_id: None,
            context: context.into(),
            artifacts: Vec::new(),
            plan_id: None,
            step_id: None,
            metadata: HashMap::new(),
        }
    }

    /// Scope the handoff to a plan step.
    pub fn with_step(mut self, plan_id: EntityId, step_id: EntityId) -> Self {
        self.plan_id = Some(plan_id);
        self.step_id = Some(step_id);
        self
    }

    /// Attach artifacts.
    pub fn with_artifacts(mut self, artifacts: Vec<EntityId>) -> Self {
        self.artifacts = artifacts;
        self
    }

    /// Validate the handoff invariant: source, target, and context must all
    /// be non-empty.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::RequiredFieldMissing`] naming the first
    /// missing field.
    pub fn validate(&self) -> ForemanResult<()> {
        if self.source_agent_id.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "source_agent_id".to_string(),
            }
            .into());
        }
        if self.target_agent_id.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "target_agent_id".to_string(),
            }
            .into());
        }
        if self.context.trim().is_empty() {
            return Err(ValidationError::RequiredFieldMissing {
                field: "context".to_string(),
            }
            .into());
        }
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
