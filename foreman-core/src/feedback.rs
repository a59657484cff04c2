//! Human feedback types: approval requests, decisions, and audit entries.
//!
//! Exactly one terminal [`FeedbackResult`] exists per `(run_id, call_id)`;
//! every decision is durably recorded as an [`AuditEntry`] regardless of
//! which channel collected it. The audit entry is the only place a human's
//! identity attaches to an automated run.

use crate::{new_entity_id, EntityId, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A request for human approval of a specific tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRequest {
    /// Run the tool call belongs to.
    pub run_id: EntityId,
    /// Identifier of the pending tool call.
    pub call_id: EntityId,
    /// Tool being invoked.
    pub tool: String,
    /// Command or argument string the tool will execute.
    pub command: String,
    /// Path the tool will touch, when applicable.
    pub path: Option<String>,
}

/// Terminal decision for a pending tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackDecision {
    /// The tool call may proceed.
    Allow,
    /// The tool call must not proceed.
    Deny,
}

impl fmt::Display for FeedbackDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeedbackDecision::Allow => write!(f, "allow"),
            FeedbackDecision::Deny => write!(f, "deny"),
        }
    }
}

/// The outcome of a feedback request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackResult {
    /// The decision taken.
    pub decision: FeedbackDecision,
    /// Identity of the human who responded, or the policy that decided.
    pub responder: String,
    /// Channel provider that collected the decision.
    pub provider: String,
}

/// Durable, non-repudiable record of one feedback decision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Unique identifier for this entry.
    pub id: EntityId,
    /// Run the decision applies to.
    pub run_id: EntityId,
    /// Tool call the decision applies to.
    pub call_id: EntityId,
    /// Tool that was gated.
    pub tool: String,
    /// The decision taken.
    pub decision: FeedbackDecision,
    /// Identity of the responder.
    pub responder: String,
    /// Channel provider that collected the decision.
    pub provider: String,
    /// Time from request to decision, in milliseconds.
    pub latency_ms: i64,
    /// When the entry was recorded.
    pub created_at: Timestamp,
    /// Raw command, sealed with the audit key (nonce || ciphertext).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sealed_command: Option<Vec<u8>>,
}

impl AuditEntry {
    /// Build an audit entry from a request and its result.
    pub fn from_decision(
        request: &FeedbackRequest,
        result: &FeedbackResult,
        latency_ms: i64,
        created_at: Timestamp,
    ) -> Self {
        Self {
            id: new_entity_id(),
            run_id: request.run_id,
            call_id: request.call_id,
            tool: request.tool.clone(),
            decision: result.decision,
            responder: result.responder.clone(),
            provider: result.provider.clone(),
            latency_ms,
            created_at,
            sealed_command: None,
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
