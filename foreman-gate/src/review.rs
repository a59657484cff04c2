//! Confidence-based review routing.
//!
//! Evaluated fresh for each step before any approval request is issued.
//! The output is advisory input to the gate, never a substitute for it:
//! a step the policy waves through can still hit the gate when its tool
//! call is sensitive.

use foreman_core::{ReviewDecision, ToolPolicy};
use std::sync::Arc;

/// Decides whether a step needs moderated review and who should look.
pub struct ReviewPolicy {
    tool_policy: Arc<dyn ToolPolicy>,
    confidence_threshold: f32,
    reviewers: Vec<String>,
}

impl ReviewPolicy {
    /// Create a policy over a tool classification, threshold 0.8, no roster.
    pub fn new(tool_policy: Arc<dyn ToolPolicy>) -> Self {
        Self {
            tool_policy,
            confidence_threshold: 0.8,
            reviewers: Vec::new(),
        }
    }

    /// Set the confidence below which review is required.
    pub fn with_confidence_threshold(mut self, threshold: f32) -> Self {
        self.confidence_threshold = threshold;
        self
    }

    /// Set the reviewer roster, most relevant first.
    pub fn with_reviewers<I, S>(mut self, reviewers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.reviewers = reviewers.into_iter().map(Into::into).collect();
        self
    }

    /// Evaluate one step. Never stored; callers re-evaluate each time.
    pub fn evaluate(&self, tool: &str, confidence: f32) -> ReviewDecision {
        let sensitive = self.tool_policy.is_sensitive(tool);
        let below_threshold = confidence < self.confidence_threshold;
        let needs_review = sensitive || below_threshold;

        let reason = if sensitive {
            format!("tool '{tool}' is classified sensitive")
        } else if below_threshold {
            format!(
                "confidence {confidence:.2} below threshold {:.2}",
                self.confidence_threshold
            )
        } else {
            format!("confidence {confidence:.2} meets threshold, tool '{tool}' unrestricted")
        };

        ReviewDecision {
            needs_review,
            confidence,
            reason,
            suggested_reviewers: if needs_review {
                self.reviewers.clone()
            } else {
                Vec::new()
            },
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
