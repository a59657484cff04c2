//! FOREMAN Gate - Human-in-the-Loop Approval
//!
//! Sensitive tool calls pause until a human decides. This crate holds the
//! provider seam (how a decision is collected), the email-style provider
//! with approve/deny callback links, the gate itself (provider fallback
//! chain, exactly-one decision per call, non-repudiable audit), and the
//! advisory review-routing policy.

mod email;
mod gate;
mod provider;
mod review;

pub use email::{DecisionInbox, EmailFeedbackProvider};
pub use gate::{AuditStore, FeedbackGate, InMemoryAuditStore};
pub use provider::FeedbackProvider;
pub use review::ReviewPolicy;
