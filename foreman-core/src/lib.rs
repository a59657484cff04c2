//! FOREMAN Core - Entity Types
//!
//! Pure data structures shared by every other crate in the workspace:
//! events, tasks, plans, handoffs, feedback records, experience entries,
//! configuration, and the error taxonomy. No business logic lives here;
//! the fold/reducer and all side-effecting components build on these types.

mod config;
mod embedding;
mod entities;
mod error;
mod event;
mod feedback;
mod handoff;
mod identity;
mod notify;
mod sealing;

pub use config::{DenyPolicy, EngineConfig, SensitivePolicy, ToolPolicy};
pub use embedding::EmbeddingVector;
pub use entities::{
    ExperienceEntry, Plan, PlanStatus, PlanStep, ReviewDecision, StepStatus, Task, TaskStatus,
};
pub use error::{
    ConfigError, CryptoError, DispatchError, EventLogError, FeedbackError, ForemanError,
    ForemanResult, ResilienceError, ValidationError,
};
pub use event::{AgentEvent, AgentEventBuilder, EventKind};
pub use feedback::{AuditEntry, FeedbackDecision, FeedbackRequest, FeedbackResult};
pub use handoff::HandoffMessage;
pub use identity::{compute_content_hash, new_entity_id, ContentHash, EntityId, Timestamp};
pub use notify::Notifier;
pub use sealing::{open_sealed, seal, SealingKey, NONCE_LEN};
