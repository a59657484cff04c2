//! FOREMAN Engine - Run/Plan State Machine
//!
//! The top-level coordinator: consumes events, folds them into derived run
//! state with a pure reducer, and performs the resulting side effects
//! (dispatch, feedback gating). The event sequence is the only durable
//! source of truth; everything here is rebuildable from it.

mod engine;
mod experience;
mod reducer;
mod state;

pub use engine::Engine;
pub use experience::ExperienceStore;
pub use reducer::Reducer;
pub use state::{PlanState, RunState, RunStatus, StepState};
