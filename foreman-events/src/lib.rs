//! FOREMAN Events - Append-Only Event Log
//!
//! This crate defines the [`EventLog`] trait: the append-only, per-run
//! ordered event sequence that is the source of truth for run state. It
//! provides the contract plus an in-memory implementation; persistent
//! backends live behind the same trait.
//!
//! # Guarantees
//!
//! - Append is atomic and strictly ordered per run: no two appends for the
//!   same run receive the same sequence number.
//! - Reads only observe acknowledged appends; there are no dirty reads of
//!   partially written events.
//! - Audit queries are cursor-paginated over a stable key, so pages do not
//!   shift under concurrent appends.
//!
//! Replay (`ReplayRequest`) reconstructs a bounded event window; the fold
//! that re-derives run state from that window lives in `foreman-engine`.

mod log;
mod memory;

pub use log::{AuditFilter, AuditPage, EventLog, ReplayRequest};
pub use memory::InMemoryEventLog;
