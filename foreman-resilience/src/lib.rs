//! FOREMAN Resilience - Circuit Breaking and Tiered Caching
//!
//! Every external-facing call in the engine (dispatch publish, notifier
//! send, remote cache read) passes through this layer:
//!
//! - [`CircuitBreaker`]: fail fast once a dependency crosses its failure
//!   threshold, with a single trial call after the open timeout.
//! - [`TieredCache`]: fast in-process tier backed by a shared remote tier,
//!   with read-through backfill.
//!
//! Breaker state is the only mutable shared state per external dependency;
//! cache tiers are key-partitioned and need no cross-key coordination.

mod breaker;
mod cache;

pub use breaker::{BreakerConfig, BreakerError, CircuitBreaker, CircuitState};
pub use cache::{CacheTier, MemoryTier, TieredCache, TieredCacheConfig};
