//! Two-level cache: fast in-process tier backed by a shared remote tier.
//!
//! Reads check the fast tier first, fall through to the shared tier on
//! miss, and backfill the fast tier with a shorter expiry on a shared-tier
//! hit. Backfill is best-effort: a fast-tier write failure is logged and
//! the shared-tier value is still returned. Writes and deletes apply to
//! both tiers; the shared tier is written
//! only after the fast tier succeeds, so a fast-tier failure aborts the
//! write rather than leaving the tiers inconsistent.

use async_trait::async_trait;
use foreman_core::ForemanResult;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

// ============================================================================
// TIER TRAIT
// ============================================================================

/// One cache tier. Implementations must be safe for concurrent access;
/// keys are partitioned so no cross-key coordination is required.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Name of this tier, for logs and errors.
    fn name(&self) -> &str;

    /// Get a value, or None on miss or expiry.
    async fn get(&self, key: &str) -> ForemanResult<Option<Vec<u8>>>;

    /// Put a value with an optional time-to-live.
    async fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> ForemanResult<()>;

    /// Delete a value. Deleting a nonexistent key is a no-op.
    async fn delete(&self, key: &str) -> ForemanResult<()>;
}

// ============================================================================
// IN-MEMORY TIER
// ============================================================================

/// In-process tier backed by a mutex-guarded map with per-entry expiry.
pub struct MemoryTier {
    name: String,
    entries: Mutex<HashMap<String, (Vec<u8>, Option<Instant>)>>,
}

impl MemoryTier {
    /// Create a named in-memory tier.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> &str {
        &self.name
    }

    async fn get(&self, key: &str) -> ForemanResult<Option<Vec<u8>>> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((_, Some(expires_at))) if *expires_at <= Instant::now() => {
                entries.remove(key);
                Ok(None)
            }
            Some((value, _)) => Ok(Some(value.clone())),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, value: &[u8], ttl: Option<Duration>) -> ForemanResult<()> {
        let expires_at = ttl.map(|ttl| Instant::now() + ttl);
        self.entries
            .lock()
            .await
            .insert(key.to_string(), (value.to_vec(), expires_at));
        Ok(())
    }

    async fn delete(&self, key: &str) -> ForemanResult<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}

// ============================================================================
// TIERED CACHE
// ============================================================================

/// Configuration for the tiered composition.
#[derive(Debug, Clone)]
pub struct TieredCacheConfig {
    /// Expiry for fast-tier entries backfilled from a shared-tier hit.
    /// Kept shorter than the shared expiry so the fast tier re-validates.
    pub backfill_ttl: Duration,
    /// TTL applied to writes on both tiers, if any.
    pub write_ttl: Option<Duration>,
}

impl Default for TieredCacheConfig {
    fn default() -> Self {
        Self {
            backfill_ttl: Duration::from_secs(60),
            write_ttl: Some(Duration::from_secs(3600)),
        }
    }
}

impl TieredCacheConfig {
    /// Create a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the backfill expiry.
    pub fn with_backfill_ttl(mut self, ttl: Duration) -> Self {
        self.backfill_ttl = ttl;
        self
    }

    /// Set the write TTL.
    pub fn with_write_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.write_ttl = ttl;
        self
    }
}

/// Fast tier composed over a shared tier with read-through backfill.
pub struct TieredCache {
    fast: Arc<dyn CacheTier>,
    shared: Arc<dyn CacheTier>,
    config: TieredCacheConfig,
}

impl TieredCache {
    /// Compose a fast tier over a shared tier.
    pub fn new(
        fast: Arc<dyn CacheTier>,
        shared: Arc<dyn CacheTier>,
        config: TieredCacheConfig,
    ) -> Self {
        Self {
            fast,
            shared,
            config,
        }
    }

    /// Read a value: fast tier, then shared tier with fast backfill.
    pub async fn get(&self, key: &str) -> ForemanResult<Option<Vec<u8>>> {
        if let Some(value) = self.fast.get(key).await? {
            return Ok(Some(value));
        }

        match self.shared.get(key).await? {
            Some(value) => {
                // Backfill is an optimization; a fast-tier write failure must
                // not turn a successful shared-tier read into an error.
                match self
                    .fast
                    .put(key, &value, Some(self.config.backfill_ttl))
                    .await
                {
                    Ok(()) => tracing::trace!(
                        key,
                        tier = self.shared.name(),
                        "shared-tier hit, fast tier backfilled"
                    ),
                    Err(e) => tracing::warn!(
                        key,
                        tier = self.fast.name(),
                        error = %e,
                        "fast-tier backfill failed, serving shared-tier value"
                    ),
                }
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    /// Write a value to both tiers. The fast tier is written first; if it
    /// fails, the shared tier is not touched.
    pub async fn put(&self, key: &str, value: &[u8]) -> ForemanResult<()> {
        self.fast.put(key, value, self.config.write_ttl).await?;
        self.shared.put(key, value, self.config.write_ttl).await
    }

    /// Delete a value from both tiers.
    pub async fn delete(&self, key: &str) -> ForemanResult<()> {
        self.fast.delete(key).await?;
        self.shared.delete(key).await
    }
}

// =============================================================================
// TESTS
// =============================================================================
