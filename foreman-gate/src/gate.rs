//! The feedback gate: provider fallback chain, exactly-one decision per
//! call, and non-repudiable audit.
//!
//! A decision exists if and only if its audit entry exists: the audit
//! write happens before the decision becomes visible, under one lock, so
//! no path can observe a decision that is not on record.

use crate::FeedbackProvider;
use async_trait::async_trait;
use chrono::Utc;
use foreman_core::{
    seal, AuditEntry, EntityId, FeedbackDecision, FeedbackRequest, FeedbackResult, ForemanResult,
    SealingKey,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;

// ============================================================================
// AUDIT STORE
// ============================================================================

/// Durable store for feedback audit entries.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// Persist one entry.
    async fn record(&self, entry: AuditEntry) -> ForemanResult<()>;

    /// All entries for a run, oldest first. Empty when none.
    async fn for_run(&self, run_id: EntityId) -> ForemanResult<Vec<AuditEntry>>;
}

/// In-memory audit store for tests and single-process deployments.
#[derive(Default)]
pub struct InMemoryAuditStore {
    entries: Mutex<Vec<AuditEntry>>,
}

impl InMemoryAuditStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// All entries recorded so far, in order.
    pub async fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().await.clone()
    }
}

#[async_trait]
impl AuditStore for InMemoryAuditStore {
    async fn record(&self, entry: AuditEntry) -> ForemanResult<()> {
        self.entries.lock().await.push(entry);
        Ok(())
    }

    async fn for_run(&self, run_id: EntityId) -> ForemanResult<Vec<AuditEntry>> {
        Ok(self
            .entries
            .lock()
            .await
            .iter()
            .filter(|e| e.run_id == run_id)
            .cloned()
            .collect())
    }
}

// ============================================================================
// FEEDBACK GATE
// ============================================================================

/// Responder identity recorded when every provider failed and the default
/// policy decided instead of a human.
const DEFAULT_POLICY_RESPONDER: &str = "policy:default-deny";

/// Gate collecting exactly one terminal decision per `(run_id, call_id)`.
///
/// Providers are tried in order; the first that returns a decision wins.
/// When all providers fail the gate denies by default rather than blocking
/// the run indefinitely. Either way the decision is audited.
pub struct FeedbackGate {
    providers: Vec<Arc<dyn FeedbackProvider>>,
    audit: Arc<dyn AuditStore>,
    decisions: Mutex<HashMap<(EntityId, EntityId), FeedbackResult>>,
    sealing_key: Option<SealingKey>,
}

impl FeedbackGate {
    /// Create a gate over an ordered provider chain.
    pub fn new(providers: Vec<Arc<dyn FeedbackProvider>>, audit: Arc<dyn AuditStore>) -> Self {
        Self {
            providers,
            audit,
            decisions: Mutex::new(HashMap::new()),
            sealing_key: None,
        }
    }

    /// Seal the raw command into each audit entry with this key.
    pub fn with_sealing_key(mut self, key: SealingKey) -> Self {
        self.sealing_key = Some(key);
        self
    }

    /// Collect (or return the already-recorded) decision for a tool call.
    pub async fn request_feedback(
        &self,
        request: &FeedbackRequest,
    ) -> ForemanResult<FeedbackResult> {
        let call = (request.run_id, request.call_id);
        if let Some(existing) = self.decisions.lock().await.get(&call) {
            return Ok(existing.clone());
        }

        let started = Instant::now();
        for provider in &self.providers {
            match provider.request_feedback(request).await {
                Ok(result) => return self.record(request, result, started).await,
                Err(e) => {
                    tracing::warn!(
                        provider = provider.name(),
                        run_id = %request.run_id,
                        call_id = %request.call_id,
                        error = %e,
                        "feedback provider failed, escalating"
                    );
                }
            }
        }

        tracing::warn!(
            run_id = %request.run_id,
            call_id = %request.call_id,
            "all feedback providers failed, applying default deny"
        );
        let fallback = FeedbackResult {
            decision: FeedbackDecision::Deny,
            responder: DEFAULT_POLICY_RESPONDER.to_string(),
            provider: "policy".to_string(),
        };
        self.record(request, fallback, started).await
    }

    /// Record a decision and its audit entry as one step.
    ///
    /// Re-checks for an existing decision under the lock, so two racing
    /// requests for the same call cannot both write an audit entry.
    async fn record(
        &self,
        request: &FeedbackRequest,
        result: FeedbackResult,
        started: Instant,
    ) -> ForemanResult<FeedbackResult> {
        let call = (request.run_id, request.call_id);
        let mut decisions = self.decisions.lock().await;
        if let Some(existing) = decisions.get(&call) {
            return Ok(existing.clone());
        }

        let latency_ms = started.elapsed().as_millis() as i64;
        let mut entry = AuditEntry::from_decision(request, &result, latency_ms, Utc::now());
        if let Some(key) = &self.sealing_key {
            entry.sealed_command = Some(seal(key, request.command.as_bytes())?);
        }

        // Audit first: a decision without an audit entry must not exist.
        self.audit.record(entry).await?;
        decisions.insert(call, result.clone());

        tracing::info!(
            run_id = %request.run_id,
            call_id = %request.call_id,
            decision = %result.decision,
            responder = %result.responder,
            provider = %result.provider,
            latency_ms,
            "feedback decision recorded"
        );
        Ok(result)
    }
}

// =============================================================================
// TESTS
// =============================================================================
