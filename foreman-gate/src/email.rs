//! Email-style feedback provider.
//!
//! The provider sends one message containing explicit approve/deny callback
//! links and then waits on a [`DecisionInbox`] for the human's click to be
//! delivered back (by whatever transport terminates the callback URL). The
//! notifier send passes through a circuit breaker keyed to the channel.

use crate::FeedbackProvider;
use async_trait::async_trait;
use foreman_core::{
    EntityId, FeedbackDecision, FeedbackError, FeedbackRequest, FeedbackResult, ForemanResult,
    Notifier,
};
use foreman_resilience::{BreakerConfig, BreakerError, CircuitBreaker};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};

// ============================================================================
// DECISION INBOX
// ============================================================================

/// Rendezvous between a waiting provider and an arriving callback.
///
/// One pending slot per `(run_id, call_id)`; resolving a call with no
/// waiter is a no-op that reports `false` (the waiter timed out or the
/// link was clicked twice).
#[derive(Default)]
pub struct DecisionInbox {
    pending: Mutex<HashMap<(EntityId, EntityId), oneshot::Sender<(FeedbackDecision, String)>>>,
}

impl DecisionInbox {
    /// Create an empty inbox.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a waiter for a pending call. A second registration for the
    /// same call replaces the first, whose receiver then resolves as closed.
    pub async fn register(
        &self,
        run_id: EntityId,
        call_id: EntityId,
    ) -> oneshot::Receiver<(FeedbackDecision, String)> {
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert((run_id, call_id), tx);
        rx
    }

    /// Deliver a decision to the waiter for a call.
    ///
    /// Returns `true` when a waiter received it.
    pub async fn resolve(
        &self,
        run_id: EntityId,
        call_id: EntityId,
        decision: FeedbackDecision,
        responder: impl Into<String>,
    ) -> bool {
        match self.pending.lock().await.remove(&(run_id, call_id)) {
            Some(tx) => tx.send((decision, responder.into())).is_ok(),
            None => false,
        }
    }

    /// Drop the waiter for a call without resolving it.
    pub async fn forget(&self, run_id: EntityId, call_id: EntityId) {
        self.pending.lock().await.remove(&(run_id, call_id));
    }
}

// ============================================================================
// EMAIL PROVIDER
// ============================================================================

/// Feedback provider that emails approve/deny callback links.
pub struct EmailFeedbackProvider {
    notifier: Arc<dyn Notifier>,
    inbox: Arc<DecisionInbox>,
    recipient: String,
    callback_base: String,
    decision_window: Duration,
    breaker: CircuitBreaker,
}

impl EmailFeedbackProvider {
    /// Create a provider sending to one recipient.
    ///
    /// `callback_base` is the URL prefix the approve/deny links are built
    /// under; the transport terminating those links feeds the inbox.
    pub fn new(
        notifier: Arc<dyn Notifier>,
        inbox: Arc<DecisionInbox>,
        recipient: impl Into<String>,
        callback_base: impl Into<String>,
    ) -> Self {
        let notifier_name = format!("notifier:{}", notifier.name());
        Self {
            notifier,
            inbox,
            recipient: recipient.into(),
            callback_base: callback_base.into(),
            decision_window: Duration::from_secs(300),
            breaker: CircuitBreaker::new(notifier_name, BreakerConfig::default()),
        }
    }

    /// Set how long to wait for the human decision.
    pub fn with_decision_window(mut self, window: Duration) -> Self {
        self.decision_window = window;
        self
    }

    /// Set the breaker configuration for the notifier send.
    pub fn with_breaker(mut self, config: BreakerConfig) -> Self {
        self.breaker = CircuitBreaker::new(self.breaker.dependency().to_string(), config);
        self
    }

    fn body_for(&self, request: &FeedbackRequest) -> String {
        let base = format!(
            "{}/{}/{}",
            self.callback_base.trim_end_matches('/'),
            request.run_id,
            request.call_id
        );
        let path = request.path.as_deref().unwrap_or("-");
        format!(
            "<html><body>\
             <p>An agent wants to run a sensitive tool call.</p>\
             <table>\
             <tr><td>Tool</td><td><code>{}</code></td></tr>\
             <tr><td>Command</td><td><code>{}</code></td></tr>\
             <tr><td>Path</td><td><code>{}</code></td></tr>\
             </table>\
             <p><a href=\"{base}?decision=allow\">Approve</a> | \
             <a href=\"{base}?decision=deny\">Deny</a></p>\
             </body></html>",
            request.tool, request.command, path
        )
    }
}

#[async_trait]
impl FeedbackProvider for EmailFeedbackProvider {
    fn name(&self) -> &str {
        "email"
    }

    async fn request_feedback(&self, request: &FeedbackRequest) -> ForemanResult<FeedbackResult> {
        let rx = self.inbox.register(request.run_id, request.call_id).await;

        let subject = format!("Approval needed: {} ({})", request.tool, request.command);
        let body = self.body_for(request);
        let send = self
            .breaker
            .call_async(self.notifier.send(&self.recipient, &subject, &body))
            .await;
        if let Err(e) = send {
            self.inbox.forget(request.run_id, request.call_id).await;
            return Err(match e {
                BreakerError::Open => self.breaker.open_error().into(),
                BreakerError::Inner(inner) => FeedbackError::Unavailable {
                    provider: self.name().to_string(),
                    reason: inner.to_string(),
                }
                .into(),
            });
        }

        match tokio::time::timeout(self.decision_window, rx).await {
            Ok(Ok((decision, responder))) => Ok(FeedbackResult {
                decision,
                responder,
                provider: self.name().to_string(),
            }),
            // Sender dropped: a later registration displaced this waiter.
            Ok(Err(_)) | Err(_) => {
                self.inbox.forget(request.run_id, request.call_id).await;
                Err(FeedbackError::Timeout {
                    run_id: request.run_id,
                    call_id: request.call_id,
                }
                .into())
            }
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
