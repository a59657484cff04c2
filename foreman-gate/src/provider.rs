//! Feedback provider seam.

use async_trait::async_trait;
use foreman_core::{FeedbackRequest, FeedbackResult, ForemanResult};

/// One channel through which a human decision can be collected.
///
/// A provider either returns a terminal [`FeedbackResult`] or an error;
/// on error the gate escalates to the next configured provider. A provider
/// must never fabricate a decision: "could not deliver" is an error, not a
/// deny.
#[async_trait]
pub trait FeedbackProvider: Send + Sync {
    /// Registered name of this provider, recorded in audit entries.
    fn name(&self) -> &str;

    /// Collect a decision for a pending tool call.
    ///
    /// May block for the duration of one notification send plus however
    /// long this channel waits for the decision to arrive.
    ///
    /// # Errors
    ///
    /// Returns [`foreman_core::FeedbackError::Unavailable`] when the
    /// underlying transport cannot deliver, and
    /// [`foreman_core::FeedbackError::Timeout`] when no decision arrived
    /// within the channel's window.
    async fn request_feedback(&self, request: &FeedbackRequest) -> ForemanResult<FeedbackResult>;
}
