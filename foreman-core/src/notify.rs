//! Notification channel seam.
//!
//! Delivery mechanics (SMTP, chat webhooks) are external collaborators;
//! only the behavioral contract lives here. Concrete channels register in
//! the notifier registry and back the feedback gate's providers.

use crate::ForemanResult;
use async_trait::async_trait;

/// Abstract notification channel: e-mail, chat, webhook.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Registered name of this channel.
    fn name(&self) -> &str;

    /// Deliver a message to a recipient.
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> ForemanResult<()>;
}
