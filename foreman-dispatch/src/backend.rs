//! Backend adapter trait.

use crate::Capabilities;
use async_trait::async_trait;
use foreman_core::{EntityId, ForemanResult, Task};

/// A worker backend that executes tasks out of process.
///
/// `execute` returning `Ok(())` signals asynchronous completion: the task
/// was enqueued, and its results arrive later as events. An error means
/// the dispatch attempt itself could not be enqueued.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Registered name of this backend.
    fn name(&self) -> &str;

    /// Fixed capability set advertised at registration time.
    fn capabilities(&self) -> Capabilities;

    /// Enqueue a task for execution.
    async fn execute(&self, task: &Task) -> ForemanResult<()>;

    /// Best-effort cancellation. Backends are not required to stop
    /// immediately, only to stop producing further results after
    /// acknowledging the signal.
    async fn stop(&self, task_id: EntityId) -> ForemanResult<()>;
}
