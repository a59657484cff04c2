//! FOREMAN Dispatch - Backend Routing and Publish
//!
//! Routes a task to a capability-matched worker backend and publishes it
//! asynchronously. Dispatch is fire-and-forget: a successful `dispatch`
//! means the task was enqueued, and the eventual result arrives later as
//! an event carrying the originating task/run identifiers. Out-of-order
//! and duplicate result delivery are expected; the engine deduplicates by
//! `request_id`.
//!
//! Registries are owned values injected at construction, not process-wide
//! globals; registration happens once at startup and duplicate names fail
//! fast there rather than at request time.

mod backend;
mod capabilities;
mod dispatcher;
mod publisher;
mod registry;

pub use backend::Backend;
pub use capabilities::Capabilities;
pub use dispatcher::{CancelSignal, DispatchConfig, Dispatcher};
pub use publisher::{Publisher, RecordingPublisher};
pub use registry::{
    BackendRegistry, ExternalProvider, Factory, FactoryRegistry, NotifierRegistry,
    ProviderRegistry,
};
