//! Application layer - message formatting, delivery and the run state machine

pub mod dispatcher;
pub mod message;
pub mod orchestrator;
pub mod report;

pub use dispatcher::{DispatchSettings, EventDelivery, NotificationDispatcher};
pub use message::MessageFormatter;
pub use orchestrator::{RunOrchestrator, RunState};
pub use report::RunSummary;
