//! ASIN tracker - detects discount and stock changes for tracked Amazon products
//! and announces them on social channels

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod shared;

// Re-export main types for convenience
pub use application::{NotificationDispatcher, RunOrchestrator, RunState, RunSummary};
pub use domain::{detect_changes, ChangeEvent, ChangeKind, NotificationPolicy, RunConfig, RunMode};
pub use domain::{ProductSnapshot, SnapshotSet, StockStatus};
pub use infrastructure::{CatalogStore, JsonFileStateStore, ProductFetcher, StateStore};
pub use shared::errors::TrackerError;
