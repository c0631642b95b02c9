//! Domain layer - snapshots, change detection and notification policy

pub mod change;
pub mod policy;
pub mod product;

pub use change::{detect_changes, ChangeEvent, ChangeKind};
pub use policy::{NotificationPolicy, RunConfig, RunMode};
pub use product::{ProductSnapshot, SnapshotSet, StockStatus};
