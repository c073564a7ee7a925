pub mod retention_store;
pub mod snapshot_diff;

pub use retention_store::{RetainedSnapshot, RetentionStore};
pub use snapshot_diff::{diff, SnapshotDiff};
