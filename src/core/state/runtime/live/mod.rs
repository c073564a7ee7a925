pub mod live_snapshot_repository;
pub mod live_snapshot_repository_trait;
pub mod live_snapshot_state;
