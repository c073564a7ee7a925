use std::sync::Arc;
use async_trait::async_trait;

use crate::core::state::runtime::live::live_snapshot_state::LiveSnapshotState;

/// Shared access to the latest snapshots of one engine.
#[async_trait]
pub trait LiveSnapshotRepositoryTrait: Send + Sync {
    /// Current state, without cloning the snapshots.
    async fn get(&self) -> Arc<LiveSnapshotState>;

    /// Apply `f` to a copy of the state and publish the copy.
    ///
    /// Returns the published state, so a writer can read back exactly what
    /// it stored even if another writer follows immediately.
    async fn update<F>(&self, f: F) -> Arc<LiveSnapshotState>
    where
        F: FnOnce(&mut LiveSnapshotState) + Send + Sync;
}
