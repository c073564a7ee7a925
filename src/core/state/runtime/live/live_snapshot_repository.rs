use std::sync::Arc;
use tokio::sync::RwLock;

use crate::core::state::runtime::live::live_snapshot_repository_trait::LiveSnapshotRepositoryTrait;
use crate::core::state::runtime::live::live_snapshot_state::LiveSnapshotState;

/// Copy-on-write holder of the live snapshot. Readers get an `Arc` and never
/// alias the state a cycle is writing.
#[derive(Default)]
pub struct LiveSnapshotRepository {
    state: Arc<RwLock<Arc<LiveSnapshotState>>>,
}

impl LiveSnapshotRepository {
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(Arc::new(LiveSnapshotState::default()))),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}

#[async_trait::async_trait]
impl LiveSnapshotRepositoryTrait for LiveSnapshotRepository {
    async fn get(&self) -> Arc<LiveSnapshotState> {
        self.state.read().await.clone()
    }

    async fn update<F>(&self, f: F) -> Arc<LiveSnapshotState>
    where
        F: FnOnce(&mut LiveSnapshotState) + Send + Sync,
    {
        let mut guard = self.state.write().await;

        let mut next = (**guard).clone();
        f(&mut next);

        // Readers holding the old Arc keep their consistent view
        let published = Arc::new(next);
        *guard = published.clone();
        published
    }
}
