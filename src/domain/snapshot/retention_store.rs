use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::debug;

use crate::domain::model::PodModel;
use crate::domain::snapshot::snapshot_diff::{diff, SnapshotDiff};

/// A user-pinned copy of the pod view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetainedSnapshot {
    pub pods: Vec<PodModel>,
    pub captured_at: DateTime<Utc>,
}

/// Holds at most one pinned pod snapshot.
///
/// The pinned slice is owned here; refresh cycles never see it.
#[derive(Debug, Default)]
pub struct RetentionStore {
    pinned: RwLock<Option<Arc<RetainedSnapshot>>>,
}

impl RetentionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deep-copy `current` and keep it, replacing any earlier pin.
    pub async fn pin(&self, current: &[PodModel]) -> DateTime<Utc> {
        let snapshot = RetainedSnapshot {
            pods: current.to_vec(),
            captured_at: Utc::now(),
        };
        let captured_at = snapshot.captured_at;

        let mut guard = self.pinned.write().await;
        *guard = Some(Arc::new(snapshot));
        debug!("Pinned {} pods at {}", current.len(), captured_at);
        captured_at
    }

    /// Drop the pinned snapshot. Returns whether one was held.
    pub async fn clear(&self) -> bool {
        self.pinned.write().await.take().is_some()
    }

    /// A copy of the pinned snapshot, if any.
    pub async fn pinned(&self) -> Option<RetainedSnapshot> {
        self.pinned
            .read()
            .await
            .as_ref()
            .map(|s| RetainedSnapshot::clone(s))
    }

    pub async fn captured_at(&self) -> Option<DateTime<Utc>> {
        self.pinned.read().await.as_ref().map(|s| s.captured_at)
    }

    /// Compare the pinned snapshot with `current`. `None` when nothing is pinned.
    pub async fn diff_against(&self, current: &[PodModel]) -> Option<SnapshotDiff> {
        let pinned = self.pinned.read().await.clone()?;
        Some(diff(&pinned.pods, current))
    }
}
