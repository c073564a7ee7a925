use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::domain::model::{PodKey, PodModel};

/// Pods that appeared and disappeared between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SnapshotDiff {
    /// In `current` but not in `pinned`, in `current` order.
    pub added: Vec<PodModel>,
    /// In `pinned` but not in `current`, in `pinned` order.
    pub removed: Vec<PodModel>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

fn absent_from(from: &[PodModel], other: &[PodModel]) -> Vec<PodModel> {
    let keys: HashSet<PodKey> = other.iter().map(PodModel::key).collect();
    from.iter()
        .filter(|p| !keys.contains(&p.key()))
        .cloned()
        .collect()
}

/// Symmetric difference keyed by namespace and name. Pure.
pub fn diff(pinned: &[PodModel], current: &[PodModel]) -> SnapshotDiff {
    SnapshotDiff {
        added: absent_from(current, pinned),
        removed: absent_from(pinned, current),
    }
}
