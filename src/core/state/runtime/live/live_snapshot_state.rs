use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::model::{ClusterSummary, NodeModel, PodModel};
use crate::domain::sort::{sort_nodes, sort_pods, NodeSortField, PodSortField};

/// The most recent snapshot of every view, held in memory only.
///
/// Replaced wholesale by each cycle; never merged with an older snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LiveSnapshotState {
    // ===== Snapshots =====
    pub nodes: Vec<NodeModel>,
    pub pods: Vec<PodModel>,
    pub summary: Option<ClusterSummary>,

    // ===== Presentation order =====
    pub node_sort: NodeSortField,
    pub pod_sort: PodSortField,

    /// Whether usage figures in the latest snapshot came from metrics.
    pub metrics_available: bool,

    // ===== Timestamps =====
    pub last_node_refresh_at: Option<DateTime<Utc>>,
    pub last_summary_refresh_at: Option<DateTime<Utc>>,
    pub last_error_at: Option<DateTime<Utc>>,

    pub last_error_message: Option<String>,
}

impl LiveSnapshotState {
    /// Replace the node and pod snapshots with one cycle's result.
    pub fn replace_nodes(
        &mut self,
        mut nodes: Vec<NodeModel>,
        mut pods: Vec<PodModel>,
        metrics_available: bool,
    ) {
        arrange_nodes(&mut nodes, self.node_sort);
        arrange_pods(&mut pods, self.pod_sort);
        self.nodes = nodes;
        self.pods = pods;
        self.metrics_available = metrics_available;
        self.last_node_refresh_at = Some(Utc::now());
        self.last_error_at = None;
        self.last_error_message = None;
    }

    pub fn replace_summary(&mut self, summary: ClusterSummary, metrics_available: bool) {
        self.summary = Some(summary);
        self.metrics_available = metrics_available;
        self.last_summary_refresh_at = Some(Utc::now());
    }

    /// Change the node order and re-sort the current snapshot.
    pub fn set_node_sort(&mut self, field: NodeSortField) {
        self.node_sort = field;
        arrange_nodes(&mut self.nodes, field);
    }

    pub fn set_pod_sort(&mut self, field: PodSortField) {
        self.pod_sort = field;
        arrange_pods(&mut self.pods, field);
    }

    /// Record a skipped cycle without touching the snapshots.
    pub fn mark_error(&mut self, msg: String) {
        self.last_error_message = Some(msg);
        self.last_error_at = Some(Utc::now());
    }

    /// Latest refresh of either cycle.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.last_node_refresh_at.max(self.last_summary_refresh_at)
    }
}

// Ties on the selected field fall back to the canonical order, whatever
// order the source listed the objects in.
fn arrange_nodes(nodes: &mut [NodeModel], field: NodeSortField) {
    sort_nodes(nodes, NodeSortField::Name);
    if field != NodeSortField::Name {
        sort_nodes(nodes, field);
    }
}

fn arrange_pods(pods: &mut [PodModel], field: PodSortField) {
    sort_pods(pods, PodSortField::Namespace);
    if field != PodSortField::Namespace {
        sort_pods(pods, field);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::pod_model;

    #[test]
    fn replace_applies_the_selected_order() {
        let mut state = LiveSnapshotState {
            pod_sort: PodSortField::Name,
            ..Default::default()
        };
        state.replace_nodes(
            Vec::new(),
            vec![pod_model("b", "2"), pod_model("a", "3"), pod_model("c", "1")],
            false,
        );

        let names: Vec<&str> = state.pods.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["1", "2", "3"]);
        assert!(state.last_node_refresh_at.is_some());
    }

    #[test]
    fn ties_order_the_same_after_resort_and_refresh() {
        let listed = || vec![pod_model("b", "x"), pod_model("a", "y"), pod_model("a", "w")];

        let mut state = LiveSnapshotState::default();
        state.replace_nodes(Vec::new(), listed(), false);
        state.set_pod_sort(PodSortField::Name);
        state.set_pod_sort(PodSortField::Status);
        let after_sort: Vec<String> = state.pods.iter().map(|p| p.key().to_string()).collect();

        state.replace_nodes(Vec::new(), listed(), false);
        let next: Vec<String> = state.pods.iter().map(|p| p.key().to_string()).collect();

        assert_eq!(after_sort, vec!["a/w", "a/y", "b/x"]);
        assert_eq!(after_sort, next);
    }

    #[test]
    fn error_keeps_previous_snapshot() {
        let mut state = LiveSnapshotState::default();
        state.replace_nodes(Vec::new(), vec![pod_model("a", "1")], true);
        state.mark_error("pods source unavailable".to_string());

        assert_eq!(state.pods.len(), 1);
        assert!(state.metrics_available);
        assert_eq!(
            state.last_error_message.as_deref(),
            Some("pods source unavailable")
        );
    }
}
