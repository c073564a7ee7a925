//! Deterministic, field-selectable ordering of node and pod snapshots.
//!
//! All sorts are stable so rows with equal keys keep their relative order
//! between refreshes.

pub mod node_sort;
pub mod pod_sort;

pub use node_sort::{sort_nodes, NodeSortField};
pub use pod_sort::{sort_pods, PodSortField};
