pub mod cluster_summary;
pub mod node_model;
pub mod pod_model;

pub use cluster_summary::{ClusterObjects, ClusterSummary, ReadyTally};
pub use node_model::{NodeModel, NodeStatus};
pub use pod_model::{PodKey, PodModel};
