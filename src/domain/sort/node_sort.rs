use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::model::NodeModel;

/// Column a node list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeSortField {
    #[default]
    Name,
    Status,
    Age,
    Pods,
    Cpu,
    Memory,
}

impl NodeSortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeSortField::Name => "name",
            NodeSortField::Status => "status",
            NodeSortField::Age => "age",
            NodeSortField::Pods => "pods",
            NodeSortField::Cpu => "cpu",
            NodeSortField::Memory => "memory",
        }
    }

    /// Parse a column name; anything unrecognized selects the canonical order.
    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for NodeSortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeSortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(NodeSortField::Name),
            "status" => Ok(NodeSortField::Status),
            "age" => Ok(NodeSortField::Age),
            "pods" => Ok(NodeSortField::Pods),
            "cpu" => Ok(NodeSortField::Cpu),
            "memory" | "mem" => Ok(NodeSortField::Memory),
            other => Err(format!("unknown node sort field '{other}'")),
        }
    }
}

fn compare(a: &NodeModel, b: &NodeModel, field: NodeSortField) -> Ordering {
    match field {
        NodeSortField::Name => a.name.cmp(&b.name),
        NodeSortField::Status => a.status.cmp(&b.status),
        // oldest first; nodes without a timestamp go last
        NodeSortField::Age => match (a.created_at, b.created_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        NodeSortField::Pods => b.pods_count.cmp(&a.pods_count),
        NodeSortField::Cpu => b.usage_cpu_millis.cmp(&a.usage_cpu_millis),
        NodeSortField::Memory => b.usage_memory_bytes.cmp(&a.usage_memory_bytes),
    }
}

/// Stable in-place sort of nodes by `field`.
pub fn sort_nodes(models: &mut [NodeModel], field: NodeSortField) {
    models.sort_by(|a, b| compare(a, b, field));
}
