use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::model::PodModel;

/// Column a pod list can be ordered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PodSortField {
    #[default]
    Namespace,
    Name,
    Status,
    Node,
    Restarts,
    Age,
    Cpu,
    Memory,
}

impl PodSortField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PodSortField::Namespace => "namespace",
            PodSortField::Name => "name",
            PodSortField::Status => "status",
            PodSortField::Node => "node",
            PodSortField::Restarts => "restarts",
            PodSortField::Age => "age",
            PodSortField::Cpu => "cpu",
            PodSortField::Memory => "memory",
        }
    }

    pub fn parse_or_default(s: &str) -> Self {
        s.parse().unwrap_or_default()
    }
}

impl fmt::Display for PodSortField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PodSortField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "namespace" | "ns" => Ok(PodSortField::Namespace),
            "name" => Ok(PodSortField::Name),
            "status" => Ok(PodSortField::Status),
            "node" => Ok(PodSortField::Node),
            "restarts" => Ok(PodSortField::Restarts),
            "age" => Ok(PodSortField::Age),
            "cpu" => Ok(PodSortField::Cpu),
            "memory" | "mem" => Ok(PodSortField::Memory),
            other => Err(format!("unknown pod sort field '{other}'")),
        }
    }
}

fn compare(a: &PodModel, b: &PodModel, field: PodSortField) -> Ordering {
    match field {
        PodSortField::Namespace => a
            .namespace
            .cmp(&b.namespace)
            .then_with(|| a.name.cmp(&b.name)),
        PodSortField::Name => a.name.cmp(&b.name),
        PodSortField::Status => a.status.cmp(&b.status),
        PodSortField::Node => a.node.cmp(&b.node),
        PodSortField::Restarts => b.restarts.cmp(&a.restarts),
        PodSortField::Age => match (a.created_at, b.created_at) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        },
        PodSortField::Cpu => b.usage_cpu_millis.cmp(&a.usage_cpu_millis),
        PodSortField::Memory => b.usage_memory_bytes.cmp(&a.usage_memory_bytes),
    }
}

/// Stable in-place sort of pods by `field`.
pub fn sort_pods(models: &mut [PodModel], field: PodSortField) {
    models.sort_by(|a, b| compare(a, b, field));
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn model(namespace: &str, name: &str) -> PodModel {
        PodModel {
            namespace: namespace.to_string(),
            name: name.to_string(),
            ..Default::default()
        }
    }

    fn keys(models: &[PodModel]) -> Vec<String> {
        models.iter().map(|m| m.key().to_string()).collect()
    }

    #[test]
    fn canonical_order_is_namespace_then_name() {
        let mut models = vec![
            model("kube-system", "coredns"),
            model("default", "web-1"),
            model("default", "api-0"),
        ];
        sort_pods(&mut models, PodSortField::parse_or_default(""));
        assert_eq!(
            keys(&models),
            vec!["default/api-0", "default/web-1", "kube-system/coredns"]
        );
    }

    #[test]
    fn equal_keys_keep_original_order_across_namespaces() {
        let mut models = vec![model("zeta", "same"), model("alpha", "same"), model("mid", "other")];
        sort_pods(&mut models, PodSortField::Name);
        assert_eq!(keys(&models), vec!["mid/other", "zeta/same", "alpha/same"]);
    }

    #[test]
    fn restarts_descend_and_age_puts_oldest_first() {
        let mut a = model("default", "a");
        a.restarts = 1;
        a.created_at = Some(Utc.with_ymd_and_hms(2024, 5, 2, 0, 0, 0).unwrap());
        let mut b = model("default", "b");
        b.restarts = 5;
        b.created_at = Some(Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap());
        let c = model("default", "c");

        let mut models = vec![a.clone(), b.clone(), c.clone()];
        sort_pods(&mut models, PodSortField::Restarts);
        assert_eq!(keys(&models), vec!["default/b", "default/a", "default/c"]);

        let mut models = vec![c, a, b];
        sort_pods(&mut models, PodSortField::Age);
        assert_eq!(keys(&models), vec!["default/b", "default/a", "default/c"]);
    }

    #[test]
    fn sorting_twice_is_a_no_op() {
        let mut models = vec![model("b", "1"), model("a", "2"), model("a", "1")];
        sort_pods(&mut models, PodSortField::Memory);
        let once = models.clone();
        sort_pods(&mut models, PodSortField::Memory);
        assert_eq!(models, once);
    }
}
