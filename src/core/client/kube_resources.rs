/// Re-export the Kubernetes resource types the engine reads from k8s-openapi
/// This module provides a centralized place for all K8s resource types

pub use k8s_openapi::api::core::v1::{
    ContainerStatus,
    Namespace,
    Node,
    PersistentVolume,
    PersistentVolumeClaim,
    Pod,
};

pub use k8s_openapi::api::apps::v1::{
    DaemonSet,
    Deployment,
    ReplicaSet,
    StatefulSet,
};

pub use k8s_openapi::api::batch::v1::{
    CronJob,
    Job,
};

pub use k8s_openapi::apimachinery::pkg::api::resource::Quantity;
pub use k8s_openapi::apimachinery::pkg::apis::meta::v1::{ObjectMeta, Time};
