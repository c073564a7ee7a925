// Kube-rs based Kubernetes access
pub mod kube_client;
pub mod kube_resources;
pub mod authz;
pub mod metrics;

// Object list sources
pub mod cache;
pub mod lister;
pub mod store;
