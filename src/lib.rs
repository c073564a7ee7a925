//! Snapshot aggregation and refresh engine for a Kubernetes terminal dashboard.
//!
//! The [`scheduler::Engine`] periodically reads cluster objects, metrics and
//! per-node host health, folds them into node, pod and cluster summary
//! snapshots, orders them and hands them to registered callbacks.

pub mod config;
pub mod core;
pub mod domain;
pub mod errors;
pub mod logging;
pub mod scheduler;

#[cfg(test)]
pub(crate) mod test_support;
