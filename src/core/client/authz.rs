use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use k8s_openapi::api::authorization::v1::{
    ResourceAttributes, SelfSubjectAccessReview, SelfSubjectAccessReviewSpec,
};
use kube::api::PostParams;
use kube::{Api, Client};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::errors::EngineError;

/// Every cluster resource type the engine reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClusterResource {
    Nodes,
    Pods,
    Namespaces,
    Deployments,
    DaemonSets,
    ReplicaSets,
    StatefulSets,
    Jobs,
    CronJobs,
    PersistentVolumes,
    PersistentVolumeClaims,
}

impl ClusterResource {
    pub const ALL: [ClusterResource; 11] = [
        ClusterResource::Nodes,
        ClusterResource::Pods,
        ClusterResource::Namespaces,
        ClusterResource::Deployments,
        ClusterResource::DaemonSets,
        ClusterResource::ReplicaSets,
        ClusterResource::StatefulSets,
        ClusterResource::Jobs,
        ClusterResource::CronJobs,
        ClusterResource::PersistentVolumes,
        ClusterResource::PersistentVolumeClaims,
    ];

    /// Plural resource name as used by RBAC.
    pub fn plural(&self) -> &'static str {
        match self {
            ClusterResource::Nodes => "nodes",
            ClusterResource::Pods => "pods",
            ClusterResource::Namespaces => "namespaces",
            ClusterResource::Deployments => "deployments",
            ClusterResource::DaemonSets => "daemonsets",
            ClusterResource::ReplicaSets => "replicasets",
            ClusterResource::StatefulSets => "statefulsets",
            ClusterResource::Jobs => "jobs",
            ClusterResource::CronJobs => "cronjobs",
            ClusterResource::PersistentVolumes => "persistentvolumes",
            ClusterResource::PersistentVolumeClaims => "persistentvolumeclaims",
        }
    }

    /// API group ("" is the core group).
    pub fn group(&self) -> &'static str {
        match self {
            ClusterResource::Nodes
            | ClusterResource::Pods
            | ClusterResource::Namespaces
            | ClusterResource::PersistentVolumes
            | ClusterResource::PersistentVolumeClaims => "",
            ClusterResource::Deployments
            | ClusterResource::DaemonSets
            | ClusterResource::ReplicaSets
            | ClusterResource::StatefulSets => "apps",
            ClusterResource::Jobs | ClusterResource::CronJobs => "batch",
        }
    }
}

impl fmt::Display for ClusterResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.plural())
    }
}

impl FromStr for ClusterResource {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        ClusterResource::ALL
            .into_iter()
            .find(|r| r.plural() == wanted)
            .ok_or_else(|| EngineError::Config(format!("unknown cluster resource '{s}'")))
    }
}

/// Answers "may the current identity perform these verbs on this resource".
#[async_trait]
pub trait Authorizer: Send + Sync {
    async fn is_authorized(
        &self,
        resource: ClusterResource,
        verbs: &[&str],
    ) -> Result<bool, EngineError>;
}

/// Authorizer backed by SelfSubjectAccessReview, one review per verb.
pub struct KubeAuthorizer {
    client: Client,
}

impl KubeAuthorizer {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn review(&self, resource: ClusterResource, verb: &str) -> Result<bool, EngineError> {
        let api: Api<SelfSubjectAccessReview> = Api::all(self.client.clone());
        let review = SelfSubjectAccessReview {
            spec: SelfSubjectAccessReviewSpec {
                resource_attributes: Some(ResourceAttributes {
                    group: Some(resource.group().to_string()),
                    resource: Some(resource.plural().to_string()),
                    verb: Some(verb.to_string()),
                    ..Default::default()
                }),
                ..Default::default()
            },
            ..Default::default()
        };

        let response = api
            .create(&PostParams::default(), &review)
            .await
            .map_err(|e| EngineError::AuthorizationCheck(e.to_string()))?;

        let allowed = response.status.map(|s| s.allowed).unwrap_or(false);
        debug!("Access review {} {}: allowed={}", verb, resource, allowed);
        Ok(allowed)
    }
}

#[async_trait]
impl Authorizer for KubeAuthorizer {
    async fn is_authorized(
        &self,
        resource: ClusterResource,
        verbs: &[&str],
    ) -> Result<bool, EngineError> {
        for verb in verbs {
            if !self.review(resource, verb).await? {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

/// Grants everything; for clusters where access is managed out of band.
pub struct AllowAll;

#[async_trait]
impl Authorizer for AllowAll {
    async fn is_authorized(
        &self,
        _resource: ClusterResource,
        _verbs: &[&str],
    ) -> Result<bool, EngineError> {
        Ok(true)
    }
}
