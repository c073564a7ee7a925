pub mod ssh_prober;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use ssh_prober::SshProber;

/// Run state of a host service as reported by `systemctl status`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceState {
    Active,
    Inactive,
    Failed,
    Activating,
    /// Unreachable, unparseable or otherwise undetermined.
    #[default]
    Unknown,
}

impl ServiceState {
    pub fn is_active(&self) -> bool {
        matches!(self, ServiceState::Active)
    }

    /// Map a systemd ActiveState token. Anything unrecognized is `Unknown`.
    pub fn from_token(token: &str) -> Self {
        match token {
            "active" => ServiceState::Active,
            "inactive" => ServiceState::Inactive,
            "failed" => ServiceState::Failed,
            "activating" | "reloading" => ServiceState::Activating,
            _ => ServiceState::Unknown,
        }
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = match self {
            ServiceState::Active => "active",
            ServiceState::Inactive => "inactive",
            ServiceState::Failed => "failed",
            ServiceState::Activating => "activating",
            ServiceState::Unknown => "",
        };
        f.write_str(token)
    }
}

/// Pull the state word following `Active:` out of `systemctl status` output.
pub fn extract_status(output: &str) -> ServiceState {
    output
        .lines()
        .find_map(|line| {
            let mut fields = line.split_whitespace();
            fields.find(|f| *f == "Active:")?;
            fields.next()
        })
        .map(ServiceState::from_token)
        .unwrap_or_default()
}

/// Out-of-band health check of a named service on one host.
///
/// Never fails: every transport or parse problem degrades to `Unknown`.
#[async_trait]
pub trait HealthProber: Send + Sync {
    async fn probe(&self, address: &str, service: &str) -> ServiceState;
}
