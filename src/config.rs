use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use validator::{Validate, ValidationError};

use crate::core::client::authz::ClusterResource;
use crate::errors::EngineError;

pub const MIN_INTERVAL: Duration = Duration::from_millis(100);
pub const MAX_INTERVAL: Duration = Duration::from_secs(3600);

/// Verbs every read resource is checked for.
pub const READ_VERBS: [&str; 2] = ["get", "list"];

fn validate_interval(interval: &Duration) -> Result<(), ValidationError> {
    if *interval < MIN_INTERVAL || *interval > MAX_INTERVAL {
        return Err(ValidationError::new("interval_out_of_range"));
    }
    Ok(())
}

/// Where object lists come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheMode {
    /// Reflector-maintained local mirror.
    #[default]
    Watch,
    /// List from the API server on every read.
    Direct,
}

impl FromStr for CacheMode {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "watch" => Ok(CacheMode::Watch),
            "direct" => Ok(CacheMode::Direct),
            other => Err(EngineError::Config(format!("unknown cache mode '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogTarget {
    /// Daily rolling file; the terminal belongs to the dashboard.
    #[default]
    File,
    Stderr,
}

impl FromStr for LogTarget {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "file" => Ok(LogTarget::File),
            "stderr" => Ok(LogTarget::Stderr),
            other => Err(EngineError::Config(format!("unknown log target '{other}'"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `KTOP_LOG` / `RUST_LOG` win when set.
    pub filter: Option<String>,
    pub target: LogTarget,
    pub directory: PathBuf,
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: None,
            target: LogTarget::File,
            directory: PathBuf::from("logs"),
            file_prefix: "ktop-core.log".to_string(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ProbeConfig {
    /// systemd unit queried on every node.
    #[validate(length(min = 1))]
    pub service: String,

    /// argv template with `{address}` and `{service}` placeholders.
    #[validate(length(min = 1))]
    pub command: Vec<String>,

    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "timeout_ms")]
    pub timeout: Option<Duration>,

    /// Upper bound on probes in flight per cycle; unbounded when unset.
    #[validate(range(min = 1))]
    pub max_concurrency: Option<usize>,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            service: "scini".to_string(),
            command: [
                "ssh",
                "-o",
                "StrictHostKeyChecking=no",
                "{address}",
                "sudo",
                "systemctl",
                "status",
                "{service}",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            timeout: None,
            max_concurrency: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthorizationConfig {
    /// Resources checked for get/list before the first cycle.
    pub resources: Vec<ClusterResource>,
    /// Re-check the resources a cycle reads at the start of every cycle.
    pub recheck_each_cycle: bool,
}

impl Default for AuthorizationConfig {
    fn default() -> Self {
        Self {
            resources: vec![ClusterResource::Nodes],
            recheck_each_cycle: true,
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct EngineConfig {
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "refresh_interval_ms")]
    #[validate(custom(function = "validate_interval"))]
    pub refresh_interval: Duration,

    /// Summary cycle period; the refresh interval when unset.
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    #[serde(rename = "summary_interval_ms")]
    pub summary_interval: Option<Duration>,

    /// Restricts the pod view to one namespace.
    pub namespace: Option<String>,

    /// kubeconfig context; the current context when unset.
    pub kube_context: Option<String>,

    pub cache_mode: CacheMode,

    /// How long the binary waits for reflectors before the first cycle.
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(rename = "cache_sync_timeout_ms")]
    pub cache_sync_timeout: Duration,

    #[validate(nested)]
    pub probe: ProbeConfig,

    pub authorization: AuthorizationConfig,

    pub logging: LoggingConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(5),
            summary_interval: None,
            namespace: None,
            kube_context: None,
            cache_mode: CacheMode::Watch,
            cache_sync_timeout: Duration::from_secs(30),
            probe: ProbeConfig::default(),
            authorization: AuthorizationConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

fn parse_var<T: FromStr>(key: &str, raw: &str) -> Result<T, EngineError> {
    raw.trim()
        .parse()
        .map_err(|_| EngineError::Config(format!("invalid value for {key}: '{raw}'")))
}

fn parse_millis(key: &str, raw: &str) -> Result<Duration, EngineError> {
    parse_var::<u64>(key, raw).map(Duration::from_millis)
}

impl EngineConfig {
    /// Load `.env`, then build the config from `KTOP_*` variables on top of
    /// the optional JSON file named by `KTOP_CONFIG`.
    pub fn from_env() -> Result<Self, EngineError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as `from_env`, reading variables through `lookup`.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, EngineError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup("KTOP_CONFIG") {
            Some(path) => Self::from_json_file(&path)?,
            None => Self::default(),
        };

        if let Some(v) = lookup("KTOP_REFRESH_INTERVAL_MS") {
            config.refresh_interval = parse_millis("KTOP_REFRESH_INTERVAL_MS", &v)?;
        }
        if let Some(v) = lookup("KTOP_SUMMARY_INTERVAL_MS") {
            config.summary_interval = Some(parse_millis("KTOP_SUMMARY_INTERVAL_MS", &v)?);
        }
        if let Some(v) = lookup("KTOP_NAMESPACE").filter(|v| !v.trim().is_empty()) {
            config.namespace = Some(v.trim().to_string());
        }
        if let Some(v) = lookup("KTOP_KUBE_CONTEXT").filter(|v| !v.trim().is_empty()) {
            config.kube_context = Some(v.trim().to_string());
        }
        if let Some(v) = lookup("KTOP_CACHE_MODE") {
            config.cache_mode = v.parse()?;
        }
        if let Some(v) = lookup("KTOP_CACHE_SYNC_TIMEOUT_MS") {
            config.cache_sync_timeout = parse_millis("KTOP_CACHE_SYNC_TIMEOUT_MS", &v)?;
        }

        if let Some(v) = lookup("KTOP_PROBE_SERVICE") {
            config.probe.service = v.trim().to_string();
        }
        if let Some(v) = lookup("KTOP_PROBE_COMMAND") {
            config.probe.command = v.split_whitespace().map(str::to_string).collect();
        }
        if let Some(v) = lookup("KTOP_PROBE_TIMEOUT_MS") {
            config.probe.timeout = Some(parse_millis("KTOP_PROBE_TIMEOUT_MS", &v)?);
        }
        if let Some(v) = lookup("KTOP_PROBE_MAX_CONCURRENCY") {
            config.probe.max_concurrency = Some(parse_var("KTOP_PROBE_MAX_CONCURRENCY", &v)?);
        }

        if let Some(v) = lookup("KTOP_AUTHZ_RESOURCES") {
            config.authorization.resources = v
                .split(',')
                .filter(|s| !s.trim().is_empty())
                .map(|s| s.parse::<ClusterResource>())
                .collect::<Result<Vec<_>, EngineError>>()?;
        }
        if let Some(v) = lookup("KTOP_AUTHZ_RECHECK") {
            config.authorization.recheck_each_cycle = parse_var("KTOP_AUTHZ_RECHECK", &v)?;
        }

        if let Some(v) = lookup("KTOP_LOG_TARGET") {
            config.logging.target = v.parse()?;
        }
        if let Some(v) = lookup("KTOP_LOG_DIR") {
            config.logging.directory = PathBuf::from(v.trim());
        }

        config.validated()
    }

    pub fn from_json_file(path: &str) -> Result<Self, EngineError> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| EngineError::Config(format!("cannot read {path}: {e}")))?;
        let config: EngineConfig = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Config(format!("cannot parse {path}: {e}")))?;
        config.validated()
    }

    /// Run field validation plus the cross-field checks.
    pub fn validated(self) -> Result<Self, EngineError> {
        self.validate()
            .map_err(|e| EngineError::Config(e.to_string()))?;
        if let Some(summary) = self.summary_interval {
            validate_interval(&summary).map_err(|_| {
                EngineError::Config(format!("summary interval {summary:?} out of range"))
            })?;
        }
        Ok(self)
    }

    pub fn summary_interval_or(&self, fallback: Duration) -> Duration {
        self.summary_interval.unwrap_or(fallback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_the_dashboard() {
        let config = EngineConfig::from_lookup(lookup(&[])).unwrap();

        assert_eq!(config.refresh_interval, Duration::from_secs(5));
        assert_eq!(config.summary_interval_or(config.refresh_interval), Duration::from_secs(5));
        assert_eq!(config.probe.service, "scini");
        assert_eq!(config.probe.command[0], "ssh");
        assert!(config.probe.timeout.is_none());
        assert_eq!(config.authorization.resources, vec![ClusterResource::Nodes]);
        assert!(config.authorization.recheck_each_cycle);
        assert_eq!(config.cache_mode, CacheMode::Watch);
    }

    #[test]
    fn environment_overrides_apply() {
        let config = EngineConfig::from_lookup(lookup(&[
            ("KTOP_REFRESH_INTERVAL_MS", "2000"),
            ("KTOP_NAMESPACE", "kube-system"),
            ("KTOP_PROBE_COMMAND", "ssh {address} systemctl status {service}"),
            ("KTOP_PROBE_MAX_CONCURRENCY", "8"),
            ("KTOP_AUTHZ_RESOURCES", "nodes, pods,deployments"),
            ("KTOP_AUTHZ_RECHECK", "false"),
            ("KTOP_CACHE_MODE", "direct"),
            ("KTOP_LOG_TARGET", "stderr"),
        ]))
        .unwrap();

        assert_eq!(config.refresh_interval, Duration::from_secs(2));
        assert_eq!(config.namespace.as_deref(), Some("kube-system"));
        assert_eq!(config.probe.command.len(), 5);
        assert_eq!(config.probe.max_concurrency, Some(8));
        assert_eq!(
            config.authorization.resources,
            vec![
                ClusterResource::Nodes,
                ClusterResource::Pods,
                ClusterResource::Deployments
            ]
        );
        assert!(!config.authorization.recheck_each_cycle);
        assert_eq!(config.cache_mode, CacheMode::Direct);
        assert_eq!(config.logging.target, LogTarget::Stderr);
    }

    #[test]
    fn out_of_range_intervals_are_rejected() {
        assert!(EngineConfig::from_lookup(lookup(&[("KTOP_REFRESH_INTERVAL_MS", "10")])).is_err());
        assert!(
            EngineConfig::from_lookup(lookup(&[("KTOP_SUMMARY_INTERVAL_MS", "7200000")])).is_err()
        );
        let bad = lookup(&[("KTOP_REFRESH_INTERVAL_MS", "soon")]);
        assert!(EngineConfig::from_lookup(bad).is_err());
    }

    #[test]
    fn empty_probe_command_is_rejected() {
        let mut config = EngineConfig::default();
        config.probe.command.clear();
        assert!(config.validated().is_err());

        let mut config = EngineConfig::default();
        config.probe.max_concurrency = Some(0);
        assert!(config.validated().is_err());
    }

    #[test]
    fn json_uses_millisecond_keys() {
        let config: EngineConfig = serde_json::from_str(
            r#"{ "refresh_interval_ms": 1500, "probe": { "timeout_ms": 3000 }, "cache_mode": "direct" }"#,
        )
        .unwrap();

        assert_eq!(config.refresh_interval, Duration::from_millis(1500));
        assert_eq!(config.probe.timeout, Some(Duration::from_secs(3)));
        assert_eq!(config.probe.service, "scini");
        assert_eq!(config.cache_mode, CacheMode::Direct);
    }
}
