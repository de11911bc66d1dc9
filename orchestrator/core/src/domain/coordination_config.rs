// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Coordination Configuration Types
//
// Defines the configuration schema for an ACP project, including:
// - Kubernetes-style manifest format (apiVersion/kind/metadata/spec)
// - Coordination directory name
// - Worker loop timing (poll interval, error backoff)
// - Advisory lock policy
// - Role manifest defaults (constraints, reporting line)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const API_VERSION: &str = "acp.dev/v1";
pub const KIND: &str = "CoordinationConfig";
pub const DEFAULT_COORDINATION_DIR: &str = ".acp";

/// Top-level Kubernetes-style coordination configuration manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoordinationConfig {
    /// API version (must be "acp.dev/v1")
    #[serde(rename = "apiVersion")]
    pub api_version: String,

    /// Resource kind (must be "CoordinationConfig")
    pub kind: String,

    pub metadata: ConfigMetadata,

    #[serde(default)]
    pub spec: CoordinationSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigMetadata {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoordinationSpec {
    /// Directory under the project root holding all coordination state
    #[serde(default = "default_coordination_dir")]
    pub coordination_dir: String,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub locks: LockConfig,

    #[serde(default)]
    pub constraints: ConstraintDefaults,

    #[serde(default)]
    pub role: RoleDefaults,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkerConfig {
    /// Fixed wait between poll cycles
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub poll_interval: Duration,

    /// Upper bound for the wait after consecutive failing cycles
    #[serde(with = "humantime_serde", default = "default_max_backoff")]
    pub max_backoff: Duration,

    /// Window within which an agent counts as live in status reports
    #[serde(with = "humantime_serde", default = "default_liveness_window")]
    pub liveness_window: Duration,

    /// Failed handler runs before a message is moved to `rejected/`
    #[serde(default = "default_max_delivery_attempts")]
    pub max_delivery_attempts: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LockConfig {
    /// Locks older than this are considered abandoned and may be broken
    #[serde(with = "humantime_serde", default = "default_stale_after")]
    pub stale_after: Duration,

    #[serde(default = "default_retry_attempts")]
    pub retry_attempts: u32,

    #[serde(with = "humantime_serde", default = "default_retry_delay")]
    pub retry_delay: Duration,
}

/// Defaults copied into every role manifest's `constraints` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintDefaults {
    #[serde(default = "default_max_task_duration")]
    pub max_task_duration: String,

    #[serde(default = "default_true")]
    pub requires_review: bool,

    #[serde(default = "default_deploy_targets")]
    pub can_deploy_to: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleDefaults {
    #[serde(default = "default_reports_to")]
    pub reports_to: String,

    #[serde(default = "default_escalation_path")]
    pub escalation_path: Vec<String>,

    #[serde(default = "default_responsibilities")]
    pub responsibilities: Vec<String>,
}

// Default value functions
fn default_true() -> bool {
    true
}

fn default_coordination_dir() -> String {
    DEFAULT_COORDINATION_DIR.to_string()
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(5)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(60)
}

fn default_liveness_window() -> Duration {
    Duration::from_secs(60)
}

fn default_max_delivery_attempts() -> u32 {
    5
}

fn default_stale_after() -> Duration {
    Duration::from_secs(30)
}

fn default_retry_attempts() -> u32 {
    10
}

fn default_retry_delay() -> Duration {
    Duration::from_millis(100)
}

fn default_max_task_duration() -> String {
    "4h".to_string()
}

fn default_deploy_targets() -> Vec<String> {
    vec!["dev".to_string()]
}

fn default_reports_to() -> String {
    "team-lead".to_string()
}

fn default_escalation_path() -> Vec<String> {
    vec!["team-lead".to_string()]
}

fn default_responsibilities() -> Vec<String> {
    vec![
        "Execute assigned tasks".to_string(),
        "Communicate status".to_string(),
        "Request help when blocked".to_string(),
    ]
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            max_backoff: default_max_backoff(),
            liveness_window: default_liveness_window(),
            max_delivery_attempts: default_max_delivery_attempts(),
        }
    }
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            stale_after: default_stale_after(),
            retry_attempts: default_retry_attempts(),
            retry_delay: default_retry_delay(),
        }
    }
}

impl Default for ConstraintDefaults {
    fn default() -> Self {
        Self {
            max_task_duration: default_max_task_duration(),
            requires_review: true,
            can_deploy_to: default_deploy_targets(),
        }
    }
}

impl Default for RoleDefaults {
    fn default() -> Self {
        Self {
            reports_to: default_reports_to(),
            escalation_path: default_escalation_path(),
            responsibilities: default_responsibilities(),
        }
    }
}

impl Default for CoordinationSpec {
    fn default() -> Self {
        Self {
            coordination_dir: default_coordination_dir(),
            worker: WorkerConfig::default(),
            locks: LockConfig::default(),
            constraints: ConstraintDefaults::default(),
            role: RoleDefaults::default(),
        }
    }
}

impl Default for CoordinationConfig {
    fn default() -> Self {
        Self {
            api_version: API_VERSION.to_string(),
            kind: KIND.to_string(),
            metadata: ConfigMetadata {
                name: "acp".to_string(),
                version: Some("1.0.0".to_string()),
            },
            spec: CoordinationSpec::default(),
        }
    }
}

impl CoordinationConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Parse configuration from YAML string
    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    pub fn to_yaml_string(&self) -> anyhow::Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Discover configuration file using precedence order
    /// 1. ACP_CONFIG_PATH environment variable
    /// 2. <project>/.acp/config.yaml
    /// 3. ~/.acp/config.yaml (user home)
    pub fn discover_config(project_root: &Path) -> Option<PathBuf> {
        if let Ok(path) = std::env::var("ACP_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let coordination_dir = std::env::var("ACP_COORDINATION_DIR")
            .unwrap_or_else(|_| DEFAULT_COORDINATION_DIR.to_string());
        let project_config = project_root.join(coordination_dir).join("config.yaml");
        if project_config.exists() {
            return Some(project_config);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".acp").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration: explicit path (must exist), then discovery, then defaults.
    pub fn load_or_default(cli_path: Option<&Path>, project_root: &Path) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", path, e)
            })?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config(project_root) {
            tracing::debug!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(&config_path).map_err(|e| {
                anyhow::anyhow!("Failed to load config at {:?}: {}", config_path, e)
            })?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::debug!("No configuration file found. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("ACP_POLL_INTERVAL") {
            match humantime::parse_duration(&val) {
                Ok(interval) => {
                    tracing::info!("Environment override: ACP_POLL_INTERVAL={}", val);
                    self.spec.worker.poll_interval = interval;
                }
                Err(e) => {
                    tracing::warn!(
                        "Invalid value for ACP_POLL_INTERVAL: '{}' ({}). Ignoring.",
                        val,
                        e
                    );
                }
            }
        }

        if let Ok(val) = std::env::var("ACP_COORDINATION_DIR") {
            if !val.trim().is_empty() {
                tracing::info!("Environment override: ACP_COORDINATION_DIR={}", val);
                self.spec.coordination_dir = val;
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_version != API_VERSION {
            anyhow::bail!(
                "Invalid apiVersion: '{}'. Must be '{}'",
                self.api_version,
                API_VERSION
            );
        }

        if self.kind != KIND {
            anyhow::bail!("Invalid kind: '{}'. Must be '{}'", self.kind, KIND);
        }

        if self.metadata.name.is_empty() {
            anyhow::bail!("metadata.name cannot be empty");
        }

        let dir = Path::new(&self.spec.coordination_dir);
        if self.spec.coordination_dir.trim().is_empty() || dir.is_absolute() {
            anyhow::bail!(
                "spec.coordinationDir must be a relative directory name, got '{}'",
                self.spec.coordination_dir
            );
        }

        if self.spec.worker.poll_interval.is_zero() {
            anyhow::bail!("spec.worker.pollInterval must be greater than zero");
        }

        if self.spec.worker.max_backoff < self.spec.worker.poll_interval {
            anyhow::bail!("spec.worker.maxBackoff cannot be shorter than spec.worker.pollInterval");
        }

        if self.spec.worker.max_delivery_attempts == 0 {
            anyhow::bail!("spec.worker.maxDeliveryAttempts must be at least 1");
        }

        if self.spec.locks.stale_after.is_zero() {
            anyhow::bail!("spec.locks.staleAfter must be greater than zero");
        }

        if self.spec.locks.retry_attempts == 0 {
            anyhow::bail!("spec.locks.retryAttempts must be at least 1");
        }

        Ok(())
    }
}
