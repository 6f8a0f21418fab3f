//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the
//! synthesizer. All types derive Serde traits for deserialization from
//! config files.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Root configuration for the proxy configuration synthesizer.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SynthConfig {
    /// Enabled reverse-proxy servers.
    pub servers: ServersConfig,

    /// Template directories.
    pub templates: TemplatesConfig,

    /// Destination artifact.
    pub output: OutputConfig,

    /// Service discovery settings.
    pub discovery: DiscoveryConfig,

    /// Orchestrator connection.
    pub docker: DockerConfig,

    /// External reload command.
    pub reload: ReloadConfig,

    /// Follow-up regeneration settings.
    pub retry: RetryConfig,

    /// Reachability probe settings.
    pub probe: ProbeConfig,

    /// Filesystem watching.
    pub watch: WatchConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// The fixed set of servers rendered into the output file.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ServersConfig {
    /// Server ids; each needs a template named `<id>.<ext>` in the server directory.
    pub enabled: Vec<String>,
}

/// Template directory layout.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TemplatesConfig {
    /// Directory holding one template per server id.
    pub server_dir: PathBuf,

    /// Directory holding one template per location id.
    pub location_dir: PathBuf,
}

impl Default for TemplatesConfig {
    fn default() -> Self {
        Self {
            server_dir: PathBuf::from("templates/servers"),
            location_dir: PathBuf::from("templates/locations"),
        }
    }
}

/// Output file settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Path of the generated proxy configuration.
    pub path: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("/etc/nginx/conf.d/services.conf"),
        }
    }
}

/// Which orchestrator services are considered.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Stack names to include. Empty means every stack.
    pub stacks: Vec<String>,

    /// Service label carrying the stack name.
    pub stack_label: String,

    /// Only variables with this prefix are kept on a service record.
    pub declared_prefix: String,

    /// Variables with this prefix hold service definitions.
    pub definition_prefix: String,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            stacks: Vec::new(),
            stack_label: "com.docker.stack.namespace".to_string(),
            declared_prefix: "PROXY_".to_string(),
            definition_prefix: "PROXY_SERVICE_DEF_".to_string(),
        }
    }
}

/// Orchestrator endpoint.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct DockerConfig {
    /// Docker API address (e.g. "tcp://manager:2375"). Local defaults when unset.
    pub host: Option<String>,

    /// API request timeout in seconds.
    pub timeout_secs: Option<u64>,
}

/// Reload command configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Program and arguments. Empty disables reloading.
    pub command: Vec<String>,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            command: vec!["nginx".to_string(), "-s".to_string(), "reload".to_string()],
        }
    }
}

/// Follow-up regeneration configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Delay before regenerating after an unreachable backend, in seconds.
    pub delay_secs: u64,
}

impl RetryConfig {
    pub fn delay(&self) -> Duration {
        Duration::from_secs(self.delay_secs)
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { delay_secs: 30 }
    }
}

/// Reachability probe configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ProbeConfig {
    /// TCP connect deadline in milliseconds.
    pub timeout_ms: u64,
}

impl ProbeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self { timeout_ms: 3000 }
    }
}

/// Filesystem watch configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WatchConfig {
    /// Regenerate when a location template changes on disk.
    pub templates: bool,
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { templates: true }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
