//! Tenant host module configuration.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::registry::RegistryEntry;

/// Configuration of the `tenant_host` module (`modules.tenant_host` in the
/// application config).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TenantHostConfig {
    /// Root directory holding one sub-directory per tenant. A relative path is
    /// resolved under the server home directory.
    pub data_root: PathBuf,
    /// Database file name inside each tenant directory.
    pub db_file_name: String,
    /// Storage-root directory name inside each tenant directory.
    pub files_dir: String,
    pub max_connections_per_tenant: u32,
    #[serde(with = "humantime_serde")]
    pub busy_timeout: Duration,
    pub audit: AuditConfig,
    pub lock: LockConfig,
    pub upstream: UpstreamConfig,
    pub registry: RegistryConfig,
    pub settings: SettingsConfig,
}

impl Default for TenantHostConfig {
    fn default() -> Self {
        Self {
            data_root: PathBuf::from("tenants"),
            db_file_name: "app.db".to_owned(),
            files_dir: "files".to_owned(),
            max_connections_per_tenant: 4,
            busy_timeout: Duration::from_secs(5),
            audit: AuditConfig::default(),
            lock: LockConfig::default(),
            upstream: UpstreamConfig::default(),
            registry: RegistryConfig::default(),
            settings: SettingsConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuditConfig {
    /// Events queued beyond this are dropped.
    pub queue_capacity: usize,
    pub file_name: String,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            file_name: "audit.jsonl".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LockConfig {
    #[serde(with = "humantime_serde")]
    pub default_ttl: Duration,
    #[serde(with = "humantime_serde")]
    pub max_ttl: Duration,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(15 * 60),
            max_ttl: Duration::from_secs(2 * 60 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UpstreamConfig {
    /// Per-request timeout for proxied calls.
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Substituted for `{host}` in registry upstream URLs.
    pub discovery_host: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(5),
            discovery_host: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RegistryConfig {
    /// Tenants declared inline.
    pub tenants: Vec<RegistryEntry>,
    /// Optional YAML file with a top-level `tenants` list; re-read on reload.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SettingsConfig {
    pub max_value_bytes: usize,
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            max_value_bytes: 4096,
        }
    }
}
