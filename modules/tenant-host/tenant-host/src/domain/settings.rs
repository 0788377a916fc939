//! Per-tenant key-value toggles.

use std::collections::BTreeMap;
use std::sync::{Arc, LazyLock};

use regex::Regex;
use serde_json::Value;
use tenant_host_sdk::{AuditEvent, TenantId};

use super::clock::Clock;
use super::error::DomainError;
use super::ports::AuditRecorder;
use super::repo::SettingsRepository;
use crate::config::SettingsConfig;

static KEY_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // literal pattern, covered by tests
    Regex::new(r"^[A-Za-z0-9_.-]{1,64}$").unwrap()
});

pub type Settings = BTreeMap<String, Value>;

pub struct SettingsService {
    repo: Arc<dyn SettingsRepository>,
    clock: Arc<dyn Clock>,
    audit: Arc<dyn AuditRecorder>,
    config: SettingsConfig,
}

impl SettingsService {
    #[must_use]
    pub fn new(
        repo: Arc<dyn SettingsRepository>,
        clock: Arc<dyn Clock>,
        audit: Arc<dyn AuditRecorder>,
        config: SettingsConfig,
    ) -> Self {
        Self {
            repo,
            clock,
            audit,
            config,
        }
    }

    /// All settings of the tenant, ordered by key.
    ///
    /// # Errors
    /// Storage failures only.
    pub async fn get(&self, tenant: &TenantId) -> Result<Settings, DomainError> {
        self.repo.list(tenant).await
    }

    /// Upsert the given keys; a `null` value removes the key. Returns the
    /// settings after the patch.
    ///
    /// # Errors
    /// `Validation` for bad keys or oversized values; nothing is written then.
    pub async fn patch(&self, tenant: &TenantId, changes: Settings) -> Result<Settings, DomainError> {
        for (key, value) in &changes {
            self.validate(key, value)?;
        }
        if changes.is_empty() {
            return self.get(tenant).await;
        }

        self.repo.apply(tenant, &changes, self.clock.now()).await?;

        let keys: Vec<Value> = changes.keys().map(|k| Value::from(k.as_str())).collect();
        tracing::info!(tenant = %tenant, keys = changes.len(), "settings updated");
        self.audit
            .record(AuditEvent::new(tenant.clone(), "settings.updated").with("keys", keys));

        self.get(tenant).await
    }

    fn validate(&self, key: &str, value: &Value) -> Result<(), DomainError> {
        if !KEY_RE.is_match(key) {
            return Err(DomainError::validation(
                key,
                "keys are 1-64 characters of letters, digits, '_', '.' or '-'",
            ));
        }
        let size = value.to_string().len();
        if size > self.config.max_value_bytes {
            return Err(DomainError::validation(
                key,
                format!(
                    "value is {size} bytes, maximum is {}",
                    self.config.max_value_bytes
                ),
            ));
        }
        Ok(())
    }
}
