//! SQLite key-value rows in each tenant's `host_settings` table.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tenant_host_sdk::TenantId;

use crate::domain::error::DomainError;
use crate::domain::repo::SettingsRepository;
use crate::infra::store::TenantStoreManager;

pub struct SqliteSettingsRepository {
    stores: Arc<TenantStoreManager>,
}

impl SqliteSettingsRepository {
    #[must_use]
    pub fn new(stores: Arc<TenantStoreManager>) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl SettingsRepository for SqliteSettingsRepository {
    async fn list(
        &self,
        tenant: &TenantId,
    ) -> Result<BTreeMap<String, serde_json::Value>, DomainError> {
        let store = self.stores.get_handle(tenant).await?;
        let rows: Vec<(String, String)> =
            sqlx::query_as("SELECT key, value FROM host_settings ORDER BY key")
                .fetch_all(store.pool())
                .await
                .map_err(DomainError::database(tenant))?;

        rows.into_iter()
            .map(|(key, raw)| {
                serde_json::from_str(&raw)
                    .map(|value| (key.clone(), value))
                    .map_err(|e| DomainError::Internal(format!("setting {key} is not valid JSON: {e}")))
            })
            .collect()
    }

    async fn apply(
        &self,
        tenant: &TenantId,
        changes: &BTreeMap<String, serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError> {
        let store = self.stores.get_handle(tenant).await?;
        let mut tx = store.pool().begin().await.map_err(DomainError::database(tenant))?;

        for (key, value) in changes {
            let query = if value.is_null() {
                sqlx::query("DELETE FROM host_settings WHERE key = ?1").bind(key)
            } else {
                sqlx::query(
                    "INSERT INTO host_settings (key, value, updated_at_ms) VALUES (?1, ?2, ?3)
                     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at_ms = excluded.updated_at_ms",
                )
                .bind(key)
                .bind(value.to_string())
                .bind(now.timestamp_millis())
            };
            query
                .execute(&mut *tx)
                .await
                .map_err(DomainError::database(tenant))?;
        }

        tx.commit().await.map_err(DomainError::database(tenant))
    }
}
