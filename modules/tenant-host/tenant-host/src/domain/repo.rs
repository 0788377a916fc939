use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tenant_host_sdk::{LockRecord, TenantId};

use super::error::DomainError;

/// Storage for coordination locks, one row per task.
#[async_trait]
pub trait LockRepository: Send + Sync {
    /// Write `candidate` only if the task is free, expired, or already held
    /// by the same session, as one atomic conditional write.
    ///
    /// Returns whether the write happened.
    async fn try_acquire(
        &self,
        tenant: &TenantId,
        candidate: &LockRecord,
    ) -> Result<bool, DomainError>;

    /// The lock on `task_id` if it is unexpired at `now`.
    async fn find_active(
        &self,
        tenant: &TenantId,
        task_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LockRecord>, DomainError>;

    /// The most recently acquired lock of the tenant that is unexpired at `now`.
    async fn latest_active(
        &self,
        tenant: &TenantId,
        now: DateTime<Utc>,
    ) -> Result<Option<LockRecord>, DomainError>;

    /// Delete the lock if `session_id` holds it unexpired; returns whether a row went away.
    async fn release(
        &self,
        tenant: &TenantId,
        task_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError>;
}

/// Storage for per-tenant key-value settings.
#[async_trait]
pub trait SettingsRepository: Send + Sync {
    async fn list(
        &self,
        tenant: &TenantId,
    ) -> Result<BTreeMap<String, serde_json::Value>, DomainError>;

    /// Upsert every entry in one transaction; a `null` value deletes the key.
    async fn apply(
        &self,
        tenant: &TenantId,
        changes: &BTreeMap<String, serde_json::Value>,
        now: DateTime<Utc>,
    ) -> Result<(), DomainError>;
}
