//! SQLite lock rows in each tenant's `host_task_locks` table.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tenant_host_sdk::{LockRecord, TenantId};

use crate::domain::error::DomainError;
use crate::domain::repo::LockRepository;
use crate::infra::store::TenantStoreManager;

/// Single atomic statement: the update arm replaces the row only when it has
/// expired or is owned by the same session. Zero affected rows means held.
const ACQUIRE_SQL: &str = "INSERT INTO host_task_locks (task_id, session_id, locked_at_ms, expires_at_ms)
     VALUES (?1, ?2, ?3, ?4)
     ON CONFLICT(task_id) DO UPDATE SET
         session_id = excluded.session_id,
         locked_at_ms = excluded.locked_at_ms,
         expires_at_ms = excluded.expires_at_ms
     WHERE host_task_locks.expires_at_ms <= excluded.locked_at_ms
        OR host_task_locks.session_id = excluded.session_id";

const FIND_ACTIVE_SQL: &str = "SELECT task_id, session_id, locked_at_ms, expires_at_ms
     FROM host_task_locks WHERE task_id = ?1 AND expires_at_ms > ?2";

const LATEST_ACTIVE_SQL: &str = "SELECT task_id, session_id, locked_at_ms, expires_at_ms
     FROM host_task_locks WHERE expires_at_ms > ?1
     ORDER BY locked_at_ms DESC, task_id LIMIT 1";

const RELEASE_SQL: &str = "DELETE FROM host_task_locks
     WHERE task_id = ?1 AND session_id = ?2 AND expires_at_ms > ?3";

#[derive(sqlx::FromRow)]
struct LockRow {
    task_id: String,
    session_id: String,
    locked_at_ms: i64,
    expires_at_ms: i64,
}

impl From<LockRow> for LockRecord {
    fn from(row: LockRow) -> Self {
        Self {
            task_id: row.task_id,
            session_id: row.session_id,
            locked_at: DateTime::from_timestamp_millis(row.locked_at_ms).unwrap_or_default(),
            expires_at: DateTime::from_timestamp_millis(row.expires_at_ms).unwrap_or_default(),
        }
    }
}

pub struct SqliteLockRepository {
    stores: Arc<TenantStoreManager>,
}

impl SqliteLockRepository {
    #[must_use]
    pub fn new(stores: Arc<TenantStoreManager>) -> Self {
        Self { stores }
    }
}

#[async_trait]
impl LockRepository for SqliteLockRepository {
    async fn try_acquire(
        &self,
        tenant: &TenantId,
        candidate: &LockRecord,
    ) -> Result<bool, DomainError> {
        let store = self.stores.get_handle(tenant).await?;
        let done = sqlx::query(ACQUIRE_SQL)
            .bind(&candidate.task_id)
            .bind(&candidate.session_id)
            .bind(candidate.locked_at.timestamp_millis())
            .bind(candidate.expires_at.timestamp_millis())
            .execute(store.pool())
            .await
            .map_err(DomainError::database(tenant))?;
        Ok(done.rows_affected() == 1)
    }

    async fn find_active(
        &self,
        tenant: &TenantId,
        task_id: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<LockRecord>, DomainError> {
        let store = self.stores.get_handle(tenant).await?;
        let row: Option<LockRow> = sqlx::query_as(FIND_ACTIVE_SQL)
            .bind(task_id)
            .bind(now.timestamp_millis())
            .fetch_optional(store.pool())
            .await
            .map_err(DomainError::database(tenant))?;
        Ok(row.map(LockRecord::from))
    }

    async fn latest_active(
        &self,
        tenant: &TenantId,
        now: DateTime<Utc>,
    ) -> Result<Option<LockRecord>, DomainError> {
        let store = self.stores.get_handle(tenant).await?;
        let row: Option<LockRow> = sqlx::query_as(LATEST_ACTIVE_SQL)
            .bind(now.timestamp_millis())
            .fetch_optional(store.pool())
            .await
            .map_err(DomainError::database(tenant))?;
        Ok(row.map(LockRecord::from))
    }

    async fn release(
        &self,
        tenant: &TenantId,
        task_id: &str,
        session_id: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, DomainError> {
        let store = self.stores.get_handle(tenant).await?;
        let done = sqlx::query(RELEASE_SQL)
            .bind(task_id)
            .bind(session_id)
            .bind(now.timestamp_millis())
            .execute(store.pool())
            .await
            .map_err(DomainError::database(tenant))?;
        Ok(done.rows_affected() > 0)
    }
}
