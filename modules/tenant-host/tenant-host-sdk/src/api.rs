//! Public API trait for in-process consumers of the tenant host.

use async_trait::async_trait;

use crate::error::TenantHostError;
use crate::models::{ExecOutcome, LockRecord, RowSet, SqlParam, TenantId, TenantRecord};

/// In-process API used by locally hosted applications.
///
/// Every operation is scoped to one tenant: storage paths resolve under that
/// tenant's root, statements run against that tenant's database, and locks
/// are keyed by that tenant.
///
/// ```ignore
/// let tenant = TenantId::parse("notes")?;
/// let lock = client.acquire_lock(&tenant, "daily-digest", "agent-7", None).await?;
/// client.execute(&tenant, "INSERT INTO notes(body) VALUES (?)", vec!["hi".into()]).await?;
/// client.release_lock(&tenant, "daily-digest", "agent-7").await?;
/// ```
#[async_trait]
pub trait TenantHostClient: Send + Sync {
    /// Registry entry for `tenant`.
    ///
    /// # Errors
    /// - `UnknownTenant` if the tenant is not registered
    async fn get_tenant(&self, tenant: &TenantId) -> Result<TenantRecord, TenantHostError>;

    /// Read a file below the tenant's storage root.
    ///
    /// # Errors
    /// - `PathEscape` if `path` resolves outside the root
    /// - `NotFound` if there is no such file
    async fn read_file(&self, tenant: &TenantId, path: &str) -> Result<Vec<u8>, TenantHostError>;

    /// Atomically replace (or create) a file below the tenant's storage root.
    ///
    /// # Errors
    /// - `PathEscape` if `path` resolves outside the root
    async fn write_file(
        &self,
        tenant: &TenantId,
        path: &str,
        content: &[u8],
    ) -> Result<(), TenantHostError>;

    /// Run a guarded, parameterized read.
    ///
    /// # Errors
    /// - `GuardrailViolation` if the statement is rejected before execution
    async fn query(
        &self,
        tenant: &TenantId,
        statement: &str,
        params: Vec<SqlParam>,
    ) -> Result<RowSet, TenantHostError>;

    /// Run a guarded, parameterized mutation.
    ///
    /// # Errors
    /// - `GuardrailViolation` if the statement is rejected before execution
    async fn execute(
        &self,
        tenant: &TenantId,
        statement: &str,
        params: Vec<SqlParam>,
    ) -> Result<ExecOutcome, TenantHostError>;

    /// Take the exclusive lock on `task_id` for `session_id`.
    ///
    /// `ttl` defaults to the configured lock TTL.
    ///
    /// # Errors
    /// - `LockHeld` carrying the current holder when another session owns it
    async fn acquire_lock(
        &self,
        tenant: &TenantId,
        task_id: &str,
        session_id: &str,
        ttl: Option<std::time::Duration>,
    ) -> Result<LockRecord, TenantHostError>;

    /// Release the lock if `session_id` holds it; returns whether anything was released.
    ///
    /// # Errors
    /// - `UnknownTenant` if the tenant is not registered
    async fn release_lock(
        &self,
        tenant: &TenantId,
        task_id: &str,
        session_id: &str,
    ) -> Result<bool, TenantHostError>;

    /// The unexpired lock on `task_id`, or the tenant's most recently acquired
    /// unexpired lock when `task_id` is `None`.
    ///
    /// # Errors
    /// - `UnknownTenant` if the tenant is not registered
    async fn active_lock(
        &self,
        tenant: &TenantId,
        task_id: Option<&str>,
    ) -> Result<Option<LockRecord>, TenantHostError>;
}
