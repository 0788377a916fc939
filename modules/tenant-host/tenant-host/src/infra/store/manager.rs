//! Lazily provisioned, cached per-tenant stores.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use tenant_host_sdk::{AuditEvent, ExecOutcome, RowSet, SqlParam, TenantId};
use tokio::sync::OnceCell;

use super::handle::TenantStore;
use super::schema;
use crate::config::TenantHostConfig;
use crate::domain::error::DomainError;
use crate::domain::guardrail;
use crate::domain::scoped_path::ScopedPath;
use crate::infra::audit::AuditSink;

/// On-disk layout shared by every tenant.
#[derive(Debug, Clone)]
pub struct StoreLayout {
    pub data_root: PathBuf,
    pub db_file_name: String,
    pub files_dir: String,
}

impl StoreLayout {
    #[must_use]
    pub fn tenant_dir(&self, id: &TenantId) -> PathBuf {
        self.data_root.join(id.as_str())
    }

    #[must_use]
    pub fn db_path(&self, id: &TenantId) -> PathBuf {
        self.tenant_dir(id).join(&self.db_file_name)
    }

    #[must_use]
    pub fn files_root(&self, id: &TenantId) -> PathBuf {
        self.tenant_dir(id).join(&self.files_dir)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct PoolSettings {
    pub max_connections: u32,
    pub busy_timeout: Duration,
}

type HandleCell = Arc<OnceCell<Arc<TenantStore>>>;

/// Owns every tenant store handle.
///
/// First access for a tenant is serialized through a per-tenant
/// [`OnceCell`], so concurrent first requests share one initialization and
/// one pool. A failed or abandoned initialization leaves the cell empty and
/// the next caller retries.
pub struct TenantStoreManager {
    layout: StoreLayout,
    pool: PoolSettings,
    handles: DashMap<TenantId, HandleCell>,
    audit: AuditSink,
}

impl TenantStoreManager {
    #[must_use]
    pub fn new(layout: StoreLayout, pool: PoolSettings, audit: AuditSink) -> Self {
        Self {
            layout,
            pool,
            handles: DashMap::new(),
            audit,
        }
    }

    /// Manager for `cfg` with tenant directories under `data_root`.
    #[must_use]
    pub fn from_config(cfg: &TenantHostConfig, data_root: PathBuf, audit: AuditSink) -> Self {
        Self::new(
            StoreLayout {
                data_root,
                db_file_name: cfg.db_file_name.clone(),
                files_dir: cfg.files_dir.clone(),
            },
            PoolSettings {
                max_connections: cfg.max_connections_per_tenant.max(1),
                busy_timeout: cfg.busy_timeout,
            },
            audit,
        )
    }

    /// The tenant's handle, provisioning directory and database on first use.
    ///
    /// # Errors
    /// `StoreInit` when the directory or database cannot be created.
    pub async fn get_handle(&self, id: &TenantId) -> Result<Arc<TenantStore>, DomainError> {
        let cell: HandleCell = self.handles.entry(id.clone()).or_default().clone();
        let store = cell.get_or_try_init(|| self.open(id)).await?;
        Ok(Arc::clone(store))
    }

    async fn open(&self, id: &TenantId) -> Result<Arc<TenantStore>, DomainError> {
        let init_err = |reason: String| DomainError::StoreInit {
            tenant: id.clone(),
            reason,
        };

        let files_root = self.layout.files_root(id);
        tokio::fs::create_dir_all(&files_root)
            .await
            .map_err(|e| init_err(format!("create {}: {e}", files_root.display())))?;

        let options = SqliteConnectOptions::new()
            .filename(self.layout.db_path(id))
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(self.pool.busy_timeout);

        let pool = SqlitePoolOptions::new()
            .max_connections(self.pool.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| init_err(format!("open database: {e}")))?;

        schema::bootstrap(&pool)
            .await
            .map_err(|e| init_err(format!("bootstrap host tables: {e}")))?;

        tracing::info!(tenant = %id, root = %files_root.display(), "tenant store provisioned");
        Ok(Arc::new(TenantStore::new(id.clone(), files_root, pool)))
    }

    fn guard(&self, id: &TenantId, statement: &str) -> Result<(), DomainError> {
        guardrail::assert_allowed(statement).inspect_err(|e| {
            tracing::warn!(
                target: "security",
                tenant = %id,
                error = %e,
                "raw statement rejected by guardrail"
            );
            if let DomainError::GuardrailViolation { reason } = e {
                self.audit
                    .record(AuditEvent::new(id.clone(), "sql.rejected").with("reason", reason.as_str()));
            }
        })
    }

    /// Run a guarded mutation on the tenant's database.
    ///
    /// # Errors
    /// `GuardrailViolation` before execution, `StoreInit`, or `Database`.
    pub async fn execute(
        &self,
        id: &TenantId,
        statement: &str,
        params: Vec<SqlParam>,
    ) -> Result<ExecOutcome, DomainError> {
        self.guard(id, statement)?;
        let outcome = self.get_handle(id).await?.run_execute(statement, params).await?;
        self.audit.record(
            AuditEvent::new(id.clone(), "sql.execute").with("rows_affected", outcome.rows_affected),
        );
        Ok(outcome)
    }

    /// Run a guarded read; rows keep the engine's column order.
    ///
    /// # Errors
    /// `GuardrailViolation` before execution, `StoreInit`, or `Database`.
    pub async fn query(
        &self,
        id: &TenantId,
        statement: &str,
        params: Vec<SqlParam>,
    ) -> Result<RowSet, DomainError> {
        self.guard(id, statement)?;
        self.get_handle(id).await?.run_query(statement, params).await
    }

    /// Resolve `rel_path` for `id` without touching the filesystem.
    ///
    /// # Errors
    /// `PathEscape` when the path leaves the storage root.
    pub fn scoped(&self, id: &TenantId, rel_path: &str) -> Result<ScopedPath, DomainError> {
        ScopedPath::resolve(id, &self.layout.files_root(id), rel_path).inspect_err(|_| {
            tracing::warn!(
                target: "security",
                tenant = %id,
                path = rel_path,
                "path escape from tenant storage root rejected"
            );
        })
    }

    /// Read a file below the tenant's storage root.
    ///
    /// # Errors
    /// `PathEscape`, `NotFound`, `StoreInit`, or `Io`.
    pub async fn read_scoped(&self, id: &TenantId, rel_path: &str) -> Result<Vec<u8>, DomainError> {
        let path = self.scoped(id, rel_path)?;
        let content = self.get_handle(id).await?.read(&path).await?;
        self.audit.record(
            AuditEvent::new(id.clone(), "file.read")
                .with("path", path.logical())
                .with("bytes", content.len()),
        );
        Ok(content)
    }

    /// Atomically replace a file below the tenant's storage root, creating
    /// intermediate directories.
    ///
    /// # Errors
    /// `PathEscape`, `Validation` for the root itself, `StoreInit`, or `Io`.
    pub async fn write_scoped(
        &self,
        id: &TenantId,
        rel_path: &str,
        content: &[u8],
    ) -> Result<(), DomainError> {
        let path = self.scoped(id, rel_path)?;
        self.get_handle(id).await?.write(&path, content).await?;
        self.audit.record(
            AuditEvent::new(id.clone(), "file.write")
                .with("path", path.logical())
                .with("bytes", content.len()),
        );
        Ok(())
    }

    /// Tenants with a live handle, ordered by id.
    #[must_use]
    pub fn list_tenants_open(&self) -> Vec<TenantId> {
        let mut ids: Vec<TenantId> = self
            .handles
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect();
        ids.sort();
        ids
    }

    /// Close every open pool.
    pub async fn close_all(&self) {
        let open = self.list_tenants_open();
        let stores: Vec<Arc<TenantStore>> = self
            .handles
            .iter()
            .filter_map(|entry| entry.value().get().cloned())
            .collect();
        for store in &stores {
            store.close().await;
        }
        tracing::info!(closed = stores.len(), tenants = ?open, "tenant stores closed");
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use serde_json::json;
    use std::path::Path;

    fn manager(root: &Path) -> TenantStoreManager {
        let (audit, _drain) = AuditSink::channel(64);
        TenantStoreManager::new(
            StoreLayout {
                data_root: root.to_path_buf(),
                db_file_name: "app.db".to_owned(),
                files_dir: "files".to_owned(),
            },
            PoolSettings {
                max_connections: 2,
                busy_timeout: Duration::from_secs(5),
            },
            audit,
        )
    }

    fn id(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn handle_is_provisioned_once_and_cached() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());

        let a = mgr.get_handle(&id("notes")).await.unwrap();
        let b = mgr.get_handle(&id("notes")).await.unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(dir.path().join("notes/app.db").exists());
        assert!(dir.path().join("notes/files").is_dir());
        assert_eq!(mgr.list_tenants_open(), vec![id("notes")]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_first_access_shares_one_handle() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = Arc::new(manager(dir.path()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let mgr = Arc::clone(&mgr);
                tokio::spawn(async move { mgr.get_handle(&id("moods")).await.unwrap() })
            })
            .collect();

        let mut handles = Vec::new();
        for task in tasks {
            handles.push(task.await.unwrap());
        }
        assert!(handles.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }

    #[tokio::test]
    async fn wal_and_foreign_keys_are_enabled() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let store = mgr.get_handle(&id("notes")).await.unwrap();

        let (mode,): (String,) = sqlx::query_as("PRAGMA journal_mode")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(mode.to_lowercase(), "wal");

        let (fk,): (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(store.pool())
            .await
            .unwrap();
        assert_eq!(fk, 1);
    }

    #[tokio::test]
    async fn execute_and_query_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let t = id("notes");

        mgr.execute(
            &t,
            "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT, score REAL, raw BLOB)",
            vec![],
        )
        .await
        .unwrap();
        let out = mgr
            .execute(
                &t,
                "INSERT INTO notes (body, score, raw) VALUES (?, ?, X'0102')",
                vec![json!("hello"), json!(1.5)],
            )
            .await
            .unwrap();
        assert_eq!(out.rows_affected, 1);
        assert_eq!(out.last_insert_rowid, 1);

        let rows = mgr
            .query(&t, "SELECT body, id, score, raw FROM notes WHERE id = ?", vec![json!(1)])
            .await
            .unwrap();
        assert_eq!(rows.columns, ["body", "id", "score", "raw"]);
        assert_eq!(rows.rows, vec![vec![json!("hello"), json!(1), json!(1.5), json!("AQI=")]]);

        let empty = mgr
            .query(&t, "SELECT id, body FROM notes WHERE id = ?", vec![json!(99)])
            .await
            .unwrap();
        assert!(empty.is_empty());
        assert_eq!(empty.columns, ["id", "body"]);
    }

    #[tokio::test]
    async fn guardrail_rejects_before_provisioning() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());

        let err = mgr
            .execute(&id("notes"), "PRAGMA foreign_keys=OFF", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::GuardrailViolation { .. }));
        assert!(!dir.path().join("notes").exists());
    }

    #[tokio::test]
    async fn engine_errors_carry_tenant() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());

        let err = mgr
            .query(&id("notes"), "SELECT * FROM missing_table", vec![])
            .await
            .unwrap_err();
        match err {
            DomainError::Database { tenant, .. } => assert_eq!(tenant, id("notes")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn scoped_files_round_trip_and_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let t = id("notes");

        mgr.write_scoped(&t, "a/b/c.txt", b"one").await.unwrap();
        mgr.write_scoped(&t, "a/b/c.txt", b"two").await.unwrap();
        assert_eq!(mgr.read_scoped(&t, "a/b/c.txt").await.unwrap(), b"two");

        let leftovers: Vec<_> = std::fs::read_dir(dir.path().join("notes/files/a/b"))
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers.len(), 1);
    }

    #[tokio::test]
    async fn missing_files_and_directories_are_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let t = id("notes");

        mgr.write_scoped(&t, "dir/file.txt", b"x").await.unwrap();
        for path in ["nope.txt", "dir", ""] {
            let err = mgr.read_scoped(&t, path).await.unwrap_err();
            assert!(matches!(err, DomainError::NotFound { .. }), "{path}: {err:?}");
        }
    }

    #[tokio::test]
    async fn file_used_as_directory_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let t = id("notes");

        mgr.write_scoped(&t, "a.txt", b"x").await.unwrap();
        for path in ["a.txt/b.txt", "a.txt/deeper/b.txt"] {
            let err = mgr.read_scoped(&t, path).await.unwrap_err();
            assert!(matches!(err, DomainError::NotFound { .. }), "{path}: {err:?}");
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn directory_link_out_of_root_is_an_escape() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let t = id("notes");
        mgr.get_handle(&t).await.unwrap();

        let outside = dir.path().join("outside");
        std::fs::create_dir_all(&outside).unwrap();
        std::fs::write(outside.join("secret.txt"), b"secret").unwrap();
        std::os::unix::fs::symlink(&outside, dir.path().join("notes/files/link")).unwrap();

        let err = mgr.read_scoped(&t, "link/secret.txt").await.unwrap_err();
        assert!(matches!(err, DomainError::PathEscape { .. }), "{err:?}");

        let err = mgr.write_scoped(&t, "link/new.txt", b"x").await.unwrap_err();
        assert!(matches!(err, DomainError::PathEscape { .. }), "{err:?}");
        assert!(!outside.join("new.txt").exists());
        assert_eq!(std::fs::read(outside.join("secret.txt")).unwrap(), b"secret");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn dangling_link_out_of_root_is_an_escape() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let t = id("notes");
        mgr.get_handle(&t).await.unwrap();

        let target = dir.path().join("outside.txt");
        std::os::unix::fs::symlink(&target, dir.path().join("notes/files/dangling")).unwrap();

        let err = mgr.write_scoped(&t, "dangling", b"x").await.unwrap_err();
        assert!(matches!(err, DomainError::PathEscape { .. }), "{err:?}");
        assert!(!target.exists());
    }

    #[tokio::test]
    async fn storage_root_cannot_reach_the_database() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let t = id("notes");
        mgr.get_handle(&t).await.unwrap();

        let err = mgr.read_scoped(&t, "../app.db").await.unwrap_err();
        assert!(matches!(err, DomainError::PathEscape { .. }));
    }

    #[tokio::test]
    async fn close_all_closes_pools() {
        let dir = tempfile::tempdir().unwrap();
        let mgr = manager(dir.path());
        let store = mgr.get_handle(&id("notes")).await.unwrap();
        mgr.close_all().await;
        assert!(store.pool().is_closed());
    }
}
