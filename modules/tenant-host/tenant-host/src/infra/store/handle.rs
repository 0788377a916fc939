//! One tenant's database pool and storage root.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use sqlx::{Executor as _, SqlitePool};
use tenant_host_sdk::{ExecOutcome, RowSet, SqlParam, TenantId};

use super::rows;
use crate::domain::error::DomainError;
use crate::domain::scoped_path::{ScopedPath, is_missing};

static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Live handle for one tenant: a pooled database connection set and the
/// storage root under which all tenant files live.
#[derive(Debug)]
pub struct TenantStore {
    id: TenantId,
    files_root: PathBuf,
    pool: SqlitePool,
}

impl TenantStore {
    pub(super) fn new(id: TenantId, files_root: PathBuf, pool: SqlitePool) -> Self {
        Self {
            id,
            files_root,
            pool,
        }
    }

    #[must_use]
    pub fn id(&self) -> &TenantId {
        &self.id
    }

    #[must_use]
    pub fn files_root(&self) -> &Path {
        &self.files_root
    }

    /// Pool for host-owned bookkeeping statements; tenant statements go
    /// through the store manager.
    pub(crate) fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Unguarded read for host-owned statements.
    pub(crate) async fn run_query(
        &self,
        statement: &str,
        params: Vec<SqlParam>,
    ) -> Result<RowSet, DomainError> {
        let fetched = rows::bind_all(sqlx::query(statement), params)
            .fetch_all(&self.pool)
            .await
            .map_err(DomainError::database(&self.id))?;

        let columns = match fetched.first() {
            Some(row) => rows::column_names(row),
            None => {
                let described = self
                    .pool
                    .describe(statement)
                    .await
                    .map_err(DomainError::database(&self.id))?;
                described
                    .columns()
                    .iter()
                    .map(|c| sqlx::Column::name(c).to_owned())
                    .collect()
            }
        };

        let rows = fetched
            .iter()
            .map(rows::decode_row)
            .collect::<Result<Vec<_>, _>>()
            .map_err(DomainError::database(&self.id))?;

        Ok(RowSet { columns, rows })
    }

    /// Unguarded mutation for host-owned statements.
    pub(crate) async fn run_execute(
        &self,
        statement: &str,
        params: Vec<SqlParam>,
    ) -> Result<ExecOutcome, DomainError> {
        let done = rows::bind_all(sqlx::query(statement), params)
            .execute(&self.pool)
            .await
            .map_err(DomainError::database(&self.id))?;
        Ok(ExecOutcome {
            rows_affected: done.rows_affected(),
            last_insert_rowid: done.last_insert_rowid(),
        })
    }

    async fn ensure_inside(&self, path: &ScopedPath) -> Result<(), DomainError> {
        if path.check_links().await.map_err(DomainError::io(&self.id))? {
            Ok(())
        } else {
            tracing::warn!(
                target: "security",
                tenant = %self.id,
                path = %path.logical(),
                "symlink escape from tenant storage root rejected"
            );
            Err(DomainError::PathEscape {
                tenant: self.id.clone(),
                path: path.logical(),
            })
        }
    }

    pub(super) async fn read(&self, path: &ScopedPath) -> Result<Vec<u8>, DomainError> {
        let not_found = || DomainError::not_found(format!("file {}", path.logical()));
        if path.is_root() {
            return Err(not_found());
        }
        self.ensure_inside(path).await?;

        let target = path.absolute();
        match tokio::fs::metadata(&target).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Err(not_found()),
            Err(e) if is_missing(&e) => return Err(not_found()),
            Err(e) => return Err(DomainError::io(&self.id)(e)),
        }
        tokio::fs::read(&target)
            .await
            .map_err(|e| {
                if is_missing(&e) {
                    not_found()
                } else {
                    DomainError::io(&self.id)(e)
                }
            })
    }

    /// Write through a temporary sibling and rename it over the target, so a
    /// concurrent reader sees either the old or the new content.
    pub(super) async fn write(&self, path: &ScopedPath, content: &[u8]) -> Result<(), DomainError> {
        if path.is_root() {
            return Err(DomainError::validation("path", "must name a file"));
        }
        self.ensure_inside(path).await?;

        let target = path.absolute();
        let parent = target
            .parent()
            .ok_or_else(|| DomainError::validation("path", "must name a file"))?;
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(DomainError::io(&self.id))?;

        let file_name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let tmp = parent.join(format!(
            ".{file_name}.{}.{}.tmp",
            std::process::id(),
            TMP_SEQ.fetch_add(1, Ordering::Relaxed)
        ));

        if let Err(e) = tokio::fs::write(&tmp, content).await {
            return Err(DomainError::io(&self.id)(e));
        }
        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            if let Err(cleanup) = tokio::fs::remove_file(&tmp).await {
                tracing::debug!(error = %cleanup, "temporary file cleanup failed");
            }
            return Err(DomainError::io(&self.id)(e));
        }
        Ok(())
    }

    pub(super) async fn close(&self) {
        self.pool.close().await;
    }
}
