//! Host bookkeeping tables created in every tenant database.

use sqlx::SqlitePool;

const HOST_TABLES: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS host_task_locks (
        task_id       TEXT PRIMARY KEY NOT NULL,
        session_id    TEXT NOT NULL,
        locked_at_ms  INTEGER NOT NULL,
        expires_at_ms INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS host_settings (
        key           TEXT PRIMARY KEY NOT NULL,
        value         TEXT NOT NULL,
        updated_at_ms INTEGER NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS host_selftest (
        id         INTEGER PRIMARY KEY AUTOINCREMENT,
        content    TEXT NOT NULL,
        created_at TEXT NOT NULL
    )",
];

/// Create the host tables if they do not exist yet.
pub(super) async fn bootstrap(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for ddl in HOST_TABLES {
        sqlx::query(ddl).execute(&mut *tx).await?;
    }
    tx.commit().await
}
