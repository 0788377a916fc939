//! Write/read round trip through a tenant's store.

use chrono::{SecondsFormat, Utc};
use serde_json::json;
use tenant_host_sdk::{RowSet, TenantId};

use super::error::DomainError;
use crate::infra::store::TenantStoreManager;

pub const SELFTEST_PATH: &str = "selftest/ping.txt";
const RECENT_ROWS: usize = 5;

#[derive(Debug, Clone)]
pub struct SelfTestReport {
    pub id: TenantId,
    pub written: String,
    pub read: String,
    pub rows: RowSet,
}

impl SelfTestReport {
    #[must_use]
    pub fn matches(&self) -> bool {
        self.written == self.read
    }
}

/// Write a ping file, read it back, record the result, and return the most
/// recent recorded runs.
///
/// # Errors
/// Any store error from the round trip.
pub async fn run(stores: &TenantStoreManager, id: &TenantId) -> Result<SelfTestReport, DomainError> {
    let ts = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
    let written = format!("ping @ {ts}");

    stores.write_scoped(id, SELFTEST_PATH, written.as_bytes()).await?;
    let read = String::from_utf8_lossy(&stores.read_scoped(id, SELFTEST_PATH).await?).into_owned();

    let store = stores.get_handle(id).await?;
    store
        .run_execute(
            "INSERT INTO host_selftest (content, created_at) VALUES (?, ?)",
            vec![json!(read), json!(ts)],
        )
        .await?;
    let rows = store
        .run_query(
            "SELECT id, content, created_at FROM host_selftest ORDER BY id DESC LIMIT ?",
            vec![json!(RECENT_ROWS)],
        )
        .await?;

    Ok(SelfTestReport {
        id: id.clone(),
        written,
        read,
        rows,
    })
}
