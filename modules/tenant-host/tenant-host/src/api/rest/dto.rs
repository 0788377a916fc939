use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tenant_host_sdk::{ExecOutcome, LockRecord, RowSet, SqlParam, TenantId, TenantRecord};

use crate::domain::selftest::SelfTestReport;
use crate::domain::service::{HealthReport, HealthSource};
use crate::domain::settings::Settings;

/// Public view of a registry record; upstream internals stay private.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TenantDto {
    pub id: TenantId,
    pub name: String,
    pub permissions: Vec<String>,
    pub external: bool,
}

impl From<&TenantRecord> for TenantDto {
    fn from(r: &TenantRecord) -> Self {
        Self {
            id: r.id.clone(),
            name: r.name.clone(),
            permissions: r.permissions.iter().cloned().collect(),
            external: r.is_external(),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HealthSourceDto {
    Local,
    Registry,
}

impl From<HealthSource> for HealthSourceDto {
    fn from(s: HealthSource) -> Self {
        match s {
            HealthSource::Local => Self::Local,
            HealthSource::Registry => Self::Registry,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthDto {
    pub ok: bool,
    pub id: TenantId,
    pub source: HealthSourceDto,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error: Option<String>,
    pub ts: DateTime<Utc>,
}

impl From<HealthReport> for HealthDto {
    fn from(r: HealthReport) -> Self {
        Self {
            ok: true,
            id: r.id,
            source: r.source.into(),
            status: r.status,
            error: None,
            ts: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelfTestDto {
    pub ok: bool,
    pub id: TenantId,
    pub written: String,
    pub read: String,
    pub matches: bool,
    pub rows: RowSet,
}

impl From<SelfTestReport> for SelfTestDto {
    fn from(r: SelfTestReport) -> Self {
        let matches = r.matches();
        Self {
            ok: matches,
            id: r.id,
            written: r.written,
            read: r.read,
            matches,
            rows: r.rows,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LockQuery {
    pub task_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockStatusDto {
    pub ok: bool,
    pub locked: bool,
    pub lock: Option<LockRecord>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AcquireLockRequest {
    pub session_id: String,
    #[serde(default)]
    pub ttl_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseLockQuery {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReleaseLockDto {
    pub ok: bool,
    pub released: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsDto {
    pub ok: bool,
    pub id: TenantId,
    pub settings: Settings,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SqlRequest {
    pub statement: String,
    #[serde(default)]
    pub params: Vec<SqlParam>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResultDto {
    pub ok: bool,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl From<RowSet> for QueryResultDto {
    fn from(r: RowSet) -> Self {
        Self {
            ok: true,
            columns: r.columns,
            rows: r.rows,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecuteResultDto {
    pub ok: bool,
    pub rows_affected: u64,
    pub last_insert_rowid: i64,
}

impl From<ExecOutcome> for ExecuteResultDto {
    fn from(o: ExecOutcome) -> Self {
        Self {
            ok: true,
            rows_affected: o.rows_affected,
            last_insert_rowid: o.last_insert_rowid,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileWrittenDto {
    pub ok: bool,
    pub path: String,
    pub bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryReloadDto {
    pub ok: bool,
    pub tenants: usize,
}
