//! Public models for the tenant host module.
//!
//! Transport-agnostic data structures shared between the module and its
//! consumers.

use std::collections::BTreeSet;
use std::fmt;
use std::ops::Deref;
use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::InvalidTenantId;

static TENANT_ID_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)] // literal pattern, covered by tests
    Regex::new(r"^[a-z][a-z0-9-]{0,63}$").unwrap()
});

/// Validated tenant identifier.
///
/// Matches `^[a-z][a-z0-9-]{0,63}$`. It is the only key used to derive
/// storage paths, database files, lock rows and audit records, so every raw
/// identifier must pass through [`TenantId::parse`] before it is used.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Validate `raw`; on success the identifier is returned unchanged.
    ///
    /// # Errors
    /// Returns `InvalidTenantId` when `raw` does not match the identifier pattern.
    pub fn parse(raw: &str) -> Result<Self, InvalidTenantId> {
        if TENANT_ID_RE.is_match(raw) {
            Ok(Self(raw.to_owned()))
        } else {
            Err(InvalidTenantId {
                value: raw.to_owned(),
            })
        }
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Deref for TenantId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for TenantId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for TenantId {
    type Err = InvalidTenantId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl<'de> Deserialize<'de> for TenantId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Registry entry for one hosted application.
///
/// A present `upstream_base_url` means the tenant is served by an external
/// upstream; absence means it is served in-process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantRecord {
    pub id: TenantId,
    pub name: String,
    #[serde(default)]
    pub permissions: BTreeSet<String>,
    #[serde(default)]
    pub upstream_base_url: Option<String>,
    #[serde(default)]
    pub health_path: Option<String>,
}

impl TenantRecord {
    #[must_use]
    pub fn is_external(&self) -> bool {
        self.upstream_base_url.is_some()
    }
}

/// One held coordination lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockRecord {
    pub task_id: String,
    pub session_id: String,
    pub locked_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl LockRecord {
    /// A lock counts as held only while `now < expires_at`.
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// One append-only audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEvent {
    pub ts: DateTime<Utc>,
    pub app_id: TenantId,
    pub event: String,
    pub payload: serde_json::Map<String, serde_json::Value>,
}

impl AuditEvent {
    #[must_use]
    pub fn new(app_id: TenantId, event: impl Into<String>) -> Self {
        Self {
            ts: Utc::now(),
            app_id,
            event: event.into(),
            payload: serde_json::Map::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.payload.insert(key.to_owned(), value.into());
        self
    }
}

/// Positional statement parameter.
///
/// Null, booleans, integers, reals and strings bind natively; arrays and
/// objects are bound as their JSON text.
pub type SqlParam = serde_json::Value;

/// Result of a mutation statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecOutcome {
    pub rows_affected: u64,
    pub last_insert_rowid: i64,
}

/// Result of a read statement; `columns` keeps the engine's column order and
/// every row has one value per column.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowSet {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<serde_json::Value>>,
}

impl RowSet {
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Value of column `column` in row `row`, if both exist.
    #[must_use]
    pub fn get(&self, row: usize, column: &str) -> Option<&serde_json::Value> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.rows.get(row)?.get(idx)
    }
}
