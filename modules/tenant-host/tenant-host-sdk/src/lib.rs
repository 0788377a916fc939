//! Tenant Host SDK
//!
//! Public contract of the `tenant-host` module:
//!
//! - [`TenantId`] - validated tenant identifier (the only way raw ids enter the system)
//! - [`TenantRecord`], [`LockRecord`], [`AuditEvent`], [`RowSet`], [`ExecOutcome`] - models
//! - [`TenantHostError`] - error type returned to consumers
//! - [`TenantHostClient`] - in-process API for hosted applications
//!
//! ## Usage
//!
//! ```ignore
//! use tenant_host_sdk::{TenantHostClient, TenantId};
//!
//! let tenant = TenantId::parse("gym-tracker")?;
//! client.write_file(&tenant, "ping.txt", b"ping").await?;
//! let rows = client.query(&tenant, "SELECT * FROM notes WHERE id = ?", vec![1.into()]).await?;
//! ```

pub mod api;
pub mod error;
pub mod models;

pub use api::TenantHostClient;
pub use error::{InvalidTenantId, TenantHostError};
pub use models::{
    AuditEvent, ExecOutcome, LockRecord, RowSet, SqlParam, TenantId, TenantRecord,
};
