//! Tenant Host Module
//!
//! Tenant isolation and routing core. The public API is defined in
//! `tenant-host-sdk` and re-exported here.
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

pub use tenant_host_sdk::{
    AuditEvent, ExecOutcome, InvalidTenantId, LockRecord, RowSet, SqlParam, TenantHostClient,
    TenantHostError, TenantId, TenantRecord,
};

pub mod module;
pub use module::TenantHostModule;

pub mod local_client;
pub use local_client::LocalClient;

pub mod config;
pub use config::TenantHostConfig;

#[doc(hidden)]
pub mod api;
#[doc(hidden)]
pub mod domain;
#[doc(hidden)]
pub mod errors;
#[doc(hidden)]
pub mod infra;
