//! Error types for the tenant host module.

use thiserror::Error;

use crate::models::LockRecord;

/// A string that does not match `^[a-z][a-z0-9-]{0,63}$`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid tenant identifier: {value:?}")]
pub struct InvalidTenantId {
    pub value: String,
}

/// Errors returned by the [`TenantHostClient`](crate::TenantHostClient).
#[derive(Debug, Error)]
pub enum TenantHostError {
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidTenantId),

    #[error("tenant not registered: {tenant}")]
    UnknownTenant { tenant: String },

    #[error("storage for tenant {tenant} could not be provisioned: {reason}")]
    StoreInit { tenant: String, reason: String },

    #[error("path {path:?} escapes the storage root of tenant {tenant}")]
    PathEscape { tenant: String, path: String },

    #[error("statement rejected: {reason}")]
    GuardrailViolation { reason: String },

    #[error("upstream for tenant {tenant} unavailable: {reason}")]
    UpstreamUnavailable { tenant: String, reason: String },

    /// The task is locked by another session; carries the holder.
    #[error("task {} is locked by session {}", holder.task_id, holder.session_id)]
    LockHeld { holder: LockRecord },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("invalid request: {0}")]
    Validation(String),

    #[error("internal error: {0}")]
    Internal(String),
}
