//! Domain errors for the tenant host.

use tenant_host_sdk::{InvalidTenantId, LockRecord, TenantHostError, TenantId};
use thiserror::Error;

/// Domain-level errors for tenant host operations.
#[derive(Error, Debug)]
pub enum DomainError {
    /// Malformed tenant identifier; rejected before any I/O.
    #[error(transparent)]
    InvalidIdentifier(#[from] InvalidTenantId),

    /// Well-formed identifier that is not registered.
    #[error("tenant not registered: {tenant}")]
    UnknownTenant { tenant: TenantId },

    /// Tenant directory or database could not be provisioned.
    #[error("storage for tenant {tenant} could not be provisioned: {reason}")]
    StoreInit { tenant: TenantId, reason: String },

    /// Resolved storage path left the tenant root.
    #[error("path {path:?} escapes the storage root of tenant {tenant}")]
    PathEscape { tenant: TenantId, path: String },

    /// Unsafe raw statement.
    #[error("statement rejected: {reason}")]
    GuardrailViolation { reason: String },

    /// Proxy target unreachable or returned a failure.
    #[error("upstream for tenant {tenant} unavailable: {reason}")]
    UpstreamUnavailable {
        tenant: TenantId,
        reason: String,
        /// Status answered by the upstream, absent on transport failures.
        upstream_status: Option<u16>,
    },

    /// Exclusive resource already owned by another session.
    #[error("task {} is locked by session {}", holder.task_id, holder.session_id)]
    LockHeld { holder: LockRecord },

    /// Referenced row or file is absent.
    #[error("not found: {what}")]
    NotFound { what: String },

    /// Request is well-formed but carries an invalid value.
    #[error("validation error: {field}: {message}")]
    Validation { field: String, message: String },

    /// Database engine failure, wrapped with the tenant id.
    #[error("database error for tenant {tenant}: {source}")]
    Database {
        tenant: TenantId,
        #[source]
        source: sqlx::Error,
    },

    /// Filesystem failure, wrapped with the tenant id.
    #[error("i/o error for tenant {tenant}: {source}")]
    Io {
        tenant: TenantId,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl DomainError {
    #[must_use]
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn guardrail(reason: impl Into<String>) -> Self {
        Self::GuardrailViolation {
            reason: reason.into(),
        }
    }

    pub(crate) fn database(tenant: &TenantId) -> impl FnOnce(sqlx::Error) -> Self + '_ {
        move |source| Self::Database {
            tenant: tenant.clone(),
            source,
        }
    }

    pub(crate) fn io(tenant: &TenantId) -> impl FnOnce(std::io::Error) -> Self + '_ {
        move |source| Self::Io {
            tenant: tenant.clone(),
            source,
        }
    }
}

/// Convert `DomainError` to the SDK `TenantHostError`.
impl From<DomainError> for TenantHostError {
    fn from(e: DomainError) -> Self {
        match e {
            DomainError::InvalidIdentifier(err) => Self::InvalidIdentifier(err),
            DomainError::UnknownTenant { tenant } => Self::UnknownTenant {
                tenant: tenant.to_string(),
            },
            DomainError::StoreInit { tenant, reason } => Self::StoreInit {
                tenant: tenant.to_string(),
                reason,
            },
            DomainError::PathEscape { tenant, path } => Self::PathEscape {
                tenant: tenant.to_string(),
                path,
            },
            DomainError::GuardrailViolation { reason } => Self::GuardrailViolation { reason },
            DomainError::UpstreamUnavailable { tenant, reason, .. } => Self::UpstreamUnavailable {
                tenant: tenant.to_string(),
                reason,
            },
            DomainError::LockHeld { holder } => Self::LockHeld { holder },
            DomainError::NotFound { what } => Self::NotFound(what),
            DomainError::Validation { field, message } => {
                Self::Validation(format!("{field}: {message}"))
            }
            e @ (DomainError::Database { .. } | DomainError::Io { .. }) => {
                tracing::error!(error = %e, "storage failure surfaced to in-process client");
                Self::Internal(e.to_string())
            }
            DomainError::Internal(msg) => Self::Internal(msg),
        }
    }
}
