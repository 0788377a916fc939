use apphost_errors::Problem;
use serde_json::json;

use crate::domain::error::DomainError;
use crate::domain::registry::RegistryError;
use crate::errors;

fn current_trace_id() -> Option<String> {
    tracing::Span::current()
        .id()
        .map(|id| id.into_u64().to_string())
}

/// Map a domain error to an RFC 9457 problem using the error catalog.
pub fn domain_error_to_problem(e: &DomainError, instance: &str) -> Problem {
    let trace_id = current_trace_id();

    match e {
        DomainError::InvalidIdentifier(err) => {
            errors::INVALID_TENANT_ID.with_context(err.to_string(), instance, trace_id)
        }
        DomainError::UnknownTenant { tenant } => errors::UNKNOWN_TENANT
            .with_context(format!("No tenant registered as '{tenant}'"), instance, trace_id)
            .with_tenant(tenant.as_str()),
        DomainError::StoreInit { tenant, reason } => {
            tracing::error!(tenant = %tenant, reason = %reason, "tenant store init failed");
            errors::STORE_INIT
                .with_context("Tenant storage could not be provisioned", instance, trace_id)
                .with_tenant(tenant.as_str())
        }
        DomainError::PathEscape { tenant, path } => errors::PATH_ESCAPE
            .with_context(
                format!("Path '{path}' resolves outside the tenant storage root"),
                instance,
                trace_id,
            )
            .with_tenant(tenant.as_str()),
        DomainError::GuardrailViolation { reason } => {
            errors::GUARDRAIL_VIOLATION.with_context(reason.clone(), instance, trace_id)
        }
        DomainError::UpstreamUnavailable { tenant, reason, .. } => errors::UPSTREAM_UNAVAILABLE
            .with_context(reason.clone(), instance, trace_id)
            .with_tenant(tenant.as_str()),
        DomainError::LockHeld { holder } => errors::LOCK_HELD
            .with_context(
                format!("Task '{}' is locked by another session", holder.task_id),
                instance,
                trace_id,
            )
            .with_context(json!({ "holder": holder })),
        DomainError::NotFound { what } => {
            errors::NOT_FOUND.with_context(format!("{what} not found"), instance, trace_id)
        }
        DomainError::Validation { field, message } => errors::VALIDATION.with_context(
            format!("Validation error on '{field}': {message}"),
            instance,
            trace_id,
        ),
        DomainError::Database { tenant, .. } | DomainError::Io { tenant, .. } => {
            tracing::error!(error = %e, "tenant storage error");
            errors::INTERNAL
                .with_context("An internal storage error occurred", instance, trace_id)
                .with_tenant(tenant.as_str())
        }
        DomainError::Internal(msg) => {
            tracing::error!(error = %msg, "internal error");
            errors::INTERNAL.with_context("An internal error occurred", instance, trace_id)
        }
    }
}

/// A rejected registry reload; the previous snapshot stays active.
pub fn registry_error_to_problem(e: &RegistryError, instance: &str) -> Problem {
    errors::REGISTRY_INVALID.with_context(e.to_string(), instance, current_trace_id())
}

/// Implement `From<DomainError>` for `Problem` so `?` works in handlers.
impl From<DomainError> for Problem {
    fn from(e: DomainError) -> Self {
        domain_error_to_problem(&e, "/")
    }
}
