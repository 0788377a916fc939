//! Error catalog for the tenant host REST surface.

use apphost_errors::ErrDef;

macro_rules! err_def {
    ($name:ident, $status:expr, $title:expr, $code:literal) => {
        pub const $name: ErrDef = ErrDef {
            status: $status,
            title: $title,
            code: $code,
            type_url: concat!("https://errors.apphost.dev/tenant-host/", $code),
        };
    };
}

err_def!(INVALID_TENANT_ID, 400, "Invalid tenant identifier", "TENANT_INVALID_ID");
err_def!(UNKNOWN_TENANT, 404, "Unknown tenant", "TENANT_UNKNOWN");
err_def!(STORE_INIT, 500, "Tenant storage unavailable", "TENANT_STORE_INIT");
err_def!(PATH_ESCAPE, 400, "Path escapes tenant storage", "TENANT_PATH_ESCAPE");
err_def!(GUARDRAIL_VIOLATION, 422, "Statement rejected", "TENANT_SQL_REJECTED");
err_def!(UPSTREAM_UNAVAILABLE, 502, "Upstream unavailable", "TENANT_UPSTREAM_UNAVAILABLE");
err_def!(LOCK_HELD, 409, "Lock held", "TENANT_LOCK_HELD");
err_def!(NOT_FOUND, 404, "Not found", "TENANT_NOT_FOUND");
err_def!(VALIDATION, 400, "Validation error", "TENANT_VALIDATION");
err_def!(INTERNAL, 500, "Internal Server Error", "TENANT_INTERNAL");
err_def!(REGISTRY_INVALID, 422, "Registry source rejected", "TENANT_REGISTRY_INVALID");
