use std::sync::Arc;
use std::time::Duration;

use apphost_errors::Problem;
use axum::Json;
use axum::body::Bytes;
use axum::extract::{Extension, OriginalUri, Path, Query};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use tenant_host_sdk::TenantId;

use crate::domain::error::DomainError;
use crate::domain::service::TenantHostService;
use crate::domain::settings::Settings;

use super::dto::{
    AcquireLockRequest, ExecuteResultDto, FileWrittenDto, HealthDto, HealthSourceDto,
    LockQuery, LockStatusDto, QueryResultDto, RegistryReloadDto, ReleaseLockDto,
    ReleaseLockQuery, SelfTestDto, SettingsDto, SqlRequest, TenantDto,
};
use super::error::{domain_error_to_problem, registry_error_to_problem};

pub type ApiResult<T> = Result<T, Problem>;

fn problem(uri: &OriginalUri, e: &DomainError) -> Problem {
    domain_error_to_problem(e, uri.0.path())
}

fn tenant_id(uri: &OriginalUri, raw: &str) -> ApiResult<TenantId> {
    TenantId::parse(raw).map_err(|e| problem(uri, &e.into()))
}

pub async fn list_tenants(
    Extension(svc): Extension<Arc<TenantHostService>>,
) -> Json<Vec<TenantDto>> {
    Json(svc.list_tenants().iter().map(|r| TenantDto::from(r.as_ref())).collect())
}

pub async fn get_tenant(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
    Path(id): Path<String>,
) -> ApiResult<Json<TenantDto>> {
    let id = tenant_id(&uri, &id)?;
    let record = svc.tenant(&id).map_err(|e| problem(&uri, &e))?;
    Ok(Json(TenantDto::from(record.as_ref())))
}

pub async fn reload_registry(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
) -> ApiResult<Json<RegistryReloadDto>> {
    let tenants = svc
        .reload_registry()
        .map_err(|e| registry_error_to_problem(&e, uri.0.path()))?;
    Ok(Json(RegistryReloadDto { ok: true, tenants }))
}

/// Upstream failures are reported in the health body with a 502 rather than
/// as a problem document.
pub async fn health(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
    Path(id): Path<String>,
) -> ApiResult<Response> {
    let id = tenant_id(&uri, &id)?;
    match svc.health(&id).await {
        Ok(report) => Ok(Json(HealthDto::from(report)).into_response()),
        Err(DomainError::UpstreamUnavailable {
            tenant,
            reason,
            upstream_status,
        }) => {
            tracing::warn!(tenant = %tenant, reason = %reason, "upstream health probe failed");
            let body = HealthDto {
                ok: false,
                id: tenant,
                source: HealthSourceDto::Registry,
                status: upstream_status,
                error: Some(reason),
                ts: Utc::now(),
            };
            Ok((StatusCode::BAD_GATEWAY, Json(body)).into_response())
        }
        Err(e) => Err(problem(&uri, &e)),
    }
}

pub async fn selftest(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
    Path(id): Path<String>,
) -> ApiResult<Json<SelfTestDto>> {
    let id = tenant_id(&uri, &id)?;
    let report = svc.selftest(&id).await.map_err(|e| problem(&uri, &e))?;
    Ok(Json(report.into()))
}

pub async fn passthrough(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
    Path((id, path)): Path<(String, String)>,
) -> ApiResult<Response> {
    let id = tenant_id(&uri, &id)?;
    let out = svc
        .passthrough(&id, &path)
        .await
        .map_err(|e| problem(&uri, &e))?;
    let status = StatusCode::from_u16(out.status).unwrap_or(StatusCode::OK);
    let content_type = out
        .content_type
        .unwrap_or_else(|| "application/octet-stream".to_owned());
    Ok((status, [(header::CONTENT_TYPE, content_type)], out.body).into_response())
}

pub async fn get_lock(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
    Path(id): Path<String>,
    Query(q): Query<LockQuery>,
) -> ApiResult<Json<LockStatusDto>> {
    let id = tenant_id(&uri, &id)?;
    let lock = svc
        .active_lock(&id, q.task_id.as_deref())
        .await
        .map_err(|e| problem(&uri, &e))?;
    Ok(Json(LockStatusDto {
        ok: true,
        locked: lock.is_some(),
        lock,
    }))
}

/// A conflict answers 409 with the current holder in the lock body.
pub async fn acquire_lock(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
    Path((id, task_id)): Path<(String, String)>,
    Json(req): Json<AcquireLockRequest>,
) -> ApiResult<Response> {
    let id = tenant_id(&uri, &id)?;
    let ttl = req.ttl_secs.map(Duration::from_secs);
    match svc.acquire_lock(&id, &task_id, &req.session_id, ttl).await {
        Ok(lock) => Ok(Json(LockStatusDto {
            ok: true,
            locked: true,
            lock: Some(lock),
        })
        .into_response()),
        Err(DomainError::LockHeld { holder }) => {
            let body = LockStatusDto {
                ok: false,
                locked: true,
                lock: Some(holder),
            };
            Ok((StatusCode::CONFLICT, Json(body)).into_response())
        }
        Err(e) => Err(problem(&uri, &e)),
    }
}

pub async fn release_lock(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
    Path((id, task_id)): Path<(String, String)>,
    Query(q): Query<ReleaseLockQuery>,
) -> ApiResult<Json<ReleaseLockDto>> {
    let id = tenant_id(&uri, &id)?;
    let released = svc
        .release_lock(&id, &task_id, &q.session_id)
        .await
        .map_err(|e| problem(&uri, &e))?;
    Ok(Json(ReleaseLockDto { ok: true, released }))
}

pub async fn get_settings(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
    Path(id): Path<String>,
) -> ApiResult<Json<SettingsDto>> {
    let id = tenant_id(&uri, &id)?;
    let settings = svc.get_settings(&id).await.map_err(|e| problem(&uri, &e))?;
    Ok(Json(SettingsDto {
        ok: true,
        id,
        settings,
    }))
}

pub async fn patch_settings(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
    Path(id): Path<String>,
    Json(changes): Json<Settings>,
) -> ApiResult<Json<SettingsDto>> {
    let id = tenant_id(&uri, &id)?;
    let settings = svc
        .patch_settings(&id, changes)
        .await
        .map_err(|e| problem(&uri, &e))?;
    Ok(Json(SettingsDto {
        ok: true,
        id,
        settings,
    }))
}

pub async fn read_file(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
    Path((id, path)): Path<(String, String)>,
) -> ApiResult<Response> {
    let id = tenant_id(&uri, &id)?;
    let content = svc.read_file(&id, &path).await.map_err(|e| problem(&uri, &e))?;
    let response = match String::from_utf8(content) {
        Ok(text) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            text,
        )
            .into_response(),
        Err(raw) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            raw.into_bytes(),
        )
            .into_response(),
    };
    Ok(response)
}

pub async fn write_file(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
    Path((id, path)): Path<(String, String)>,
    body: Bytes,
) -> ApiResult<Json<FileWrittenDto>> {
    let id = tenant_id(&uri, &id)?;
    svc.write_file(&id, &path, &body)
        .await
        .map_err(|e| problem(&uri, &e))?;
    Ok(Json(FileWrittenDto {
        ok: true,
        path,
        bytes: body.len(),
    }))
}

pub async fn sql_query(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
    Path(id): Path<String>,
    Json(req): Json<SqlRequest>,
) -> ApiResult<Json<QueryResultDto>> {
    let id = tenant_id(&uri, &id)?;
    let rows = svc
        .query(&id, &req.statement, req.params)
        .await
        .map_err(|e| problem(&uri, &e))?;
    Ok(Json(rows.into()))
}

pub async fn sql_execute(
    Extension(svc): Extension<Arc<TenantHostService>>,
    uri: OriginalUri,
    Path(id): Path<String>,
    Json(req): Json<SqlRequest>,
) -> ApiResult<Json<ExecuteResultDto>> {
    let id = tenant_id(&uri, &id)?;
    let outcome = svc
        .execute(&id, &req.statement, req.params)
        .await
        .map_err(|e| problem(&uri, &e))?;
    Ok(Json(outcome.into()))
}
