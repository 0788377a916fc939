//! Tenant host facade used by the REST layer and the in-process client.
//!
//! Every tenant-scoped operation is routed first, so unknown tenants are
//! rejected before any storage is provisioned.

use std::sync::Arc;
use std::time::Duration;

use tenant_host_sdk::{ExecOutcome, LockRecord, RowSet, SqlParam, TenantId, TenantRecord};

use super::error::DomainError;
use super::lock::LockService;
use super::registry::RegistryError;
use super::router::{Capability, GatewayRouter, LocalDispatch, ProxyOutcome, RouteDecision};
use super::selftest::{self, SelfTestReport};
use super::settings::{Settings, SettingsService};
use crate::infra::store::TenantStoreManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthSource {
    Local,
    Registry,
}

#[derive(Debug, Clone)]
pub struct HealthReport {
    pub id: TenantId,
    pub source: HealthSource,
    /// Upstream status for registry-served tenants.
    pub status: Option<u16>,
}

pub struct TenantHostService {
    router: GatewayRouter,
    stores: Arc<TenantStoreManager>,
    locks: LockService,
    settings: SettingsService,
}

impl TenantHostService {
    #[must_use]
    pub fn new(
        router: GatewayRouter,
        stores: Arc<TenantStoreManager>,
        locks: LockService,
        settings: SettingsService,
    ) -> Self {
        Self {
            router,
            stores,
            locks,
            settings,
        }
    }

    #[must_use]
    pub fn stores(&self) -> &Arc<TenantStoreManager> {
        &self.stores
    }

    /// All registered tenants ordered by id.
    #[must_use]
    pub fn list_tenants(&self) -> Vec<Arc<TenantRecord>> {
        self.router.registry().list()
    }

    /// # Errors
    /// `UnknownTenant` when `id` is not registered.
    pub fn tenant(&self, id: &TenantId) -> Result<Arc<TenantRecord>, DomainError> {
        self.router.tenant(id)
    }

    /// Re-read the registry source; returns the number of tenants loaded.
    ///
    /// # Errors
    /// The source is unreadable or invalid; the previous registry stays active.
    pub fn reload_registry(&self) -> Result<usize, RegistryError> {
        self.router.registry().reload()
    }

    async fn local(&self, id: &TenantId, capability: Capability) -> Result<LocalDispatch, DomainError> {
        match self.router.route(id, capability).await? {
            RouteDecision::Local(dispatch) => Ok(dispatch),
            RouteDecision::Proxied(out) => Err(DomainError::Internal(format!(
                "local-only capability was proxied to {}",
                out.url
            ))),
        }
    }

    /// # Errors
    /// `UnknownTenant` or `UpstreamUnavailable`.
    pub async fn health(&self, id: &TenantId) -> Result<HealthReport, DomainError> {
        let report = match self.router.route(id, Capability::Health).await? {
            RouteDecision::Local(_) => HealthReport {
                id: id.clone(),
                source: HealthSource::Local,
                status: None,
            },
            RouteDecision::Proxied(out) => HealthReport {
                id: id.clone(),
                source: HealthSource::Registry,
                status: Some(out.status),
            },
        };
        Ok(report)
    }

    /// # Errors
    /// `UnknownTenant`, `UpstreamUnavailable`, or `NotFound` for local tenants.
    pub async fn passthrough(&self, id: &TenantId, path: &str) -> Result<ProxyOutcome, DomainError> {
        let capability = Capability::Passthrough {
            path: path.to_owned(),
        };
        match self.router.route(id, capability).await? {
            RouteDecision::Proxied(out) => Ok(out),
            RouteDecision::Local(_) => Err(DomainError::not_found(format!("upstream path {path}"))),
        }
    }

    /// # Errors
    /// `UnknownTenant` or any store error.
    pub async fn selftest(&self, id: &TenantId) -> Result<SelfTestReport, DomainError> {
        self.local(id, Capability::SelfTest).await?;
        selftest::run(&self.stores, id).await
    }

    /// # Errors
    /// `UnknownTenant`, `PathEscape`, `NotFound`, or a store error.
    pub async fn read_file(&self, id: &TenantId, path: &str) -> Result<Vec<u8>, DomainError> {
        self.local(id, Capability::Files).await?;
        self.stores.read_scoped(id, path).await
    }

    /// # Errors
    /// `UnknownTenant`, `PathEscape`, or a store error.
    pub async fn write_file(&self, id: &TenantId, path: &str, content: &[u8]) -> Result<(), DomainError> {
        self.local(id, Capability::Files).await?;
        self.stores.write_scoped(id, path, content).await
    }

    /// # Errors
    /// `UnknownTenant`, `GuardrailViolation`, or a store error.
    pub async fn query(
        &self,
        id: &TenantId,
        statement: &str,
        params: Vec<SqlParam>,
    ) -> Result<RowSet, DomainError> {
        self.local(id, Capability::Sql).await?;
        self.stores.query(id, statement, params).await
    }

    /// # Errors
    /// `UnknownTenant`, `GuardrailViolation`, or a store error.
    pub async fn execute(
        &self,
        id: &TenantId,
        statement: &str,
        params: Vec<SqlParam>,
    ) -> Result<ExecOutcome, DomainError> {
        self.local(id, Capability::Sql).await?;
        self.stores.execute(id, statement, params).await
    }

    /// # Errors
    /// `UnknownTenant`, `LockHeld`, `Validation`, or a store error.
    pub async fn acquire_lock(
        &self,
        id: &TenantId,
        task_id: &str,
        session_id: &str,
        ttl: Option<Duration>,
    ) -> Result<LockRecord, DomainError> {
        self.local(id, Capability::Lock).await?;
        self.locks.acquire(id, task_id, session_id, ttl).await
    }

    /// # Errors
    /// `UnknownTenant`, `Validation`, or a store error.
    pub async fn release_lock(
        &self,
        id: &TenantId,
        task_id: &str,
        session_id: &str,
    ) -> Result<bool, DomainError> {
        self.local(id, Capability::Lock).await?;
        self.locks.release(id, task_id, session_id).await
    }

    /// # Errors
    /// `UnknownTenant` or a store error.
    pub async fn active_lock(
        &self,
        id: &TenantId,
        task_id: Option<&str>,
    ) -> Result<Option<LockRecord>, DomainError> {
        self.local(id, Capability::Lock).await?;
        self.locks.active_lock(id, task_id).await
    }

    /// # Errors
    /// `UnknownTenant` or a store error.
    pub async fn get_settings(&self, id: &TenantId) -> Result<Settings, DomainError> {
        self.local(id, Capability::Settings).await?;
        self.settings.get(id).await
    }

    /// # Errors
    /// `UnknownTenant`, `Validation`, or a store error.
    pub async fn patch_settings(&self, id: &TenantId, changes: Settings) -> Result<Settings, DomainError> {
        self.local(id, Capability::Settings).await?;
        self.settings.patch(id, changes).await
    }
}
