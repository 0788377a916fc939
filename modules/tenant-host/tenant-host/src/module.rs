//! Tenant host module wiring.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Router;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::rest::routes;
use crate::config::TenantHostConfig;
use crate::domain::clock::SystemClock;
use crate::domain::lock::LockService;
use crate::domain::ports::UpstreamClient;
use crate::domain::registry::{Registry, RegistrySource};
use crate::domain::router::GatewayRouter;
use crate::domain::service::TenantHostService;
use crate::domain::settings::SettingsService;
use crate::infra::audit::{AuditSink, JsonlAuditWriter};
use crate::infra::lock_repo::SqliteLockRepository;
use crate::infra::settings_repo::SqliteSettingsRepository;
use crate::infra::store::TenantStoreManager;
use crate::infra::upstream::HyperUpstreamClient;
use crate::local_client::LocalClient;

/// Tenant host module.
///
/// Owns:
/// - the per-tenant store manager and its audit drain task
/// - the registry and gateway router
/// - the lock and settings services
pub struct TenantHostModule {
    service: Arc<TenantHostService>,
    cancel: CancellationToken,
    drain: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl TenantHostModule {
    /// Build the module with the default hyper upstream client.
    ///
    /// Must be called inside a tokio runtime; the audit drain task is spawned here.
    ///
    /// # Errors
    /// The registry source is invalid or the upstream client cannot be built.
    pub fn init(cfg: &TenantHostConfig, data_root: PathBuf) -> anyhow::Result<Self> {
        let upstream = HyperUpstreamClient::new(cfg.upstream.timeout)?;
        Self::with_upstream(cfg, data_root, Arc::new(upstream))
    }

    /// Build the module around a caller-supplied upstream client.
    ///
    /// # Errors
    /// The registry source is invalid.
    pub fn with_upstream(
        cfg: &TenantHostConfig,
        data_root: PathBuf,
        upstream: Arc<dyn UpstreamClient>,
    ) -> anyhow::Result<Self> {
        info!(data_root = %data_root.display(), "Initializing tenant host module");

        let source = RegistrySource::from_config(&cfg.registry, cfg.upstream.discovery_host.clone());
        let registry = Arc::new(Registry::load(source)?);
        info!(tenants = registry.list().len(), "Tenant registry loaded");

        let cancel = CancellationToken::new();
        let (audit, drain) = AuditSink::channel(cfg.audit.queue_capacity);
        let writer = Arc::new(JsonlAuditWriter::new(data_root.clone(), cfg.audit.file_name.clone()));
        let drain = drain.spawn(writer, cancel.child_token());

        let stores = Arc::new(TenantStoreManager::from_config(cfg, data_root, audit.clone()));
        let clock = Arc::new(SystemClock);
        let audit = Arc::new(audit);

        let locks = LockService::new(
            Arc::new(SqliteLockRepository::new(stores.clone())),
            clock.clone(),
            audit.clone(),
            cfg.lock.clone(),
        );
        let settings = SettingsService::new(
            Arc::new(SqliteSettingsRepository::new(stores.clone())),
            clock,
            audit,
            cfg.settings.clone(),
        );
        let router = GatewayRouter::new(registry, upstream);
        let service = Arc::new(TenantHostService::new(router, stores, locks, settings));

        Ok(Self {
            service,
            cancel,
            drain: tokio::sync::Mutex::new(Some(drain)),
        })
    }

    #[must_use]
    pub fn service(&self) -> &Arc<TenantHostService> {
        &self.service
    }

    /// REST routes mounted under `/apphost/v1`.
    #[must_use]
    pub fn router(&self) -> Router {
        routes::router(self.service.clone())
    }

    /// In-process client for other modules.
    #[must_use]
    pub fn client(&self) -> LocalClient {
        LocalClient::new(self.service.clone())
    }

    /// Flush the audit queue and close every tenant pool. Idempotent.
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        if let Some(handle) = self.drain.lock().await.take()
            && let Err(e) = handle.await
        {
            tracing::warn!(error = %e, "audit drain task failed");
        }
        self.service.stores().close_all().await;
        info!("Tenant host module stopped");
    }
}
