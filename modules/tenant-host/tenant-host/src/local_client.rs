//! Local client adapter implementing the SDK API trait.
//!
//! Bridges the domain service to [`TenantHostClient`] so in-process
//! applications share the same routing, guardrail and audit path as REST.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tenant_host_sdk::{
    ExecOutcome, LockRecord, RowSet, SqlParam, TenantHostClient, TenantHostError, TenantId,
    TenantRecord,
};

use crate::domain::service::TenantHostService;

pub struct LocalClient {
    service: Arc<TenantHostService>,
}

impl LocalClient {
    #[must_use]
    pub fn new(service: Arc<TenantHostService>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl TenantHostClient for LocalClient {
    async fn get_tenant(&self, tenant: &TenantId) -> Result<TenantRecord, TenantHostError> {
        self.service
            .tenant(tenant)
            .map(|record| record.as_ref().clone())
            .map_err(Into::into)
    }

    async fn read_file(&self, tenant: &TenantId, path: &str) -> Result<Vec<u8>, TenantHostError> {
        self.service
            .read_file(tenant, path)
            .await
            .map_err(Into::into)
    }

    async fn write_file(
        &self,
        tenant: &TenantId,
        path: &str,
        content: &[u8],
    ) -> Result<(), TenantHostError> {
        self.service
            .write_file(tenant, path, content)
            .await
            .map_err(Into::into)
    }

    async fn query(
        &self,
        tenant: &TenantId,
        statement: &str,
        params: Vec<SqlParam>,
    ) -> Result<RowSet, TenantHostError> {
        self.service
            .query(tenant, statement, params)
            .await
            .map_err(Into::into)
    }

    async fn execute(
        &self,
        tenant: &TenantId,
        statement: &str,
        params: Vec<SqlParam>,
    ) -> Result<ExecOutcome, TenantHostError> {
        self.service
            .execute(tenant, statement, params)
            .await
            .map_err(Into::into)
    }

    async fn acquire_lock(
        &self,
        tenant: &TenantId,
        task_id: &str,
        session_id: &str,
        ttl: Option<Duration>,
    ) -> Result<LockRecord, TenantHostError> {
        self.service
            .acquire_lock(tenant, task_id, session_id, ttl)
            .await
            .map_err(Into::into)
    }

    async fn release_lock(
        &self,
        tenant: &TenantId,
        task_id: &str,
        session_id: &str,
    ) -> Result<bool, TenantHostError> {
        self.service
            .release_lock(tenant, task_id, session_id)
            .await
            .map_err(Into::into)
    }

    async fn active_lock(
        &self,
        tenant: &TenantId,
        task_id: Option<&str>,
    ) -> Result<Option<LockRecord>, TenantHostError> {
        self.service
            .active_lock(tenant, task_id)
            .await
            .map_err(Into::into)
    }
}
