//! Gateway router: serve a tenant locally or through its registered upstream.

use std::sync::Arc;

use bytes::Bytes;
use tenant_host_sdk::{TenantId, TenantRecord};

use super::error::DomainError;
use super::ports::UpstreamClient;
use super::registry::Registry;

const DEFAULT_HEALTH_PATH: &str = "/health";

/// What a request asks a tenant for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    /// Liveness probe; proxied to `health_path` (or `/health`) for external tenants.
    Health,
    /// Arbitrary upstream path; only external tenants serve it.
    Passthrough { path: String },
    SelfTest,
    Settings,
    Lock,
    Files,
    Sql,
}

impl Capability {
    /// Upstream path for this capability, when it is served remotely at all.
    fn remote_path(&self, record: &TenantRecord) -> Option<String> {
        match self {
            Self::Health => Some(
                record
                    .health_path
                    .clone()
                    .unwrap_or_else(|| DEFAULT_HEALTH_PATH.to_owned()),
            ),
            Self::Passthrough { path } => Some(path.clone()),
            Self::SelfTest | Self::Settings | Self::Lock | Self::Files | Self::Sql => None,
        }
    }

    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Health => "health",
            Self::Passthrough { .. } => "passthrough",
            Self::SelfTest => "selftest",
            Self::Settings => "settings",
            Self::Lock => "lock",
            Self::Files => "files",
            Self::Sql => "sql",
        }
    }
}

/// Serve the capability in-process for this tenant.
#[derive(Debug, Clone)]
pub struct LocalDispatch {
    pub tenant: Arc<TenantRecord>,
    pub capability: Capability,
}

/// A successful upstream response, body passed through unchanged.
#[derive(Debug, Clone)]
pub struct ProxyOutcome {
    pub tenant: Arc<TenantRecord>,
    pub url: String,
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

#[derive(Debug, Clone)]
pub enum RouteDecision {
    Local(LocalDispatch),
    Proxied(ProxyOutcome),
}

pub struct GatewayRouter {
    registry: Arc<Registry>,
    upstream: Arc<dyn UpstreamClient>,
}

impl GatewayRouter {
    #[must_use]
    pub fn new(registry: Arc<Registry>, upstream: Arc<dyn UpstreamClient>) -> Self {
        Self { registry, upstream }
    }

    #[must_use]
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Registry record for `id`.
    ///
    /// # Errors
    /// `UnknownTenant` when the id is not registered.
    pub fn tenant(&self, id: &TenantId) -> Result<Arc<TenantRecord>, DomainError> {
        self.registry
            .resolve(id)
            .ok_or_else(|| DomainError::UnknownTenant { tenant: id.clone() })
    }

    /// Decide how to serve `capability` for `id`; proxied capabilities issue
    /// exactly one outbound call.
    ///
    /// # Errors
    /// - `UnknownTenant` if `id` is not registered
    /// - `UpstreamUnavailable` on network failure or a non-2xx upstream status
    /// - `NotFound` for a passthrough to a locally served tenant
    pub async fn route(
        &self,
        id: &TenantId,
        capability: Capability,
    ) -> Result<RouteDecision, DomainError> {
        let tenant = self.tenant(id)?;

        if let Some(base) = tenant.upstream_base_url.as_deref()
            && let Some(path) = capability.remote_path(&tenant)
        {
            let url = join_url(base, &path);
            return self.proxy(tenant, url).await.map(RouteDecision::Proxied);
        }

        if let Capability::Passthrough { path } = &capability {
            return Err(DomainError::not_found(format!(
                "tenant {id} is served locally and has no upstream for {path}"
            )));
        }

        tracing::debug!(tenant = %id, capability = capability.name(), "local dispatch");
        Ok(RouteDecision::Local(LocalDispatch { tenant, capability }))
    }

    async fn proxy(&self, tenant: Arc<TenantRecord>, url: String) -> Result<ProxyOutcome, DomainError> {
        let unavailable = |reason: String, upstream_status: Option<u16>| {
            tracing::warn!(tenant = %tenant.id, url = %url, reason = %reason, "upstream unavailable");
            DomainError::UpstreamUnavailable {
                tenant: tenant.id.clone(),
                reason,
                upstream_status,
            }
        };

        let response = match self.upstream.get(&url).await {
            Ok(response) => response,
            Err(e) => return Err(unavailable(e.to_string(), None)),
        };
        if !response.is_success() {
            return Err(unavailable(
                format!("upstream returned status {}", response.status),
                Some(response.status),
            ));
        }

        tracing::debug!(tenant = %tenant.id, url = %url, status = response.status, "proxied");
        Ok(ProxyOutcome {
            tenant,
            url,
            status: response.status,
            content_type: response.content_type,
            body: response.body,
        })
    }
}

/// `base` without trailing `/` followed by `path` with exactly one leading `/`.
#[must_use]
pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::domain::ports::{UpstreamError, UpstreamResponse};
    use crate::domain::registry::RegistryEntry;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct ScriptedUpstream {
        calls: Mutex<Vec<String>>,
        reply: fn() -> Result<UpstreamResponse, UpstreamError>,
    }

    #[async_trait]
    impl UpstreamClient for ScriptedUpstream {
        async fn get(&self, url: &str) -> Result<UpstreamResponse, UpstreamError> {
            self.calls.lock().unwrap().push(url.to_owned());
            (self.reply)()
        }
    }

    fn ok_reply() -> Result<UpstreamResponse, UpstreamError> {
        Ok(UpstreamResponse {
            status: 200,
            content_type: Some("application/json".to_owned()),
            body: Bytes::from_static(br#"{"up":true}"#),
        })
    }

    fn router(
        reply: fn() -> Result<UpstreamResponse, UpstreamError>,
    ) -> (GatewayRouter, Arc<ScriptedUpstream>) {
        let registry = Registry::from_entries(vec![
            RegistryEntry {
                id: "weather".to_owned(),
                name: "Weather".to_owned(),
                permissions: vec![],
                upstream_base_url: Some("https://x".to_owned()),
                health_path: Some("/h".to_owned()),
            },
            RegistryEntry {
                id: "notes".to_owned(),
                name: "Notes".to_owned(),
                permissions: vec![],
                upstream_base_url: None,
                health_path: None,
            },
        ])
        .unwrap();
        let upstream = Arc::new(ScriptedUpstream {
            calls: Mutex::new(vec![]),
            reply,
        });
        (GatewayRouter::new(Arc::new(registry), upstream.clone()), upstream)
    }

    fn id(raw: &str) -> TenantId {
        TenantId::parse(raw).unwrap()
    }

    #[test]
    fn join_url_normalizes_slashes() {
        assert_eq!(join_url("https://x", "/h"), "https://x/h");
        assert_eq!(join_url("https://x/", "h"), "https://x/h");
        assert_eq!(join_url("https://x/api//", "//v1/ping"), "https://x/api/v1/ping");
        assert_eq!(join_url("https://x", ""), "https://x/");
    }

    #[tokio::test]
    async fn external_health_issues_exactly_one_call() {
        let (router, upstream) = router(ok_reply);
        let decision = router.route(&id("weather"), Capability::Health).await.unwrap();

        match decision {
            RouteDecision::Proxied(out) => {
                assert_eq!(out.url, "https://x/h");
                assert_eq!(out.status, 200);
                assert_eq!(&out.body[..], br#"{"up":true}"#);
            }
            RouteDecision::Local(_) => panic!("expected proxy"),
        }
        assert_eq!(*upstream.calls.lock().unwrap(), ["https://x/h"]);
    }

    #[tokio::test]
    async fn upstream_failures_become_unavailable() {
        fn server_error() -> Result<UpstreamResponse, UpstreamError> {
            Ok(UpstreamResponse {
                status: 503,
                content_type: None,
                body: Bytes::new(),
            })
        }
        fn refused() -> Result<UpstreamResponse, UpstreamError> {
            Err(UpstreamError::Transport("connection refused".to_owned()))
        }

        let replies: [(fn() -> Result<UpstreamResponse, UpstreamError>, Option<u16>); 2] =
            [(server_error, Some(503)), (refused, None)];
        for (reply, expected_status) in replies {
            let (router, upstream) = router(reply);
            let err = router.route(&id("weather"), Capability::Health).await.unwrap_err();
            match err {
                DomainError::UpstreamUnavailable { upstream_status, .. } => {
                    assert_eq!(upstream_status, expected_status);
                }
                other => panic!("unexpected: {other:?}"),
            }
            assert_eq!(upstream.calls.lock().unwrap().len(), 1);
        }
    }

    #[tokio::test]
    async fn local_tenants_dispatch_without_outbound_calls() {
        let (router, upstream) = router(ok_reply);
        let decision = router.route(&id("notes"), Capability::Health).await.unwrap();
        assert!(matches!(decision, RouteDecision::Local(d) if d.capability == Capability::Health));

        let err = router
            .route(&id("notes"), Capability::Passthrough { path: "/x".to_owned() })
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
        assert!(upstream.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn local_only_capabilities_stay_local_for_external_tenants() {
        let (router, upstream) = router(ok_reply);
        let decision = router.route(&id("weather"), Capability::Settings).await.unwrap();
        assert!(matches!(decision, RouteDecision::Local(_)));
        assert!(upstream.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unknown_tenants_are_rejected() {
        let (router, _) = router(ok_reply);
        let err = router.route(&id("ghost"), Capability::Health).await.unwrap_err();
        assert!(matches!(err, DomainError::UnknownTenant { .. }));
    }
}
