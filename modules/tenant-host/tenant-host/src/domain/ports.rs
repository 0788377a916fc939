//! Output ports (interfaces) for domain services.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

/// Response from an upstream service, any status.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: u16,
    pub content_type: Option<String>,
    pub body: Bytes,
}

impl UpstreamResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("invalid upstream url {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("upstream request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("upstream transport error: {0}")]
    Transport(String),
}

/// Port for outbound calls to registered upstreams.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    /// Issue one GET to `url`.
    ///
    /// Returns `Ok` for every HTTP status; `Err` only when no response arrived.
    async fn get(&self, url: &str) -> Result<UpstreamResponse, UpstreamError>;
}

/// Port for the best-effort audit trail; recording never fails or blocks.
pub trait AuditRecorder: Send + Sync {
    fn record(&self, event: tenant_host_sdk::AuditEvent);
}
