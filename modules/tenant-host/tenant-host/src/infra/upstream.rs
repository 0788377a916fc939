//! Outbound HTTP client for proxied tenants.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::{CONTENT_TYPE, USER_AGENT};
use http_body_util::{BodyExt, Empty, Limited};
use hyper_rustls::HttpsConnector;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioTimer};

use crate::domain::ports::{UpstreamClient, UpstreamError, UpstreamResponse};

/// Upstream bodies larger than this are treated as a failed call.
const MAX_BODY_BYTES: usize = 8 * 1024 * 1024;
const UA: &str = concat!("apphost/", env!("CARGO_PKG_VERSION"));

fn crypto_provider() -> Arc<rustls::crypto::CryptoProvider> {
    rustls::crypto::CryptoProvider::get_default()
        .cloned()
        .unwrap_or_else(|| Arc::new(rustls::crypto::aws_lc_rs::default_provider()))
}

/// Pooled hyper client over rustls with webpki roots; plain `http` is allowed
/// because upstreams are commonly on the local network.
pub struct HyperUpstreamClient {
    client: Client<HttpsConnector<HttpConnector>, Empty<Bytes>>,
    timeout: Duration,
}

impl HyperUpstreamClient {
    /// # Errors
    /// TLS provider initialization failures.
    pub fn new(timeout: Duration) -> Result<Self, UpstreamError> {
        let https = hyper_rustls::HttpsConnectorBuilder::new()
            .with_provider_and_webpki_roots(crypto_provider())
            .map_err(|e| UpstreamError::Transport(format!("tls setup: {e}")))?
            .https_or_http()
            .enable_all_versions()
            .build();

        let client = Client::builder(TokioExecutor::new())
            .pool_timer(TokioTimer::new())
            .pool_idle_timeout(Duration::from_secs(90))
            .build(https);

        Ok(Self { client, timeout })
    }

    async fn fetch(&self, uri: http::Uri) -> Result<UpstreamResponse, UpstreamError> {
        let request = http::Request::get(uri)
            .header(USER_AGENT, UA)
            .body(Empty::new())
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let response = self
            .client
            .request(request)
            .await
            .map_err(|e| UpstreamError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_owned);
        let body = Limited::new(response.into_body(), MAX_BODY_BYTES)
            .collect()
            .await
            .map_err(|e| UpstreamError::Transport(format!("reading body: {e}")))?
            .to_bytes();

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }
}

#[async_trait]
impl UpstreamClient for HyperUpstreamClient {
    async fn get(&self, url: &str) -> Result<UpstreamResponse, UpstreamError> {
        let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| UpstreamError::InvalidUrl {
            url: url.to_owned(),
            reason: e.to_string(),
        })?;

        tokio::time::timeout(self.timeout, self.fetch(uri))
            .await
            .map_err(|_| UpstreamError::Timeout(self.timeout))?
    }
}
