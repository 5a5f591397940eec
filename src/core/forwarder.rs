use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use hyper::HeaderMap;
use reqwest::Client;
use tracing::warn;

use crate::core::request::GatewayRequest;
use crate::core::response::GatewayResponse;
use crate::error::GatewayError;

/// Headers that are connection-scoped and must not travel upstream
const HOP_BY_HOP_HEADERS: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host",
];

/// Maps a route's service label to a reachable backend address.
///
/// Used only by the forwarder; the admission pipeline itself never
/// consults addresses.
#[derive(Debug, Clone, Default)]
pub struct BackendRegistry {
    backends: HashMap<String, String>,
}

impl BackendRegistry {
    pub fn new(backends: HashMap<String, String>) -> Self {
        Self { backends }
    }

    /// Base address for a service label
    pub fn address_for(&self, service: &str) -> Option<&str> {
        self.backends.get(service).map(|s| s.as_str())
    }
}

/// The forwarding collaborator: everything past admission.
///
/// Implementations own connection reuse, timeouts and retries; the
/// pipeline treats the result as an opaque status + headers + body.
#[async_trait]
pub trait Forwarder: Send + Sync {
    async fn forward(
        &self,
        request: &GatewayRequest,
        service: &str,
    ) -> Result<GatewayResponse, GatewayError>;
}

/// Plain HTTP forwarder over a pooled reqwest client
pub struct HttpForwarder {
    client: Client,
    registry: BackendRegistry,
}

impl HttpForwarder {
    pub fn new(registry: BackendRegistry, request_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .unwrap_or_else(|_| {
                warn!("failed to build forwarder client with timeout, using default");
                Client::new()
            });

        Self { client, registry }
    }
}

/// Strip connection-scoped headers before forwarding
fn upstream_headers(headers: &HeaderMap) -> HeaderMap {
    let mut outbound = headers.clone();
    for name in HOP_BY_HOP_HEADERS {
        outbound.remove(*name);
    }
    outbound
}

#[async_trait]
impl Forwarder for HttpForwarder {
    async fn forward(
        &self,
        request: &GatewayRequest,
        service: &str,
    ) -> Result<GatewayResponse, GatewayError> {
        let base = self
            .registry
            .address_for(service)
            .ok_or_else(|| GatewayError::UnknownService(service.to_string()))?;

        let path_and_query = request
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let url = format!("{}{}", base.trim_end_matches('/'), path_and_query);

        let response = self
            .client
            .request(request.method.clone(), &url)
            .headers(upstream_headers(&request.headers))
            .body(request.body.clone())
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    GatewayError::RequestTimeout
                } else {
                    tracing::warn!(service, url = %url, error = %err, "backend call failed");
                    GatewayError::BackendUnavailable
                }
            })?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response.bytes().await.map_err(|err| {
            tracing::warn!(service, error = %err, "failed to read backend response body");
            GatewayError::BackendUnavailable
        })?;

        Ok(GatewayResponse::new(status, headers, body).with_service(service))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_registry_lookup() {
        let mut backends = HashMap::new();
        backends.insert("users".to_string(), "http://localhost:9001".to_string());
        let registry = BackendRegistry::new(backends);

        assert_eq!(registry.address_for("users"), Some("http://localhost:9001"));
        assert_eq!(registry.address_for("orders"), None);
    }

    #[test]
    fn test_hop_by_hop_headers_stripped() {
        let mut headers = HeaderMap::new();
        headers.insert("connection", HeaderValue::from_static("keep-alive"));
        headers.insert("host", HeaderValue::from_static("gateway.local"));
        headers.insert("x-user-id", HeaderValue::from_static("42"));

        let outbound = upstream_headers(&headers);
        assert!(outbound.get("connection").is_none());
        assert!(outbound.get("host").is_none());
        assert_eq!(outbound.get("x-user-id").unwrap(), "42");
    }
}
