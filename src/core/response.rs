use bytes::Bytes;
use hyper::{HeaderMap, StatusCode};

use crate::utils::unix_now;

/// Cache information for a response
#[derive(Debug, Clone)]
pub struct CacheInfo {
    /// Whether the response was served from cache
    pub cache_hit: bool,

    /// Time-to-live for the cached response
    pub ttl_seconds: Option<u64>,

    /// Cache key used to store/retrieve the response
    pub cache_key: String,
}

/// Represents a response leaving the admission pipeline
#[derive(Debug, Clone)]
pub struct GatewayResponse {
    /// HTTP status code
    pub status: StatusCode,

    /// HTTP headers
    pub headers: HeaderMap,

    /// Response body
    pub body: Bytes,

    /// Cache information (if applicable)
    pub cache_info: Option<CacheInfo>,

    /// Backend service that produced the response (if applicable)
    pub service: Option<String>,
}

impl GatewayResponse {
    /// Create a new GatewayResponse
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            cache_info: None,
            service: None,
        }
    }

    /// Build a machine-parseable admission denial response.
    ///
    /// The body is `{"error": ..., "path": ..., "timestamp": ...}` so that
    /// operators and callers can distinguish gateway denials from backend
    /// errors. The principal's identity is deliberately absent.
    pub fn denial(status: StatusCode, error: &str, path: &str) -> Self {
        let body = serde_json::json!({
            "error": error,
            "path": path,
            "timestamp": unix_now(),
        });

        let mut headers = HeaderMap::new();
        headers.insert(
            hyper::header::CONTENT_TYPE,
            hyper::header::HeaderValue::from_static("application/json"),
        );

        Self::new(status, headers, Bytes::from(body.to_string()))
    }

    /// Content type of the response, if present and readable
    pub fn content_type(&self) -> Option<String> {
        self.headers
            .get(hyper::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string())
    }

    /// Set cache information for this response
    pub fn with_cache_info(mut self, cache_info: CacheInfo) -> Self {
        self.cache_info = Some(cache_info);
        self
    }

    /// Set the producing service for this response
    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = Some(service.into());
        self
    }
}
