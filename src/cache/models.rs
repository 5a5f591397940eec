use std::time::{Duration, SystemTime};

use bytes::Bytes;
use hyper::{HeaderMap, StatusCode};
use serde::{Deserialize, Serialize};

use crate::core::response::{CacheInfo, GatewayResponse};
use crate::utils::unix_now;

/// A stored response with the metadata needed for expiry and selective
/// invalidation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// The HTTP status code
    pub status: u16,

    /// The HTTP headers (serialized as name/value pairs)
    pub headers: Vec<(String, String)>,

    /// The response body
    pub body: Vec<u8>,

    /// Content type of the response
    pub content_type: Option<String>,

    /// Logical backend this entry belongs to, used for selective
    /// invalidation
    pub service_tag: String,

    /// When the response was stored (unix seconds)
    pub stored_at: u64,

    /// Time-to-live in seconds
    pub ttl: u64,
}

impl CacheEntry {
    /// Capture a response for storage
    pub fn from_response(response: &GatewayResponse, service_tag: &str, ttl: Duration) -> Self {
        let headers = response
            .headers
            .iter()
            .filter_map(|(name, value)| {
                let value = value.to_str().ok()?.to_string();
                Some((name.as_str().to_string(), value))
            })
            .collect();

        Self {
            status: response.status.as_u16(),
            headers,
            body: response.body.to_vec(),
            content_type: response.content_type(),
            service_tag: service_tag.to_string(),
            stored_at: unix_now(),
            ttl: ttl.as_secs(),
        }
    }

    /// Rebuild the response this entry captured
    pub fn to_response(&self, cache_key: &str) -> GatewayResponse {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            if let (Ok(name), Ok(value)) = (
                name.parse::<hyper::header::HeaderName>(),
                value.parse::<hyper::header::HeaderValue>(),
            ) {
                headers.insert(name, value);
            }
        }

        GatewayResponse::new(
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::OK),
            headers,
            Bytes::from(self.body.clone()),
        )
        .with_cache_info(CacheInfo {
            cache_hit: true,
            ttl_seconds: Some(self.remaining_ttl()),
            cache_key: cache_key.to_string(),
        })
        .with_service(self.service_tag.clone())
    }

    /// Whether the entry's TTL has elapsed.
    ///
    /// A zero TTL entry is expired the moment it is stored.
    pub fn is_expired(&self) -> bool {
        unix_now() >= self.stored_at + self.ttl
    }

    /// Remaining TTL in seconds
    pub fn remaining_ttl(&self) -> u64 {
        (self.stored_at + self.ttl).saturating_sub(unix_now())
    }
}

/// Cache key derivation options
#[derive(Debug, Clone)]
pub struct CacheKeyOptions {
    /// Headers allowed to influence the cache key. Sensitive headers are
    /// excluded by a fixed deny-list regardless of this whitelist.
    pub include_headers: Vec<String>,
}

impl Default for CacheKeyOptions {
    fn default() -> Self {
        Self {
            include_headers: vec!["accept".to_string(), "accept-language".to_string()],
        }
    }
}

/// Policy for what gets cached and for how long.
///
/// TTL policy lives here, outside the cache gate; the pipeline computes a
/// TTL per response and hands it to the gate.
#[derive(Debug, Clone)]
pub struct CachePolicy {
    /// Default TTL for cached responses
    pub default_ttl: Duration,

    /// Maximum TTL for cached responses
    pub max_ttl: Duration,

    /// HTTP status codes that can be cached
    pub cacheable_status_codes: Vec<StatusCode>,

    /// Whether Cache-Control/Expires response headers are honored
    pub respect_cache_control: bool,

    /// Cache key derivation options
    pub key_options: CacheKeyOptions,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            default_ttl: Duration::from_secs(60),
            max_ttl: Duration::from_secs(3600),
            cacheable_status_codes: vec![
                StatusCode::OK,
                StatusCode::NOT_FOUND,
                StatusCode::MOVED_PERMANENTLY,
                StatusCode::PERMANENT_REDIRECT,
            ],
            respect_cache_control: true,
            key_options: CacheKeyOptions::default(),
        }
    }
}

impl CachePolicy {
    /// Check if a response is cacheable under this policy
    pub fn is_response_cacheable(&self, response: &GatewayResponse) -> bool {
        if !self.cacheable_status_codes.contains(&response.status) {
            return false;
        }

        if self.respect_cache_control {
            if let Some(cache_control) = response.headers.get(hyper::header::CACHE_CONTROL) {
                if let Ok(value) = cache_control.to_str() {
                    if value.contains("no-store") || value.contains("private") {
                        return false;
                    }
                }
            }
        }

        true
    }

    /// TTL for a response under this policy and the response's own
    /// freshness headers
    pub fn ttl_for_response(&self, response: &GatewayResponse) -> Duration {
        let mut ttl = self.default_ttl;

        if self.respect_cache_control {
            if let Some(max_age) = self.max_age_directive(response) {
                ttl = Duration::from_secs(max_age);
            } else if let Some(expires) = self.expires_ttl(response) {
                ttl = expires;
            }
        }

        ttl.min(self.max_ttl)
    }

    fn max_age_directive(&self, response: &GatewayResponse) -> Option<u64> {
        let value = response
            .headers
            .get(hyper::header::CACHE_CONTROL)?
            .to_str()
            .ok()?;

        value
            .split(',')
            .map(str::trim)
            .find_map(|directive| directive.strip_prefix("max-age="))
            .and_then(|age| age.parse::<u64>().ok())
    }

    fn expires_ttl(&self, response: &GatewayResponse) -> Option<Duration> {
        let value = response
            .headers
            .get(hyper::header::EXPIRES)?
            .to_str()
            .ok()?;

        let expires_at = httpdate::parse_http_date(value).ok()?;
        match expires_at.duration_since(SystemTime::now()) {
            Ok(duration) => Some(duration),
            // Already expired: keep only for the minimum useful window
            Err(_) => Some(Duration::from_secs(1)),
        }
    }
}
