pub mod memory_store;
pub mod models;
pub mod redis_store;

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::core::request::GatewayRequest;
use crate::core::response::GatewayResponse;
use crate::error::CacheError;
use models::{CacheEntry, CacheKeyOptions};

/// Headers that must never influence a cache key, regardless of the
/// configured whitelist
const SENSITIVE_HEADERS: &[&str] = &[
    "authorization",
    "cookie",
    "set-cookie",
    "proxy-authorization",
    "x-api-key",
];

/// One tier of the cache hierarchy
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get a cached entry; expired entries read as misses
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>, CacheError>;

    /// Store an entry under a key
    async fn set(&self, key: &str, entry: CacheEntry, ttl: Duration) -> Result<(), CacheError>;

    /// Delete a single entry
    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Remove every entry tagged with the given service
    async fn invalidate_service(&self, service_tag: &str) -> Result<(), CacheError>;

    /// Clear the entire tier
    async fn clear(&self) -> Result<(), CacheError>;

    /// Check if a key exists in this tier
    async fn exists(&self, key: &str) -> Result<bool, CacheError>;
}

/// Derive the cache key for a request.
///
/// Deterministic over method, normalized path, normalized query and the
/// whitelisted headers; sensitive headers are excluded even when
/// whitelisted. Long keys are hashed to keep shared-tier keys bounded.
pub fn derive_cache_key(request: &GatewayRequest, options: &CacheKeyOptions) -> String {
    let mut parts = vec![request.method.to_string(), request.normalized_path()];

    let query = request.normalized_query();
    if !query.is_empty() {
        parts.push(query);
    }

    for header_name in &options.include_headers {
        let lowered = header_name.to_lowercase();
        if SENSITIVE_HEADERS.contains(&lowered.as_str()) {
            continue;
        }
        if let Some(value) = request.header(&lowered) {
            parts.push(format!("{}:{}", lowered, value));
        }
    }

    let key = parts.join(":");

    if key.len() > 200 {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        format!("hashed:{:x}", hasher.finish())
    } else {
        key
    }
}

/// Tiered cache front: a fast local tier backed by an optional shared
/// tier.
///
/// Reads check local first and fall through to the shared tier, with
/// shared hits populated back into the local tier. A missing or
/// unreachable shared tier degrades the gate to local-only operation;
/// cache trouble is logged, never surfaced as a request failure.
pub struct CacheGate {
    local: Arc<dyn CacheStore>,
    shared: Option<Arc<dyn CacheStore>>,
    key_options: CacheKeyOptions,
}

impl CacheGate {
    /// Create a local-only gate
    pub fn local_only(local: Arc<dyn CacheStore>) -> Self {
        Self {
            local,
            shared: None,
            key_options: CacheKeyOptions::default(),
        }
    }

    /// Create a tiered gate with a shared tier behind the local one
    pub fn tiered(local: Arc<dyn CacheStore>, shared: Arc<dyn CacheStore>) -> Self {
        Self {
            local,
            shared: Some(shared),
            key_options: CacheKeyOptions::default(),
        }
    }

    /// Override the key derivation options
    pub fn with_key_options(mut self, key_options: CacheKeyOptions) -> Self {
        self.key_options = key_options;
        self
    }

    /// The cache key for a request under this gate's options
    pub fn cache_key(&self, request: &GatewayRequest) -> String {
        derive_cache_key(request, &self.key_options)
    }

    /// Look up a fresh entry across the tiers
    pub async fn lookup(&self, key: &str) -> Option<GatewayResponse> {
        match self.local.get(key).await {
            Ok(Some(entry)) => return Some(entry.to_response(key)),
            Ok(None) => {}
            Err(err) => tracing::warn!(key, error = %err, "local cache tier read failed"),
        }

        let shared = self.shared.as_ref()?;
        match shared.get(key).await {
            Ok(Some(entry)) => {
                // Read-through: shared hits warm the local tier
                let ttl = Duration::from_secs(entry.remaining_ttl());
                if let Err(err) = self.local.set(key, entry.clone(), ttl).await {
                    tracing::warn!(key, error = %err, "local tier population failed");
                }
                Some(entry.to_response(key))
            }
            Ok(None) => None,
            Err(err) => {
                tracing::warn!(key, error = %err, "shared cache tier unavailable, degrading to local");
                None
            }
        }
    }

    /// Store a response in both tiers.
    ///
    /// The local write completes before returning; the shared write is
    /// fire-and-forget so a slow shared tier never delays the response.
    pub async fn store(
        &self,
        key: &str,
        response: &GatewayResponse,
        service_tag: &str,
        ttl: Duration,
    ) {
        let entry = CacheEntry::from_response(response, service_tag, ttl);

        if let Err(err) = self.local.set(key, entry.clone(), ttl).await {
            tracing::warn!(key, error = %err, "local cache store failed");
        }

        if let Some(shared) = &self.shared {
            let shared = shared.clone();
            let key = key.to_string();
            tokio::spawn(async move {
                if let Err(err) = shared.set(&key, entry, ttl).await {
                    tracing::warn!(key = %key, error = %err, "shared cache store failed");
                }
            });
        }
    }

    /// Remove every entry for the given service from both tiers.
    ///
    /// Unrelated tags are untouched and concurrent reads/writes for other
    /// keys proceed normally.
    pub async fn invalidate(&self, service_tag: &str) {
        if let Err(err) = self.local.invalidate_service(service_tag).await {
            tracing::warn!(service_tag, error = %err, "local cache invalidation failed");
        }

        if let Some(shared) = &self.shared {
            if let Err(err) = shared.invalidate_service(service_tag).await {
                tracing::warn!(service_tag, error = %err, "shared cache invalidation failed");
            }
        }
    }
}
