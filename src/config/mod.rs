use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Request timeout in seconds
    pub request_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout: 30,
        }
    }
}

/// Identity projection configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IdentityConfig {
    /// Pre-shared secret proving to backends that a request passed the
    /// gateway. A blank value disables the secret header entirely.
    pub gateway_secret: Option<String>,
}

/// Cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Whether caching is enabled
    pub enabled: bool,

    /// Default TTL in seconds
    pub default_ttl: u64,

    /// Maximum TTL in seconds
    pub max_ttl: u64,

    /// Maximum number of entries in the local tier
    pub max_entries: usize,

    /// Redis URL for the shared tier (local-only when absent)
    pub redis_url: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            default_ttl: 60,
            max_ttl: 3600,
            max_entries: 1000,
            redis_url: None,
        }
    }
}

/// Health aggregation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthConfig {
    /// Per-probe timeout in seconds
    pub probe_timeout: u64,
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self { probe_timeout: 2 }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,

    /// Whether to log in JSON format
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: true,
        }
    }
}

/// Route definition in configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteDefinition {
    /// Owning backend service label
    pub service: String,

    /// Path prefix this rule covers
    pub path_prefix: String,

    /// HTTP method names, matched case-insensitively
    pub methods: Vec<String>,

    /// Whether a verified identity is required
    #[serde(default)]
    pub requires_auth: bool,

    /// Whether responses on this route may be cached
    #[serde(default)]
    pub cache_enabled: bool,
}

/// Main gateway configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Identity projection configuration
    #[serde(default)]
    pub identity: IdentityConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Health aggregation configuration
    #[serde(default)]
    pub health: HealthConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Backend service label to base address
    #[serde(default)]
    pub backends: HashMap<String, String>,

    /// Route rules, in match order
    #[serde(default)]
    pub routes: Vec<RouteDefinition>,
}

impl GatewayConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::LoadError(format!("{}: {}", path.as_ref().display(), e)))?;

        let config: GatewayConfig = serde_json::from_str(&raw)
            .map_err(|e| ConfigError::LoadError(format!("invalid config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate route definitions against the table invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (i, route) in self.routes.iter().enumerate() {
            if route.path_prefix.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "route {}: empty path prefix",
                    i
                )));
            }
            if route.path_prefix.contains('?') {
                return Err(ConfigError::ValidationError(format!(
                    "route {}: path prefix '{}' contains a query string",
                    i, route.path_prefix
                )));
            }
            if route.methods.is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "route {}: empty method set for prefix '{}'",
                    i, route.path_prefix
                )));
            }
            if route.service.trim().is_empty() {
                return Err(ConfigError::ValidationError(format!(
                    "route {}: empty service label for prefix '{}'",
                    i, route.path_prefix
                )));
            }
        }
        Ok(())
    }
}
