use thiserror::Error;

/// Gateway error types
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Backend service unavailable")]
    BackendUnavailable,

    #[error("Request timeout")]
    RequestTimeout,

    #[error("Cache error: {0}")]
    CacheError(#[from] CacheError),

    #[error("Configuration error: {0}")]
    ConfigError(#[from] ConfigError),

    #[error("Health error: {0}")]
    HealthError(#[from] HealthError),

    #[error("Internal server error: {0}")]
    InternalError(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Unknown backend service: {0}")]
    UnknownService(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// HTTP status code mapping for gateway errors
impl GatewayError {
    pub fn status_code(&self) -> u16 {
        match self {
            GatewayError::BackendUnavailable => 503,
            GatewayError::RequestTimeout => 504,
            GatewayError::CacheError(_) => 500,
            GatewayError::ConfigError(_) => 500,
            GatewayError::HealthError(_) => 500,
            GatewayError::InternalError(_) => 500,
            GatewayError::InvalidRequest(_) => 400,
            GatewayError::UnknownService(_) => 502,
            GatewayError::IoError(_) => 500,
        }
    }
}

/// Cache specific errors
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Failed to connect to cache: {0}")]
    ConnectionError(String),

    #[error("Failed to store item in cache: {0}")]
    StoreError(String),

    #[error("Failed to retrieve item from cache: {0}")]
    RetrieveError(String),

    #[error("Cache item expired")]
    Expired,
}

/// Health probe specific errors
#[derive(Debug, Error)]
pub enum HealthError {
    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Probe timed out")]
    ProbeTimeout,
}

/// Configuration specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}
