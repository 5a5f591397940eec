// Edge Gateway Library

pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod health;
pub mod identity;
pub mod logging;
pub mod routing;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{
    forwarder::{BackendRegistry, Forwarder, HttpForwarder},
    gateway::EdgeGateway,
    pipeline::AdmissionPipeline,
    request::GatewayRequest,
    response::GatewayResponse,
};
pub use error::{CacheError, ConfigError, GatewayError, HealthError};
pub use identity::{projector::IdentityProjector, CredentialVerifier, Principal};
pub use routing::{RouteRule, RouteTable, RouteTableHandle};
