pub mod projector;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::core::request::GatewayRequest;

/// The verified identity of a caller.
///
/// Constructed fresh per request by the credential verifier; never
/// persisted. An instance without an authentication scheme represents an
/// anonymous caller even if claims are attached.
#[derive(Debug, Clone, Default)]
pub struct Principal {
    /// Authentication scheme the credential was verified under
    /// (e.g. "Bearer"); absent for anonymous identities
    pub scheme: Option<String>,

    /// Verified claims by name
    pub claims: HashMap<String, Value>,
}

impl Principal {
    /// Create an authenticated principal with string claims
    pub fn authenticated<'a, I>(scheme: &str, claims: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            scheme: Some(scheme.to_string()),
            claims: claims
                .into_iter()
                .map(|(k, v)| (k.to_string(), Value::String(v.to_string())))
                .collect(),
        }
    }

    /// Create an anonymous principal (claims present, no scheme)
    pub fn anonymous<'a, I>(claims: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        Self {
            scheme: None,
            ..Self::authenticated("", claims)
        }
    }

    /// Whether this principal was actually authenticated.
    ///
    /// A blank scheme counts as anonymous.
    pub fn is_authenticated(&self) -> bool {
        self.scheme
            .as_deref()
            .map(|s| !s.trim().is_empty())
            .unwrap_or(false)
    }

    /// Read a claim as a non-blank string.
    ///
    /// Returns None for missing claims, blank values and non-string
    /// values; the caller treats all three as "claim absent".
    pub fn claim_str(&self, name: &str) -> Option<&str> {
        match self.claims.get(name) {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.as_str()),
            Some(Value::String(_)) | None => None,
            Some(other) => {
                tracing::debug!(claim = name, value_type = %value_type(other), "non-string claim value ignored");
                None
            }
        }
    }
}

fn value_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Produces a Principal from an inbound credential before the pipeline
/// runs. The pipeline never parses raw tokens itself.
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    /// Verify the request's credential, if any.
    ///
    /// Returns None for requests without a usable credential; invalid
    /// credentials also yield None rather than an error, since the
    /// authorizer decides whether identity is required.
    async fn verify(&self, request: &GatewayRequest) -> Option<Principal>;
}

/// Verifier for deployments where no credentials are consumed at the edge;
/// every request is anonymous.
pub struct NoopVerifier;

#[async_trait]
impl CredentialVerifier for NoopVerifier {
    async fn verify(&self, _request: &GatewayRequest) -> Option<Principal> {
        None
    }
}
