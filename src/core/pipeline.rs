use std::sync::Arc;

use hyper::StatusCode;

use crate::cache::models::CachePolicy;
use crate::cache::CacheGate;
use crate::core::forwarder::Forwarder;
use crate::core::request::GatewayRequest;
use crate::core::response::GatewayResponse;
use crate::error::GatewayError;
use crate::identity::projector::IdentityProjector;
use crate::identity::Principal;
use crate::routing::authorizer::{authorize, AuthzVerdict};
use crate::routing::{RouteRule, RouteTableHandle};
use crate::utils::{is_cacheable_method, is_mutating_method};

/// The ordered admission decisions applied to every request before it is
/// handed to the forwarding collaborator.
///
/// Authorization runs first and may short-circuit with a denial; identity
/// projection enriches the outbound headers; the cache gate may
/// short-circuit with a stored response; otherwise the request is
/// forwarded and the response is considered for caching or triggers
/// invalidation. Components never share locks; each request task owns
/// its own state.
pub struct AdmissionPipeline {
    table: Arc<RouteTableHandle>,
    projector: IdentityProjector,
    forwarder: Arc<dyn Forwarder>,
    cache: Option<CacheGate>,
    policy: CachePolicy,
}

impl AdmissionPipeline {
    pub fn new(
        table: Arc<RouteTableHandle>,
        projector: IdentityProjector,
        forwarder: Arc<dyn Forwarder>,
    ) -> Self {
        Self {
            table,
            projector,
            forwarder,
            cache: None,
            policy: CachePolicy::default(),
        }
    }

    /// Enable response caching through the given gate
    pub fn with_cache(mut self, cache: CacheGate) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Override the cache TTL policy
    pub fn with_policy(mut self, policy: CachePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The current route table handle (shared with config reloading)
    pub fn table(&self) -> &Arc<RouteTableHandle> {
        &self.table
    }

    /// Run a request through admission.
    ///
    /// Returns the response to send to the caller: a denial, a cached
    /// response, or the forwarded backend response. Forwarder errors are
    /// the only errors that escape; cache trouble degrades silently.
    pub async fn admit(
        &self,
        mut request: GatewayRequest,
        principal: Option<Principal>,
    ) -> Result<GatewayResponse, GatewayError> {
        let table = self.table.snapshot();
        let verdict = authorize(
            &table,
            request.uri.path(),
            &request.method,
            principal.as_ref(),
        );

        let rule = match verdict {
            AuthzVerdict::Deny(denial) => return Ok(denial.into_response()),
            AuthzVerdict::Allow(rule) => Some(rule),
            AuthzVerdict::AllowPublic => {
                // Public paths may still be backend-served (docs, metrics);
                // any configured rule supplies the forwarding target
                table
                    .first_match(&request.normalized_path(), &request.method)
                    .cloned()
            }
        };

        let rule = match rule {
            Some(rule) => rule,
            None => {
                // Admitted, but nothing serves this path at this layer
                return Ok(GatewayResponse::denial(
                    StatusCode::NOT_FOUND,
                    "Not Found",
                    &request.normalized_path(),
                ));
            }
        };

        let outbound = self.projector.project(principal.as_ref());
        request.apply_headers(&outbound);

        match self.cacheable_gate(&rule, &request) {
            Some(gate) => self.admit_through_cache(gate, rule, request).await,
            None => self.forward_and_invalidate(&rule, &request).await,
        }
    }

    /// The cache gate, if this request is a read-path cache candidate
    fn cacheable_gate(&self, rule: &RouteRule, request: &GatewayRequest) -> Option<&CacheGate> {
        if !rule.cache_enabled || !is_cacheable_method(&request.method) {
            return None;
        }
        self.cache.as_ref()
    }

    async fn admit_through_cache(
        &self,
        gate: &CacheGate,
        rule: RouteRule,
        request: GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let key = gate.cache_key(&request);

        if let Some(hit) = gate.lookup(&key).await {
            tracing::debug!(key = %key, service = %rule.service, "cache hit");
            return Ok(hit);
        }

        let response = self.forwarder.forward(&request, &rule.service).await?;

        if self.policy.is_response_cacheable(&response) {
            let ttl = self.policy.ttl_for_response(&response);
            gate.store(&key, &response, &rule.service, ttl).await;
        }

        Ok(response)
    }

    async fn forward_and_invalidate(
        &self,
        rule: &RouteRule,
        request: &GatewayRequest,
    ) -> Result<GatewayResponse, GatewayError> {
        let response = self.forwarder.forward(request, &rule.service).await?;

        // A successful mutation makes previously cached reads for this
        // service stale
        if is_mutating_method(&request.method) && response.status.is_success() {
            if let Some(gate) = &self.cache {
                gate.invalidate(&rule.service).await;
            }
        }

        Ok(response)
    }
}
