use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use hyper::header::HeaderValue;
use hyper::{HeaderMap, Method, StatusCode, Uri};

use edge_gateway::cache::memory_store::MemoryStore;
use edge_gateway::cache::CacheGate;
use edge_gateway::config::RouteDefinition;
use edge_gateway::core::forwarder::Forwarder;
use edge_gateway::core::pipeline::AdmissionPipeline;
use edge_gateway::core::request::GatewayRequest;
use edge_gateway::core::response::GatewayResponse;
use edge_gateway::error::GatewayError;
use edge_gateway::identity::projector::IdentityProjector;
use edge_gateway::identity::Principal;
use edge_gateway::routing::{RouteTable, RouteTableHandle};

/// A forwarded call as seen by the mock backend
#[derive(Debug, Clone)]
struct ForwardedCall {
    service: String,
    method: Method,
    headers: HeaderMap,
}

/// Forwarder double that records calls and replays a canned response
struct RecordingForwarder {
    status: StatusCode,
    mutation_status: Option<StatusCode>,
    response_headers: HeaderMap,
    calls: Mutex<Vec<ForwardedCall>>,
}

impl RecordingForwarder {
    fn ok() -> Arc<Self> {
        Self::with_status(StatusCode::OK)
    }

    fn with_status(status: StatusCode) -> Arc<Self> {
        Arc::new(Self {
            status,
            mutation_status: None,
            response_headers: HeaderMap::new(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn with_response_header(status: StatusCode, name: &'static str, value: &str) -> Arc<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(name, HeaderValue::from_str(value).unwrap());
        Arc::new(Self {
            status,
            mutation_status: None,
            response_headers: headers,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn failing_mutations() -> Arc<Self> {
        Arc::new(Self {
            status: StatusCode::OK,
            mutation_status: Some(StatusCode::CONFLICT),
            response_headers: HeaderMap::new(),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<ForwardedCall> {
        self.calls.lock().unwrap().clone()
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Forwarder for RecordingForwarder {
    async fn forward(
        &self,
        request: &GatewayRequest,
        service: &str,
    ) -> Result<GatewayResponse, GatewayError> {
        self.calls.lock().unwrap().push(ForwardedCall {
            service: service.to_string(),
            method: request.method.clone(),
            headers: request.headers.clone(),
        });

        let status = match (&self.mutation_status, &request.method) {
            (Some(status), &Method::POST | &Method::PUT | &Method::PATCH | &Method::DELETE) => {
                *status
            }
            _ => self.status,
        };

        Ok(GatewayResponse::new(
            status,
            self.response_headers.clone(),
            Bytes::from_static(b"{\"ok\":true}"),
        )
        .with_service(service))
    }
}

fn route(
    service: &str,
    prefix: &str,
    methods: &[&str],
    requires_auth: bool,
    cache_enabled: bool,
) -> RouteDefinition {
    RouteDefinition {
        service: service.to_string(),
        path_prefix: prefix.to_string(),
        methods: methods.iter().map(|m| m.to_string()).collect(),
        requires_auth,
        cache_enabled,
    }
}

fn default_routes() -> Vec<RouteDefinition> {
    vec![
        route("users", "/api/users", &["GET"], false, true),
        route("users", "/api/users", &["POST", "PUT", "DELETE"], true, false),
        route("orders", "/api/orders", &["GET"], true, false),
    ]
}

fn pipeline_with(
    routes: &[RouteDefinition],
    secret: Option<&str>,
    forwarder: Arc<RecordingForwarder>,
    cached: bool,
) -> AdmissionPipeline {
    let table = Arc::new(RouteTableHandle::new(
        RouteTable::from_definitions(routes).unwrap(),
    ));
    let projector = IdentityProjector::new(secret.map(|s| s.to_string()));

    let mut pipeline = AdmissionPipeline::new(table, projector, forwarder);
    if cached {
        pipeline = pipeline.with_cache(CacheGate::local_only(Arc::new(MemoryStore::new())));
    }
    pipeline
}

fn request(method: Method, uri: &str) -> GatewayRequest {
    GatewayRequest::new(
        method,
        uri.parse::<Uri>().unwrap(),
        HeaderMap::new(),
        Bytes::new(),
        None,
    )
}

fn request_with_header(method: Method, uri: &str, name: &'static str, value: &str) -> GatewayRequest {
    let mut req = request(method, uri);
    req.headers.insert(name, HeaderValue::from_str(value).unwrap());
    req
}

fn authenticated_principal() -> Principal {
    Principal::authenticated(
        "Bearer",
        [
            ("sub", "42"),
            ("email", "ada@example.com"),
            ("role", "admin"),
            ("name", "Ada"),
        ],
    )
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

#[tokio::test]
async fn unauthenticated_mutation_is_denied_with_structured_401() {
    let forwarder = RecordingForwarder::ok();
    let pipeline = pipeline_with(&default_routes(), None, forwarder.clone(), false);

    let response = pipeline
        .admit(request(Method::POST, "http://gw/api/users"), None)
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"], "Unauthorized");
    assert_eq!(body["path"], "/api/users");
    assert!(body["timestamp"].is_u64());

    // The pipeline stopped before forwarding
    assert_eq!(forwarder.call_count(), 0);
}

#[tokio::test]
async fn unknown_route_is_denied_with_structured_403() {
    let forwarder = RecordingForwarder::ok();
    let pipeline = pipeline_with(&default_routes(), None, forwarder.clone(), false);

    let response = pipeline
        .admit(request(Method::GET, "http://gw/api/payments"), None)
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::FORBIDDEN);
    let body: serde_json::Value = serde_json::from_slice(&response.body).unwrap();
    assert_eq!(body["error"], "Forbidden");
    assert_eq!(forwarder.call_count(), 0);
}

#[tokio::test]
async fn authenticated_request_carries_projected_headers() {
    let forwarder = RecordingForwarder::ok();
    let pipeline = pipeline_with(&default_routes(), Some("s3cret"), forwarder.clone(), false);

    let response = pipeline
        .admit(
            request(Method::POST, "http://gw/api/users"),
            Some(authenticated_principal()),
        )
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::OK);

    let calls = forwarder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].service, "users");
    assert_eq!(header(&calls[0].headers, "x-gateway-secret"), Some("s3cret"));
    assert_eq!(header(&calls[0].headers, "x-user-id"), Some("42"));
    assert_eq!(
        header(&calls[0].headers, "x-user-email"),
        Some("ada@example.com")
    );
    assert_eq!(header(&calls[0].headers, "x-user-role"), Some("admin"));
    assert_eq!(header(&calls[0].headers, "x-user-name"), Some("Ada"));
}

#[tokio::test]
async fn spoofed_identity_headers_are_overwritten() {
    let forwarder = RecordingForwarder::ok();
    let pipeline = pipeline_with(&default_routes(), None, forwarder.clone(), false);

    let inbound = request_with_header(Method::POST, "http://gw/api/users", "x-user-id", "666");
    let response = pipeline
        .admit(inbound, Some(authenticated_principal()))
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::OK);

    let calls = forwarder.calls();
    assert_eq!(header(&calls[0].headers, "x-user-id"), Some("42"));
}

#[tokio::test]
async fn anonymous_request_gets_secret_but_no_identity() {
    let forwarder = RecordingForwarder::ok();
    let pipeline = pipeline_with(&default_routes(), Some("s3cret"), forwarder.clone(), false);

    pipeline
        .admit(request(Method::GET, "http://gw/api/users"), None)
        .await
        .unwrap();

    let calls = forwarder.calls();
    assert_eq!(header(&calls[0].headers, "x-gateway-secret"), Some("s3cret"));
    assert_eq!(header(&calls[0].headers, "x-user-id"), None);
    assert_eq!(header(&calls[0].headers, "x-user-email"), None);
}

#[tokio::test]
async fn cache_hit_short_circuits_second_request() {
    let forwarder = RecordingForwarder::ok();
    let pipeline = pipeline_with(&default_routes(), None, forwarder.clone(), true);

    let first = pipeline
        .admit(request(Method::GET, "http://gw/api/users/42"), None)
        .await
        .unwrap();
    assert!(first.cache_info.is_none());

    let second = pipeline
        .admit(request(Method::GET, "http://gw/api/users/42"), None)
        .await
        .unwrap();
    assert!(second.cache_info.unwrap().cache_hit);
    assert_eq!(second.body, first.body);

    assert_eq!(forwarder.call_count(), 1);
}

#[tokio::test]
async fn authorization_header_does_not_partition_the_cache() {
    let forwarder = RecordingForwarder::ok();
    let pipeline = pipeline_with(&default_routes(), None, forwarder.clone(), true);

    pipeline
        .admit(
            request_with_header(
                Method::GET,
                "http://gw/api/users",
                "authorization",
                "Bearer aaa",
            ),
            None,
        )
        .await
        .unwrap();

    let second = pipeline
        .admit(
            request_with_header(
                Method::GET,
                "http://gw/api/users",
                "authorization",
                "Bearer bbb",
            ),
            None,
        )
        .await
        .unwrap();

    // Identical requests up to credentials share one cache entry
    assert!(second.cache_info.unwrap().cache_hit);
    assert_eq!(forwarder.call_count(), 1);
}

#[tokio::test]
async fn zero_ttl_response_is_never_served_from_cache() {
    let forwarder =
        RecordingForwarder::with_response_header(StatusCode::OK, "cache-control", "max-age=0");
    let pipeline = pipeline_with(&default_routes(), None, forwarder.clone(), true);

    pipeline
        .admit(request(Method::GET, "http://gw/api/users"), None)
        .await
        .unwrap();
    let second = pipeline
        .admit(request(Method::GET, "http://gw/api/users"), None)
        .await
        .unwrap();

    assert!(second.cache_info.is_none());
    assert_eq!(forwarder.call_count(), 2);
}

#[tokio::test]
async fn error_responses_are_not_cached() {
    let forwarder = RecordingForwarder::with_status(StatusCode::INTERNAL_SERVER_ERROR);
    let pipeline = pipeline_with(&default_routes(), None, forwarder.clone(), true);

    for _ in 0..2 {
        let response = pipeline
            .admit(request(Method::GET, "http://gw/api/users"), None)
            .await
            .unwrap();
        assert_eq!(response.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(response.cache_info.is_none());
    }

    assert_eq!(forwarder.call_count(), 2);
}

#[tokio::test]
async fn successful_mutation_invalidates_service_entries() {
    let forwarder = RecordingForwarder::ok();
    let pipeline = pipeline_with(&default_routes(), None, forwarder.clone(), true);

    // Populate the cache
    pipeline
        .admit(request(Method::GET, "http://gw/api/users"), None)
        .await
        .unwrap();
    assert_eq!(forwarder.call_count(), 1);

    // Mutate the same service
    pipeline
        .admit(
            request(Method::DELETE, "http://gw/api/users/42"),
            Some(authenticated_principal()),
        )
        .await
        .unwrap();

    // The cached read is gone, so the next GET goes to the backend
    let after = pipeline
        .admit(request(Method::GET, "http://gw/api/users"), None)
        .await
        .unwrap();
    assert!(after.cache_info.is_none());
    assert_eq!(forwarder.call_count(), 3);
}

#[tokio::test]
async fn failed_mutation_keeps_cache_entries() {
    // Backend that serves reads but rejects mutations
    let forwarder = RecordingForwarder::failing_mutations();
    let pipeline = pipeline_with(&default_routes(), None, forwarder.clone(), true);

    pipeline
        .admit(request(Method::GET, "http://gw/api/users"), None)
        .await
        .unwrap();

    let rejected = pipeline
        .admit(
            request(Method::DELETE, "http://gw/api/users/1"),
            Some(authenticated_principal()),
        )
        .await
        .unwrap();
    assert_eq!(rejected.status, StatusCode::CONFLICT);

    // The failed mutation changed nothing, so the cached read survives
    let after = pipeline
        .admit(request(Method::GET, "http://gw/api/users"), None)
        .await
        .unwrap();
    assert!(after.cache_info.unwrap().cache_hit);
}

#[tokio::test]
async fn system_public_path_without_route_is_not_found() {
    let forwarder = RecordingForwarder::ok();
    let pipeline = pipeline_with(&default_routes(), None, forwarder.clone(), false);

    let response = pipeline
        .admit(request(Method::GET, "http://gw/metrics"), None)
        .await
        .unwrap();

    // Admitted (not 403), but nothing serves it at this layer
    assert_eq!(response.status, StatusCode::NOT_FOUND);
    assert_eq!(forwarder.call_count(), 0);
}

#[tokio::test]
async fn system_public_path_with_covering_route_is_forwarded() {
    let mut routes = default_routes();
    routes.push(route("platform", "/metrics", &["GET"], true, false));

    let forwarder = RecordingForwarder::ok();
    let pipeline = pipeline_with(&routes, None, forwarder.clone(), false);

    // Public status wins over the rule's auth requirement, and the rule
    // still supplies the forwarding target
    let response = pipeline
        .admit(request(Method::GET, "http://gw/metrics"), None)
        .await
        .unwrap();

    assert_eq!(response.status, StatusCode::OK);
    let calls = forwarder.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].service, "platform");
}

#[tokio::test]
async fn table_swap_changes_admission_for_new_requests() {
    let forwarder = RecordingForwarder::ok();
    let pipeline = pipeline_with(&default_routes(), None, forwarder.clone(), false);

    let denied = pipeline
        .admit(request(Method::GET, "http://gw/api/payments"), None)
        .await
        .unwrap();
    assert_eq!(denied.status, StatusCode::FORBIDDEN);

    let mut routes = default_routes();
    routes.push(route("payments", "/api/payments", &["GET"], false, false));
    pipeline
        .table()
        .replace(RouteTable::from_definitions(&routes).unwrap());

    let allowed = pipeline
        .admit(request(Method::GET, "http://gw/api/payments"), None)
        .await
        .unwrap();
    assert_eq!(allowed.status, StatusCode::OK);
}

#[tokio::test]
async fn concurrent_reads_race_safely_for_population() {
    let forwarder = RecordingForwarder::ok();
    let pipeline = Arc::new(pipeline_with(&default_routes(), None, forwarder.clone(), true));

    let mut handles = Vec::new();
    for _ in 0..16 {
        let pipeline = pipeline.clone();
        handles.push(tokio::spawn(async move {
            pipeline
                .admit(request(Method::GET, "http://gw/api/users"), None)
                .await
                .unwrap()
        }));
    }

    for handle in handles {
        let response = handle.await.unwrap();
        assert_eq!(response.status, StatusCode::OK);
    }

    // Racing population may duplicate a little backend work, but it must
    // stay bounded by the number of racers
    let calls = forwarder.call_count();
    assert!(calls >= 1 && calls <= 16);
}

#[tokio::test]
async fn method_matching_is_case_insensitive_through_the_pipeline() {
    let routes = vec![route("users", "/api/users", &["get"], false, false)];
    let forwarder = RecordingForwarder::ok();
    let pipeline = pipeline_with(&routes, None, forwarder.clone(), false);

    let response = pipeline
        .admit(request(Method::GET, "http://gw/API/Users/"), None)
        .await
        .unwrap();
    assert_eq!(response.status, StatusCode::OK);
    assert_eq!(forwarder.calls()[0].method, Method::GET);
}
