use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bytes::Bytes;
use hyper::{HeaderMap, Method, Uri};

use edge_gateway::cache::models::CacheKeyOptions;
use edge_gateway::cache::derive_cache_key;
use edge_gateway::config::RouteDefinition;
use edge_gateway::core::request::GatewayRequest;
use edge_gateway::identity::projector::IdentityProjector;
use edge_gateway::identity::Principal;
use edge_gateway::routing::authorizer::authorize;
use edge_gateway::routing::RouteTable;
use edge_gateway::utils::normalize_path;

fn route(service: &str, prefix: &str, methods: &[&str], requires_auth: bool) -> RouteDefinition {
    RouteDefinition {
        service: service.to_string(),
        path_prefix: prefix.to_string(),
        methods: methods.iter().map(|m| m.to_string()).collect(),
        requires_auth,
        cache_enabled: true,
    }
}

fn benchmark_table() -> RouteTable {
    let mut routes = Vec::new();
    for i in 0..50 {
        routes.push(route(
            &format!("service-{}", i),
            &format!("/api/service{}", i),
            &["GET", "POST"],
            i % 2 == 0,
        ));
    }
    RouteTable::from_definitions(&routes).expect("benchmark table must build")
}

fn bench_authorize(c: &mut Criterion) {
    let table = benchmark_table();
    let principal = Principal::authenticated("Bearer", [("sub", "42")]);

    c.bench_function("authorize_hit_late_rule", |b| {
        b.iter(|| {
            authorize(
                black_box(&table),
                black_box("/api/service49/items/7"),
                &Method::GET,
                Some(&principal),
            )
        })
    });

    c.bench_function("authorize_default_deny", |b| {
        b.iter(|| {
            authorize(
                black_box(&table),
                black_box("/api/unknown"),
                &Method::GET,
                None,
            )
        })
    });
}

fn bench_cache_key(c: &mut Criterion) {
    let options = CacheKeyOptions::default();
    let mut headers = HeaderMap::new();
    headers.insert("accept", "application/json".parse().unwrap());
    let request = GatewayRequest::new(
        Method::GET,
        Uri::from_static("http://gw/api/service1/items?page=3&sort=name"),
        headers,
        Bytes::new(),
        None,
    );

    c.bench_function("derive_cache_key", |b| {
        b.iter(|| derive_cache_key(black_box(&request), &options))
    });
}

fn bench_normalize_path(c: &mut Criterion) {
    c.bench_function("normalize_path", |b| {
        b.iter(|| normalize_path(black_box("/API//Service1/Items/42/")))
    });
}

fn bench_projection(c: &mut Criterion) {
    let projector = IdentityProjector::new(Some("s3cret".to_string()));
    let principal = Principal::authenticated(
        "Bearer",
        [
            ("sub", "42"),
            ("email", "ada@example.com"),
            ("role", "admin"),
            ("name", "Ada"),
        ],
    );

    c.bench_function("project_identity", |b| {
        b.iter(|| projector.project(black_box(Some(&principal))))
    });
}

criterion_group!(
    benches,
    bench_authorize,
    bench_cache_key,
    bench_normalize_path,
    bench_projection
);
criterion_main!(benches);
