use std::sync::Arc;
use std::time::Duration;

use tokio::signal;

use edge_gateway::cache::memory_store::MemoryStore;
use edge_gateway::cache::models::CachePolicy;
use edge_gateway::cache::redis_store::{RedisConfig, RedisStore};
use edge_gateway::cache::CacheGate;
use edge_gateway::config::GatewayConfig;
use edge_gateway::core::forwarder::{BackendRegistry, HttpForwarder};
use edge_gateway::core::gateway::EdgeGateway;
use edge_gateway::core::pipeline::AdmissionPipeline;
use edge_gateway::error::GatewayError;
use edge_gateway::health::probes::{HttpProbe, RedisProbe};
use edge_gateway::health::HealthAggregator;
use edge_gateway::identity::projector::IdentityProjector;
use edge_gateway::identity::NoopVerifier;
use edge_gateway::logging;
use edge_gateway::routing::{RouteTable, RouteTableHandle};

#[tokio::main]
async fn main() -> Result<(), GatewayError> {
    // Load configuration before logging so logging settings apply
    let config = match std::env::var("GATEWAY_CONFIG") {
        Ok(path) => GatewayConfig::from_file(&path)?,
        Err(_) => GatewayConfig::default(),
    };

    logging::init_tracing(&config.logging);

    if config.routes.is_empty() {
        tracing::warn!("no routes configured; every non-system request will be denied");
    }

    // Route table, published as an atomically swappable snapshot
    let table = Arc::new(RouteTableHandle::new(RouteTable::from_definitions(
        &config.routes,
    )?));

    let projector = IdentityProjector::new(config.identity.gateway_secret.clone());

    let registry = BackendRegistry::new(config.backends.clone());
    let forwarder = Arc::new(HttpForwarder::new(
        registry,
        Duration::from_secs(config.server.request_timeout),
    ));

    let probe_timeout = Duration::from_secs(config.health.probe_timeout);
    let mut aggregator = HealthAggregator::new(probe_timeout);
    for (service, address) in &config.backends {
        aggregator.register(Arc::new(HttpProbe::new(
            service.clone(),
            format!("{}/health", address.trim_end_matches('/')),
            probe_timeout,
        )));
    }

    let mut pipeline = AdmissionPipeline::new(table.clone(), projector, forwarder);

    if config.cache.enabled {
        let local = Arc::new(MemoryStore::with_max_entries(config.cache.max_entries));

        let gate = match &config.cache.redis_url {
            Some(url) => match RedisStore::new(RedisConfig { url: url.clone() }).await {
                Ok(store) => {
                    aggregator.register(Arc::new(RedisProbe::new("redis-cache", store.pool())));
                    CacheGate::tiered(local, Arc::new(store))
                }
                Err(err) => {
                    tracing::warn!(error = %err, "shared cache tier unreachable at startup, running local-only");
                    CacheGate::local_only(local)
                }
            },
            None => CacheGate::local_only(local),
        };

        let policy = CachePolicy {
            default_ttl: Duration::from_secs(config.cache.default_ttl),
            max_ttl: Duration::from_secs(config.cache.max_ttl),
            ..CachePolicy::default()
        };

        pipeline = pipeline.with_cache(gate).with_policy(policy);
    }

    let gateway = EdgeGateway::new(
        Arc::new(pipeline),
        Arc::new(NoopVerifier),
        Arc::new(aggregator),
        config.server.clone(),
    );

    gateway.start().await?;
    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        "edge gateway started"
    );

    signal::ctrl_c()
        .await
        .map_err(|e| GatewayError::InternalError(format!("failed to listen for ctrl-c: {}", e)))?;
    tracing::info!("shutdown signal received");

    gateway.stop().await?;

    Ok(())
}
