use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use reqwest::Client;
use tracing::warn;

use crate::health::{DependencyProbe, DependencyReport};

/// HTTP health probe against a dependency's health endpoint.
///
/// 2xx is healthy, any other status is degraded (the dependency answers
/// but is unwell), transport failure is unhealthy.
pub struct HttpProbe {
    name: String,
    url: String,
    client: Client,
}

impl HttpProbe {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| {
                warn!("failed to build HTTP probe client with timeout, using default");
                Client::new()
            });

        Self {
            name: name.into(),
            url: url.into(),
            client,
        }
    }
}

#[async_trait]
impl DependencyProbe for HttpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> DependencyReport {
        match self.client.get(&self.url).send().await {
            Ok(response) if response.status().is_success() => DependencyReport::healthy(),
            Ok(response) => {
                DependencyReport::degraded(format!("status {}", response.status().as_u16()))
            }
            Err(err) => DependencyReport::unhealthy(err.to_string()),
        }
    }
}

/// Probe for the shared cache tier: a Redis PING over the pool
pub struct RedisProbe {
    name: String,
    pool: Pool,
}

impl RedisProbe {
    pub fn new(name: impl Into<String>, pool: Pool) -> Self {
        Self {
            name: name.into(),
            pool,
        }
    }
}

#[async_trait]
impl DependencyProbe for RedisProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> DependencyReport {
        let mut conn = match self.pool.get().await {
            Ok(conn) => conn,
            Err(err) => return DependencyReport::unhealthy(format!("pool: {}", err)),
        };

        match redis::cmd("PING")
            .query_async::<_, String>(&mut conn)
            .await
        {
            Ok(_) => DependencyReport::healthy(),
            Err(err) => DependencyReport::unhealthy(format!("ping: {}", err)),
        }
    }
}
