use std::sync::Arc;

use axum::routing::get;
use tokio::sync::Mutex;

use crate::config::ServerConfig;
use crate::core::pipeline::AdmissionPipeline;
use crate::core::request::GatewayRequest;
use crate::error::GatewayError;
use crate::health::HealthAggregator;
use crate::identity::CredentialVerifier;

/// Serving surface for the admission pipeline.
///
/// Health endpoints are answered locally from the aggregator; everything
/// else is verified, converted and run through the pipeline.
pub struct EdgeGateway {
    pipeline: Arc<AdmissionPipeline>,
    verifier: Arc<dyn CredentialVerifier>,
    aggregator: Arc<HealthAggregator>,
    config: ServerConfig,
    server_state: Arc<Mutex<ServerState>>,
}

/// Server state that can be mutated
struct ServerState {
    server_handle: Option<tokio::task::JoinHandle<()>>,
    shutdown_tx: Option<tokio::sync::oneshot::Sender<()>>,
}

impl EdgeGateway {
    pub fn new(
        pipeline: Arc<AdmissionPipeline>,
        verifier: Arc<dyn CredentialVerifier>,
        aggregator: Arc<HealthAggregator>,
        config: ServerConfig,
    ) -> Self {
        Self {
            pipeline,
            verifier,
            aggregator,
            config,
            server_state: Arc::new(Mutex::new(ServerState {
                server_handle: None,
                shutdown_tx: None,
            })),
        }
    }

    /// Start serving. Returns once the listener is up; the server runs on
    /// its own task until `stop` is called.
    pub async fn start(&self) -> Result<(), GatewayError> {
        let mut server_state = self.server_state.lock().await;
        if server_state.server_handle.is_some() {
            return Err(GatewayError::InternalError(
                "server is already running".to_string(),
            ));
        }

        let app = self.build_router();

        let addr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .map_err(|e| GatewayError::InternalError(format!("invalid bind address: {}", e)))?;

        tracing::info!(%addr, "starting edge gateway");

        let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();

        let server_handle = tokio::spawn(async move {
            let server = axum::Server::bind(&addr).serve(app.into_make_service());

            let graceful = server.with_graceful_shutdown(async {
                shutdown_rx.await.ok();
                tracing::info!("shutdown signal received, draining connections");
            });

            if let Err(e) = graceful.await {
                tracing::error!(error = %e, "server error");
            }
        });

        server_state.server_handle = Some(server_handle);
        server_state.shutdown_tx = Some(shutdown_tx);

        Ok(())
    }

    /// Signal shutdown and wait for the server task to finish
    pub async fn stop(&self) -> Result<(), GatewayError> {
        let mut server_state = self.server_state.lock().await;

        if server_state.server_handle.is_none() {
            return Err(GatewayError::InternalError(
                "server is not running".to_string(),
            ));
        }

        if let Some(tx) = server_state.shutdown_tx.take() {
            let _ = tx.send(());
        }

        if let Some(handle) = server_state.server_handle.take() {
            handle
                .await
                .map_err(|e| GatewayError::InternalError(format!("shutdown failed: {}", e)))?;
        }

        tracing::info!("edge gateway stopped");
        Ok(())
    }

    fn build_router(&self) -> axum::Router {
        let health = self.aggregator.clone();
        let ready = self.aggregator.clone();
        let pipeline = self.pipeline.clone();
        let verifier = self.verifier.clone();

        axum::Router::new()
            .route(
                "/health",
                get(move || {
                    let aggregator = health.clone();
                    async move { health_response(&aggregator).await }
                }),
            )
            .route("/health/live", get(|| async { "OK" }))
            .route(
                "/health/ready",
                get(move || {
                    let aggregator = ready.clone();
                    async move { health_response(&aggregator).await }
                }),
            )
            .fallback(move |req: axum::http::Request<axum::body::Body>| {
                let pipeline = pipeline.clone();
                let verifier = verifier.clone();
                async move { admit_http(pipeline, verifier, req).await }
            })
            .layer(tower_http::trace::TraceLayer::new_for_http())
    }
}

async fn health_response(
    aggregator: &HealthAggregator,
) -> (axum::http::StatusCode, axum::Json<serde_json::Value>) {
    let snapshot = aggregator.snapshot().await;
    let status = if snapshot.is_serving() {
        axum::http::StatusCode::OK
    } else {
        axum::http::StatusCode::SERVICE_UNAVAILABLE
    };

    let body = serde_json::to_value(&snapshot).unwrap_or_else(|_| serde_json::json!({}));
    (status, axum::Json(body))
}

async fn admit_http(
    pipeline: Arc<AdmissionPipeline>,
    verifier: Arc<dyn CredentialVerifier>,
    req: axum::http::Request<axum::body::Body>,
) -> axum::http::Response<axum::body::Body> {
    let (parts, body) = req.into_parts();

    let body_bytes = match hyper::body::to_bytes(body).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::error!(error = %e, "failed to read request body");
            return error_response(500, "failed to read request body");
        }
    };

    let client_ip = parts
        .headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.split(',').next())
        .and_then(|s| s.trim().parse().ok());

    let request = GatewayRequest::new(parts.method, parts.uri, parts.headers, body_bytes, client_ip);

    let principal = verifier.verify(&request).await;

    match pipeline.admit(request, principal).await {
        Ok(response) => {
            let mut builder = axum::http::Response::builder().status(response.status);
            for (name, value) in response.headers.iter() {
                builder = builder.header(name, value);
            }
            builder
                .body(axum::body::Body::from(response.body))
                .unwrap_or_else(|_| error_response(500, "failed to build response"))
        }
        Err(e) => error_response(e.status_code(), &e.to_string()),
    }
}

fn error_response(status: u16, message: &str) -> axum::http::Response<axum::body::Body> {
    let body = serde_json::json!({ "error": message }).to_string();
    axum::http::Response::builder()
        .status(status)
        .header("content-type", "application/json")
        .body(axum::body::Body::from(body))
        .expect("static error response must build")
}
