//! HTTP server setup and the tile pipeline.
//!
//! # Responsibilities
//! - Create the Axum router and wire up middleware (tracing, request ID)
//! - Drive the request pipeline: normalize → admit → fetch → classify
//! - Hold the admission ticket across the upstream call, including the retry
//! - Observability (metrics, correlation IDs)

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{RawQuery, State},
    http::{HeaderMap, Response},
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::{timeout::TimeoutLayer, trace::TraceLayer};

use crate::admission::AdmissionController;
use crate::config::GatewayConfig;
use crate::http::request::{request_id_middleware, X_REQUEST_ID};
use crate::http::response;
use crate::observability::metrics;
use crate::upstream::UpstreamClient;
use crate::wms;

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub admission: Arc<AdmissionController>,
    pub upstream: Arc<UpstreamClient>,
}

/// HTTP server for the tile gateway.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: GatewayConfig) -> Self {
        let state = AppState {
            admission: Arc::new(AdmissionController::new(config.admission.capacity)),
            upstream: Arc::new(UpstreamClient::new(&config.upstream)),
        };

        let router = Self::build_router(&config, state);
        Self { router }
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &GatewayConfig, state: AppState) -> Router {
        let mut router = Router::new()
            .route("/tiles", get(tile_handler))
            .with_state(state)
            .layer(axum::middleware::from_fn(request_id_middleware))
            .layer(TraceLayer::new_for_http());

        // 0 disables the deadline; the admission wait and the upstream call
        // are then unbounded.
        if config.timeouts.request_secs > 0 {
            router = router.layer(TimeoutLayer::new(Duration::from_secs(
                config.timeouts.request_secs,
            )));
        }

        router
    }

    /// Run the server, accepting connections on the given listener.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router.into_make_service())
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Tile endpoint handler.
///
/// Validation runs before admission so rejected requests never consume
/// upstream capacity. The admission ticket is held for the whole upstream
/// exchange and released when it drops, on every exit path.
async fn tile_handler(
    State(state): State<AppState>,
    RawQuery(raw_query): RawQuery,
    headers: HeaderMap,
) -> Response<Body> {
    let start = Instant::now();
    let request_id = headers
        .get(X_REQUEST_ID)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("unknown")
        .to_string();

    let params = url::form_urlencoded::parse(raw_query.as_deref().unwrap_or("").as_bytes())
        .into_owned();
    let query = match wms::normalize(params) {
        Ok(query) => query,
        Err(e) => {
            tracing::debug!(request_id = %request_id, error = %e, "Rejected tile request");
            metrics::record_request(400, "rejected", start);
            return response::validation_error(&e.to_string());
        }
    };
    let query_string = query.to_query_string();

    let _ticket = state.admission.admit().await;
    tracing::debug!(
        request_id = %request_id,
        in_flight = state.admission.in_flight(),
        "Upstream call admitted"
    );

    match state.upstream.fetch(&query_string, &headers).await {
        Ok(upstream) => {
            if query.debug() {
                metrics::record_request(upstream.status, "debug", start);
                return response::debug_response(
                    &state.upstream.target_url(&query_string),
                    &upstream,
                );
            }

            let outcome = if upstream.is_server_error() {
                "upstream_error"
            } else {
                "success"
            };
            tracing::debug!(
                request_id = %request_id,
                status = upstream.status,
                content_type = ?upstream.content_type,
                "Upstream call finished"
            );
            metrics::record_request(upstream.status, outcome, start);
            response::tile_response(&upstream)
        }
        Err(e) => {
            tracing::error!(request_id = %request_id, error = %e, "Upstream request failed");
            metrics::record_request(502, "unreachable", start);
            response::upstream_unreachable(e.to_string())
        }
    }
}
