//! # haul-api: Axum API Services for the Haul Stack
//!
//! The logistics back-office lifecycle core: shipments and trips moving
//! through one status machine, a driver/vehicle registry with lazy
//! materialization and soft deletion, proof-of-delivery gating, payable
//! synthesis on completion, and an append-only dispatch timeline.
//!
//! ## API Surface
//!
//! | Prefix                    | Module                  | Domain            |
//! |---------------------------|-------------------------|-------------------|
//! | `/v1/shipments/*`         | [`routes::shipments`]   | Shipment lifecycle |
//! | `/v1/trips/*`             | [`routes::trips`]       | Trip lifecycle    |
//! | `/v1/resources/*`         | [`routes::resources`]   | Driver/vehicle registry |
//! | `/v1/identities/*`        | [`routes::identities`]  | Identity shadow records |
//! | `/v1/financial-records/*` | [`routes::financial`]   | Payables          |
//! | `/v1/ops/*`               | [`routes::ops`]         | Dead letters      |
//!
//! ## Middleware Stack (execution order)
//!
//! ```text
//! TraceLayer → MetricsMiddleware → AuthMiddleware → Handler
//! ```
//!
//! Health probes (`/health/*`) and `/metrics` are mounted outside the auth
//! middleware so they remain accessible without credentials.

pub mod auth;
pub mod db;
pub mod error;
pub mod extractors;
pub mod maps;
pub mod middleware;
pub mod openapi;
pub mod routes;
pub mod services;
pub mod state;

use axum::extract::{DefaultBodyLimit, State};
use axum::http::StatusCode;
use axum::middleware::from_fn;
use axum::response::IntoResponse;
use axum::{Extension, Router};
use tower_http::trace::TraceLayer;

use haul_state::{FinancialStatus, ResourceStatus, ShipmentStatus};

use crate::auth::AuthConfig;
use crate::middleware::metrics::ApiMetrics;
use crate::state::AppState;

pub use error::AppError;

/// Check if metrics are enabled via the `HAUL_METRICS_ENABLED` env var.
/// Defaults to `true` when the variable is absent or set to anything other
/// than `"false"`.
fn metrics_enabled() -> bool {
    std::env::var("HAUL_METRICS_ENABLED")
        .map(|v| v.to_lowercase() != "false")
        .unwrap_or(true)
}

/// Assemble the full application router with all routes and middleware.
pub fn app(state: AppState) -> Router {
    let auth_config = AuthConfig {
        token: state.config.auth_token.clone(),
    };
    let metrics = ApiMetrics::new();
    let metrics_on = metrics_enabled();

    // Authenticated API routes.
    //
    // Body size limit: 2 MiB. The POD upload route overrides this with its
    // own larger route-level limit.
    let api = Router::new()
        .merge(routes::shipments::router())
        .merge(routes::trips::router())
        .merge(routes::resources::router())
        .merge(routes::identities::router())
        .merge(routes::financial::router())
        .merge(routes::ops::router())
        .merge(openapi::router());

    let mut api = api
        .layer(DefaultBodyLimit::max(2 * 1024 * 1024))
        .layer(from_fn(auth::auth_middleware));

    // Only register the metrics middleware when metrics are enabled.
    if metrics_on {
        api = api
            .layer(from_fn(middleware::metrics::metrics_middleware))
            .layer(Extension(metrics.clone()));
    }

    let api = api
        .layer(TraceLayer::new_for_http())
        .layer(Extension(auth_config))
        .with_state(state.clone());

    // Unauthenticated health probes, readiness checks actual service health.
    let mut unauthenticated = Router::new()
        .route("/health/liveness", axum::routing::get(liveness))
        .route("/health/readiness", axum::routing::get(readiness));

    // Mount /metrics when enabled (unauthenticated, like health probes).
    if metrics_on {
        unauthenticated = unauthenticated
            .route("/metrics", axum::routing::get(prometheus_metrics))
            .layer(Extension(metrics));
    }

    let unauthenticated = unauthenticated.with_state(state);

    Router::new().merge(unauthenticated).merge(api)
}

/// GET /metrics: the Prometheus scrape endpoint.
///
/// Updates domain gauges from current `AppState` on each scrape (pull
/// model), then gathers and encodes all metrics in Prometheus text
/// exposition format.
async fn prometheus_metrics(
    State(state): State<AppState>,
    Extension(metrics): Extension<ApiMetrics>,
) -> impl IntoResponse {
    // -- Update domain gauges from AppState --

    let shipments = state.shipments.list();
    let trips = state.trips.list();
    metrics.shipments_total().reset();
    metrics.trips_total().reset();
    for &status in ShipmentStatus::all() {
        let label = status.as_str();
        metrics
            .shipments_total()
            .with_label_values(&[label])
            .set(shipments.iter().filter(|s| s.status == status).count() as f64);
        metrics
            .trips_total()
            .with_label_values(&[label])
            .set(trips.iter().filter(|t| t.status == status).count() as f64);
    }

    let resources = state.resources.list();
    metrics.resources_total().reset();
    for &status in ResourceStatus::all() {
        metrics
            .resources_total()
            .with_label_values(&[status.as_str()])
            .set(resources.iter().filter(|r| r.status == status).count() as f64);
    }

    let financials = state.financials.list();
    metrics.financial_records_total().reset();
    for &status in FinancialStatus::all() {
        metrics
            .financial_records_total()
            .with_label_values(&[status.as_str()])
            .set(financials.iter().filter(|r| r.status == status).count() as f64);
    }

    metrics.pod_artifacts_total().set(state.pods.total() as f64);
    metrics
        .timeline_events_total()
        .set(state.timeline.len() as f64);
    metrics
        .dead_letters_total()
        .set(state.dead_letters.len() as f64);

    // -- Gather and encode --
    match metrics.gather_and_encode() {
        Ok(body) => (
            StatusCode::OK,
            [(
                axum::http::header::CONTENT_TYPE,
                "text/plain; version=0.0.4; charset=utf-8",
            )],
            body,
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Failed to encode Prometheus metrics: {e}");
            (StatusCode::INTERNAL_SERVER_ERROR, e).into_response()
        }
    }
}

/// Liveness probe, always returns 200 if the process is running.
async fn liveness() -> &'static str {
    "ok"
}

/// Readiness probe, verifies the application is ready to serve traffic.
///
/// Checks:
/// - In-memory stores are accessible.
/// - Database connection is healthy (when configured).
///
/// Returns 200 "ready" or 503 with a diagnostic message.
async fn readiness(State(state): State<AppState>) -> impl IntoResponse {
    // Verify stores are accessible (read lock acquirable).
    let _ = state.shipments.len();
    let _ = state.trips.len();
    let _ = state.resources.len();

    // Verify database connection (when configured).
    if let Some(pool) = &state.db_pool {
        if let Err(e) = sqlx::query("SELECT 1").execute(pool).await {
            tracing::warn!("Database health check failed: {e}");
            return (StatusCode::SERVICE_UNAVAILABLE, "database unreachable").into_response();
        }
    }

    (StatusCode::OK, "ready").into_response()
}
