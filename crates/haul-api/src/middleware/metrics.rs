//! # Prometheus Metrics
//!
//! HTTP-level metrics (request counts, latency, errors) are recorded in
//! middleware. Domain-level gauges (shipments/trips/resources by status,
//! POD artifacts, timeline length, financial records, dead letters) are
//! updated on each `/metrics` scrape (pull model); see the metrics
//! handler in `lib.rs`.

use std::sync::Arc;
use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use prometheus::{
    core::Collector, Encoder, GaugeVec, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};

/// Shared metrics state backed by a Prometheus registry.
#[derive(Clone)]
pub struct ApiMetrics {
    inner: Arc<Inner>,
}

struct Inner {
    registry: Registry,

    // -- HTTP middleware metrics (push model) --
    http_requests_total: IntCounterVec,
    http_request_duration_seconds: HistogramVec,
    http_errors_total: IntCounterVec,

    // -- Domain gauges (pull model, updated on /metrics scrape) --
    shipments_total: GaugeVec,
    trips_total: GaugeVec,
    resources_total: GaugeVec,
    pod_artifacts_total: prometheus::Gauge,
    timeline_events_total: prometheus::Gauge,
    financial_records_total: GaugeVec,
    dead_letters_total: prometheus::Gauge,
}

impl std::fmt::Debug for ApiMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiMetrics")
            .field("requests", &self.requests())
            .field("errors", &self.errors())
            .finish()
    }
}

impl ApiMetrics {
    /// Create a new metrics instance with a fresh Prometheus registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let http_requests_total = IntCounterVec::new(
            Opts::new("haul_http_requests_total", "Total HTTP requests"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let http_request_duration_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "haul_http_request_duration_seconds",
                "HTTP request duration in seconds",
            )
            .buckets(vec![
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["method", "path"],
        )
        .expect("metric can be created");

        let http_errors_total = IntCounterVec::new(
            Opts::new("haul_http_errors_total", "Total HTTP errors (4xx and 5xx)"),
            &["method", "path", "status"],
        )
        .expect("metric can be created");

        let shipments_total = GaugeVec::new(
            Opts::new("haul_shipments_total", "Total shipments by status"),
            &["status"],
        )
        .expect("metric can be created");

        let trips_total = GaugeVec::new(
            Opts::new("haul_trips_total", "Total trips by status"),
            &["status"],
        )
        .expect("metric can be created");

        let resources_total = GaugeVec::new(
            Opts::new(
                "haul_resources_total",
                "Total driver/vehicle resources by status",
            ),
            &["status"],
        )
        .expect("metric can be created");

        let pod_artifacts_total = prometheus::Gauge::new(
            "haul_pod_artifacts_total",
            "Total proof-of-delivery artifacts recorded",
        )
        .expect("metric can be created");

        let timeline_events_total = prometheus::Gauge::new(
            "haul_timeline_events_total",
            "Total timeline audit events",
        )
        .expect("metric can be created");

        let financial_records_total = GaugeVec::new(
            Opts::new(
                "haul_financial_records_total",
                "Total financial records by status",
            ),
            &["status"],
        )
        .expect("metric can be created");

        let dead_letters_total = prometheus::Gauge::new(
            "haul_dead_letters_total",
            "Failed post-commit effects awaiting operator review",
        )
        .expect("metric can be created");

        // Register all metrics.
        registry
            .register(Box::new(http_requests_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_request_duration_seconds.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(http_errors_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(shipments_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(trips_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(resources_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(pod_artifacts_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(timeline_events_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(financial_records_total.clone()))
            .expect("metric can be registered");
        registry
            .register(Box::new(dead_letters_total.clone()))
            .expect("metric can be registered");

        Self {
            inner: Arc::new(Inner {
                registry,
                http_requests_total,
                http_request_duration_seconds,
                http_errors_total,
                shipments_total,
                trips_total,
                resources_total,
                pod_artifacts_total,
                timeline_events_total,
                financial_records_total,
                dead_letters_total,
            }),
        }
    }

    /// Return current total request count (sum across all labels).
    pub fn requests(&self) -> u64 {
        let mut total = 0u64;
        let families = self.inner.http_requests_total.collect();
        for mf in &families {
            for m in mf.get_metric() {
                total += m.get_counter().get_value() as u64;
            }
        }
        total
    }

    /// Return current total error count (sum across all labels).
    pub fn errors(&self) -> u64 {
        let mut total = 0u64;
        let families = self.inner.http_errors_total.collect();
        for mf in &families {
            for m in mf.get_metric() {
                total += m.get_counter().get_value() as u64;
            }
        }
        total
    }

    /// Record an HTTP request (called by the middleware).
    fn record_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.inner
            .http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();

        self.inner
            .http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);

        if status >= 400 {
            self.inner
                .http_errors_total
                .with_label_values(&[method, path, &status_str])
                .inc();
        }
    }

    // -- Domain gauge accessors (used by the /metrics handler) --

    /// Access the shipments gauge for updating.
    pub fn shipments_total(&self) -> &GaugeVec {
        &self.inner.shipments_total
    }

    /// Access the trips gauge for updating.
    pub fn trips_total(&self) -> &GaugeVec {
        &self.inner.trips_total
    }

    /// Access the resources gauge for updating.
    pub fn resources_total(&self) -> &GaugeVec {
        &self.inner.resources_total
    }

    /// Access the POD artifacts gauge for updating.
    pub fn pod_artifacts_total(&self) -> &prometheus::Gauge {
        &self.inner.pod_artifacts_total
    }

    /// Access the timeline events gauge for updating.
    pub fn timeline_events_total(&self) -> &prometheus::Gauge {
        &self.inner.timeline_events_total
    }

    /// Access the financial records gauge for updating.
    pub fn financial_records_total(&self) -> &GaugeVec {
        &self.inner.financial_records_total
    }

    /// Access the dead letters gauge for updating.
    pub fn dead_letters_total(&self) -> &prometheus::Gauge {
        &self.inner.dead_letters_total
    }

    /// Gather all metrics and encode to Prometheus text format.
    pub fn gather_and_encode(&self) -> Result<String, String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|e| format!("failed to encode metrics: {e}"))?;
        String::from_utf8(buffer)
            .map_err(|e| format!("metrics encoding produced invalid UTF-8: {e}"))
    }
}

impl Default for ApiMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Normalize a request path by replacing UUID segments with `{id}`.
///
/// Prevents cardinality explosion in Prometheus labels. UUIDs are detected
/// as 32-hex-char strings with optional hyphens (standard UUID format).
fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            // Match standard UUID: 8-4-4-4-12 hex chars with hyphens
            if segment.len() == 36
                && segment.chars().enumerate().all(|(i, c)| {
                    if i == 8 || i == 13 || i == 18 || i == 23 {
                        c == '-'
                    } else {
                        c.is_ascii_hexdigit()
                    }
                })
            {
                "{id}"
            } else if segment.len() == 32 && segment.chars().all(|c| c.is_ascii_hexdigit()) {
                // UUID without hyphens
                "{id}"
            } else {
                segment
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Middleware that records HTTP request metrics via Prometheus.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let metrics = request.extensions().get::<ApiMetrics>().cloned();
    let method = request.method().to_string();
    let path = normalize_path(request.uri().path());
    let start = Instant::now();

    let response = next.run(request).await;

    if let Some(m) = metrics {
        let duration = start.elapsed().as_secs_f64();
        let status = response.status().as_u16();
        m.record_request(&method, &path, status, duration);
    }

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_metrics_new_starts_at_zero() {
        let m = ApiMetrics::new();
        assert_eq!(m.requests(), 0);
        assert_eq!(m.errors(), 0);
    }

    #[test]
    fn requests_increments() {
        let m = ApiMetrics::new();
        m.record_request("GET", "/test", 200, 0.01);
        assert_eq!(m.requests(), 1);
        m.record_request("POST", "/test", 201, 0.02);
        m.record_request("GET", "/other", 200, 0.005);
        assert_eq!(m.requests(), 3);
    }

    #[test]
    fn errors_increments() {
        let m = ApiMetrics::new();
        m.record_request("GET", "/test", 500, 0.1);
        assert_eq!(m.errors(), 1);
        m.record_request("GET", "/test", 409, 0.05);
        assert_eq!(m.errors(), 2);
        assert_eq!(m.requests(), 2);
    }

    #[test]
    fn normalize_path_replaces_uuids() {
        let raw = "/v1/shipments/6b1f6e0e-8a3f-4e1d-9b1a-0dcf33f5c98a/status";
        assert_eq!(normalize_path(raw), "/v1/shipments/{id}/status");
    }

    #[test]
    fn normalize_path_leaves_plain_segments() {
        assert_eq!(normalize_path("/v1/trips"), "/v1/trips");
        assert_eq!(
            normalize_path("/health/readiness"),
            "/health/readiness"
        );
    }

    #[test]
    fn gather_and_encode_produces_exposition_text() {
        let m = ApiMetrics::new();
        m.record_request("GET", "/v1/shipments", 200, 0.01);
        let body = m.gather_and_encode().unwrap();
        assert!(body.contains("haul_http_requests_total"));
    }
}
