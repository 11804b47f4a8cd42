//! # Integration Tests for haul-api
//!
//! Drives the assembled router end to end: shipment assignment, the
//! delivery-proof gate, POD upload with its review nudge, trip updates
//! with registry auto-provisioning, the financial trigger, soft deletion,
//! authentication, and the health/metrics surface.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use haul_api::auth::SecretString;
use haul_api::state::{AppConfig, AppState};

/// Helper: build the test app (auth disabled, in-memory only) plus a state
/// handle sharing the same stores.
fn test_app() -> (axum::Router, AppState) {
    let state = AppState::new();
    (haul_api::app(state.clone()), state)
}

/// Helper: build the test app with POD storage in a temp directory.
fn test_app_with_pod_dir(dir: &std::path::Path) -> (axum::Router, AppState) {
    let config = AppConfig {
        pod_dir: dir.to_path_buf(),
        ..AppConfig::default()
    };
    let state = AppState::with_config(config, None);
    (haul_api::app(state.clone()), state)
}

/// Helper: build the test app with auth enabled.
fn test_app_with_auth(token: &str) -> axum::Router {
    let config = AppConfig {
        auth_token: Some(SecretString::new(token)),
        ..AppConfig::default()
    };
    haul_api::app(AppState::with_config(config, None))
}

/// Helper: read response body as JSON.
async fn body_json(response: axum::http::Response<Body>) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Helper: send a JSON request and return (status, body).
async fn send_json(
    app: &axum::Router,
    method: &str,
    uri: &str,
    body: Value,
) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

/// Helper: GET and return (status, body).
async fn get_json(app: &axum::Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

/// Helper: create a shipment, returning its id.
async fn create_shipment(app: &axum::Router) -> Uuid {
    let (status, body) = send_json(
        app,
        "POST",
        "/v1/shipments",
        json!({"origin": "Karachi", "destination": "Lahore", "driver_pay_minor": 50_000, "currency": "PKR"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create shipment: {body}");
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}

/// Helper: onboard an idle driver resource, returning its id.
async fn create_driver(app: &axum::Router) -> Uuid {
    let (status, body) = send_json(
        app,
        "POST",
        "/v1/resources",
        json!({"kind": "DRIVER", "display_name": "Imran K"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create driver: {body}");
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}

/// Helper: walk a shipment through the given statuses.
async fn walk_statuses(app: &axum::Router, shipment: Uuid, statuses: &[&str]) {
    for target in statuses {
        let (status, body) = send_json(
            app,
            "POST",
            &format!("/v1/shipments/{shipment}/status"),
            json!({"target_status": target}),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "transition to {target}: {body}");
    }
}

// -- Health Probes ------------------------------------------------------------

#[tokio::test]
async fn test_liveness_probe() {
    let (app, _) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/liveness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_readiness_probe() {
    let (app, _) = test_app();
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/readiness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// -- Authentication -----------------------------------------------------------

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let app = test_app_with_auth("dispatch-secret");
    let (status, body) = get_json(&app, "/v1/shipments").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_wrong_token_is_unauthorized() {
    let app = test_app_with_auth("dispatch-secret");
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/shipments")
                .header("authorization", "Bearer wrong")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_token_is_accepted() {
    let app = test_app_with_auth("dispatch-secret");
    let response = app
        .oneshot(
            Request::builder()
                .uri("/v1/shipments")
                .header("authorization", "Bearer dispatch-secret")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_health_probes_skip_auth() {
    let app = test_app_with_auth("dispatch-secret");
    let response = app
        .oneshot(
            Request::builder()
                .uri("/health/liveness")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// -- Shipment CRUD ------------------------------------------------------------

#[tokio::test]
async fn test_create_shipment_generates_waybill() {
    let (app, _) = test_app();
    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/shipments",
        json!({"origin": "Karachi", "destination": "Lahore"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert!(body["waybill_no"].as_str().unwrap().starts_with("WB-"));
    assert_eq!(body["status"], "CREATED");
    assert!(body["driver_id"].is_null());
}

#[tokio::test]
async fn test_create_shipment_rejects_empty_origin() {
    let (app, _) = test_app();
    let (status, body) = send_json(
        &app,
        "POST",
        "/v1/shipments",
        json!({"origin": "  ", "destination": "Lahore"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_get_unknown_shipment_is_404() {
    let (app, _) = test_app();
    let (status, body) = get_json(&app, &format!("/v1/shipments/{}", Uuid::new_v4())).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "NOT_FOUND");
}

// -- Assignment: NEW shipment, IDLE driver -----------------------------------

#[tokio::test]
async fn test_assign_driver_happy_path() {
    let (app, state) = test_app();
    let shipment = create_shipment(&app).await;
    let driver = create_driver(&app).await;

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/v1/shipments/{shipment}/assign-driver"),
        json!({"driver_id": driver}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "ASSIGNED");
    assert_eq!(body["driver_id"], driver.to_string());

    // Driver is now BUSY.
    let (_, driver_body) = get_json(&app, &format!("/v1/resources/{driver}")).await;
    assert_eq!(driver_body["status"], "BUSY");

    // Exactly one STATUS_CHANGED event CREATED -> ASSIGNED.
    let (_, timeline) = get_json(&app, &format!("/v1/shipments/{shipment}/timeline")).await;
    let events = timeline.as_array().unwrap();
    let status_events: Vec<_> = events
        .iter()
        .filter(|e| e["kind"] == "STATUS_CHANGED")
        .collect();
    assert_eq!(status_events.len(), 1);
    assert_eq!(status_events[0]["from_status"], "CREATED");
    assert_eq!(status_events[0]["to_status"], "ASSIGNED");

    assert!(state.dead_letters.is_empty());
}

#[tokio::test]
async fn test_assign_busy_driver_is_rejected_without_mutation() {
    let (app, _) = test_app();
    let first = create_shipment(&app).await;
    let second = create_shipment(&app).await;
    let driver = create_driver(&app).await;

    send_json(
        &app,
        "POST",
        &format!("/v1/shipments/{first}/assign-driver"),
        json!({"driver_id": driver}),
    )
    .await;

    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/v1/shipments/{second}/assign-driver"),
        json!({"driver_id": driver}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DRIVER_NOT_AVAILABLE");

    // The rejected shipment is untouched.
    let (_, untouched) = get_json(&app, &format!("/v1/shipments/{second}")).await;
    assert_eq!(untouched["status"], "CREATED");
    assert!(untouched["driver_id"].is_null());
}

#[tokio::test]
async fn test_concurrent_assignments_exactly_one_wins() {
    let (app, _) = test_app();
    let shipment = create_shipment(&app).await;
    let driver_a = create_driver(&app).await;
    let driver_b = create_driver(&app).await;

    let request = |driver: Uuid| {
        let app = app.clone();
        async move {
            app.oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/v1/shipments/{shipment}/assign-driver"))
                    .header("content-type", "application/json")
                    .body(Body::from(json!({"driver_id": driver}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap()
        }
    };

    let (first, second) = tokio::join!(request(driver_a), request(driver_b));
    let statuses = [first.status(), second.status()];

    assert_eq!(
        statuses.iter().filter(|s| **s == StatusCode::OK).count(),
        1,
        "exactly one assignment must win: {statuses:?}"
    );
    assert_eq!(
        statuses
            .iter()
            .filter(|s| **s == StatusCode::CONFLICT)
            .count(),
        1,
        "the loser must observe a conflict: {statuses:?}"
    );

    // The winner's binding is in place and exactly one driver is BUSY.
    let (_, shipment_body) = get_json(&app, &format!("/v1/shipments/{shipment}")).await;
    assert_eq!(shipment_body["status"], "ASSIGNED");
    let bound = shipment_body["driver_id"].as_str().unwrap();
    assert!(bound == driver_a.to_string() || bound == driver_b.to_string());
}

// -- Delivery-proof gate: DELIVERED, zero PODs --------------------------------

#[tokio::test]
async fn test_completion_requires_pod() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _state) = test_app_with_pod_dir(tmp.path());
    let shipment = create_shipment(&app).await;
    let driver = create_driver(&app).await;
    send_json(
        &app,
        "POST",
        &format!("/v1/shipments/{shipment}/assign-driver"),
        json!({"driver_id": driver}),
    )
    .await;
    walk_statuses(&app, shipment, &["PICKUP", "IN_TRANSIT", "DELIVERED"]).await;

    // Completion with zero PODs is vetoed.
    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/v1/shipments/{shipment}/status"),
        json!({"target_status": "COMPLETED"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "POD_REQUIRED");
    let (_, unchanged) = get_json(&app, &format!("/v1/shipments/{shipment}")).await;
    assert_eq!(unchanged["status"], "DELIVERED");

    // Upload one POD: 201, auto-advance to review.
    let (status, pod_body) = upload_pod(&app, shipment, b"jpeg-bytes", Some("left at gate")).await;
    assert_eq!(status, StatusCode::CREATED, "{pod_body}");
    assert!(pod_body["file_path"].as_str().unwrap().contains(&shipment.to_string()));
    let (_, nudged) = get_json(&app, &format!("/v1/shipments/{shipment}")).await;
    assert_eq!(nudged["status"], "POD_PENDING_REVIEW");

    // Completion now passes the gate.
    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/v1/shipments/{shipment}/status"),
        json!({"target_status": "COMPLETED"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "COMPLETED");

    // The artifact landed on disk.
    let (_, pods) = get_json(&app, &format!("/v1/shipments/{shipment}/pod")).await;
    assert_eq!(pods.as_array().unwrap().len(), 1);
}

/// Helper: multipart POD upload.
async fn upload_pod(
    app: &axum::Router,
    shipment: Uuid,
    bytes: &[u8],
    note: Option<&str>,
) -> (StatusCode, Value) {
    let boundary = "pod-test-boundary";
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{boundary}\r\nContent-Disposition: form-data; name=\"file\"; \
             filename=\"receipt.jpg\"\r\nContent-Type: image/jpeg\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(b"\r\n");
    if let Some(note) = note {
        body.extend_from_slice(
            format!(
                "--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\n{note}\r\n"
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/shipments/{shipment}/pod"))
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn test_pod_upload_without_file_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let (app, _) = test_app_with_pod_dir(tmp.path());
    let shipment = create_shipment(&app).await;

    let boundary = "pod-test-boundary";
    let body = format!(
        "--{boundary}\r\nContent-Disposition: form-data; name=\"note\"\r\n\r\nno file\r\n--{boundary}--\r\n"
    );
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/v1/shipments/{shipment}/pod"))
                .header(
                    "content-type",
                    format!("multipart/form-data; boundary={boundary}"),
                )
                .body(Body::from(body))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// -- Status endpoint ----------------------------------------------------------

#[tokio::test]
async fn test_invalid_transition_is_conflict() {
    let (app, _) = test_app();
    let shipment = create_shipment(&app).await;
    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/v1/shipments/{shipment}/status"),
        json!({"target_status": "DELIVERED"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_unknown_status_name_is_validation_error() {
    let (app, _) = test_app();
    let shipment = create_shipment(&app).await;
    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/v1/shipments/{shipment}/status"),
        json!({"target_status": "SHIPPED"}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_exception_recovers_through_scheduled() {
    let (app, _) = test_app();
    let shipment = create_shipment(&app).await;
    let driver = create_driver(&app).await;
    send_json(
        &app,
        "POST",
        &format!("/v1/shipments/{shipment}/assign-driver"),
        json!({"driver_id": driver}),
    )
    .await;
    walk_statuses(&app, shipment, &["PICKUP", "EXCEPTION", "SCHEDULED"]).await;
    let (_, body) = get_json(&app, &format!("/v1/shipments/{shipment}")).await;
    assert_eq!(body["status"], "SCHEDULED");
}

// -- Trip updates and the financial trigger -----------------------------------

/// Helper: create a trip, returning its id.
async fn create_trip(app: &axum::Router) -> Uuid {
    let (status, body) = send_json(
        app,
        "POST",
        "/v1/trips",
        json!({"origin": "Karachi", "destination": "Peshawar", "driver_pay_minor": 150_000, "currency": "PKR"}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create trip: {body}");
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}

/// Helper: create an identity with a role hint, returning its id.
async fn create_identity(app: &axum::Router, role_hint: &str) -> Uuid {
    let (status, body) = send_json(
        app,
        "POST",
        "/v1/identities",
        json!({"display_name": "Bashir T", "role_hint": role_hint}),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "create identity: {body}");
    Uuid::parse_str(body["id"].as_str().unwrap()).unwrap()
}

#[tokio::test]
async fn test_trip_put_provisions_identity_and_assigns() {
    let (app, _) = test_app();
    let trip = create_trip(&app).await;
    let identity = create_identity(&app, "DRIVER").await;

    let (status, body) = send_json(
        &app,
        "PUT",
        &format!("/v1/trips/{trip}"),
        json!({"driver_id": identity, "status": "ASSIGNED"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["driver_id"], identity.to_string());
    assert_eq!(body["status"], "ASSIGNED");

    // The identity was materialized as a BUSY driver resource.
    let (_, resource) = get_json(&app, &format!("/v1/resources/{identity}")).await;
    assert_eq!(resource["kind"], "DRIVER");
    assert_eq!(resource["status"], "BUSY");
    assert_eq!(resource["provisioned"], true);
}

#[tokio::test]
async fn test_trip_put_cannot_bypass_transition_table() {
    let (app, _) = test_app();
    let trip = create_trip(&app).await;

    let (status, body) = send_json(
        &app,
        "PUT",
        &format!("/v1/trips/{trip}"),
        json!({"status": "COMPLETED"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "INVALID_TRANSITION");
}

#[tokio::test]
async fn test_trip_put_rejects_unknown_fields() {
    let (app, _) = test_app();
    let trip = create_trip(&app).await;

    let (status, body) = send_json(
        &app,
        "PUT",
        &format!("/v1/trips/{trip}"),
        json!({"status": "SCHEDULED", "tenant_id": Uuid::new_v4()}),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_trip_completion_creates_exactly_one_financial_record() {
    let (app, state) = test_app();
    let trip = create_trip(&app).await;
    let identity = create_identity(&app, "DRIVER").await;

    for (body, _label) in [
        (json!({"driver_id": identity, "status": "ASSIGNED"}), "assign"),
        (json!({"status": "PICKUP"}), "pickup"),
        (json!({"status": "IN_TRANSIT"}), "transit"),
        (json!({"status": "DELIVERED"}), "delivered"),
        (json!({"status": "COMPLETED"}), "completed"),
    ] {
        let (status, response) =
            send_json(&app, "PUT", &format!("/v1/trips/{trip}"), body).await;
        assert_eq!(status, StatusCode::OK, "{response}");
    }

    let (_, records) = get_json(&app, "/v1/financial-records").await;
    let records = records.as_array().unwrap().clone();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["kind"], "payable");
    assert_eq!(records[0]["status"], "PENDING");
    assert_eq!(records[0]["entity_id"], trip.to_string());
    assert_eq!(records[0]["reference_id"], identity.to_string());
    assert_eq!(records[0]["amount"]["minor"], 150_000);

    // Re-sending completion is a no-op rejection and creates nothing more.
    let (status, _) = send_json(
        &app,
        "PUT",
        &format!("/v1/trips/{trip}"),
        json!({"status": "COMPLETED"}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (_, records) = get_json(&app, "/v1/financial-records").await;
    assert_eq!(records.as_array().unwrap().len(), 1);

    // Completion released the driver.
    let (_, resource) = get_json(&app, &format!("/v1/resources/{identity}")).await;
    assert_eq!(resource["status"], "IDLE");
    assert!(state.dead_letters.is_empty());
}

#[tokio::test]
async fn test_trip_detour_degrades_without_maps_client() {
    let (app, _) = test_app();
    let trip = create_trip(&app).await;
    let (status, body) = get_json(&app, &format!("/v1/trips/{trip}/detour")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["available"].is_null());
}

// -- Resource registry --------------------------------------------------------

#[tokio::test]
async fn test_soft_delete_existing_resource() {
    let (app, _) = test_app();
    let driver = create_driver(&app).await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/v1/resources/{driver}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // Tombstones are excluded from the listing.
    let (_, listing) = get_json(&app, "/v1/resources").await;
    assert!(listing
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["id"] != driver.to_string()));

    // And cannot be assigned.
    let shipment = create_shipment(&app).await;
    let (status, body) = send_json(
        &app,
        "POST",
        &format!("/v1/shipments/{shipment}/assign-driver"),
        json!({"driver_id": driver}),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"]["code"], "DRIVER_NOT_AVAILABLE");
}

#[tokio::test]
async fn test_soft_delete_bare_identity_creates_tombstone() {
    let (app, _) = test_app();
    let identity = create_identity(&app, "DRIVER").await;

    // The bare identity is listed as dispatchable.
    let (_, listing) = get_json(&app, "/v1/resources?kind=DRIVER").await;
    assert!(listing
        .as_array()
        .unwrap()
        .iter()
        .any(|r| r["id"] == identity.to_string() && r["provisioned"] == false));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/v1/resources/{identity}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    // The union listing now excludes the tombstoned identity.
    let (_, listing) = get_json(&app, "/v1/resources?kind=DRIVER").await;
    assert!(listing
        .as_array()
        .unwrap()
        .iter()
        .all(|r| r["id"] != identity.to_string()));
}

#[tokio::test]
async fn test_delete_unknown_resource_is_404() {
    let (app, _) = test_app();
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/v1/resources/{}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -- Tenant scoping -----------------------------------------------------------

#[tokio::test]
async fn test_cross_tenant_lookup_is_not_found() {
    let (app, _) = test_app();
    let shipment = create_shipment(&app).await;

    // Same id, different tenant header: looks absent.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/v1/shipments/{shipment}"))
                .header("x-tenant-id", Uuid::new_v4().to_string())
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// -- Metrics and OpenAPI ------------------------------------------------------

#[tokio::test]
async fn test_metrics_endpoint_exposes_domain_gauges() {
    let (app, _) = test_app();
    create_shipment(&app).await;

    let response = app
        .clone()
        .oneshot(Request::builder().uri("/metrics").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains("haul_shipments_total"));
    assert!(text.contains("haul_dead_letters_total"));
}

#[tokio::test]
async fn test_openapi_spec_is_served() {
    let (app, _) = test_app();
    let (status, body) = get_json(&app, "/openapi.json").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["paths"]
        .as_object()
        .unwrap()
        .contains_key("/v1/shipments/{id}/assign-driver"));
}

// -- Dead letters -------------------------------------------------------------

#[tokio::test]
async fn test_dead_letter_queue_starts_empty() {
    let (app, _) = test_app();
    let (status, body) = get_json(&app, "/v1/ops/dead-letters").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 0);
}
