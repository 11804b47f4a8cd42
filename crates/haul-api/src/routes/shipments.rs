//! # Shipment API
//!
//! Shipment CRUD and the lifecycle operations that make up the dispatch
//! core.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/shipments` | `create_shipment` |
//! | `GET`  | `/v1/shipments` | `list_shipments` |
//! | `GET`  | `/v1/shipments/:id` | `get_shipment` |
//! | `POST` | `/v1/shipments/:id/assign-driver` | `assign_driver` |
//! | `POST` | `/v1/shipments/:id/status` | `change_status` |
//! | `POST` | `/v1/shipments/:id/pod` | `upload_pod` |
//! | `GET`  | `/v1/shipments/:id/pod` | `list_pods` |
//! | `GET`  | `/v1/shipments/:id/timeline` | `get_timeline` |

use axum::extract::rejection::JsonRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use haul_core::{Money, WaybillNo};
use haul_state::{EntityKind, ShipmentStatus, TimelineEvent};

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::routes::PaginationParams;
use crate::services::{assignment, status};
use crate::state::{AppState, PodRecord, ShipmentRecord};

/// Request to create a shipment.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateShipmentRequest {
    /// Waybill reference (`WB-…`). Generated when absent.
    pub waybill_no: Option<String>,
    pub origin: String,
    pub destination: String,
    /// Trip to ride on, when consolidated.
    pub trip_id: Option<Uuid>,
    /// Driver pay in minor units. Defaults to 0.
    pub driver_pay_minor: Option<i64>,
    /// ISO-4217 currency code. Defaults to USD.
    pub currency: Option<String>,
}

impl Validate for CreateShipmentRequest {
    fn validate(&self) -> Result<(), String> {
        if self.origin.trim().is_empty() {
            return Err("origin must not be empty".to_string());
        }
        if self.destination.trim().is_empty() {
            return Err("destination must not be empty".to_string());
        }
        if self.origin.len() > 255 || self.destination.len() > 255 {
            return Err("origin and destination must not exceed 255 characters".to_string());
        }
        Ok(())
    }
}

/// Request to bind a driver to a shipment.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignDriverRequest {
    /// The driver resource (or dispatchable identity) to bind.
    pub driver_id: Uuid,
}

impl Validate for AssignDriverRequest {
    fn validate(&self) -> Result<(), String> {
        Ok(())
    }
}

/// Request to change a shipment's lifecycle status.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ChangeStatusRequest {
    /// Target status name, e.g. `IN_TRANSIT`.
    pub target_status: String,
}

impl Validate for ChangeStatusRequest {
    fn validate(&self) -> Result<(), String> {
        parse_status_param(&self.target_status).map(|_| ()).map_err(|e| match e {
            AppError::Validation(msg) => msg,
            other => other.to_string(),
        })
    }
}

/// Parse a status name from a request, rejecting unknown values upfront.
pub(crate) fn parse_status_param(raw: &str) -> Result<ShipmentStatus, AppError> {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).map_err(|_| {
        let valid = ShipmentStatus::all()
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        AppError::Validation(format!("invalid target_status '{raw}'. Valid states: {valid}"))
    })
}

/// Build the shipments router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/shipments", post(create_shipment).get(list_shipments))
        .route("/v1/shipments/:id", get(get_shipment))
        .route("/v1/shipments/:id/assign-driver", post(assign_driver))
        .route("/v1/shipments/:id/status", post(change_status))
        .route(
            "/v1/shipments/:id/pod",
            post(upload_pod)
                .get(list_pods)
                // POD images are larger than the default body cap.
                .layer(DefaultBodyLimit::max(10 * 1024 * 1024)),
        )
        .route("/v1/shipments/:id/timeline", get(get_timeline))
}

/// POST /v1/shipments: create a shipment.
#[utoipa::path(
    post,
    path = "/v1/shipments",
    request_body = CreateShipmentRequest,
    responses(
        (status = 201, description = "Shipment created", body = ShipmentRecord),
        (status = 400, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
pub(crate) async fn create_shipment(
    State(state): State<AppState>,
    ctx: TenantContext,
    body: Result<Json<CreateShipmentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ShipmentRecord>), AppError> {
    let req = extract_validated_json(body)?;

    let waybill_no = match &req.waybill_no {
        Some(raw) => WaybillNo::parse(raw)?,
        None => WaybillNo::generate(),
    };
    let driver_pay = Money::new(
        req.driver_pay_minor.unwrap_or(0),
        req.currency.as_deref().unwrap_or("USD"),
    )?;

    if let Some(trip_id) = req.trip_id {
        state
            .trips
            .get(&trip_id)
            .filter(|t| t.tenant_id == ctx.tenant_id)
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;
    }

    let now = Utc::now();
    let id = Uuid::new_v4();
    let record = ShipmentRecord {
        id,
        tenant_id: ctx.tenant_id,
        waybill_no,
        origin: req.origin,
        destination: req.destination,
        status: ShipmentStatus::Created,
        trip_id: req.trip_id,
        driver_id: None,
        vehicle_id: None,
        driver_pay,
        created_at: now,
        updated_at: now,
    };

    state.shipments.insert(id, record.clone());

    // Persist to database (write-through). Failure is surfaced to the client
    // because the in-memory record would be lost on restart.
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::shipments::insert(pool, &record).await {
            tracing::error!(shipment_id = %id, error = %e, "failed to persist shipment to database");
            return Err(AppError::Internal(
                "shipment recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/shipments: list shipments for the tenant, newest first.
#[utoipa::path(
    get,
    path = "/v1/shipments",
    params(
        ("limit" = Option<usize>, Query, description = "Max items to return (default 100, max 1000)"),
        ("offset" = Option<usize>, Query, description = "Items to skip (default 0)"),
    ),
    responses(
        (status = 200, description = "List of shipments", body = Vec<ShipmentRecord>),
    ),
    tag = "shipments"
)]
pub(crate) async fn list_shipments(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(pagination): Query<PaginationParams>,
) -> Json<Vec<ShipmentRecord>> {
    let mut all: Vec<_> = state
        .shipments
        .list()
        .into_iter()
        .filter(|s| s.tenant_id == ctx.tenant_id)
        .collect();
    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let offset = pagination.effective_offset().min(all.len());
    let page = all
        .into_iter()
        .skip(offset)
        .take(pagination.effective_limit())
        .collect();
    Json(page)
}

/// GET /v1/shipments/:id: get a shipment.
#[utoipa::path(
    get,
    path = "/v1/shipments/{id}",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Shipment found", body = ShipmentRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
pub(crate) async fn get_shipment(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ShipmentRecord>, AppError> {
    state
        .shipments
        .get(&id)
        .filter(|s| s.tenant_id == ctx.tenant_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("shipment {id} not found")))
}

/// POST /v1/shipments/:id/assign-driver: bind an idle driver.
#[utoipa::path(
    post,
    path = "/v1/shipments/{id}/assign-driver",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    request_body = AssignDriverRequest,
    responses(
        (status = 200, description = "Driver assigned", body = ShipmentRecord),
        (status = 404, description = "Shipment or driver not found", body = crate::error::ErrorBody),
        (status = 409, description = "Invalid transition or driver not available", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
pub(crate) async fn assign_driver(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    body: Result<Json<AssignDriverRequest>, JsonRejection>,
) -> Result<Json<ShipmentRecord>, AppError> {
    let req = extract_validated_json(body)?;
    let updated = assignment::assign_driver(&state, &ctx, id, req.driver_id).await?;
    Ok(Json(updated))
}

/// POST /v1/shipments/:id/status: change the lifecycle status.
#[utoipa::path(
    post,
    path = "/v1/shipments/{id}/status",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    request_body = ChangeStatusRequest,
    responses(
        (status = 200, description = "Status changed", body = ShipmentRecord),
        (status = 404, description = "Shipment not found", body = crate::error::ErrorBody),
        (status = 409, description = "Invalid transition or POD required", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
pub(crate) async fn change_status(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    body: Result<Json<ChangeStatusRequest>, JsonRejection>,
) -> Result<Json<ShipmentRecord>, AppError> {
    let req = extract_validated_json(body)?;
    let target = parse_status_param(&req.target_status)?;
    let updated = status::change_shipment_status(&state, &ctx, id, target).await?;
    Ok(Json(updated))
}

/// POST /v1/shipments/:id/pod: upload a proof-of-delivery artifact.
///
/// Multipart form with a required `file` part and an optional `note` part.
/// Uploading for a shipment in `DELIVERED` nudges it into
/// `POD_PENDING_REVIEW`.
#[utoipa::path(
    post,
    path = "/v1/shipments/{id}/pod",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 201, description = "Artifact recorded", body = PodRecord),
        (status = 400, description = "Missing or empty file", body = crate::error::ErrorBody),
        (status = 404, description = "Shipment not found", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
pub(crate) async fn upload_pod(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<PodRecord>), AppError> {
    // Reject unknown shipments before accepting the upload body.
    state
        .shipments
        .get(&id)
        .filter(|s| s.tenant_id == ctx.tenant_id)
        .ok_or_else(|| AppError::NotFound(format!("shipment {id} not found")))?;

    let mut file: Option<(String, Vec<u8>)> = None;
    let mut note: Option<String> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("malformed multipart body: {e}")))?
    {
        match field.name() {
            Some("file") => {
                let filename = sanitize_filename(field.file_name().unwrap_or("pod.bin"));
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read file part: {e}")))?;
                file = Some((filename, data.to_vec()));
            }
            Some("note") => {
                let text = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("failed to read note part: {e}")))?;
                if !text.trim().is_empty() {
                    note = Some(text);
                }
            }
            _ => {}
        }
    }

    let (filename, data) =
        file.ok_or_else(|| AppError::Validation("file part is required".to_string()))?;
    if data.is_empty() {
        return Err(AppError::Validation("file part must not be empty".to_string()));
    }

    let dir = state.config.pod_dir.join(id.to_string());
    tokio::fs::create_dir_all(&dir).await.map_err(|e| {
        AppError::Internal(format!("failed to create POD directory: {e}"))
    })?;
    let stored = dir.join(format!("{}-{}", Uuid::new_v4().simple(), filename));
    tokio::fs::write(&stored, &data)
        .await
        .map_err(|e| AppError::Internal(format!("failed to store POD artifact: {e}")))?;

    let (pod, _nudged) = status::record_pod(
        &state,
        &ctx,
        id,
        stored.to_string_lossy().into_owned(),
        note,
    )
    .await?;

    Ok((StatusCode::CREATED, Json(pod)))
}

/// GET /v1/shipments/:id/pod: list recorded artifacts, oldest first.
#[utoipa::path(
    get,
    path = "/v1/shipments/{id}/pod",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Artifacts", body = Vec<PodRecord>),
        (status = 404, description = "Shipment not found", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
pub(crate) async fn list_pods(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<PodRecord>>, AppError> {
    state
        .shipments
        .get(&id)
        .filter(|s| s.tenant_id == ctx.tenant_id)
        .ok_or_else(|| AppError::NotFound(format!("shipment {id} not found")))?;
    Ok(Json(state.pods.list(&id)))
}

/// GET /v1/shipments/:id/timeline: the shipment's audit trail, oldest first.
#[utoipa::path(
    get,
    path = "/v1/shipments/{id}/timeline",
    params(("id" = Uuid, Path, description = "Shipment ID")),
    responses(
        (status = 200, description = "Timeline events"),
        (status = 404, description = "Shipment not found", body = crate::error::ErrorBody),
    ),
    tag = "shipments"
)]
pub(crate) async fn get_timeline(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TimelineEvent>>, AppError> {
    state
        .shipments
        .get(&id)
        .filter(|s| s.tenant_id == ctx.tenant_id)
        .ok_or_else(|| AppError::NotFound(format!("shipment {id} not found")))?;
    Ok(Json(state.timeline.for_entity(EntityKind::Shipment, id)))
}

/// Keep only filesystem-safe characters from an uploaded filename.
fn sanitize_filename(raw: &str) -> String {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'))
        .collect();
    if cleaned.is_empty() {
        "pod.bin".to_string()
    } else {
        cleaned
    }
}
