//! # Trip API
//!
//! Trip CRUD plus the tagged update used for trip-level reassignment.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/trips` | `create_trip` |
//! | `GET`  | `/v1/trips` | `list_trips` |
//! | `GET`  | `/v1/trips/:id` | `get_trip` |
//! | `PUT`  | `/v1/trips/:id` | `update_trip` |
//! | `GET`  | `/v1/trips/:id/timeline` | `get_timeline` |
//! | `GET`  | `/v1/trips/:id/detour` | `detour_availability` |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use haul_core::Money;
use haul_state::{EntityKind, ShipmentStatus, TimelineEvent};

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::routes::shipments::parse_status_param;
use crate::routes::PaginationParams;
use crate::services::trips::{self, TripChanges};
use crate::state::{AppState, TripRecord};

/// Request to create a trip.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateTripRequest {
    pub origin: String,
    pub destination: String,
    /// Driver pay in minor units. Defaults to 0.
    pub driver_pay_minor: Option<i64>,
    /// ISO-4217 currency code. Defaults to USD.
    pub currency: Option<String>,
}

impl Validate for CreateTripRequest {
    fn validate(&self) -> Result<(), String> {
        if self.origin.trim().is_empty() || self.destination.trim().is_empty() {
            return Err("origin and destination must not be empty".to_string());
        }
        if self.origin.len() > 255 || self.destination.len() > 255 {
            return Err("origin and destination must not exceed 255 characters".to_string());
        }
        Ok(())
    }
}

/// Tagged update for `PUT /v1/trips/:id`.
///
/// Only the listed fields can change; unknown fields are rejected outright
/// so a generic update can never smuggle state past the lifecycle checks.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateTripRequest {
    /// Target status name. Routed through the transition table.
    pub status: Option<String>,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub driver_pay_minor: Option<i64>,
    pub currency: Option<String>,
}

impl Validate for UpdateTripRequest {
    fn validate(&self) -> Result<(), String> {
        if let Some(raw) = &self.status {
            parse_status_param(raw).map_err(|e| e.to_string())?;
        }
        if self.status.is_none()
            && self.driver_id.is_none()
            && self.vehicle_id.is_none()
            && self.driver_pay_minor.is_none()
            && self.currency.is_none()
        {
            return Err("at least one field must be provided".to_string());
        }
        Ok(())
    }
}

/// Detour availability for a trip's route.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DetourResponse {
    pub trip_id: Uuid,
    /// `null` when the maps collaborator could not answer.
    pub available: Option<bool>,
}

/// Build the trips router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/trips", post(create_trip).get(list_trips))
        .route("/v1/trips/:id", get(get_trip).put(update_trip))
        .route("/v1/trips/:id/timeline", get(get_timeline))
        .route("/v1/trips/:id/detour", get(detour_availability))
}

/// POST /v1/trips: create a trip.
#[utoipa::path(
    post,
    path = "/v1/trips",
    request_body = CreateTripRequest,
    responses(
        (status = 201, description = "Trip created", body = TripRecord),
        (status = 400, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "trips"
)]
pub(crate) async fn create_trip(
    State(state): State<AppState>,
    ctx: TenantContext,
    body: Result<Json<CreateTripRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<TripRecord>), AppError> {
    let req = extract_validated_json(body)?;
    let driver_pay = Money::new(
        req.driver_pay_minor.unwrap_or(0),
        req.currency.as_deref().unwrap_or("USD"),
    )?;

    let now = Utc::now();
    let id = Uuid::new_v4();
    let record = TripRecord {
        id,
        tenant_id: ctx.tenant_id,
        origin: req.origin,
        destination: req.destination,
        status: ShipmentStatus::Created,
        driver_id: None,
        vehicle_id: None,
        driver_pay,
        created_at: now,
        updated_at: now,
    };

    state.trips.insert(id, record.clone());

    // Persist to database (write-through). Failure is surfaced to the client
    // because the in-memory record would be lost on restart.
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::trips::insert(pool, &record).await {
            tracing::error!(trip_id = %id, error = %e, "failed to persist trip to database");
            return Err(AppError::Internal(
                "trip recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/trips: list trips for the tenant, newest first.
#[utoipa::path(
    get,
    path = "/v1/trips",
    params(
        ("limit" = Option<usize>, Query, description = "Max items to return (default 100, max 1000)"),
        ("offset" = Option<usize>, Query, description = "Items to skip (default 0)"),
    ),
    responses(
        (status = 200, description = "List of trips", body = Vec<TripRecord>),
    ),
    tag = "trips"
)]
pub(crate) async fn list_trips(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(pagination): Query<PaginationParams>,
) -> Json<Vec<TripRecord>> {
    let mut all: Vec<_> = state
        .trips
        .list()
        .into_iter()
        .filter(|t| t.tenant_id == ctx.tenant_id)
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

/// GET /v1/trips/:id: get a trip.
#[utoipa::path(
    get,
    path = "/v1/trips/{id}",
    params(("id" = Uuid, Path, description = "Trip ID")),
    responses(
        (status = 200, description = "Trip found", body = TripRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "trips"
)]
pub(crate) async fn get_trip(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<TripRecord>, AppError> {
    state
        .trips
        .get(&id)
        .filter(|t| t.tenant_id == ctx.tenant_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("trip {id} not found")))
}

/// PUT /v1/trips/:id: apply a tagged update.
///
/// Status changes go through the same transition table as the dedicated
/// shipment endpoints; driver/vehicle references are auto-provisioned from
/// identities by the registry; completing a trip synthesizes the payable
/// record post-commit.
#[utoipa::path(
    put,
    path = "/v1/trips/{id}",
    params(("id" = Uuid, Path, description = "Trip ID")),
    request_body = UpdateTripRequest,
    responses(
        (status = 200, description = "Trip updated", body = TripRecord),
        (status = 404, description = "Trip or referenced identity not found", body = crate::error::ErrorBody),
        (status = 409, description = "Invalid transition", body = crate::error::ErrorBody),
    ),
    tag = "trips"
)]
pub(crate) async fn update_trip(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
    body: Result<Json<UpdateTripRequest>, JsonRejection>,
) -> Result<Json<TripRecord>, AppError> {
    let req = extract_validated_json(body)?;
    let status = match &req.status {
        Some(raw) => Some(parse_status_param(raw)?),
        None => None,
    };
    let changes = TripChanges {
        status,
        driver_id: req.driver_id,
        vehicle_id: req.vehicle_id,
        driver_pay_minor: req.driver_pay_minor,
        currency: req.currency,
    };
    let updated = trips::update_trip(&state, &ctx, id, changes).await?;
    Ok(Json(updated))
}

/// GET /v1/trips/:id/timeline: the trip's audit trail, oldest first.
#[utoipa::path(
    get,
    path = "/v1/trips/{id}/timeline",
    params(("id" = Uuid, Path, description = "Trip ID")),
    responses(
        (status = 200, description = "Timeline events"),
        (status = 404, description = "Trip not found", body = crate::error::ErrorBody),
    ),
    tag = "trips"
)]
pub(crate) async fn get_timeline(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<TimelineEvent>>, AppError> {
    state
        .trips
        .get(&id)
        .filter(|t| t.tenant_id == ctx.tenant_id)
        .ok_or_else(|| AppError::NotFound(format!("trip {id} not found")))?;
    Ok(Json(state.timeline.for_entity(EntityKind::Trip, id)))
}

/// GET /v1/trips/:id/detour: ask the maps collaborator for detour info.
///
/// Degrades to `available: null` whenever the collaborator is missing or
/// fails, detour info is advisory and never fails the request.
#[utoipa::path(
    get,
    path = "/v1/trips/{id}/detour",
    params(("id" = Uuid, Path, description = "Trip ID")),
    responses(
        (status = 200, description = "Detour availability", body = DetourResponse),
        (status = 404, description = "Trip not found", body = crate::error::ErrorBody),
    ),
    tag = "trips"
)]
pub(crate) async fn detour_availability(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<DetourResponse>, AppError> {
    let trip = state
        .trips
        .get(&id)
        .filter(|t| t.tenant_id == ctx.tenant_id)
        .ok_or_else(|| AppError::NotFound(format!("trip {id} not found")))?;

    let available = match &state.maps {
        Some(client) => client.detour_available(&trip.origin, &trip.destination).await,
        None => None,
    };

    Ok(Json(DetourResponse {
        trip_id: id,
        available,
    }))
}
