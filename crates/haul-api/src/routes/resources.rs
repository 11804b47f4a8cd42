//! # Resource API
//!
//! Driver and vehicle onboarding, the union listing over resource rows
//! and dispatchable identities, and soft deletion.
//!
//! | Method | Path | Handler |
//! |--------|------|---------|
//! | `POST` | `/v1/resources` | `create_resource` |
//! | `GET`  | `/v1/resources` | `list_resources` |
//! | `GET`  | `/v1/resources/:id` | `get_resource` |
//! | `DELETE` | `/v1/resources/:id` | `delete_resource` |

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::routing::post;
use axum::{Json, Router};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use haul_state::{ResourceKind, ResourceStatus};

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::services::registry;
use crate::state::{AppState, ResourceRecord};

/// Request to onboard a driver or vehicle.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateResourceRequest {
    /// `DRIVER` or `VEHICLE`.
    pub kind: String,
    pub display_name: String,
}

impl Validate for CreateResourceRequest {
    fn validate(&self) -> Result<(), String> {
        parse_kind(&self.kind)?;
        if self.display_name.trim().is_empty() {
            return Err("display_name must not be empty".to_string());
        }
        if self.display_name.len() > 255 {
            return Err("display_name must not exceed 255 characters".to_string());
        }
        Ok(())
    }
}

fn parse_kind(raw: &str) -> Result<ResourceKind, String> {
    serde_json::from_value(serde_json::Value::String(raw.to_string()))
        .map_err(|_| format!("invalid kind '{raw}'. Valid kinds: DRIVER, VEHICLE"))
}

/// One row of the resource listing.
///
/// The listing unions concrete resource rows with identities carrying a
/// role hint that have not been materialized yet, both are dispatchable.
/// Tombstoned rows are excluded from both sides.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResourceView {
    pub id: Uuid,
    #[schema(value_type = String)]
    pub kind: ResourceKind,
    pub display_name: String,
    #[schema(value_type = String)]
    pub status: ResourceStatus,
    /// Whether a concrete resource row exists yet.
    pub provisioned: bool,
    pub created_at: DateTime<Utc>,
}

impl ResourceView {
    fn from_record(record: ResourceRecord) -> Self {
        Self {
            id: record.id,
            kind: record.kind,
            display_name: record.display_name,
            status: record.status,
            provisioned: true,
            created_at: record.created_at,
        }
    }
}

/// Filter parameters for the resource listing.
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct ListResourcesParams {
    /// Restrict to one kind: `DRIVER` or `VEHICLE`.
    pub kind: Option<String>,
}

/// Build the resources router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/resources", post(create_resource).get(list_resources))
        .route(
            "/v1/resources/:id",
            get(get_resource).delete(delete_resource),
        )
}

/// POST /v1/resources: onboard a driver or vehicle.
#[utoipa::path(
    post,
    path = "/v1/resources",
    request_body = CreateResourceRequest,
    responses(
        (status = 201, description = "Resource onboarded", body = ResourceRecord),
        (status = 400, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "resources"
)]
pub(crate) async fn create_resource(
    State(state): State<AppState>,
    ctx: TenantContext,
    body: Result<Json<CreateResourceRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<ResourceRecord>), AppError> {
    let req = extract_validated_json(body)?;
    let kind = parse_kind(&req.kind).map_err(AppError::Validation)?;

    let now = Utc::now();
    let id = Uuid::new_v4();
    let record = ResourceRecord {
        id,
        tenant_id: ctx.tenant_id,
        kind,
        display_name: req.display_name,
        status: ResourceStatus::Idle,
        created_at: now,
        updated_at: now,
    };

    state.resources.insert(id, record.clone());

    // Persist to database (write-through). Failure is surfaced to the client
    // because the in-memory record would be lost on restart.
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::resources::insert(pool, &record).await {
            tracing::error!(resource_id = %id, error = %e, "failed to persist resource to database");
            return Err(AppError::Internal(
                "resource recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/resources: list dispatchable resources for the tenant.
///
/// Unions resource rows with identities that carry a role hint and have
/// no resource row yet (status reads `IDLE`, `provisioned` is false).
/// Tombstoned ids are excluded from both sides of the union.
#[utoipa::path(
    get,
    path = "/v1/resources",
    params(("kind" = Option<String>, Query, description = "Restrict to DRIVER or VEHICLE")),
    responses(
        (status = 200, description = "Dispatchable resources", body = Vec<ResourceView>),
    ),
    tag = "resources"
)]
pub(crate) async fn list_resources(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<ListResourcesParams>,
) -> Result<Json<Vec<ResourceView>>, AppError> {
    let kind_filter = match &params.kind {
        Some(raw) => Some(parse_kind(raw).map_err(AppError::Validation)?),
        None => None,
    };

    let resources = state.resources.list();
    let materialized: std::collections::HashSet<Uuid> =
        resources.iter().map(|r| r.id).collect();

    let mut views: Vec<ResourceView> = resources
        .into_iter()
        .filter(|r| r.tenant_id == ctx.tenant_id && r.status != ResourceStatus::Deleted)
        .filter(|r| kind_filter.map_or(true, |k| r.kind == k))
        .map(ResourceView::from_record)
        .collect();

    // Identities with a role hint that were never materialized are still
    // dispatchable and appear alongside concrete rows.
    for identity in state.identities.list() {
        if identity.tenant_id != ctx.tenant_id || materialized.contains(&identity.id) {
            continue;
        }
        let Some(kind) = identity.role_hint else {
            continue;
        };
        if kind_filter.is_some_and(|k| k != kind) {
            continue;
        }
        views.push(ResourceView {
            id: identity.id,
            kind,
            display_name: identity.display_name,
            status: ResourceStatus::Idle,
            provisioned: false,
            created_at: identity.created_at,
        });
    }

    views.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok(Json(views))
}

/// GET /v1/resources/:id: get one dispatchable resource.
#[utoipa::path(
    get,
    path = "/v1/resources/{id}",
    params(("id" = Uuid, Path, description = "Resource or identity ID")),
    responses(
        (status = 200, description = "Resource found", body = ResourceView),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "resources"
)]
pub(crate) async fn get_resource(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<ResourceView>, AppError> {
    if let Some(record) = state
        .resources
        .get(&id)
        .filter(|r| r.tenant_id == ctx.tenant_id)
    {
        return Ok(Json(ResourceView::from_record(record)));
    }

    let identity = state
        .identities
        .get(&id)
        .filter(|i| i.tenant_id == ctx.tenant_id)
        .ok_or_else(|| AppError::NotFound(format!("resource {id} not found")))?;
    let kind = identity
        .role_hint
        .ok_or_else(|| AppError::NotFound(format!("resource {id} not found")))?;

    Ok(Json(ResourceView {
        id: identity.id,
        kind,
        display_name: identity.display_name,
        status: ResourceStatus::Idle,
        provisioned: false,
        created_at: identity.created_at,
    }))
}

/// DELETE /v1/resources/:id: soft-delete a resource.
///
/// Tombstones the row (or creates a tombstone for a bare identity).
/// Historical orders keep their references; the id disappears from
/// listings and can never be dispatched again.
#[utoipa::path(
    delete,
    path = "/v1/resources/{id}",
    params(("id" = Uuid, Path, description = "Resource or identity ID")),
    responses(
        (status = 204, description = "Resource tombstoned"),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "resources"
)]
pub(crate) async fn delete_resource(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, AppError> {
    registry::soft_delete(&state, &ctx, id).await?;
    Ok(StatusCode::NO_CONTENT)
}
