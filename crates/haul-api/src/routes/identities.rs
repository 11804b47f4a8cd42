//! # Identity Shadow Records
//!
//! Mirrors of accounts owned by the identity collaborator. An identity
//! with a role hint is dispatchable before any resource row exists, the
//! registry materializes the row on first reference.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use haul_state::ResourceKind;

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::extractors::{extract_validated_json, Validate};
use crate::state::{AppState, IdentityRecord};

/// Request to mirror an identity.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateIdentityRequest {
    pub display_name: String,
    /// `DRIVER` or `VEHICLE` when the account represents one.
    pub role_hint: Option<String>,
}

impl Validate for CreateIdentityRequest {
    fn validate(&self) -> Result<(), String> {
        if self.display_name.trim().is_empty() {
            return Err("display_name must not be empty".to_string());
        }
        if self.display_name.len() > 255 {
            return Err("display_name must not exceed 255 characters".to_string());
        }
        if let Some(raw) = &self.role_hint {
            serde_json::from_value::<ResourceKind>(serde_json::Value::String(raw.clone()))
                .map_err(|_| format!("invalid role_hint '{raw}'. Valid hints: DRIVER, VEHICLE"))?;
        }
        Ok(())
    }
}

/// Build the identities router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/identities", post(create_identity).get(list_identities))
        .route("/v1/identities/:id", get(get_identity))
}

/// POST /v1/identities: mirror an identity record.
#[utoipa::path(
    post,
    path = "/v1/identities",
    request_body = CreateIdentityRequest,
    responses(
        (status = 201, description = "Identity mirrored", body = IdentityRecord),
        (status = 400, description = "Invalid request", body = crate::error::ErrorBody),
    ),
    tag = "identities"
)]
pub(crate) async fn create_identity(
    State(state): State<AppState>,
    ctx: TenantContext,
    body: Result<Json<CreateIdentityRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<IdentityRecord>), AppError> {
    let req = extract_validated_json(body)?;
    let role_hint = req
        .role_hint
        .as_deref()
        .map(|raw| {
            serde_json::from_value::<ResourceKind>(serde_json::Value::String(raw.to_string()))
                .map_err(|_| AppError::Validation(format!("invalid role_hint '{raw}'")))
        })
        .transpose()?;

    let record = IdentityRecord {
        id: Uuid::new_v4(),
        tenant_id: ctx.tenant_id,
        display_name: req.display_name,
        role_hint,
        created_at: Utc::now(),
    };

    state.identities.insert(record.id, record.clone());

    // Persist to database (write-through). Failure is surfaced to the client
    // because the in-memory record would be lost on restart.
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::identities::insert(pool, &record).await {
            tracing::error!(identity_id = %record.id, error = %e, "failed to persist identity to database");
            return Err(AppError::Internal(
                "identity recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /v1/identities: list identities for the tenant, newest first.
#[utoipa::path(
    get,
    path = "/v1/identities",
    responses(
        (status = 200, description = "Identities", body = Vec<IdentityRecord>),
    ),
    tag = "identities"
)]
pub(crate) async fn list_identities(
    State(state): State<AppState>,
    ctx: TenantContext,
) -> Json<Vec<IdentityRecord>> {
    let mut all: Vec<_> = state
        .identities
        .list()
        .into_iter()
        .filter(|i| i.tenant_id == ctx.tenant_id)
        .collect();
    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Json(all)
}

/// GET /v1/identities/:id: get an identity.
#[utoipa::path(
    get,
    path = "/v1/identities/{id}",
    params(("id" = Uuid, Path, description = "Identity ID")),
    responses(
        (status = 200, description = "Identity found", body = IdentityRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "identities"
)]
pub(crate) async fn get_identity(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<IdentityRecord>, AppError> {
    state
        .identities
        .get(&id)
        .filter(|i| i.tenant_id == ctx.tenant_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("identity {id} not found")))
}
