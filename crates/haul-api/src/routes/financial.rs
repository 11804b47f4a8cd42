//! # Financial Records API
//!
//! Read-only surface over the payable/receivable records synthesized by
//! the completion trigger. Settlement workflows live in the finance
//! collaborator; this API only exposes what the trigger produced.

use axum::extract::{Path, Query, State};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use haul_state::FinancialStatus;

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::routes::PaginationParams;
use crate::state::{AppState, FinancialRecord};

/// Filter parameters for the financial record listing.
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct ListFinancialParams {
    /// Restrict to one settlement status, e.g. `PENDING`.
    pub status: Option<String>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

/// Build the financial records router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/financial-records", get(list_records))
        .route("/v1/financial-records/:id", get(get_record))
}

/// GET /v1/financial-records: list records for the tenant, newest first.
#[utoipa::path(
    get,
    path = "/v1/financial-records",
    params(
        ("status" = Option<String>, Query, description = "Restrict to one settlement status"),
        ("limit" = Option<usize>, Query, description = "Max items to return"),
        ("offset" = Option<usize>, Query, description = "Items to skip"),
    ),
    responses(
        (status = 200, description = "Financial records", body = Vec<FinancialRecord>),
    ),
    tag = "financial"
)]
pub(crate) async fn list_records(
    State(state): State<AppState>,
    ctx: TenantContext,
    Query(params): Query<ListFinancialParams>,
) -> Result<Json<Vec<FinancialRecord>>, AppError> {
    let status_filter = match &params.status {
        Some(raw) => Some(
            serde_json::from_value::<FinancialStatus>(serde_json::Value::String(raw.clone()))
                .map_err(|_| {
                    AppError::Validation(format!(
                        "invalid status '{raw}'. Valid statuses: PENDING, PAID, OVERDUE, VOID"
                    ))
                })?,
        ),
        None => None,
    };

    let pagination = PaginationParams {
        limit: params.limit,
        offset: params.offset,
    };
    let mut all: Vec<_> = state
        .financials
        .list()
        .into_iter()
        .filter(|r| r.tenant_id == ctx.tenant_id)
        .filter(|r| status_filter.map_or(true, |s| r.status == s))
        .collect();
    all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let offset = pagination.effective_offset().min(all.len());
    let page = all
        .into_iter()
        .skip(offset)
        .take(pagination.effective_limit())
        .collect();
    Ok(Json(page))
}

/// GET /v1/financial-records/:id: get a record.
#[utoipa::path(
    get,
    path = "/v1/financial-records/{id}",
    params(("id" = Uuid, Path, description = "Record ID")),
    responses(
        (status = 200, description = "Record found", body = FinancialRecord),
        (status = 404, description = "Not found", body = crate::error::ErrorBody),
    ),
    tag = "financial"
)]
pub(crate) async fn get_record(
    State(state): State<AppState>,
    ctx: TenantContext,
    Path(id): Path<Uuid>,
) -> Result<Json<FinancialRecord>, AppError> {
    state
        .financials
        .get(&id)
        .filter(|r| r.tenant_id == ctx.tenant_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("financial record {id} not found")))
}
