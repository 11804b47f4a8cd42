//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::state::AppState;

/// Adds Bearer token security scheme to the OpenAPI spec.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .description(Some(
                            "Bearer token authentication. Set via HAUL_AUTH_TOKEN env var.",
                        ))
                        .build(),
                ),
            );
        }
    }
}

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Haul Stack API",
        version = "0.3.2",
        description = "Logistics back-office lifecycle core: shipments and trips moving through a single status machine, driver/vehicle registry with lazy materialization and soft deletion, proof-of-delivery gating, payable synthesis on completion, and an append-only dispatch timeline.\n\nAuthentication: Bearer token via `Authorization: Bearer <token>`. All `/v1/*` endpoints require authentication; health probes and `/metrics` are unauthenticated.",
        license(name = "BUSL-1.1")
    ),
    servers(
        (url = "http://localhost:8080", description = "Local development server"),
    ),
    security(
        ("bearer_auth" = [])
    ),
    paths(
        // ── Shipments ────────────────────────────────────────────────────
        crate::routes::shipments::create_shipment,
        crate::routes::shipments::list_shipments,
        crate::routes::shipments::get_shipment,
        crate::routes::shipments::assign_driver,
        crate::routes::shipments::change_status,
        crate::routes::shipments::upload_pod,
        crate::routes::shipments::list_pods,
        crate::routes::shipments::get_timeline,
        // ── Trips ────────────────────────────────────────────────────────
        crate::routes::trips::create_trip,
        crate::routes::trips::list_trips,
        crate::routes::trips::get_trip,
        crate::routes::trips::update_trip,
        crate::routes::trips::get_timeline,
        crate::routes::trips::detour_availability,
        // ── Resources ────────────────────────────────────────────────────
        crate::routes::resources::create_resource,
        crate::routes::resources::list_resources,
        crate::routes::resources::get_resource,
        crate::routes::resources::delete_resource,
        // ── Identities ───────────────────────────────────────────────────
        crate::routes::identities::create_identity,
        crate::routes::identities::list_identities,
        crate::routes::identities::get_identity,
        // ── Financial ────────────────────────────────────────────────────
        crate::routes::financial::list_records,
        crate::routes::financial::get_record,
        // ── Ops ──────────────────────────────────────────────────────────
        crate::routes::ops::list_dead_letters,
    ),
    components(schemas(
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        crate::state::ShipmentRecord,
        crate::state::TripRecord,
        crate::state::ResourceRecord,
        crate::state::IdentityRecord,
        crate::state::PodRecord,
        crate::state::FinancialRecord,
        crate::state::DeadLetterRecord,
        crate::routes::shipments::CreateShipmentRequest,
        crate::routes::shipments::AssignDriverRequest,
        crate::routes::shipments::ChangeStatusRequest,
        crate::routes::trips::CreateTripRequest,
        crate::routes::trips::UpdateTripRequest,
        crate::routes::trips::DetourResponse,
        crate::routes::resources::CreateResourceRequest,
        crate::routes::resources::ResourceView,
        crate::routes::identities::CreateIdentityRequest,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "shipments", description = "Shipment lifecycle operations"),
        (name = "trips", description = "Trip lifecycle and reassignment"),
        (name = "resources", description = "Driver/vehicle registry"),
        (name = "identities", description = "Identity shadow records"),
        (name = "financial", description = "Payables and receivables"),
        (name = "ops", description = "Operator surface"),
    )
)]
pub struct ApiDoc;

/// GET /openapi.json, the assembled spec.
async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Build the OpenAPI router.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}
