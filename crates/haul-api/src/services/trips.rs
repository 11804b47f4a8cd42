//! # Trip Update Service
//!
//! The looser update path used for trip-level driver/vehicle reassignment
//! and status changes. "Looser" covers what it accepts (an explicit
//! tagged-update body, identities that have no resource row yet), not
//! which checks run: a `status` change here goes through the same
//! transition table as the dedicated shipment endpoints, always.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use haul_core::Money;
use haul_state::{
    ensure_transition, financial::trip_payout_due, ActorKind, EntityKind, ResourceKind,
    ResourceStatus, ShipmentStatus, TimelineEventKind,
};

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::services::effects::{Effects, FinancialDraft};
use crate::services::registry;
use crate::state::{AppState, TripRecord};

/// The tagged update applied by `PUT /v1/trips/:id`.
///
/// Only these fields can change; anything else in the request body is
/// rejected at deserialization. `None` means "leave as is".
#[derive(Debug, Default, Clone)]
pub struct TripChanges {
    pub status: Option<ShipmentStatus>,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    pub driver_pay_minor: Option<i64>,
    pub currency: Option<String>,
}

/// Apply a tagged update to a trip.
pub async fn update_trip(
    state: &AppState,
    ctx: &TenantContext,
    trip_id: Uuid,
    changes: TripChanges,
) -> Result<TripRecord, AppError> {
    let (updated, touched, fx) = {
        // Lock order: shipments (for release checks) before trips.
        let shipments = state.shipments.read();
        let mut trips = state.trips.write();
        let current = trips
            .get(&trip_id)
            .filter(|t| t.tenant_id == ctx.tenant_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("trip {trip_id} not found")))?;

        // Validate everything before mutating anything.
        if let Some(target) = changes.status {
            ensure_transition(current.status, target)?;
        }
        let new_pay = match (changes.driver_pay_minor, changes.currency.as_deref()) {
            (None, None) => None,
            (minor, currency) => Some(Money::new(
                minor.unwrap_or(current.driver_pay.minor),
                currency.unwrap_or(&current.driver_pay.currency),
            )?),
        };

        let identities = state.identities.read();
        let mut resources = state.resources.write();

        // Every referenced resource must be attachable before any row is
        // mutated, so a multi-field update cannot half-apply.
        if let Some(driver_id) = changes.driver_id {
            if current.driver_id != Some(driver_id) {
                registry::check_attachable(
                    &identities,
                    &resources,
                    ctx.tenant_id,
                    driver_id,
                    ResourceKind::Driver,
                )?;
            }
        }
        if let Some(vehicle_id) = changes.vehicle_id {
            if current.vehicle_id != Some(vehicle_id) {
                registry::check_attachable(
                    &identities,
                    &resources,
                    ctx.tenant_id,
                    vehicle_id,
                    ResourceKind::Vehicle,
                )?;
            }
        }

        let mut fx = Effects::new();
        let mut touched = Vec::new();
        let now = Utc::now();
        let mut updated = current.clone();

        if let Some(driver_id) = changes.driver_id {
            if updated.driver_id != Some(driver_id) {
                registry::ensure_resource(
                    &identities,
                    &mut resources,
                    ctx.tenant_id,
                    driver_id,
                    ResourceKind::Driver,
                    EntityKind::Trip,
                    trip_id,
                    &mut fx,
                )?;
                if let Some(resource) = resources.get_mut(&driver_id) {
                    if resource.status == ResourceStatus::Idle {
                        resource.status = ResourceStatus::Busy;
                        resource.updated_at = now;
                    }
                    touched.push(resource.clone());
                }
                fx.action(
                    EntityKind::Trip,
                    trip_id,
                    TimelineEventKind::DriverAssigned,
                    ctx.actor,
                    json!({"driver_id": driver_id}),
                );
                updated.driver_id = Some(driver_id);
            }
        }

        if let Some(vehicle_id) = changes.vehicle_id {
            if updated.vehicle_id != Some(vehicle_id) {
                registry::ensure_resource(
                    &identities,
                    &mut resources,
                    ctx.tenant_id,
                    vehicle_id,
                    ResourceKind::Vehicle,
                    EntityKind::Trip,
                    trip_id,
                    &mut fx,
                )?;
                if let Some(resource) = resources.get_mut(&vehicle_id) {
                    if resource.status == ResourceStatus::Idle {
                        resource.status = ResourceStatus::Busy;
                        resource.updated_at = now;
                    }
                    touched.push(resource.clone());
                }
                fx.action(
                    EntityKind::Trip,
                    trip_id,
                    TimelineEventKind::VehicleAssigned,
                    ctx.actor,
                    json!({"vehicle_id": vehicle_id}),
                );
                updated.vehicle_id = Some(vehicle_id);
            }
        }

        if let Some(pay) = new_pay {
            updated.driver_pay = pay;
        }
        if let Some(target) = changes.status {
            updated.status = target;
        }
        updated.updated_at = now;
        trips.insert(trip_id, updated.clone());

        // Release swapped-out resources now that the trip row is updated.
        for old in [current.driver_id, current.vehicle_id].into_iter().flatten() {
            let still_bound = updated.driver_id == Some(old) || updated.vehicle_id == Some(old);
            if still_bound {
                continue;
            }
            if let Some(released) =
                registry::release_if_unreferenced(&shipments, &trips, &mut resources, old)
            {
                fx.action(
                    EntityKind::Trip,
                    trip_id,
                    TimelineEventKind::ResourceReleased,
                    ActorKind::System,
                    json!({"resource_id": old, "kind": released.kind.as_str()}),
                );
                touched.push(released);
            }
        }

        if let Some(target) = changes.status {
            fx.status_changed(EntityKind::Trip, trip_id, current.status, target, ctx.actor);

            if target.is_terminal() {
                for rid in [updated.driver_id, updated.vehicle_id].into_iter().flatten() {
                    if let Some(released) =
                        registry::release_if_unreferenced(&shipments, &trips, &mut resources, rid)
                    {
                        fx.action(
                            EntityKind::Trip,
                            trip_id,
                            TimelineEventKind::ResourceReleased,
                            ActorKind::System,
                            json!({"resource_id": rid, "kind": released.kind.as_str()}),
                        );
                        touched.push(released);
                    }
                }
            }

            if trip_payout_due(current.status, target) {
                fx.financial(FinancialDraft {
                    tenant_id: updated.tenant_id,
                    entity_kind: EntityKind::Trip,
                    entity_id: trip_id,
                    reference_id: updated.driver_id,
                    amount: updated.driver_pay.clone(),
                });
            }
        }

        (updated, touched, fx)
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::trips::persist_update(pool, &updated, &touched).await {
            tracing::error!(trip_id = %trip_id, error = %e, "failed to persist trip update to database");
            return Err(AppError::Internal(
                "trip update recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    fx.run(state).await;
    Ok(updated)
}
