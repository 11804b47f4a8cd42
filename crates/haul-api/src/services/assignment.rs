//! # Assignment Service
//!
//! The strict driver-assignment path for shipments. The shipment and
//! driver rows are read, validated, and mutated inside one critical
//! section over the shipment and resource store locks, the second of two
//! concurrent assignment attempts observes the first one's committed
//! status and is rejected by the transition table (same shipment) or the
//! availability check (same driver), never silently overwritten.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use haul_state::{
    ensure_transition, EntityKind, ResourceKind, ResourceStatus, ShipmentStatus, TimelineEventKind,
};

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::services::effects::Effects;
use crate::state::{AppState, ShipmentRecord};

/// Bind an idle driver to a shipment and move it to `ASSIGNED`.
pub async fn assign_driver(
    state: &AppState,
    ctx: &TenantContext,
    shipment_id: Uuid,
    driver_id: Uuid,
) -> Result<ShipmentRecord, AppError> {
    let (updated, driver, from) = {
        let mut shipments = state.shipments.write();
        let current = shipments
            .get(&shipment_id)
            .filter(|s| s.tenant_id == ctx.tenant_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("shipment {shipment_id} not found")))?;

        ensure_transition(current.status, ShipmentStatus::Assigned)?;

        let mut resources = state.resources.write();
        let driver = resources
            .get(&driver_id)
            .filter(|r| r.tenant_id == ctx.tenant_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("driver {driver_id} not found")))?;
        if driver.kind != ResourceKind::Driver {
            return Err(AppError::Validation(format!(
                "resource {driver_id} is a {}, not a driver",
                driver.kind
            )));
        }
        if !driver.status.is_available() {
            return Err(AppError::DriverNotAvailable(format!(
                "driver {driver_id} is {}",
                driver.status
            )));
        }

        let now = Utc::now();
        let mut driver = driver;
        driver.status = ResourceStatus::Busy;
        driver.updated_at = now;
        resources.insert(driver_id, driver.clone());

        let from = current.status;
        let mut updated = current;
        updated.driver_id = Some(driver_id);
        updated.status = ShipmentStatus::Assigned;
        updated.updated_at = now;
        shipments.insert(shipment_id, updated.clone());

        (updated, driver, from)
    };

    // Write-through persistence of both rows in one transaction. Failure is
    // surfaced because the rows would diverge from the replica on restart.
    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::shipments::persist_assignment(pool, &updated, &driver).await {
            tracing::error!(
                shipment_id = %shipment_id,
                driver_id = %driver_id,
                error = %e,
                "failed to persist assignment to database"
            );
            return Err(AppError::Internal(
                "assignment recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    let mut fx = Effects::new();
    fx.action(
        EntityKind::Shipment,
        shipment_id,
        TimelineEventKind::DriverAssigned,
        ctx.actor,
        json!({"driver_id": driver_id}),
    );
    fx.status_changed(
        EntityKind::Shipment,
        shipment_id,
        from,
        ShipmentStatus::Assigned,
        ctx.actor,
    );
    fx.run(state).await;

    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use haul_core::{Money, WaybillNo};
    use haul_state::ActorKind;
    use crate::state::ResourceRecord;

    fn test_ctx() -> TenantContext {
        TenantContext {
            tenant_id: Uuid::nil(),
            actor: ActorKind::User,
            subject: "dispatcher".to_string(),
        }
    }

    fn seed_shipment(state: &AppState, status: ShipmentStatus) -> Uuid {
        let id = Uuid::new_v4();
        state.shipments.insert(
            id,
            ShipmentRecord {
                id,
                tenant_id: Uuid::nil(),
                waybill_no: WaybillNo::generate(),
                origin: "Karachi".to_string(),
                destination: "Lahore".to_string(),
                status,
                trip_id: None,
                driver_id: None,
                vehicle_id: None,
                driver_pay: Money::new(50_000, "PKR").unwrap(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        );
        id
    }

    fn seed_driver(state: &AppState, status: ResourceStatus) -> Uuid {
        let id = Uuid::new_v4();
        state.resources.insert(
            id,
            ResourceRecord {
                id,
                tenant_id: Uuid::nil(),
                kind: ResourceKind::Driver,
                display_name: "Imran K".to_string(),
                status,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        );
        id
    }

    #[tokio::test]
    async fn assigns_idle_driver_and_records_timeline() {
        let state = AppState::new();
        let ctx = test_ctx();
        let shipment = seed_shipment(&state, ShipmentStatus::Created);
        let driver = seed_driver(&state, ResourceStatus::Idle);

        let updated = assign_driver(&state, &ctx, shipment, driver).await.unwrap();
        assert_eq!(updated.status, ShipmentStatus::Assigned);
        assert_eq!(updated.driver_id, Some(driver));
        assert_eq!(
            state.resources.get(&driver).unwrap().status,
            ResourceStatus::Busy
        );

        let events = state.timeline.for_entity(EntityKind::Shipment, shipment);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, TimelineEventKind::DriverAssigned);
        assert_eq!(events[1].kind, TimelineEventKind::StatusChanged);
        assert_eq!(events[1].from_status, Some(ShipmentStatus::Created));
        assert_eq!(events[1].to_status, Some(ShipmentStatus::Assigned));
    }

    #[tokio::test]
    async fn busy_driver_leaves_shipment_untouched() {
        let state = AppState::new();
        let ctx = test_ctx();
        let shipment = seed_shipment(&state, ShipmentStatus::Created);
        let driver = seed_driver(&state, ResourceStatus::Busy);

        let err = assign_driver(&state, &ctx, shipment, driver)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::DriverNotAvailable(_)));

        let untouched = state.shipments.get(&shipment).unwrap();
        assert_eq!(untouched.status, ShipmentStatus::Created);
        assert!(untouched.driver_id.is_none());
        assert!(state.timeline.is_empty());
    }

    #[tokio::test]
    async fn assigned_shipment_rejects_second_driver() {
        let state = AppState::new();
        let ctx = test_ctx();
        let shipment = seed_shipment(&state, ShipmentStatus::Created);
        let first = seed_driver(&state, ResourceStatus::Idle);
        let second = seed_driver(&state, ResourceStatus::Idle);

        assign_driver(&state, &ctx, shipment, first).await.unwrap();
        let err = assign_driver(&state, &ctx, shipment, second)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
        // The winner's binding survives; the loser stays idle.
        assert_eq!(
            state.shipments.get(&shipment).unwrap().driver_id,
            Some(first)
        );
        assert_eq!(
            state.resources.get(&second).unwrap().status,
            ResourceStatus::Idle
        );
    }

    #[tokio::test]
    async fn unknown_driver_is_not_found() {
        let state = AppState::new();
        let ctx = test_ctx();
        let shipment = seed_shipment(&state, ShipmentStatus::Created);
        let err = assign_driver(&state, &ctx, shipment, Uuid::new_v4())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn vehicle_cannot_be_assigned_as_driver() {
        let state = AppState::new();
        let ctx = test_ctx();
        let shipment = seed_shipment(&state, ShipmentStatus::Created);
        let id = Uuid::new_v4();
        state.resources.insert(
            id,
            ResourceRecord {
                id,
                tenant_id: Uuid::nil(),
                kind: ResourceKind::Vehicle,
                display_name: "KHI-1290".to_string(),
                status: ResourceStatus::Idle,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        );
        let err = assign_driver(&state, &ctx, shipment, id).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn terminal_shipment_rejects_assignment() {
        let state = AppState::new();
        let ctx = test_ctx();
        let shipment = seed_shipment(&state, ShipmentStatus::Cancelled);
        let driver = seed_driver(&state, ResourceStatus::Idle);
        let err = assign_driver(&state, &ctx, shipment, driver)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }
}
