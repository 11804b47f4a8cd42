//! # Status Change and Delivery-Proof Gate
//!
//! The generic status-change operation for shipments. Every request is
//! validated against the transition table; completion is additionally
//! gated on at least one recorded proof-of-delivery artifact. The POD
//! count is read while the shipment write lock is held; the POD log is
//! append-only, so the check is monotonic and cannot be invalidated
//! between check and commit.
//!
//! POD recording itself lives here too: uploading an artifact for a
//! shipment in `DELIVERED` nudges it into `POD_PENDING_REVIEW`. The nudge
//! is a one-way system transition, deliberately outside the transition
//! check of the explicit status endpoint.

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use haul_state::{
    ensure_transition, financial::shipment_payout_due, ActorKind, EntityKind, ShipmentStatus,
    TimelineEventKind,
};

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::services::effects::{Effects, FinancialDraft};
use crate::services::registry;
use crate::state::{AppState, PodRecord, ShipmentRecord};

/// Change a shipment's status through the transition table.
pub async fn change_shipment_status(
    state: &AppState,
    ctx: &TenantContext,
    shipment_id: Uuid,
    target: ShipmentStatus,
) -> Result<ShipmentRecord, AppError> {
    let (updated, touched, fx) = {
        let mut shipments = state.shipments.write();
        let current = shipments
            .get(&shipment_id)
            .filter(|s| s.tenant_id == ctx.tenant_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("shipment {shipment_id} not found")))?;

        ensure_transition(current.status, target)?;

        if target == ShipmentStatus::Completed && state.pods.count(&shipment_id) == 0 {
            return Err(AppError::PodRequired(format!(
                "shipment {shipment_id} has no recorded proof of delivery"
            )));
        }

        let now = Utc::now();
        let from = current.status;
        let mut updated = current;
        updated.status = target;
        updated.updated_at = now;
        shipments.insert(shipment_id, updated.clone());

        let mut fx = Effects::new();
        fx.status_changed(EntityKind::Shipment, shipment_id, from, target, ctx.actor);

        let mut touched = Vec::new();
        if target.is_terminal() {
            let trips = state.trips.read();
            let mut resources = state.resources.write();
            for rid in [updated.driver_id, updated.vehicle_id].into_iter().flatten() {
                if let Some(released) =
                    registry::release_if_unreferenced(&shipments, &trips, &mut resources, rid)
                {
                    fx.action(
                        EntityKind::Shipment,
                        shipment_id,
                        TimelineEventKind::ResourceReleased,
                        ActorKind::System,
                        json!({"resource_id": rid, "kind": released.kind.as_str()}),
                    );
                    touched.push(released);
                }
            }
        }

        if shipment_payout_due(from, target) {
            fx.financial(FinancialDraft {
                tenant_id: updated.tenant_id,
                entity_kind: EntityKind::Shipment,
                entity_id: shipment_id,
                reference_id: updated.driver_id,
                amount: updated.driver_pay.clone(),
            });
        }

        (updated, touched, fx)
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::shipments::persist_status(pool, &updated, &touched).await {
            tracing::error!(
                shipment_id = %shipment_id,
                error = %e,
                "failed to persist status change to database"
            );
            return Err(AppError::Internal(
                "status change recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    fx.run(state).await;
    Ok(updated)
}

/// Record a proof-of-delivery artifact and apply the review nudge.
///
/// Returns the POD record and, when the shipment was in `DELIVERED`, the
/// auto-advanced shipment.
pub async fn record_pod(
    state: &AppState,
    ctx: &TenantContext,
    shipment_id: Uuid,
    file_path: String,
    note: Option<String>,
) -> Result<(PodRecord, Option<ShipmentRecord>), AppError> {
    let (pod, nudged, fx) = {
        let mut shipments = state.shipments.write();
        let current = shipments
            .get(&shipment_id)
            .filter(|s| s.tenant_id == ctx.tenant_id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("shipment {shipment_id} not found")))?;

        let now = Utc::now();
        let pod = PodRecord {
            id: Uuid::new_v4(),
            shipment_id,
            file_path,
            uploaded_by: ctx.actor,
            note,
            created_at: now,
        };
        state.pods.append(pod.clone());

        let mut fx = Effects::new();
        fx.action(
            EntityKind::Shipment,
            shipment_id,
            TimelineEventKind::PodUploaded,
            ctx.actor,
            json!({"pod_id": pod.id, "file_path": pod.file_path}),
        );

        let nudged = if current.status == ShipmentStatus::Delivered {
            let mut updated = current;
            updated.status = ShipmentStatus::PodPendingReview;
            updated.updated_at = now;
            shipments.insert(shipment_id, updated.clone());
            fx.status_changed(
                EntityKind::Shipment,
                shipment_id,
                ShipmentStatus::Delivered,
                ShipmentStatus::PodPendingReview,
                ActorKind::System,
            );
            Some(updated)
        } else {
            None
        };

        (pod, nudged, fx)
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::pods::persist_upload(pool, &pod, nudged.as_ref()).await {
            tracing::error!(
                shipment_id = %shipment_id,
                error = %e,
                "failed to persist POD upload to database"
            );
            return Err(AppError::Internal(
                "POD recorded in-memory but database persist failed".to_string(),
            ));
        }
    }

    fx.run(state).await;
    Ok((pod, nudged))
}

#[cfg(test)]
mod tests {
    use super::*;
    use haul_core::{Money, WaybillNo};
    use haul_state::{FinancialKind, ResourceKind, ResourceStatus};
    use crate::state::ResourceRecord;

    fn test_ctx() -> TenantContext {
        TenantContext {
            tenant_id: Uuid::nil(),
            actor: ActorKind::User,
            subject: "ops".to_string(),
        }
    }

    fn seed_shipment(
        state: &AppState,
        status: ShipmentStatus,
        driver_id: Option<Uuid>,
    ) -> Uuid {
        let id = Uuid::new_v4();
        state.shipments.insert(
            id,
            ShipmentRecord {
                id,
                tenant_id: Uuid::nil(),
                waybill_no: WaybillNo::generate(),
                origin: "Karachi".to_string(),
                destination: "Multan".to_string(),
                status,
                trip_id: None,
                driver_id,
                vehicle_id: None,
                driver_pay: Money::new(80_000, "PKR").unwrap(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        );
        id
    }

    fn seed_pod(state: &AppState, shipment_id: Uuid) {
        state.pods.append(PodRecord {
            id: Uuid::new_v4(),
            shipment_id,
            file_path: "pod/receipt.jpg".to_string(),
            uploaded_by: ActorKind::Driver,
            note: None,
            created_at: Utc::now(),
        });
    }

    #[tokio::test]
    async fn completion_without_pod_is_rejected() {
        let state = AppState::new();
        let ctx = test_ctx();
        let id = seed_shipment(&state, ShipmentStatus::Delivered, None);

        let err = change_shipment_status(&state, &ctx, id, ShipmentStatus::Completed)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::PodRequired(_)));
        assert_eq!(
            state.shipments.get(&id).unwrap().status,
            ShipmentStatus::Delivered
        );
    }

    #[tokio::test]
    async fn completion_with_one_pod_succeeds() {
        let state = AppState::new();
        let ctx = test_ctx();
        let id = seed_shipment(&state, ShipmentStatus::Delivered, None);
        seed_pod(&state, id);

        let updated = change_shipment_status(&state, &ctx, id, ShipmentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(updated.status, ShipmentStatus::Completed);
    }

    #[tokio::test]
    async fn invalid_transition_is_rejected() {
        let state = AppState::new();
        let ctx = test_ctx();
        let id = seed_shipment(&state, ShipmentStatus::Created, None);
        let err = change_shipment_status(&state, &ctx, id, ShipmentStatus::Delivered)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[tokio::test]
    async fn delivery_creates_payable_for_driver() {
        let state = AppState::new();
        let ctx = test_ctx();
        let driver = Uuid::new_v4();
        let id = seed_shipment(&state, ShipmentStatus::InTransit, Some(driver));

        change_shipment_status(&state, &ctx, id, ShipmentStatus::Delivered)
            .await
            .unwrap();

        let records = state.financials.list();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].kind, FinancialKind::Payable);
        assert_eq!(records[0].reference_id, Some(driver));
        assert_eq!(records[0].amount.minor, 80_000);
    }

    #[tokio::test]
    async fn terminal_transition_releases_driver() {
        let state = AppState::new();
        let ctx = test_ctx();
        let driver = Uuid::new_v4();
        state.resources.insert(
            driver,
            ResourceRecord {
                id: driver,
                tenant_id: Uuid::nil(),
                kind: ResourceKind::Driver,
                display_name: "Imran K".to_string(),
                status: ResourceStatus::Busy,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        );
        let id = seed_shipment(&state, ShipmentStatus::Pickup, Some(driver));

        change_shipment_status(&state, &ctx, id, ShipmentStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(
            state.resources.get(&driver).unwrap().status,
            ResourceStatus::Idle
        );
    }

    #[tokio::test]
    async fn pod_upload_nudges_delivered_shipment_into_review() {
        let state = AppState::new();
        let ctx = test_ctx();
        let id = seed_shipment(&state, ShipmentStatus::Delivered, None);

        let (pod, nudged) = record_pod(
            &state,
            &ctx,
            id,
            "pod/receipt.jpg".to_string(),
            Some("left at gate".to_string()),
        )
        .await
        .unwrap();

        assert_eq!(state.pods.count(&id), 1);
        assert_eq!(pod.note.as_deref(), Some("left at gate"));
        let nudged = nudged.expect("delivered shipment should be nudged");
        assert_eq!(nudged.status, ShipmentStatus::PodPendingReview);

        // Completion now passes the gate.
        let updated = change_shipment_status(&state, &ctx, id, ShipmentStatus::Completed)
            .await
            .unwrap();
        assert_eq!(updated.status, ShipmentStatus::Completed);
    }

    #[tokio::test]
    async fn pod_upload_before_delivery_does_not_nudge() {
        let state = AppState::new();
        let ctx = test_ctx();
        let id = seed_shipment(&state, ShipmentStatus::InTransit, None);

        let (_, nudged) = record_pod(&state, &ctx, id, "pod/early.jpg".to_string(), None)
            .await
            .unwrap();
        assert!(nudged.is_none());
        assert_eq!(
            state.shipments.get(&id).unwrap().status,
            ShipmentStatus::InTransit
        );
    }
}
