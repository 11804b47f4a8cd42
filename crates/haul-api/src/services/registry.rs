//! # Resource Registry
//!
//! Owns driver and vehicle availability. Two jobs beyond plain CRUD:
//!
//! - **Lazy materialization**: organizations dispatch "drivers" and
//!   "vehicles" that exist only as generic identities until first
//!   referenced by an order. [`ensure_resource`] synthesizes the resource
//!   row from the identity on first use, under the identity's id.
//! - **Soft deletion**: resources are tombstoned, never hard-deleted, so
//!   historical orders keep valid references. [`soft_delete`] is the single
//!   deletion contract and internally branches on whether a resource row
//!   exists yet.

use std::collections::HashMap;

use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use haul_state::{ActorKind, EntityKind, ResourceKind, ResourceStatus, TimelineEventKind};

use crate::auth::TenantContext;
use crate::error::AppError;
use crate::services::effects::Effects;
use crate::state::{AppState, IdentityRecord, ResourceRecord, ShipmentRecord, TripRecord};

/// Read-only check that an id can be attached as the given resource kind.
///
/// Used to validate every referenced resource before any row is mutated,
/// so a multi-field update cannot half-apply. [`ensure_resource`] performs
/// the same checks before materializing.
pub fn check_attachable(
    identities: &HashMap<Uuid, IdentityRecord>,
    resources: &HashMap<Uuid, ResourceRecord>,
    tenant_id: Uuid,
    id: Uuid,
    kind: ResourceKind,
) -> Result<(), AppError> {
    if let Some(existing) = resources.get(&id) {
        if existing.tenant_id != tenant_id {
            return Err(AppError::NotFound(format!("{kind} {id} not found")));
        }
        if existing.kind != kind {
            return Err(AppError::Validation(format!(
                "resource {id} is a {}, not a {kind}",
                existing.kind
            )));
        }
        if existing.status == ResourceStatus::Deleted {
            return Err(AppError::Validation(format!(
                "{kind} {id} has been deleted"
            )));
        }
        return Ok(());
    }

    let identity = identities
        .get(&id)
        .filter(|i| i.tenant_id == tenant_id)
        .ok_or_else(|| AppError::NotFound(format!("identity {id} not found")))?;
    if let Some(hint) = identity.role_hint {
        if hint != kind {
            return Err(AppError::Validation(format!(
                "identity {id} is registered as a {hint}, not a {kind}"
            )));
        }
    }
    Ok(())
}

/// Resolve a resource row for an identity, materializing it if absent.
///
/// The returned boolean is `true` when a new row was provisioned. A
/// provisioned row starts `BUSY`; this function is only called while
/// attaching the resource to an order. Caller holds the identities read
/// guard and the resources write guard.
pub fn ensure_resource(
    identities: &HashMap<Uuid, IdentityRecord>,
    resources: &mut HashMap<Uuid, ResourceRecord>,
    tenant_id: Uuid,
    id: Uuid,
    kind: ResourceKind,
    entity_kind: EntityKind,
    entity_id: Uuid,
    fx: &mut Effects,
) -> Result<(ResourceRecord, bool), AppError> {
    check_attachable(identities, resources, tenant_id, id, kind)?;

    if let Some(existing) = resources.get(&id) {
        return Ok((existing.clone(), false));
    }

    // check_attachable verified the identity exists for this tenant.
    let identity = identities
        .get(&id)
        .ok_or_else(|| AppError::NotFound(format!("identity {id} not found")))?;

    let now = Utc::now();
    let record = ResourceRecord {
        id,
        tenant_id,
        kind,
        display_name: identity.display_name.clone(),
        status: ResourceStatus::Busy,
        created_at: now,
        updated_at: now,
    };
    resources.insert(id, record.clone());
    fx.action(
        entity_kind,
        entity_id,
        TimelineEventKind::ResourceProvisioned,
        ActorKind::System,
        json!({"resource_id": id, "kind": kind.as_str()}),
    );
    tracing::info!(resource_id = %id, kind = %kind, "materialized resource row from identity");

    Ok((record, true))
}

/// Return a `BUSY` resource to `IDLE` unless an active order references it.
///
/// Caller holds the shipments and trips guards (either mode) and the
/// resources write guard. Returns the updated row when a release happened.
pub fn release_if_unreferenced(
    shipments: &HashMap<Uuid, ShipmentRecord>,
    trips: &HashMap<Uuid, TripRecord>,
    resources: &mut HashMap<Uuid, ResourceRecord>,
    resource_id: Uuid,
) -> Option<ResourceRecord> {
    let referenced = shipments.values().any(|s| {
        !s.status.is_terminal()
            && (s.driver_id == Some(resource_id) || s.vehicle_id == Some(resource_id))
    }) || trips.values().any(|t| {
        !t.status.is_terminal()
            && (t.driver_id == Some(resource_id) || t.vehicle_id == Some(resource_id))
    });
    if referenced {
        return None;
    }

    let resource = resources.get_mut(&resource_id)?;
    if resource.status != ResourceStatus::Busy {
        return None;
    }
    resource.status = ResourceStatus::Idle;
    resource.updated_at = Utc::now();
    Some(resource.clone())
}

/// Soft-delete a resource, tombstoning a bare identity when necessary.
///
/// Two internal paths, one contract: an existing resource row is marked
/// `DELETED`; an id that only exists as an identity gets a tombstone
/// resource row created directly in `DELETED`, so list queries that union
/// identities and resources exclude it. Unknown ids are `NOT_FOUND`.
pub async fn soft_delete(
    state: &AppState,
    ctx: &TenantContext,
    id: Uuid,
) -> Result<ResourceRecord, AppError> {
    let record = {
        let identities = state.identities.read();
        let mut resources = state.resources.write();
        let now = Utc::now();

        if let Some(existing) = resources.get_mut(&id) {
            if existing.tenant_id != ctx.tenant_id {
                return Err(AppError::NotFound(format!("resource {id} not found")));
            }
            existing.status = ResourceStatus::Deleted;
            existing.updated_at = now;
            existing.clone()
        } else if let Some(identity) = identities.get(&id).filter(|i| i.tenant_id == ctx.tenant_id)
        {
            let tombstone = ResourceRecord {
                id,
                tenant_id: ctx.tenant_id,
                kind: identity.role_hint.unwrap_or(ResourceKind::Driver),
                display_name: identity.display_name.clone(),
                status: ResourceStatus::Deleted,
                created_at: now,
                updated_at: now,
            };
            resources.insert(id, tombstone.clone());
            tombstone
        } else {
            return Err(AppError::NotFound(format!("resource {id} not found")));
        }
    };

    if let Some(pool) = &state.db_pool {
        if let Err(e) = crate::db::resources::upsert(pool, &record).await {
            tracing::error!(resource_id = %id, error = %e, "failed to persist soft delete to database");
            return Err(AppError::Internal(
                "resource tombstoned in-memory but database persist failed".to_string(),
            ));
        }
    }

    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use haul_core::Money;
    use haul_state::ShipmentStatus;

    fn identity(tenant: Uuid, hint: Option<ResourceKind>) -> IdentityRecord {
        IdentityRecord {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            display_name: "Imran K".to_string(),
            role_hint: hint,
            created_at: Utc::now(),
        }
    }

    fn trip(tenant: Uuid, status: ShipmentStatus, driver: Option<Uuid>) -> TripRecord {
        TripRecord {
            id: Uuid::new_v4(),
            tenant_id: tenant,
            origin: "Karachi".to_string(),
            destination: "Lahore".to_string(),
            status,
            driver_id: driver,
            vehicle_id: None,
            driver_pay: Money::zero("PKR").unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn ensure_materializes_busy_row_from_identity() {
        let tenant = Uuid::nil();
        let ident = identity(tenant, Some(ResourceKind::Driver));
        let identities = HashMap::from([(ident.id, ident.clone())]);
        let mut resources = HashMap::new();
        let mut fx = Effects::new();

        let (record, provisioned) = ensure_resource(
            &identities,
            &mut resources,
            tenant,
            ident.id,
            ResourceKind::Driver,
            EntityKind::Trip,
            Uuid::new_v4(),
            &mut fx,
        )
        .unwrap();

        assert!(provisioned);
        assert_eq!(record.id, ident.id);
        assert_eq!(record.status, ResourceStatus::Busy);
        assert_eq!(record.display_name, "Imran K");
        assert!(resources.contains_key(&ident.id));
        assert!(!fx.is_empty());
    }

    #[test]
    fn ensure_returns_existing_row_untouched() {
        let tenant = Uuid::nil();
        let id = Uuid::new_v4();
        let existing = ResourceRecord {
            id,
            tenant_id: tenant,
            kind: ResourceKind::Driver,
            display_name: "Asif".to_string(),
            status: ResourceStatus::Idle,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let mut resources = HashMap::from([(id, existing)]);
        let mut fx = Effects::new();

        let (record, provisioned) = ensure_resource(
            &HashMap::new(),
            &mut resources,
            tenant,
            id,
            ResourceKind::Driver,
            EntityKind::Trip,
            Uuid::new_v4(),
            &mut fx,
        )
        .unwrap();

        assert!(!provisioned);
        assert_eq!(record.status, ResourceStatus::Idle);
        assert!(fx.is_empty());
    }

    #[test]
    fn ensure_unknown_identity_is_not_found() {
        let mut resources = HashMap::new();
        let mut fx = Effects::new();
        let err = ensure_resource(
            &HashMap::new(),
            &mut resources,
            Uuid::nil(),
            Uuid::new_v4(),
            ResourceKind::Driver,
            EntityKind::Trip,
            Uuid::new_v4(),
            &mut fx,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[test]
    fn ensure_rejects_role_hint_mismatch() {
        let tenant = Uuid::nil();
        let ident = identity(tenant, Some(ResourceKind::Vehicle));
        let identities = HashMap::from([(ident.id, ident.clone())]);
        let mut resources = HashMap::new();
        let mut fx = Effects::new();
        let err = ensure_resource(
            &identities,
            &mut resources,
            tenant,
            ident.id,
            ResourceKind::Driver,
            EntityKind::Trip,
            Uuid::new_v4(),
            &mut fx,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn ensure_rejects_tombstoned_resource() {
        let tenant = Uuid::nil();
        let id = Uuid::new_v4();
        let mut resources = HashMap::from([(
            id,
            ResourceRecord {
                id,
                tenant_id: tenant,
                kind: ResourceKind::Driver,
                display_name: "gone".to_string(),
                status: ResourceStatus::Deleted,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        )]);
        let mut fx = Effects::new();
        let err = ensure_resource(
            &HashMap::new(),
            &mut resources,
            tenant,
            id,
            ResourceKind::Driver,
            EntityKind::Trip,
            Uuid::new_v4(),
            &mut fx,
        )
        .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn release_skips_resources_still_referenced() {
        let tenant = Uuid::nil();
        let driver = Uuid::new_v4();
        let active = trip(tenant, ShipmentStatus::InTransit, Some(driver));
        let trips = HashMap::from([(active.id, active)]);
        let mut resources = HashMap::from([(
            driver,
            ResourceRecord {
                id: driver,
                tenant_id: tenant,
                kind: ResourceKind::Driver,
                display_name: "busy".to_string(),
                status: ResourceStatus::Busy,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        )]);

        let released =
            release_if_unreferenced(&HashMap::new(), &trips, &mut resources, driver);
        assert!(released.is_none());
        assert_eq!(resources[&driver].status, ResourceStatus::Busy);
    }

    #[test]
    fn release_frees_unreferenced_busy_resource() {
        let tenant = Uuid::nil();
        let driver = Uuid::new_v4();
        let done = trip(tenant, ShipmentStatus::Completed, Some(driver));
        let trips = HashMap::from([(done.id, done)]);
        let mut resources = HashMap::from([(
            driver,
            ResourceRecord {
                id: driver,
                tenant_id: tenant,
                kind: ResourceKind::Driver,
                display_name: "free me".to_string(),
                status: ResourceStatus::Busy,
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
        )]);

        let released = release_if_unreferenced(&HashMap::new(), &trips, &mut resources, driver)
            .expect("should release");
        assert_eq!(released.status, ResourceStatus::Idle);
        assert_eq!(resources[&driver].status, ResourceStatus::Idle);
    }

    #[tokio::test]
    async fn soft_delete_marks_existing_row() {
        let state = AppState::new();
        let ctx = TenantContext {
            tenant_id: Uuid::nil(),
            actor: ActorKind::User,
            subject: "ops".to_string(),
        };
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

        let deleted = soft_delete(&state, &ctx, id).await.unwrap();
        assert_eq!(deleted.status, ResourceStatus::Deleted);
        assert_eq!(
            state.resources.get(&id).unwrap().status,
            ResourceStatus::Deleted
        );
    }

    #[tokio::test]
    async fn soft_delete_tombstones_bare_identity() {
        let state = AppState::new();
        let ctx = TenantContext {
            tenant_id: Uuid::nil(),
            actor: ActorKind::User,
            subject: "ops".to_string(),
        };
        let ident = identity(Uuid::nil(), Some(ResourceKind::Driver));
        state.identities.insert(ident.id, ident.clone());

        let tombstone = soft_delete(&state, &ctx, ident.id).await.unwrap();
        assert_eq!(tombstone.status, ResourceStatus::Deleted);
        assert_eq!(tombstone.kind, ResourceKind::Driver);
        // The tombstone now exists as a resource row.
        assert!(state.resources.get(&ident.id).is_some());
    }

    #[tokio::test]
    async fn soft_delete_unknown_id_is_not_found() {
        let state = AppState::new();
        let ctx = TenantContext {
            tenant_id: Uuid::nil(),
            actor: ActorKind::User,
            subject: "ops".to_string(),
        };
        let err = soft_delete(&state, &ctx, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }
}
