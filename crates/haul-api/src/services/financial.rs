//! # Financial Record Synthesis
//!
//! Turns a [`FinancialDraft`] queued by a completion transition into a
//! persisted payable record. The trigger is idempotent end to end: the
//! pure predicates in `haul_state::financial` only fire on qualifying
//! edges, and this module additionally refuses to create a second record
//! for the same entity, so repeated writes of the same completion status
//! can never duplicate a payable.

use chrono::Utc;
use uuid::Uuid;

use haul_state::{FinancialKind, FinancialStatus};

use crate::services::effects::FinancialDraft;
use crate::state::{AppState, FinancialRecord};

/// Apply a financial draft, creating at most one record per entity.
///
/// Returns `Ok(None)` when a record for the entity already exists (the
/// idempotent no-op path). Errors are strings suitable for dead-lettering;
/// this runs post-commit and must not surface to the client.
pub async fn apply_draft(
    state: &AppState,
    draft: &FinancialDraft,
) -> Result<Option<FinancialRecord>, String> {
    let record = {
        let mut financials = state.financials.write();
        let exists = financials
            .values()
            .any(|r| r.entity_kind == draft.entity_kind && r.entity_id == draft.entity_id);
        if exists {
            tracing::debug!(
                entity_kind = %draft.entity_kind,
                entity_id = %draft.entity_id,
                "financial record already exists, skipping"
            );
            return Ok(None);
        }

        let record = FinancialRecord {
            id: Uuid::new_v4(),
            tenant_id: draft.tenant_id,
            entity_kind: draft.entity_kind,
            entity_id: draft.entity_id,
            kind: FinancialKind::Payable,
            reference_id: draft.reference_id,
            amount: draft.amount.clone(),
            status: FinancialStatus::Pending,
            created_at: Utc::now(),
        };
        financials.insert(record.id, record.clone());
        record
    };

    tracing::info!(
        record_id = %record.id,
        entity_kind = %record.entity_kind,
        entity_id = %record.entity_id,
        amount = %record.amount,
        "payable record created"
    );

    if let Some(pool) = &state.db_pool {
        crate::db::financial::insert(pool, &record)
            .await
            .map_err(|e| format!("payable recorded in-memory but database insert failed: {e}"))?;
    }

    Ok(Some(record))
}

#[cfg(test)]
mod tests {
    use super::*;
    use haul_core::Money;
    use haul_state::EntityKind;

    fn draft(entity_id: Uuid, minor: i64) -> FinancialDraft {
        FinancialDraft {
            tenant_id: Uuid::nil(),
            entity_kind: EntityKind::Trip,
            entity_id,
            reference_id: Some(Uuid::new_v4()),
            amount: Money::new(minor, "USD").unwrap(),
        }
    }

    #[tokio::test]
    async fn creates_pending_payable() {
        let state = AppState::new();
        let trip = Uuid::new_v4();
        let record = apply_draft(&state, &draft(trip, 12_500))
            .await
            .unwrap()
            .expect("record should be created");
        assert_eq!(record.kind, FinancialKind::Payable);
        assert_eq!(record.status, FinancialStatus::Pending);
        assert_eq!(record.amount.minor, 12_500);
        assert_eq!(state.financials.len(), 1);
    }

    #[tokio::test]
    async fn second_draft_for_same_entity_is_a_no_op() {
        let state = AppState::new();
        let trip = Uuid::new_v4();
        apply_draft(&state, &draft(trip, 100)).await.unwrap();
        let second = apply_draft(&state, &draft(trip, 999)).await.unwrap();
        assert!(second.is_none());
        assert_eq!(state.financials.len(), 1);
    }

    #[tokio::test]
    async fn different_entities_each_get_a_record() {
        let state = AppState::new();
        apply_draft(&state, &draft(Uuid::new_v4(), 100))
            .await
            .unwrap();
        apply_draft(&state, &draft(Uuid::new_v4(), 200))
            .await
            .unwrap();
        assert_eq!(state.financials.len(), 2);
    }
}
