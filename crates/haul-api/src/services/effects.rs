//! # Post-Commit Effect Queue
//!
//! State-changing operations collect their side effects (timeline events
//! and financial drafts) while holding store locks, then run the queue
//! after the critical section. A failed effect never rolls back the
//! primary mutation: operational state is strongly consistent, audit and
//! finance are eventually consistent. Failures land in the dead-letter
//! store where operators can see and replay them, instead of vanishing
//! into a catch block.

use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use uuid::Uuid;

use haul_core::Money;
use haul_state::{ActorKind, EntityKind, ShipmentStatus, TimelineEvent, TimelineEventKind};

use crate::state::{AppState, DeadLetterRecord};

/// A financial record waiting to be synthesized post-commit.
#[derive(Debug, Clone, Serialize)]
pub struct FinancialDraft {
    pub tenant_id: Uuid,
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    /// The party to be paid, the assigned driver, when there is one.
    pub reference_id: Option<Uuid>,
    pub amount: Money,
}

/// One queued post-commit effect.
#[derive(Debug, Clone)]
enum Effect {
    Timeline(TimelineEvent),
    Financial(FinancialDraft),
}

/// Ordered queue of effects collected during a mutation.
#[derive(Debug, Default)]
pub struct Effects {
    queue: Vec<Effect>,
}

impl Effects {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether any effects were collected.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Queue a status-change timeline event.
    pub fn status_changed(
        &mut self,
        entity_kind: EntityKind,
        entity_id: Uuid,
        from: ShipmentStatus,
        to: ShipmentStatus,
        actor: ActorKind,
    ) {
        self.queue.push(Effect::Timeline(TimelineEvent::status_changed(
            entity_kind,
            entity_id,
            from,
            to,
            actor,
        )));
    }

    /// Queue a non-transition timeline event with an extra payload.
    pub fn action(
        &mut self,
        entity_kind: EntityKind,
        entity_id: Uuid,
        kind: TimelineEventKind,
        actor: ActorKind,
        extra: serde_json::Value,
    ) {
        self.queue.push(Effect::Timeline(TimelineEvent::action(
            entity_kind,
            entity_id,
            kind,
            actor,
            extra,
        )));
    }

    /// Queue a financial draft.
    pub fn financial(&mut self, draft: FinancialDraft) {
        self.queue.push(Effect::Financial(draft));
    }

    /// Run all queued effects in order.
    ///
    /// Must be called after the primary mutation's locks are released.
    /// Each failure is dead-lettered independently; one failed effect does
    /// not stop the rest of the queue.
    pub async fn run(self, state: &AppState) {
        for effect in self.queue {
            match effect {
                Effect::Timeline(event) => {
                    state.timeline.append(event.clone());
                    if let Some(pool) = &state.db_pool {
                        if let Err(e) = crate::db::timeline::insert(pool, &event).await {
                            dead_letter(
                                state,
                                "timeline_persist",
                                &e.to_string(),
                                serde_json::to_value(&event).unwrap_or_default(),
                            );
                        }
                    }
                }
                Effect::Financial(draft) => {
                    let payload =
                        serde_json::to_value(&draft).unwrap_or_else(|_| json!({}));
                    if let Err(e) = super::financial::apply_draft(state, &draft).await {
                        dead_letter(state, "financial_record", &e, payload);
                    }
                }
            }
        }
    }
}

/// Park a failed effect and log it.
fn dead_letter(state: &AppState, effect: &str, error: &str, payload: serde_json::Value) {
    tracing::error!(effect, error, "post-commit effect failed, dead-lettering");
    state.dead_letters.push(DeadLetterRecord {
        id: Uuid::new_v4(),
        effect: effect.to_string(),
        error: error.to_string(),
        payload,
        created_at: Utc::now(),
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn timeline_effects_append_in_order() {
        let state = AppState::new();
        let id = Uuid::new_v4();
        let mut fx = Effects::new();
        fx.action(
            EntityKind::Shipment,
            id,
            TimelineEventKind::DriverAssigned,
            ActorKind::User,
            json!({"driver_id": "d-1"}),
        );
        fx.status_changed(
            EntityKind::Shipment,
            id,
            ShipmentStatus::Created,
            ShipmentStatus::Assigned,
            ActorKind::User,
        );
        fx.run(&state).await;

        let events = state.timeline.for_entity(EntityKind::Shipment, id);
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, TimelineEventKind::DriverAssigned);
        assert_eq!(events[1].kind, TimelineEventKind::StatusChanged);
        assert!(state.dead_letters.is_empty());
    }

    #[tokio::test]
    async fn financial_effect_creates_one_record() {
        let state = AppState::new();
        let trip = Uuid::new_v4();
        let mut fx = Effects::new();
        fx.financial(FinancialDraft {
            tenant_id: Uuid::nil(),
            entity_kind: EntityKind::Trip,
            entity_id: trip,
            reference_id: None,
            amount: Money::new(5_000, "USD").unwrap(),
        });
        fx.run(&state).await;
        assert_eq!(state.financials.len(), 1);
        assert!(state.dead_letters.is_empty());
    }

    #[test]
    fn empty_queue_reports_empty() {
        assert!(Effects::new().is_empty());
    }
}
