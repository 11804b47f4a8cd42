//! Timeline event persistence operations.
//!
//! Timeline rows are append-only, there are no update or delete
//! operations on the `timeline_events` table.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use haul_state::{ActorKind, EntityKind, TimelineEvent, TimelineEventKind};

use crate::db::shipments::parse_status;

/// Insert a timeline event.
pub async fn insert(pool: &PgPool, event: &TimelineEvent) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO timeline_events (id, entity_kind, entity_id, kind,
         from_status, to_status, actor, extra, at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
    )
    .bind(event.id)
    .bind(event.entity_kind.as_str())
    .bind(event.entity_id)
    .bind(event.kind.as_str())
    .bind(event.from_status.map(|s| s.as_str()))
    .bind(event.to_status.map(|s| s.as_str()))
    .bind(event.actor.as_str())
    .bind(&event.extra)
    .bind(event.at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all timeline events from the database on startup, oldest first.
pub async fn load_all(pool: &PgPool) -> Result<Vec<TimelineEvent>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TimelineRow>(
        "SELECT id, entity_kind, entity_id, kind, from_status, to_status, actor, extra, at
         FROM timeline_events ORDER BY at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TimelineRow::into_event).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct TimelineRow {
    id: Uuid,
    entity_kind: String,
    entity_id: Uuid,
    kind: String,
    from_status: Option<String>,
    to_status: Option<String>,
    actor: String,
    extra: serde_json::Value,
    at: DateTime<Utc>,
}

impl TimelineRow {
    fn into_event(self) -> TimelineEvent {
        let entity_kind: EntityKind =
            serde_json::from_value(serde_json::Value::String(self.entity_kind.clone()))
                .unwrap_or_else(|e| {
                    tracing::warn!(id = %self.id, error = %e, "unknown entity kind in database, defaulting to SHIPMENT");
                    EntityKind::Shipment
                });
        let kind: TimelineEventKind =
            serde_json::from_value(serde_json::Value::String(self.kind.clone())).unwrap_or_else(
                |e| {
                    tracing::warn!(id = %self.id, error = %e, "unknown event kind in database, defaulting to STATUS_CHANGED");
                    TimelineEventKind::StatusChanged
                },
            );
        let actor: ActorKind =
            serde_json::from_value(serde_json::Value::String(self.actor.clone())).unwrap_or_else(
                |e| {
                    tracing::warn!(id = %self.id, error = %e, "unknown actor in database, defaulting to system");
                    ActorKind::System
                },
            );

        TimelineEvent {
            id: self.id,
            entity_kind,
            entity_id: self.entity_id,
            kind,
            from_status: self.from_status.map(|s| parse_status(self.id, &s)),
            to_status: self.to_status.map(|s| parse_status(self.id, &s)),
            actor,
            extra: self.extra,
            at: self.at,
        }
    }
}
