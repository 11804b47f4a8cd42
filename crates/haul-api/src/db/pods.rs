//! Proof-of-delivery persistence operations.
//!
//! POD rows are immutable once created, there are no update operations
//! on the `proof_of_delivery` table itself. The upload path may also
//! carry the review nudge for the owning shipment; both land in one
//! transaction.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use haul_state::ActorKind;

use crate::state::{PodRecord, ShipmentRecord};

/// Persist a POD upload and, when present, the shipment's review nudge.
pub async fn persist_upload(
    pool: &PgPool,
    pod: &PodRecord,
    nudged: Option<&ShipmentRecord>,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        "INSERT INTO proof_of_delivery (id, shipment_id, file_path, uploaded_by, note, created_at)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(pod.id)
    .bind(pod.shipment_id)
    .bind(&pod.file_path)
    .bind(pod.uploaded_by.as_str())
    .bind(&pod.note)
    .bind(pod.created_at)
    .execute(&mut *tx)
    .await?;

    if let Some(shipment) = nudged {
        sqlx::query("UPDATE shipments SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(shipment.status.as_str())
            .bind(shipment.updated_at)
            .bind(shipment.id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await
}

/// Load all POD records from the database into the in-memory log on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<PodRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, PodRow>(
        "SELECT id, shipment_id, file_path, uploaded_by, note, created_at
         FROM proof_of_delivery ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(PodRow::into_record).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct PodRow {
    id: Uuid,
    shipment_id: Uuid,
    file_path: String,
    uploaded_by: String,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl PodRow {
    fn into_record(self) -> PodRecord {
        let uploaded_by: ActorKind =
            serde_json::from_value(serde_json::Value::String(self.uploaded_by.clone()))
                .unwrap_or_else(|e| {
                    tracing::warn!(
                        id = %self.id,
                        actor = %self.uploaded_by,
                        error = %e,
                        "unknown uploader actor in database, defaulting to user"
                    );
                    ActorKind::User
                });

        PodRecord {
            id: self.id,
            shipment_id: self.shipment_id,
            file_path: self.file_path,
            uploaded_by,
            note: self.note,
            created_at: self.created_at,
        }
    }
}
