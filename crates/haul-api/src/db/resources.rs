//! Resource (driver/vehicle) persistence operations.
//!
//! Resources are never hard-deleted; soft deletion writes a `DELETED`
//! status through [`upsert`], which also covers tombstones for bare
//! identities that never had a resource row.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use haul_state::{ResourceKind, ResourceStatus};

use crate::state::ResourceRecord;

/// Insert a new resource record.
pub async fn insert(pool: &PgPool, record: &ResourceRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO resources (id, tenant_id, kind, display_name, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)",
    )
    .bind(record.id)
    .bind(record.tenant_id)
    .bind(record.kind.as_str())
    .bind(&record.display_name)
    .bind(record.status.as_str())
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Insert or update a resource record (soft delete, lazy materialization).
pub async fn upsert(pool: &PgPool, record: &ResourceRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO resources (id, tenant_id, kind, display_name, status, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7)
         ON CONFLICT (id) DO UPDATE SET status = $5, display_name = $4, updated_at = $7",
    )
    .bind(record.id)
    .bind(record.tenant_id)
    .bind(record.kind.as_str())
    .bind(&record.display_name)
    .bind(record.status.as_str())
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all resources from the database into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ResourceRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ResourceRow>(
        "SELECT id, tenant_id, kind, display_name, status, created_at, updated_at
         FROM resources ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ResourceRow::into_record).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct ResourceRow {
    id: Uuid,
    tenant_id: Uuid,
    kind: String,
    display_name: String,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ResourceRow {
    fn into_record(self) -> ResourceRecord {
        let kind: ResourceKind =
            serde_json::from_value(serde_json::Value::String(self.kind.clone())).unwrap_or_else(
                |e| {
                    tracing::warn!(
                        id = %self.id,
                        kind = %self.kind,
                        error = %e,
                        "unknown resource kind in database, defaulting to DRIVER"
                    );
                    ResourceKind::Driver
                },
            );
        let status: ResourceStatus =
            serde_json::from_value(serde_json::Value::String(self.status.clone()))
                .unwrap_or_else(|e| {
                    tracing::warn!(
                        id = %self.id,
                        status = %self.status,
                        error = %e,
                        "unknown resource status in database, defaulting to BUSY"
                    );
                    ResourceStatus::Busy
                });

        ResourceRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            kind,
            display_name: self.display_name,
            status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
