//! Identity shadow-record persistence operations.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use haul_state::ResourceKind;

use crate::state::IdentityRecord;

/// Insert a new identity record.
pub async fn insert(pool: &PgPool, record: &IdentityRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO identities (id, tenant_id, display_name, role_hint, created_at)
         VALUES ($1, $2, $3, $4, $5)",
    )
    .bind(record.id)
    .bind(record.tenant_id)
    .bind(&record.display_name)
    .bind(record.role_hint.map(|k| k.as_str()))
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all identities from the database into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<IdentityRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, IdentityRow>(
        "SELECT id, tenant_id, display_name, role_hint, created_at
         FROM identities ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(IdentityRow::into_record).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct IdentityRow {
    id: Uuid,
    tenant_id: Uuid,
    display_name: String,
    role_hint: Option<String>,
    created_at: DateTime<Utc>,
}

impl IdentityRow {
    fn into_record(self) -> IdentityRecord {
        let role_hint = self.role_hint.as_deref().and_then(|raw| {
            serde_json::from_value::<ResourceKind>(serde_json::Value::String(raw.to_string()))
                .map_err(|e| {
                    tracing::warn!(
                        id = %self.id,
                        role_hint = raw,
                        error = %e,
                        "unknown role hint in database, dropping"
                    );
                })
                .ok()
        });

        IdentityRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            display_name: self.display_name,
            role_hint,
            created_at: self.created_at,
        }
    }
}
