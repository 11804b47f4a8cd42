//! Financial record persistence operations.
//!
//! Records are created exactly once per qualifying transition; the only
//! mutation after creation is the settlement status.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use haul_core::Money;
use haul_state::{EntityKind, FinancialKind, FinancialStatus};

use crate::state::FinancialRecord;

/// Insert a new financial record.
pub async fn insert(pool: &PgPool, record: &FinancialRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO financial_records (id, tenant_id, entity_kind, entity_id,
         kind, reference_id, amount_minor, currency, status, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
    )
    .bind(record.id)
    .bind(record.tenant_id)
    .bind(record.entity_kind.as_str())
    .bind(record.entity_id)
    .bind(record.kind.as_str())
    .bind(record.reference_id)
    .bind(record.amount.minor)
    .bind(&record.amount.currency)
    .bind(record.status.as_str())
    .bind(record.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Load all financial records from the database on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<FinancialRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, FinancialRow>(
        "SELECT id, tenant_id, entity_kind, entity_id, kind, reference_id,
         amount_minor, currency, status, created_at
         FROM financial_records ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(FinancialRow::into_record).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct FinancialRow {
    id: Uuid,
    tenant_id: Uuid,
    entity_kind: String,
    entity_id: Uuid,
    kind: String,
    reference_id: Option<Uuid>,
    amount_minor: i64,
    currency: String,
    status: String,
    created_at: DateTime<Utc>,
}

impl FinancialRow {
    fn into_record(self) -> FinancialRecord {
        let entity_kind: EntityKind =
            serde_json::from_value(serde_json::Value::String(self.entity_kind.clone()))
                .unwrap_or_else(|e| {
                    tracing::warn!(id = %self.id, error = %e, "unknown entity kind in database, defaulting to TRIP");
                    EntityKind::Trip
                });
        let kind: FinancialKind =
            serde_json::from_value(serde_json::Value::String(self.kind.clone())).unwrap_or_else(
                |e| {
                    tracing::warn!(id = %self.id, error = %e, "unknown financial kind in database, defaulting to payable");
                    FinancialKind::Payable
                },
            );
        let status: FinancialStatus =
            serde_json::from_value(serde_json::Value::String(self.status.clone())).unwrap_or_else(
                |e| {
                    tracing::warn!(id = %self.id, error = %e, "unknown financial status in database, defaulting to PENDING");
                    FinancialStatus::Pending
                },
            );
        let amount = Money::new(self.amount_minor, &self.currency).unwrap_or_else(|e| {
            tracing::warn!(id = %self.id, error = %e, "invalid amount in database, defaulting to zero USD");
            Money { minor: 0, currency: "USD".to_string() }
        });

        FinancialRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            entity_kind,
            entity_id: self.entity_id,
            kind,
            reference_id: self.reference_id,
            amount,
            status,
            created_at: self.created_at,
        }
    }
}
