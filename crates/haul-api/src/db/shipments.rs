//! Shipment persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `shipments` table.
//! Lifecycle constraints are enforced at the application layer (via
//! `haul_state::ensure_transition`), not in SQL.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use haul_core::{Money, WaybillNo};
use haul_state::ShipmentStatus;

use crate::state::{ResourceRecord, ShipmentRecord};

/// Insert a new shipment record.
pub async fn insert(pool: &PgPool, record: &ShipmentRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO shipments (id, tenant_id, waybill_no, origin, destination,
         status, trip_id, driver_id, vehicle_id, driver_pay_minor, currency,
         created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(record.id)
    .bind(record.tenant_id)
    .bind(record.waybill_no.as_str())
    .bind(&record.origin)
    .bind(&record.destination)
    .bind(record.status.as_str())
    .bind(record.trip_id)
    .bind(record.driver_id)
    .bind(record.vehicle_id)
    .bind(record.driver_pay.minor)
    .bind(&record.driver_pay.currency)
    .bind(record.created_at)
    .bind(record.updated_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Persist an assignment: shipment and driver rows in one transaction.
pub async fn persist_assignment(
    pool: &PgPool,
    shipment: &ShipmentRecord,
    driver: &ResourceRecord,
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM shipments WHERE id = $1 FOR UPDATE")
        .bind(shipment.id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("SELECT id FROM resources WHERE id = $1 FOR UPDATE")
        .bind(driver.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE shipments SET status = $1, driver_id = $2, updated_at = $3 WHERE id = $4",
    )
    .bind(shipment.status.as_str())
    .bind(shipment.driver_id)
    .bind(shipment.updated_at)
    .bind(shipment.id)
    .execute(&mut *tx)
    .await?;

    sqlx::query("UPDATE resources SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(driver.status.as_str())
        .bind(driver.updated_at)
        .bind(driver.id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await
}

/// Persist a status change and any resources it released, in one transaction.
pub async fn persist_status(
    pool: &PgPool,
    shipment: &ShipmentRecord,
    released: &[ResourceRecord],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM shipments WHERE id = $1 FOR UPDATE")
        .bind(shipment.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("UPDATE shipments SET status = $1, updated_at = $2 WHERE id = $3")
        .bind(shipment.status.as_str())
        .bind(shipment.updated_at)
        .bind(shipment.id)
        .execute(&mut *tx)
        .await?;

    for resource in released {
        sqlx::query("UPDATE resources SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(resource.status.as_str())
            .bind(resource.updated_at)
            .bind(resource.id)
            .execute(&mut *tx)
            .await?;
    }

    tx.commit().await
}

/// Load all shipments from the database into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<ShipmentRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, ShipmentRow>(
        "SELECT id, tenant_id, waybill_no, origin, destination, status, trip_id,
         driver_id, vehicle_id, driver_pay_minor, currency, created_at, updated_at
         FROM shipments ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(ShipmentRow::into_record).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct ShipmentRow {
    id: Uuid,
    tenant_id: Uuid,
    waybill_no: String,
    origin: String,
    destination: String,
    status: String,
    trip_id: Option<Uuid>,
    driver_id: Option<Uuid>,
    vehicle_id: Option<Uuid>,
    driver_pay_minor: i64,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ShipmentRow {
    fn into_record(self) -> ShipmentRecord {
        let status = parse_status(self.id, &self.status);
        let waybill_no = WaybillNo::parse(&self.waybill_no).unwrap_or_else(|e| {
            tracing::warn!(
                id = %self.id,
                waybill_no = %self.waybill_no,
                error = %e,
                "malformed waybill reference in database, regenerating"
            );
            WaybillNo::generate()
        });
        let driver_pay =
            Money::new(self.driver_pay_minor, &self.currency).unwrap_or_else(|e| {
                tracing::warn!(id = %self.id, error = %e, "invalid pay amount in database, defaulting to zero USD");
                Money { minor: 0, currency: "USD".to_string() }
            });

        ShipmentRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            waybill_no,
            origin: self.origin,
            destination: self.destination,
            status,
            trip_id: self.trip_id,
            driver_id: self.driver_id,
            vehicle_id: self.vehicle_id,
            driver_pay,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Parse a persisted status, quarantining unknown values to `EXCEPTION`.
///
/// An unknown status means the row was written by a newer or corrupted
/// deployment; treating it as the recoverable-failure state keeps it
/// visible without re-opening or silently completing the order.
pub(crate) fn parse_status(id: Uuid, raw: &str) -> ShipmentStatus {
    serde_json::from_value(serde_json::Value::String(raw.to_string())).unwrap_or_else(|e| {
        tracing::warn!(
            id = %id,
            status = raw,
            error = %e,
            "unknown lifecycle status in database, quarantining to EXCEPTION"
        );
        ShipmentStatus::Exception
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_status_known_value() {
        assert_eq!(
            parse_status(Uuid::nil(), "IN_TRANSIT"),
            ShipmentStatus::InTransit
        );
    }

    #[test]
    fn parse_status_unknown_value_quarantines() {
        assert_eq!(
            parse_status(Uuid::nil(), "OPERATIONAL"),
            ShipmentStatus::Exception
        );
        assert_eq!(parse_status(Uuid::nil(), ""), ShipmentStatus::Exception);
    }
}
