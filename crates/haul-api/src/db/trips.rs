//! Trip persistence operations.
//!
//! All functions take a `&PgPool` and operate on the `trips` table.
//! Trips share the shipment lifecycle; status strings are the same set.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use haul_core::Money;

use crate::state::{ResourceRecord, TripRecord};

/// Insert a new trip record.
pub async fn insert(pool: &PgPool, record: &TripRecord) -> Result<(), sqlx::Error> {
    sqlx::query(
        "INSERT INTO trips (id, tenant_id, origin, destination, status,
         driver_id, vehicle_id, driver_pay_minor, currency, created_at, updated_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)",
    )
    .bind(record.id)
    .bind(record.tenant_id)
    .bind(&record.origin)
    .bind(&record.destination)
    .bind(record.status.as_str())
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

/// Persist a trip update and the resource rows it touched, in one transaction.
pub async fn persist_update(
    pool: &PgPool,
    trip: &TripRecord,
    touched: &[ResourceRecord],
) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;

    sqlx::query("SELECT id FROM trips WHERE id = $1 FOR UPDATE")
        .bind(trip.id)
        .execute(&mut *tx)
        .await?;

    sqlx::query(
        "UPDATE trips SET status = $1, driver_id = $2, vehicle_id = $3,
         driver_pay_minor = $4, currency = $5, updated_at = $6 WHERE id = $7",
    )
    .bind(trip.status.as_str())
    .bind(trip.driver_id)
    .bind(trip.vehicle_id)
    .bind(trip.driver_pay.minor)
    .bind(&trip.driver_pay.currency)
    .bind(trip.updated_at)
    .bind(trip.id)
    .execute(&mut *tx)
    .await?;

    // Touched resources may include freshly provisioned rows, hence upsert.
    for resource in touched {
        sqlx::query(
            "INSERT INTO resources (id, tenant_id, kind, display_name, status, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             ON CONFLICT (id) DO UPDATE SET status = $5, updated_at = $7",
        )
        .bind(resource.id)
        .bind(resource.tenant_id)
        .bind(resource.kind.as_str())
        .bind(&resource.display_name)
        .bind(resource.status.as_str())
        .bind(resource.created_at)
        .bind(resource.updated_at)
        .execute(&mut *tx)
        .await?;
    }

    tx.commit().await
}

/// Load all trips from the database into the in-memory store on startup.
pub async fn load_all(pool: &PgPool) -> Result<Vec<TripRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, TripRow>(
        "SELECT id, tenant_id, origin, destination, status, driver_id,
         vehicle_id, driver_pay_minor, currency, created_at, updated_at
         FROM trips ORDER BY created_at",
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(TripRow::into_record).collect())
}

/// Internal row type for SQLx mapping.
#[derive(sqlx::FromRow)]
struct TripRow {
    id: Uuid,
    tenant_id: Uuid,
    origin: String,
    destination: String,
    status: String,
    driver_id: Option<Uuid>,
    vehicle_id: Option<Uuid>,
    driver_pay_minor: i64,
    currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TripRow {
    fn into_record(self) -> TripRecord {
        let status = super::shipments::parse_status(self.id, &self.status);
        let driver_pay =
            Money::new(self.driver_pay_minor, &self.currency).unwrap_or_else(|e| {
                tracing::warn!(id = %self.id, error = %e, "invalid pay amount in database, defaulting to zero USD");
                Money { minor: 0, currency: "USD".to_string() }
            });

        TripRecord {
            id: self.id,
            tenant_id: self.tenant_id,
            origin: self.origin,
            destination: self.destination,
            status,
            driver_id: self.driver_id,
            vehicle_id: self.vehicle_id,
            driver_pay,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}
