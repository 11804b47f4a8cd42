//! # Database Persistence Layer
//!
//! Postgres persistence via SQLx. The database is **optional**: when
//! `DATABASE_URL` is set, every mutation is written through to Postgres
//! and the stores are reloaded from it at startup; when absent, the API
//! operates in in-memory-only mode (development and tests).
//!
//! The in-memory stores stay authoritative at runtime, concurrency
//! control lives on their locks, so the functions here replicate already
//! validated mutations. Multi-row write-throughs still take
//! `SELECT ... FOR UPDATE` row locks inside one transaction, keeping the
//! replica's rows as internally consistent as the stores they mirror.

pub mod financial;
pub mod identities;
pub mod pods;
pub mod resources;
pub mod shipments;
pub mod timeline;
pub mod trips;

use sqlx::postgres::{PgPool, PgPoolOptions};

use crate::state::AppState;

/// Initialize the database connection pool and run migrations.
///
/// Returns `None` if `DATABASE_URL` is not set (in-memory-only mode).
/// Returns `Err` if the URL is set but the connection or migration fails.
pub async fn init_pool() -> Result<Option<PgPool>, sqlx::Error> {
    let url = match std::env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            tracing::warn!(
                "DATABASE_URL not set — running in-memory only mode. \
                 State will not survive restarts."
            );
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .acquire_timeout(std::time::Duration::from_secs(5))
        .connect(&url)
        .await?;

    tracing::info!("Connected to PostgreSQL");

    // Run embedded migrations.
    sqlx::migrate!("./migrations").run(&pool).await?;
    tracing::info!("Database migrations applied");

    Ok(Some(pool))
}

/// Load all persisted rows into the in-memory stores on startup.
pub async fn load_into(pool: &PgPool, state: &AppState) -> Result<(), sqlx::Error> {
    for record in shipments::load_all(pool).await? {
        state.shipments.insert(record.id, record);
    }
    for record in trips::load_all(pool).await? {
        state.trips.insert(record.id, record);
    }
    for record in identities::load_all(pool).await? {
        state.identities.insert(record.id, record);
    }
    for record in resources::load_all(pool).await? {
        state.resources.insert(record.id, record);
    }
    for record in pods::load_all(pool).await? {
        state.pods.append(record);
    }
    for event in timeline::load_all(pool).await? {
        state.timeline.append(event);
    }
    for record in financial::load_all(pool).await? {
        state.financials.insert(record.id, record);
    }

    tracing::info!(
        shipments = state.shipments.len(),
        trips = state.trips.len(),
        resources = state.resources.len(),
        timeline_events = state.timeline.len(),
        "loaded state from PostgreSQL"
    );
    Ok(())
}
