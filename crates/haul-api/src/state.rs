//! # Application State
//!
//! Shared state for the Axum application: configuration, the in-memory
//! authoritative stores, the append-only logs, and the optional database
//! pool used as a write-through replica.
//!
//! ## Concurrency
//!
//! Each store serializes its writers behind a `parking_lot::RwLock`; every
//! mutation is a single read-validate-update critical section, so two
//! concurrent writers to the same row observe each other's committed state
//! and the loser fails the business-rule check rather than silently
//! overwriting.
//!
//! ## Lock Order
//!
//! When an operation needs more than one lock it acquires them in this
//! order, always:
//!
//! ```text
//! shipments → trips → identities → resources → pods → timeline → financials
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPool;
use utoipa::ToSchema;
use uuid::Uuid;

use haul_core::{Money, WaybillNo};
use haul_state::{
    ActorKind, EntityKind, FinancialKind, FinancialStatus, ResourceKind, ResourceStatus,
    ShipmentStatus, TimelineEvent,
};

use crate::auth::SecretString;
use crate::maps::MapsClient;

// ─── Configuration ───────────────────────────────────────────────────

/// Runtime configuration, read from the environment.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// TCP port the server binds (`HAUL_PORT`, default 8080).
    pub port: u16,
    /// Bearer token for API auth (`HAUL_AUTH_TOKEN`). `None` disables auth.
    pub auth_token: Option<SecretString>,
    /// Directory POD artifacts are written to (`HAUL_POD_DIR`).
    pub pod_dir: PathBuf,
    /// Base URL of the maps collaborator (`HAUL_MAPS_BASE_URL`). Optional.
    pub maps_base_url: Option<String>,
}

impl AppConfig {
    /// Read configuration from environment variables.
    pub fn from_env() -> Self {
        let port = std::env::var("HAUL_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(8080);
        let auth_token = std::env::var("HAUL_AUTH_TOKEN")
            .ok()
            .filter(|t| !t.is_empty())
            .map(|t| SecretString::new(&t));
        let pod_dir = std::env::var("HAUL_POD_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("pod-artifacts"));
        let maps_base_url = std::env::var("HAUL_MAPS_BASE_URL")
            .ok()
            .filter(|u| !u.is_empty());
        Self {
            port,
            auth_token,
            pod_dir,
            maps_base_url,
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            auth_token: None,
            pod_dir: PathBuf::from("pod-artifacts"),
            maps_base_url: None,
        }
    }
}

// ─── Records ─────────────────────────────────────────────────────────

/// A shipment (waybill): the customer-facing unit of carriage.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ShipmentRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    /// Customer-facing reference number.
    #[schema(value_type = String)]
    pub waybill_no: WaybillNo,
    pub origin: String,
    pub destination: String,
    /// Single source of truth for the lifecycle position.
    #[schema(value_type = String)]
    pub status: ShipmentStatus,
    /// The trip this shipment rides on, when consolidated.
    pub trip_id: Option<Uuid>,
    /// Set only by a successful assignment.
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    /// Precomputed driver pay for this shipment.
    #[schema(value_type = Object)]
    pub driver_pay: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A trip: one vehicle/driver rotation that shipments ride on.
///
/// Trips share the shipment lifecycle and transition table.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TripRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub origin: String,
    pub destination: String,
    #[schema(value_type = String)]
    pub status: ShipmentStatus,
    pub driver_id: Option<Uuid>,
    pub vehicle_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub driver_pay: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A driver or vehicle availability row.
///
/// When lazily materialized by the registry, `id` equals the identity's id.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ResourceRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[schema(value_type = String)]
    pub kind: ResourceKind,
    pub display_name: String,
    #[schema(value_type = String)]
    pub status: ResourceStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// An identity (user) shadow record from the identity collaborator.
///
/// An account may represent a driver or vehicle before a resource row
/// exists; the registry materializes the resource on first dispatch.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct IdentityRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub display_name: String,
    #[schema(value_type = Option<String>)]
    pub role_hint: Option<ResourceKind>,
    pub created_at: DateTime<Utc>,
}

/// A proof-of-delivery artifact reference. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PodRecord {
    pub id: Uuid,
    pub shipment_id: Uuid,
    /// Where the uploaded artifact was stored.
    pub file_path: String,
    #[schema(value_type = String)]
    pub uploaded_by: ActorKind,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A payable/receivable synthesized by the financial trigger.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FinancialRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    #[schema(value_type = String)]
    pub entity_kind: EntityKind,
    pub entity_id: Uuid,
    #[schema(value_type = String)]
    pub kind: FinancialKind,
    /// The paid or owed party (the assigned driver for payables).
    pub reference_id: Option<Uuid>,
    #[schema(value_type = Object)]
    pub amount: Money,
    #[schema(value_type = String)]
    pub status: FinancialStatus,
    pub created_at: DateTime<Utc>,
}

/// A post-commit effect that failed and was parked for operator review.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DeadLetterRecord {
    pub id: Uuid,
    /// Which effect failed (e.g. "timeline_persist", "financial_record").
    pub effect: String,
    /// The failure, as reported by the effect.
    pub error: String,
    /// Enough payload to replay the effect by hand.
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// ─── Stores ──────────────────────────────────────────────────────────

/// In-memory authoritative store for one record type.
///
/// Cheap to clone (shared `Arc`). Writers serialize on the inner lock;
/// [`Store::try_update`] runs a read-validate-update closure as one
/// critical section.
#[derive(Debug)]
pub struct Store<T> {
    inner: Arc<RwLock<HashMap<Uuid, T>>>,
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T: Clone> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone> Store<T> {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Insert or replace a record.
    pub fn insert(&self, id: Uuid, value: T) {
        self.inner.write().insert(id, value);
    }

    /// Fetch a clone of a record.
    pub fn get(&self, id: &Uuid) -> Option<T> {
        self.inner.read().get(id).cloned()
    }

    /// Snapshot all records.
    pub fn list(&self) -> Vec<T> {
        self.inner.read().values().cloned().collect()
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the store is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }

    /// Acquire the read guard. Respect the module-level lock order.
    pub fn read(&self) -> RwLockReadGuard<'_, HashMap<Uuid, T>> {
        self.inner.read()
    }

    /// Acquire the write guard. Respect the module-level lock order.
    pub fn write(&self) -> RwLockWriteGuard<'_, HashMap<Uuid, T>> {
        self.inner.write()
    }

    /// Atomically read-validate-update a record under the write lock.
    ///
    /// Returns `None` when the record does not exist; otherwise the
    /// closure's result. The closure observing the record and mutating it
    /// is one critical section; no other writer can interleave.
    pub fn try_update<R, E>(
        &self,
        id: &Uuid,
        f: impl FnOnce(&mut T) -> Result<R, E>,
    ) -> Option<Result<R, E>> {
        let mut guard = self.inner.write();
        guard.get_mut(id).map(f)
    }
}

/// Append-only store of proof-of-delivery artifacts, keyed by shipment.
#[derive(Debug, Clone, Default)]
pub struct PodLog {
    inner: Arc<RwLock<HashMap<Uuid, Vec<PodRecord>>>>,
}

impl PodLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an artifact record. There is no update or delete surface.
    pub fn append(&self, record: PodRecord) {
        self.inner
            .write()
            .entry(record.shipment_id)
            .or_default()
            .push(record);
    }

    /// Number of artifacts recorded for a shipment.
    pub fn count(&self, shipment_id: &Uuid) -> usize {
        self.inner
            .read()
            .get(shipment_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Snapshot the artifacts for a shipment, oldest first.
    pub fn list(&self, shipment_id: &Uuid) -> Vec<PodRecord> {
        self.inner
            .read()
            .get(shipment_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total artifacts across all shipments.
    pub fn total(&self) -> usize {
        self.inner.read().values().map(Vec::len).sum()
    }
}

/// Append-only audit log of timeline events.
#[derive(Debug, Clone, Default)]
pub struct TimelineLog {
    inner: Arc<RwLock<Vec<TimelineEvent>>>,
}

impl TimelineLog {
    /// Create an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append an event. There is no update or delete surface.
    pub fn append(&self, event: TimelineEvent) {
        self.inner.write().push(event);
    }

    /// Events for one entity, oldest first.
    pub fn for_entity(&self, kind: EntityKind, entity_id: Uuid) -> Vec<TimelineEvent> {
        self.inner
            .read()
            .iter()
            .filter(|e| e.entity_kind == kind && e.entity_id == entity_id)
            .cloned()
            .collect()
    }

    /// Total event count.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the log is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

/// Parking lot for failed post-commit effects.
#[derive(Debug, Clone, Default)]
pub struct DeadLetters {
    inner: Arc<RwLock<Vec<DeadLetterRecord>>>,
}

impl DeadLetters {
    /// Create an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a failed effect.
    pub fn push(&self, record: DeadLetterRecord) {
        self.inner.write().push(record);
    }

    /// Snapshot all parked effects, oldest first.
    pub fn list(&self) -> Vec<DeadLetterRecord> {
        self.inner.read().to_vec()
    }

    /// Number of parked effects.
    pub fn len(&self) -> usize {
        self.inner.read().len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().is_empty()
    }
}

// ─── AppState ────────────────────────────────────────────────────────

/// Shared application state passed to all route handlers.
#[derive(Debug, Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub shipments: Store<ShipmentRecord>,
    pub trips: Store<TripRecord>,
    pub identities: Store<IdentityRecord>,
    pub resources: Store<ResourceRecord>,
    pub pods: PodLog,
    pub timeline: TimelineLog,
    pub financials: Store<FinancialRecord>,
    pub dead_letters: DeadLetters,
    /// Write-through replica. `None` means in-memory-only mode.
    pub db_pool: Option<PgPool>,
    /// Maps collaborator client. `None` degrades detour checks.
    pub maps: Option<MapsClient>,
}

impl AppState {
    /// In-memory-only state with default configuration (tests, development).
    pub fn new() -> Self {
        Self::with_config(AppConfig::default(), None)
    }

    /// State with explicit configuration and an optional database pool.
    pub fn with_config(config: AppConfig, db_pool: Option<PgPool>) -> Self {
        let maps = config.maps_base_url.clone().map(MapsClient::new);
        Self {
            config: Arc::new(config),
            shipments: Store::new(),
            trips: Store::new(),
            identities: Store::new(),
            resources: Store::new(),
            pods: PodLog::new(),
            timeline: TimelineLog::new(),
            financials: Store::new(),
            dead_letters: DeadLetters::new(),
            db_pool,
            maps,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
