//! # Timeline Events
//!
//! Append-only audit record of every transition and side-effecting action.
//! Events are never updated or deleted; the types here expose no mutation
//! beyond construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::shipment::ShipmentStatus;

/// Which entity family a timeline event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Shipment,
    Trip,
}

impl EntityKind {
    /// Canonical kind name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Shipment => "SHIPMENT",
            Self::Trip => "TRIP",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What happened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TimelineEventKind {
    /// The entity's lifecycle status changed.
    StatusChanged,
    /// A proof-of-delivery artifact was recorded.
    PodUploaded,
    /// A driver was bound to the entity.
    DriverAssigned,
    /// A vehicle was bound to the entity.
    VehicleAssigned,
    /// A driver or vehicle was released back to the idle pool.
    ResourceReleased,
    /// The registry materialized a resource row from a bare identity.
    ResourceProvisioned,
}

impl TimelineEventKind {
    /// Canonical event name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StatusChanged => "STATUS_CHANGED",
            Self::PodUploaded => "POD_UPLOADED",
            Self::DriverAssigned => "DRIVER_ASSIGNED",
            Self::VehicleAssigned => "VEHICLE_ASSIGNED",
            Self::ResourceReleased => "RESOURCE_RELEASED",
            Self::ResourceProvisioned => "RESOURCE_PROVISIONED",
        }
    }
}

/// Who caused an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActorKind {
    /// An automatic transition (POD nudge, release-on-terminal).
    System,
    /// A back-office operator.
    User,
    /// The assigned driver, via the mobile client.
    Driver,
}

impl ActorKind {
    /// Canonical actor name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "system",
            Self::User => "user",
            Self::Driver => "driver",
        }
    }
}

/// One append-only audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineEvent {
    /// Event identifier.
    pub id: Uuid,
    /// Which entity family the event belongs to.
    pub entity_kind: EntityKind,
    /// The shipment or trip the event belongs to.
    pub entity_id: Uuid,
    /// What happened.
    pub kind: TimelineEventKind,
    /// Status before the event, when the event is a transition.
    pub from_status: Option<ShipmentStatus>,
    /// Status after the event, when the event is a transition.
    pub to_status: Option<ShipmentStatus>,
    /// Who caused the event.
    pub actor: ActorKind,
    /// Free-form extra payload (driver ids, file paths, notes).
    pub extra: serde_json::Value,
    /// When the event occurred (UTC).
    pub at: DateTime<Utc>,
}

impl TimelineEvent {
    /// Construct a status-change event.
    pub fn status_changed(
        entity_kind: EntityKind,
        entity_id: Uuid,
        from: ShipmentStatus,
        to: ShipmentStatus,
        actor: ActorKind,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_kind,
            entity_id,
            kind: TimelineEventKind::StatusChanged,
            from_status: Some(from),
            to_status: Some(to),
            actor,
            extra: serde_json::Value::Null,
            at: Utc::now(),
        }
    }

    /// Construct a non-transition event with an extra payload.
    pub fn action(
        entity_kind: EntityKind,
        entity_id: Uuid,
        kind: TimelineEventKind,
        actor: ActorKind,
        extra: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            entity_kind,
            entity_id,
            kind,
            from_status: None,
            to_status: None,
            actor,
            extra,
            at: Utc::now(),
        }
    }
}
