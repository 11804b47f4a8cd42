//! # Resource Availability
//!
//! Drivers and vehicles are "resources": rows with an availability status
//! that the assignment service flips between `IDLE` and `BUSY`. Resources
//! are never hard-deleted, deletion tombstones the row as `DELETED` so
//! historical orders keep their references.

use serde::{Deserialize, Serialize};

/// What kind of resource a row represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceKind {
    Driver,
    Vehicle,
}

impl ResourceKind {
    /// Canonical kind name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Driver => "DRIVER",
            Self::Vehicle => "VEHICLE",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Availability status of a driver or vehicle.
///
/// Invariant maintained by the API layer: a resource in `BUSY` is referenced
/// by at least one non-terminal shipment or trip; terminal transitions
/// release unreferenced resources back to `IDLE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceStatus {
    /// Available for assignment.
    Idle,
    /// Bound to at least one active shipment or trip.
    Busy,
    /// Soft-deleted tombstone. Never revived.
    Deleted,
}

impl ResourceStatus {
    /// Canonical status name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "IDLE",
            Self::Busy => "BUSY",
            Self::Deleted => "DELETED",
        }
    }

    /// Whether the resource can accept a new assignment.
    pub fn is_available(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// All statuses, for metrics labels.
    pub fn all() -> &'static [ResourceStatus] {
        &[Self::Idle, Self::Busy, Self::Deleted]
    }
}

impl std::fmt::Display for ResourceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
