//! # Shipment/Trip Status Machine
//!
//! The lifecycle shared by shipments (waybills) and trips. The transition
//! table is directional and non-cyclic except for `EXCEPTION`, which can
//! return to `SCHEDULED` or go to `CANCELLED`, modeling recoverable
//! failures. Terminal states have no outgoing edges.
//!
//! ## Allowed Transitions
//!
//! ```text
//! CREATED ──▶ SCHEDULED ──▶ ASSIGNED ──▶ PICKUP ──▶ IN_TRANSIT ──▶ DELIVERED
//!    │                        │  │        │  │         │              │ │
//!    └──────▶ ASSIGNED        │  └─▶ EXCEPTION ◀───────┘         ┌────┘ │
//!                             ▼           │  ▲                   ▼      ▼
//!                        CANCELLED ◀──────┘  └──────── POD_PENDING_REVIEW
//!                             ▲      (EXCEPTION ──▶ SCHEDULED)    │
//!                             │                                   ▼
//!                       (from most states)                    COMPLETED
//! ```
//!
//! `COMPLETED` and `CANCELLED` are terminal. Every status is reachable from
//! `CREATED`. Self-transitions are never allowed.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a shipment or trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ShipmentStatus {
    /// Order captured, not yet planned.
    Created,
    /// Planned for dispatch; also the recovery target after an exception.
    Scheduled,
    /// Driver bound to the order.
    Assigned,
    /// Driver en route to or at the pickup site.
    Pickup,
    /// Goods moving.
    InTransit,
    /// Goods handed over at destination; awaiting proof of delivery.
    Delivered,
    /// Proof of delivery uploaded, under back-office review.
    PodPendingReview,
    /// Terminal: delivered, proven, settled operationally.
    Completed,
    /// Terminal: abandoned at some point before completion.
    Cancelled,
    /// Recoverable failure (breakdown, refusal, damage).
    Exception,
}

impl ShipmentStatus {
    /// Canonical state name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Scheduled => "SCHEDULED",
            Self::Assigned => "ASSIGNED",
            Self::Pickup => "PICKUP",
            Self::InTransit => "IN_TRANSIT",
            Self::Delivered => "DELIVERED",
            Self::PodPendingReview => "POD_PENDING_REVIEW",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Exception => "EXCEPTION",
        }
    }

    /// Whether this status is terminal (no outgoing edges).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// The statuses this one may legally transition to.
    ///
    /// This is the transition table. It is the single authority consulted
    /// by every mutating endpoint; no caller mutates a status without
    /// checking it first.
    pub fn valid_transitions(&self) -> &'static [ShipmentStatus] {
        use ShipmentStatus::*;
        match self {
            Created => &[Scheduled, Assigned, Cancelled],
            Scheduled => &[Assigned, Cancelled],
            Assigned => &[Pickup, Cancelled, Exception],
            Pickup => &[InTransit, Cancelled, Exception],
            InTransit => &[Delivered, Exception],
            Delivered => &[PodPendingReview, Completed, Exception],
            PodPendingReview => &[Completed, Exception],
            Exception => &[Scheduled, Cancelled],
            Completed | Cancelled => &[],
        }
    }

    /// All statuses, for exhaustive checks and metrics labels.
    pub fn all() -> &'static [ShipmentStatus] {
        use ShipmentStatus::*;
        &[
            Created,
            Scheduled,
            Assigned,
            Pickup,
            InTransit,
            Delivered,
            PodPendingReview,
            Completed,
            Cancelled,
            Exception,
        ]
    }
}

impl std::fmt::Display for ShipmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `(from, to)` is an allowed transition.
///
/// Pure and total over the enum domain: pairs not in the table, including
/// every self-transition, are `false`; nothing panics.
pub fn can_transition(from: ShipmentStatus, to: ShipmentStatus) -> bool {
    from.valid_transitions().contains(&to)
}

/// Validate a transition, producing a diagnostic error on rejection.
pub fn ensure_transition(
    from: ShipmentStatus,
    to: ShipmentStatus,
) -> Result<(), TransitionError> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(TransitionError::Rejected { from, to })
    }
}

/// Status transition rejected by the table.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    /// The pair is not an edge of the transition table.
    #[error("cannot transition from {from} to {to}; valid targets from {from}: [{}]",
        .from.valid_transitions().iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", "))]
    Rejected {
        /// Current status.
        from: ShipmentStatus,
        /// Requested target status.
        to: ShipmentStatus,
    },
}
