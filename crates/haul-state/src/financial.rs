//! # Financial Record Types and Trigger Predicates
//!
//! Enums for payable/receivable records plus the pure predicates that
//! decide whether a status transition owes a payout. The predicates carry
//! no I/O; the API layer combines them with an at-most-one-record-per-entity
//! check to make the trigger idempotent end to end.

use serde::{Deserialize, Serialize};

use crate::shipment::ShipmentStatus;

/// Direction of a financial record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FinancialKind {
    /// Owed by us (driver pay).
    Payable,
    /// Owed to us (customer invoice).
    Receivable,
}

impl FinancialKind {
    /// Canonical kind name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Payable => "payable",
            Self::Receivable => "receivable",
        }
    }
}

/// Settlement status of a financial record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FinancialStatus {
    Pending,
    Paid,
    Overdue,
    Void,
}

impl FinancialStatus {
    /// Canonical status name, matching the serialized form.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Paid => "PAID",
            Self::Overdue => "OVERDUE",
            Self::Void => "VOID",
        }
    }

    /// All statuses, for metrics labels.
    pub fn all() -> &'static [FinancialStatus] {
        &[Self::Pending, Self::Paid, Self::Overdue, Self::Void]
    }
}

/// Whether a trip transition owes a driver payout.
///
/// Fires exactly on the edge into `COMPLETED`; re-writing `COMPLETED` over
/// `COMPLETED` does not fire again.
pub fn trip_payout_due(old: ShipmentStatus, new: ShipmentStatus) -> bool {
    new == ShipmentStatus::Completed && old != ShipmentStatus::Completed
}

/// Whether a shipment transition owes a driver payout.
///
/// Shipment-level pay accrues on first entry to `DELIVERED` (or directly to
/// `COMPLETED`); once a qualifying status has been reached, later edges
/// between qualifying statuses do not fire again.
pub fn shipment_payout_due(old: ShipmentStatus, new: ShipmentStatus) -> bool {
    let qualifies =
        |s: ShipmentStatus| matches!(s, ShipmentStatus::Delivered | ShipmentStatus::Completed);
    qualifies(new) && !qualifies(old)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ShipmentStatus::*;

    #[test]
    fn trip_fires_only_on_completion_edge() {
        assert!(trip_payout_due(PodPendingReview, Completed));
        assert!(trip_payout_due(Delivered, Completed));
        assert!(!trip_payout_due(Completed, Completed));
        assert!(!trip_payout_due(InTransit, Delivered));
        assert!(!trip_payout_due(Assigned, Cancelled));
    }

    #[test]
    fn shipment_fires_on_first_qualifying_status() {
        assert!(shipment_payout_due(InTransit, Delivered));
        assert!(shipment_payout_due(PodPendingReview, Completed));
        // DELIVERED -> POD_PENDING_REVIEW -> COMPLETED: only the first edge fires.
        assert!(!shipment_payout_due(Delivered, Completed));
        assert!(!shipment_payout_due(Completed, Completed));
    }

    #[test]
    fn cancellation_never_pays() {
        for &old in ShipmentStatus::all() {
            assert!(!trip_payout_due(old, Cancelled));
            assert!(!shipment_payout_due(old, Cancelled));
        }
    }

    #[test]
    fn serde_names() {
        assert_eq!(
            serde_json::to_string(&FinancialKind::Payable).unwrap(),
            "\"payable\""
        );
        assert_eq!(
            serde_json::to_string(&FinancialStatus::Overdue).unwrap(),
            "\"OVERDUE\""
        );
    }
}
