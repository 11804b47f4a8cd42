//! # API Route Modules
//!
//! Route modules for the haul stack API surface:
//!
//! - `shipments`, shipment CRUD plus the lifecycle operations: strict
//!   driver assignment, status changes behind the transition table and
//!   delivery-proof gate, POD upload, and the per-shipment timeline.
//! - `trips`, trip CRUD, the tagged `PUT` update (reassignment with
//!   registry auto-provisioning, pay, status), timeline, and the detour
//!   availability check backed by the maps collaborator.
//! - `resources`, driver/vehicle onboarding, the union listing over
//!   resources and dispatchable identities, and soft deletion.
//! - `identities`, identity shadow records mirrored from the identity
//!   collaborator.
//! - `financial`, read-only payable/receivable records.
//! - `ops`, operator surface: the post-commit dead-letter queue.

pub mod financial;
pub mod identities;
pub mod ops;
pub mod resources;
pub mod shipments;
pub mod trips;

use serde::Deserialize;
use utoipa::ToSchema;

/// Pagination parameters for list endpoints.
#[derive(Debug, Deserialize, Default, ToSchema)]
pub struct PaginationParams {
    /// Maximum number of items to return (default: 100, max: 1000).
    pub limit: Option<usize>,
    /// Number of items to skip (default: 0).
    pub offset: Option<usize>,
}

impl PaginationParams {
    const DEFAULT_LIMIT: usize = 100;
    const MAX_LIMIT: usize = 1000;

    /// Effective limit after defaulting and clamping.
    pub fn effective_limit(&self) -> usize {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .min(Self::MAX_LIMIT)
    }

    /// Effective offset after defaulting.
    pub fn effective_offset(&self) -> usize {
        self.offset.unwrap_or(0)
    }
}
