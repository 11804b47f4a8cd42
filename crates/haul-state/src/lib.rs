//! # haul-state: Lifecycle State Machines
//!
//! Runtime-checked state machines for the dispatch domain. Every status
//! mutation in the stack is validated here before any store is touched;
//! the transition table is the single authority, and it is a pure function
//! constructed at compile time.
//!
//! ## State Machines
//!
//! - **Shipment/Trip** ([`shipment`]): `CREATED` through the terminal
//!   `COMPLETED`/`CANCELLED` pair, with `EXCEPTION` as the only recoverable
//!   branch (back to `SCHEDULED`, or out to `CANCELLED`).
//!
//! - **Resource** ([`resource`]): driver and vehicle availability,
//!   `IDLE`/`BUSY`/`DELETED`. Resources are tombstoned, never hard-deleted.
//!
//! ## Append-Only Types
//!
//! - **Timeline** ([`timeline`]): audit events recorded for every transition
//!   and side-effecting action. No update or delete surface exists.
//!
//! - **Financial** ([`financial`]): payable/receivable record enums and the
//!   pure predicates deciding when a completion transition owes a payout.

pub mod financial;
pub mod resource;
pub mod shipment;
pub mod timeline;

pub use financial::{FinancialKind, FinancialStatus};
pub use resource::{ResourceKind, ResourceStatus};
pub use shipment::{can_transition, ensure_transition, ShipmentStatus, TransitionError};
pub use timeline::{ActorKind, EntityKind, TimelineEvent, TimelineEventKind};
