//! # haul-core: Foundational Domain Types
//!
//! Shared primitives for the haul stack. This crate sits at the bottom of
//! the dependency DAG and carries no I/O:
//!
//! - [`Money`]: monetary values as integer minor units plus an ISO-4217
//!   currency code. Floats are never used for amounts.
//! - [`WaybillNo`]: validated waybill reference numbers.
//! - [`ValidationError`]: structured validation failures surfaced by the
//!   constructors in this crate.

pub mod error;
pub mod money;
pub mod reference;

pub use error::ValidationError;
pub use money::Money;
pub use reference::WaybillNo;
