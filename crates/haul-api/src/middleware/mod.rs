//! # Middleware
//!
//! - [`metrics`]: Prometheus HTTP metrics recording and the registry
//!   holding the domain gauges.

pub mod metrics;
