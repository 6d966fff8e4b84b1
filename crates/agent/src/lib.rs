//! Capacity autopause agent
//!
//! Long-running service that drives the autopause cycle on a timer and
//! serves health and Prometheus endpoints.

pub mod api;
