//! Automatic pausing of idle Power BI Embedded capacities
//!
//! This crate provides:
//! - A probe, evaluate and execute engine that suspends an idle capacity
//! - REST clients for Resource Manager, Log Analytics and Azure Monitor
//! - Settings loading and validation
//! - Health checks and observability

pub mod azure;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod policy;
pub mod settings;

pub use engine::{Assessment, CycleLoop, PauseCycle, PauseCycleBuilder};
pub use error::{ConfigurationError, CycleError, Stage};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse,
    ReadinessResponse,
};
pub use models::*;
pub use observability::{AutopauseMetrics, CycleLogger};
pub use policy::EvaluationPolicy;
pub use settings::Settings;
