//! Risk prediction library for vehicle telemetry
//!
//! This crate provides the core functionality for:
//! - Feature extraction from live telemetry snapshots
//! - Training data acquisition (CSV records or synthetic generation)
//! - A trainable scoring network with a rule-based fallback
//! - Risk classification, history and trend tracking
//! - Model persistence, health checks and observability

pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod retry;
pub mod store;
pub mod training;

pub use error::{DataSourceError, ModelError, StoreError};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{RiskMetrics, StructuredLogger};
pub use retry::IoPolicy;
