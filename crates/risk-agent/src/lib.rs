//! Risk agent service
//!
//! HTTP surface and configuration for the vehicle risk predictor. The
//! binary in `main.rs` wires these together with the prediction engine.

pub mod api;
pub mod config;
