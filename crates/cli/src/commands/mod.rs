//! CLI subcommand implementations

pub mod model;
pub mod risk;
