//! Plan runner around `geoproc-core`: environment configuration, telemetry
//! bootstrap and the JSON plan format.

pub mod config;
pub mod plan;
pub mod telemetry;
