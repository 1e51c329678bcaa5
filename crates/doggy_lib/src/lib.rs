mod cli;
pub mod config;
pub mod graphql_api;
pub mod object_storage;
mod prometheus_metrics;
pub mod rest;

#[cfg(feature = "tests")]
pub mod test_utils;

pub use cli::CliOptions;
pub use prometheus_metrics::{metrics, PrometheusExporter, PrometheusMetrics};

pub const DOGGY_VERSION: &str = env!("CARGO_PKG_VERSION");
