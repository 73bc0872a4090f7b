// romscout - configuration-driven game file discovery
//
// This is the library crate containing the discovery pipeline and data structures.
// The binary crate (main.rs) provides the command-line entry point.

pub mod config;
pub mod logging;
pub mod metrics;
pub mod models;
pub mod services;

// Re-export commonly used types for convenience
pub use config::ConfigManager;
pub use metrics::RunMetrics;
pub use models::{Configuration, OutputConfiguration, OutputFile, RunOutput, Settings};
pub use services::{Pipeline, PipelineError, PipelineOptions, PipelineResult};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
