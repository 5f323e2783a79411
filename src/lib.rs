pub mod audience;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod loader;
pub mod metrics;
pub mod parse;
pub mod schema;
pub mod telemetry;
pub mod time_alignment;
pub mod video_table;
