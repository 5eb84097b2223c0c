pub mod config;
pub mod fade;
pub mod scheduler;
pub mod telemetry;
pub mod video;
