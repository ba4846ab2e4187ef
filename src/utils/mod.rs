pub mod config;
pub mod ext;
pub mod project;
pub mod tokens;

// Re-export commonly used functions for convenience
pub use config::Config;
pub use project::default_report_path;
