// vmb - Vermintide Mod Builder
//
// This is the library crate containing the mod building logic and data structures.
// The binary crate (main.rs) provides the command-line entry point.

pub mod cli;
pub mod config;
pub mod logging;
pub mod models;
pub mod paths;
pub mod services;
pub mod tasks;

// Re-export commonly used types for convenience
pub use config::{Config, ConfigError, ConfigManager};
pub use models::{GameVariant, ItemParams, Visibility};
pub use tasks::{BatchSummary, TaskContext};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
