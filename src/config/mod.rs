//! Configuration module for the stagehand build pipeline
//!
//! Provides types and parsing for `stagehand.toml` project configuration.

pub mod loader;
pub mod schema;

pub use loader::{default_config, load_config, ConfigError};
pub use schema::*;
