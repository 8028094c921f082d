//! Stagehand - Mode-aware build pipeline orchestrator
//!
//! This library provides functionality to:
//! - Assemble an ordered stage pipeline for production or development
//! - Run stages in order, stopping at the first failure
//! - Rebuild on file changes, start a preview server once and signal live reload

pub mod build;
pub mod cli;
pub mod config;
pub mod error;
pub mod reload;
pub mod watch;
