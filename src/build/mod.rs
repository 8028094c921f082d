//! Build pipeline module for stagehand
//!
//! Turns stage declarations into an ordered pipeline for one build mode and
//! runs it.
//!
//! # Overview
//!
//! The build pipeline consists of:
//! - **Mode**: Resolve production or development once per process
//! - **Assembly**: Validate declarations and keep the stages included in the mode
//! - **Execution**: Run stages in declaration order, aborting on the first failure
//!
//! # Example
//!
//! ```ignore
//! use stagehand::build::{BuildContext, BuildMode, BuildPipeline, NullProgress, ProcessExecutor};
//! use stagehand::config::load_config;
//!
//! let config = load_config(None)?;
//! let context = BuildContext::new(config, project_root, BuildMode::resolve());
//! let pipeline = BuildPipeline::new(context)?;
//!
//! let report = pipeline.run(&ProcessExecutor::new(), &NullProgress::new())?;
//! println!("{}", report.summary());
//! ```

pub mod assemble;
pub mod context;
pub mod guard;
pub mod mode;
pub mod pipeline;
pub mod progress;
pub mod result;
pub mod stage;

pub use assemble::*;
pub use context::*;
pub use guard::*;
pub use mode::*;
pub use pipeline::*;
pub use progress::*;
pub use result::*;
pub use stage::*;
