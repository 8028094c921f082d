//! Build mode resolution.
//!
//! The mode is derived once per process from the `STAGEHAND_WATCH`
//! environment flag and is the only branching input for assembly and watch.

use serde::{Deserialize, Serialize};
use std::ffi::OsStr;

/// Environment variable whose presence selects development mode.
pub const WATCH_ENV: &str = "STAGEHAND_WATCH";

/// Production or development build.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BuildMode {
    /// One-shot build, minified, no preview server
    Production,
    /// Watch mode with live reload and preview server
    Development,
}

impl BuildMode {
    /// Read the process environment and select a mode.
    ///
    /// Call this once per process and pass the result along.
    pub fn resolve() -> Self {
        Self::from_signal(std::env::var_os(WATCH_ENV).as_deref())
    }

    /// Like [`BuildMode::resolve`], with an explicit watch request from the CLI
    /// treated as an additional development signal.
    pub fn resolve_with(watch: bool) -> Self {
        if watch {
            Self::Development
        } else {
            Self::resolve()
        }
    }

    /// Mode for a given value of the watch flag. Any value counts as present.
    pub fn from_signal(signal: Option<&OsStr>) -> Self {
        match signal {
            Some(_) => Self::Development,
            None => Self::Production,
        }
    }

    /// Whether this is a production build.
    pub fn is_production(self) -> bool {
        matches!(self, Self::Production)
    }

    /// Whether this is a development (watch) build.
    pub fn is_development(self) -> bool {
        matches!(self, Self::Development)
    }

    /// Lowercase name, also exported to stages as `STAGEHAND_MODE`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Production => "production",
            Self::Development => "development",
        }
    }
}

impl std::fmt::Display for BuildMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "production" | "prod" => Ok(Self::Production),
            "development" | "dev" => Ok(Self::Development),
            other => Err(format!("unknown build mode '{}' (expected production or development)", other)),
        }
    }
}
