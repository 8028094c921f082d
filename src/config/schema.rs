//! Configuration schema types for `stagehand.toml`
//!
//! Defines the project layout, watch settings and the ordered stage
//! declarations the pipeline is assembled from.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

use crate::build::mode::BuildMode;

/// When a declared stage takes part in a run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Inclusion {
    /// Every run
    #[default]
    Always,
    /// Production runs only
    #[serde(alias = "production-only")]
    Production,
    /// Development (watch) runs only
    #[serde(alias = "development-only")]
    Development,
}

impl Inclusion {
    /// Whether a stage with this predicate is part of a `mode` pipeline.
    pub fn includes(self, mode: BuildMode) -> bool {
        match self {
            Inclusion::Always => true,
            Inclusion::Production => mode.is_production(),
            Inclusion::Development => mode.is_development(),
        }
    }
}

impl std::fmt::Display for Inclusion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Inclusion::Always => write!(f, "always"),
            Inclusion::Production => write!(f, "production"),
            Inclusion::Development => write!(f, "development"),
        }
    }
}

/// What a stage does when invoked
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum StageKind {
    /// Run an external transform command
    #[default]
    Command,
    /// Launch the preview server once per watch session
    Serve,
    /// Signal the live-reload channel after each rebuild
    LiveReload,
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StageKind::Command => write!(f, "command"),
            StageKind::Serve => write!(f, "serve"),
            StageKind::LiveReload => write!(f, "live-reload"),
        }
    }
}

/// A `[[stage]]` entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDecl {
    /// Unique stage name
    pub name: String,
    /// Stage kind
    #[serde(default)]
    pub kind: StageKind,
    /// Inclusion predicate
    #[serde(default)]
    pub when: Inclusion,
    /// Statically disabled stages are assembled but skipped
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Program to run (command and serve stages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
    /// Program arguments
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub args: Vec<String>,
    /// Extra environment for the program
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
    /// Working directory, relative to the project root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    /// Directory served to the browser (live-reload stages)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watch: Option<PathBuf>,
    /// Opaque options handed to the stage unchanged
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub options: BTreeMap<String, toml::Value>,
}

impl StageDecl {
    /// A command stage running `command args...`.
    pub fn command(name: &str, command: &str, args: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            kind: StageKind::Command,
            when: Inclusion::Always,
            enabled: true,
            command: Some(command.to_string()),
            args: args.iter().map(|a| a.to_string()).collect(),
            env: BTreeMap::new(),
            dir: None,
            watch: None,
            options: BTreeMap::new(),
        }
    }

    /// A preview server stage.
    pub fn serve(name: &str, command: &str, args: &[&str]) -> Self {
        Self {
            kind: StageKind::Serve,
            when: Inclusion::Development,
            ..Self::command(name, command, args)
        }
    }

    /// A live-reload stage for the given served directory.
    pub fn live_reload(name: &str, watch: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            kind: StageKind::LiveReload,
            when: Inclusion::Development,
            enabled: true,
            command: None,
            args: Vec::new(),
            env: BTreeMap::new(),
            dir: None,
            watch: Some(watch.into()),
            options: BTreeMap::new(),
        }
    }

    /// Set the inclusion predicate.
    pub fn when(mut self, when: Inclusion) -> Self {
        self.when = when;
        self
    }

    /// Add an opaque option.
    pub fn option(mut self, key: &str, value: impl Into<toml::Value>) -> Self {
        self.options.insert(key.to_string(), value.into());
        self
    }
}

fn default_true() -> bool {
    true
}

/// Project layout section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (required)
    pub name: String,
    /// Source directory
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Bundle output directory
    #[serde(default = "default_out")]
    pub out: PathBuf,
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_out() -> PathBuf {
    PathBuf::from("public/build")
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
    /// Clear terminal between rebuilds
    #[serde(default)]
    pub clear_screen: bool,
    /// Paths to watch, relative to the project root (empty: the source directory)
    #[serde(default)]
    pub paths: Vec<PathBuf>,
    /// File extensions that trigger a rebuild
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
    /// Glob patterns excluded from watching
    #[serde(default)]
    pub ignore: Vec<String>,
}

fn default_debounce_ms() -> u32 {
    100
}

fn default_extensions() -> Vec<String> {
    ["svelte", "js", "ts", "css", "rs", "html"].iter().map(|e| e.to_string()).collect()
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self {
            debounce_ms: default_debounce_ms(),
            clear_screen: false,
            paths: Vec::new(),
            extensions: default_extensions(),
            ignore: Vec::new(),
        }
    }
}

/// The stage list for a Svelte + WASM front end.
///
/// Transforms are delegated to `npm run` scripts and `wasm-pack`; the
/// options mirror the settings those tools expect.
pub fn default_stages() -> Vec<StageDecl> {
    vec![
        StageDecl::command("components", "npm", &["run", "build:components"])
            .option("css", "public/build/main.css"),
        StageDecl::command("resolve", "npm", &["run", "build:resolve"])
            .option("browser", true)
            .option("dedupe", vec![toml::Value::from("svelte")]),
        StageDecl::command("commonjs", "npm", &["run", "build:commonjs"]),
        StageDecl::command("native", "wasm-pack", &["build", "--target", "web"])
            .option("verbose", true)
            .option("server_path", "build/"),
        StageDecl::command("bundle", "npm", &["run", "build:bundle"])
            .option("input", "src/main.js")
            .option("format", "es")
            .option("name", "app"),
        StageDecl::serve("serve", "npm", &["run", "start", "--", "--dev"]),
        StageDecl::live_reload("livereload", "public"),
        StageDecl::command("minify", "npm", &["run", "build:minify"]).when(Inclusion::Production),
    ]
}

/// Complete stagehand.toml configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagehandConfig {
    /// Project layout (required)
    pub project: ProjectConfig,
    /// Watch mode settings
    #[serde(default)]
    pub watch: WatchConfig,
    /// Ordered stage declarations
    #[serde(default = "default_stages", rename = "stage")]
    pub stages: Vec<StageDecl>,
}

/// Configuration validation error
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "watch.debounce_ms")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stagehand.toml: '{}' {}", self.field, self.message)
    }
}

impl StagehandConfig {
    /// Validate the configuration and return any errors
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        if self.watch.debounce_ms == 0 {
            errors.push(ConfigValidationError {
                field: "watch.debounce_ms".to_string(),
                message: "must be a positive integer".to_string(),
            });
        }

        if self.watch.extensions.is_empty() {
            errors.push(ConfigValidationError {
                field: "watch.extensions".to_string(),
                message: "must contain at least one extension".to_string(),
            });
        }

        for (i, pattern) in self.watch.ignore.iter().enumerate() {
            if let Err(e) = glob::Pattern::new(pattern) {
                errors.push(ConfigValidationError {
                    field: format!("watch.ignore[{}]", i),
                    message: format!("is not a valid glob pattern: {}", e),
                });
            }
        }

        for e in crate::build::assemble::validate_declarations(&self.stages) {
            errors.push(ConfigValidationError { field: "stage".to_string(), message: e.to_string() });
        }

        errors
    }

    /// Check if validation passed
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_parse() {
        let toml = r#"
[project]
name = "web"
"#;
        let config: StagehandConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.project.name, "web");
        assert_eq!(config.project.src, PathBuf::from("src"));
        assert_eq!(config.project.out, PathBuf::from("public/build"));
        assert_eq!(config.watch.debounce_ms, 100);
        assert!(!config.watch.clear_screen);
        assert!(config.watch.paths.is_empty());
        assert_eq!(config.stages, default_stages());
        assert!(config.is_valid());
    }

    #[test]
    fn test_stage_declarations_parse() {
        let toml = r#"
[project]
name = "web"
out = "dist"

[watch]
debounce_ms = 250
clear_screen = true
paths = ["src", "crates/core/src"]
ignore = ["**/node_modules/**"]

[[stage]]
name = "native"
command = "wasm-pack"
args = ["build", "--target", "web"]
options = { verbose = true, server_path = "build/" }

[[stage]]
name = "serve"
kind = "serve"
when = "development"
command = "npm"
args = ["run", "start"]

[[stage]]
name = "livereload"
kind = "live-reload"
when = "development"
watch = "public"

[[stage]]
name = "minify"
when = "production-only"
enabled = false
command = "terser"
env = { TERSER_ECMA = "2020" }
"#;
        let config: StagehandConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.project.out, PathBuf::from("dist"));
        assert_eq!(config.watch.debounce_ms, 250);
        assert_eq!(config.watch.paths.len(), 2);
        assert_eq!(config.stages.len(), 4);

        let native = &config.stages[0];
        assert_eq!(native.kind, StageKind::Command);
        assert_eq!(native.when, Inclusion::Always);
        assert!(native.enabled);
        assert_eq!(native.options.get("verbose"), Some(&toml::Value::Boolean(true)));

        assert_eq!(config.stages[1].kind, StageKind::Serve);
        assert_eq!(config.stages[2].kind, StageKind::LiveReload);
        assert_eq!(config.stages[2].watch, Some(PathBuf::from("public")));

        let minify = &config.stages[3];
        assert_eq!(minify.when, Inclusion::Production);
        assert!(!minify.enabled);
        assert_eq!(minify.env.get("TERSER_ECMA").map(String::as_str), Some("2020"));

        assert!(config.is_valid());
    }

    #[test]
    fn test_inclusion_predicate() {
        assert!(Inclusion::Always.includes(BuildMode::Production));
        assert!(Inclusion::Always.includes(BuildMode::Development));
        assert!(Inclusion::Production.includes(BuildMode::Production));
        assert!(!Inclusion::Production.includes(BuildMode::Development));
        assert!(Inclusion::Development.includes(BuildMode::Development));
        assert!(!Inclusion::Development.includes(BuildMode::Production));
    }

    #[test]
    fn test_validation_empty_name() {
        let toml = r#"
[project]
name = ""
"#;
        let config: StagehandConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "project.name"));
    }

    #[test]
    fn test_validation_zero_debounce() {
        let toml = r#"
[project]
name = "web"

[watch]
debounce_ms = 0
"#;
        let config: StagehandConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "watch.debounce_ms"));
    }

    #[test]
    fn test_validation_bad_ignore_glob() {
        let toml = r#"
[project]
name = "web"

[watch]
ignore = ["src/[oops"]
"#;
        let config: StagehandConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "watch.ignore[0]"));
    }

    #[test]
    fn test_validation_stage_without_command() {
        let toml = r#"
[project]
name = "web"

[[stage]]
name = "bundle"
"#;
        let config: StagehandConfig = toml::from_str(toml).unwrap();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "stage" && e.message.contains("bundle")));
    }

    #[test]
    fn test_default_stage_order() {
        let names: Vec<_> = default_stages().into_iter().map(|s| s.name).collect();
        assert_eq!(
            names,
            ["components", "resolve", "commonjs", "native", "bundle", "serve", "livereload", "minify"]
        );
    }
}
