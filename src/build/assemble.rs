//! Pipeline assembly.
//!
//! Turns the static stage declarations into the ordered stage list for one
//! build mode. Declaration order is authoritative: native compilation comes
//! before bundling, serve and live reload react to the written bundle, the
//! minifier goes last. Nothing is reordered here.

use std::collections::HashSet;

use crate::build::mode::BuildMode;
use crate::build::pipeline::Pipeline;
use crate::build::stage::StageSpec;
use crate::config::{Inclusion, StageDecl, StageKind};
use crate::error::ConfigurationError;

/// Check every declaration, included or not, and collect all problems.
pub fn validate_declarations(decls: &[StageDecl]) -> Vec<ConfigurationError> {
    let mut errors = Vec::new();
    let mut seen = HashSet::new();
    let mut serve: Option<&str> = None;
    let mut live_reload: Option<&str> = None;

    for (index, decl) in decls.iter().enumerate() {
        if decl.name.trim().is_empty() {
            errors.push(ConfigurationError::EmptyName { index });
            continue;
        }
        if !seen.insert(decl.name.as_str()) {
            errors.push(ConfigurationError::DuplicateStage(decl.name.clone()));
        }

        match decl.kind {
            StageKind::Command | StageKind::Serve => {
                let has_command = decl.command.as_deref().is_some_and(|c| !c.trim().is_empty());
                if !has_command {
                    errors.push(ConfigurationError::MissingSetting {
                        stage: decl.name.clone(),
                        field: "command",
                    });
                }
            }
            StageKind::LiveReload => {
                if decl.watch.as_ref().map_or(true, |w| w.as_os_str().is_empty()) {
                    errors.push(ConfigurationError::MissingSetting {
                        stage: decl.name.clone(),
                        field: "watch",
                    });
                }
            }
        }

        let slot = match decl.kind {
            StageKind::Command => None,
            StageKind::Serve => Some(&mut serve),
            StageKind::LiveReload => Some(&mut live_reload),
        };
        if let Some(slot) = slot {
            if decl.when != Inclusion::Development {
                errors.push(ConfigurationError::WatchOnlyStage {
                    stage: decl.name.clone(),
                    kind: decl.kind.to_string(),
                });
            }
            let existing = *slot;
            match existing {
                Some(first) => errors.push(ConfigurationError::MultipleStages {
                    kind: decl.kind.to_string(),
                    first: first.to_string(),
                    second: decl.name.clone(),
                }),
                None => *slot = Some(decl.name.as_str()),
            }
        }
    }

    errors
}

/// Assemble the pipeline for `mode`.
///
/// Fails on the first structural problem so that a broken pipeline never
/// starts running.
pub fn assemble(mode: BuildMode, decls: &[StageDecl]) -> Result<Pipeline, ConfigurationError> {
    if let Some(err) = validate_declarations(decls).into_iter().next() {
        return Err(err);
    }

    let stages: Vec<StageSpec> =
        decls.iter().filter(|d| d.when.includes(mode)).map(StageSpec::from_decl).collect();

    tracing::debug!(
        %mode,
        stages = ?stages.iter().map(|s| s.name.as_str()).collect::<Vec<_>>(),
        "assembled pipeline"
    );

    Ok(Pipeline::new(mode, stages))
}
