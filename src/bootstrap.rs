//! One bootstrap pass: mirror the source tree, any asset trees and the
//! optional entry script into the sandbox, in that order.

use std::fs;
use std::path::PathBuf;

use tracing::info;

use crate::config::Config;
use crate::error::{BootstrapError, Result};
use crate::materialize::{MaterializeReport, TreeMode, materialize, resolve_source_dir};
use crate::sandbox::{FileContents, SandboxFs, SandboxPath};

/// What a pass copies, with every location still unresolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapPlan {
    pub source_dir: String,
    pub extension: String,
    pub asset_dirs: Vec<String>,
    pub entry_script: Option<PathBuf>,
}

impl BootstrapPlan {
    pub fn from_config(config: &Config) -> Self {
        Self {
            source_dir: config.source.dir.clone(),
            extension: config.source.extension.clone(),
            asset_dirs: config.assets.iter().map(|a| a.dir.clone()).collect(),
            entry_script: config
                .entry
                .script
                .as_deref()
                .map(|s| PathBuf::from(shellexpand::tilde(s).to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct BootstrapSummary {
    pub source: MaterializeReport,
    pub assets: Vec<MaterializeReport>,
    /// Sandbox location of the entry script, when one was copied
    pub entry_script: Option<SandboxPath>,
}

impl BootstrapSummary {
    pub fn files(&self) -> usize {
        self.source.files + self.assets.iter().map(|r| r.files).sum::<usize>()
    }
}

/// Run a full pass against `sandbox`.
///
/// Directories are resolved against the process working directory. The
/// first failure aborts the pass.
pub fn bootstrap<S>(sandbox: &mut S, plan: &BootstrapPlan) -> Result<BootstrapSummary>
where
    S: SandboxFs + ?Sized,
{
    let source_dir = resolve_source_dir(&plan.source_dir)?;
    let source = materialize(sandbox, &source_dir, &TreeMode::source(&plan.extension))?;

    let mut assets = Vec::with_capacity(plan.asset_dirs.len());
    for dir in &plan.asset_dirs {
        let asset_dir = resolve_source_dir(dir)?;
        assets.push(materialize(sandbox, &asset_dir, &TreeMode::Assets)?);
    }

    let entry_script = match &plan.entry_script {
        Some(script) => Some(copy_entry_script(sandbox, script)?),
        None => None,
    };

    let summary = BootstrapSummary {
        source,
        assets,
        entry_script,
    };
    info!(
        "Bootstrap complete: {} files across {} trees",
        summary.files(),
        1 + summary.assets.len()
    );
    Ok(summary)
}

fn copy_entry_script<S>(sandbox: &mut S, script: &std::path::Path) -> Result<SandboxPath>
where
    S: SandboxFs + ?Sized,
{
    let host_failure =
        |e: std::io::Error| BootstrapError::write_failure(script.display().to_string(), e);

    let text = fs::read_to_string(script).map_err(host_failure)?;
    let name = script.file_name().ok_or_else(|| {
        host_failure(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "entry script path has no file name",
        ))
    })?;
    let target = SandboxPath::workdir().join_os(name).map_err(host_failure)?;

    sandbox
        .write_file(&target, FileContents::Text(&text))
        .map_err(|e| BootstrapError::write_failure(target.as_str(), e))?;
    info!("Wrote entry script {}", target);
    Ok(target)
}
