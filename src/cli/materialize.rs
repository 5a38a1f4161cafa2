use anyhow::{Context, Result};
use clap::Args;
use std::path::PathBuf;

use crate::bootstrap::{BootstrapPlan, BootstrapSummary, bootstrap};
use crate::concurrency::BootstrapLock;
use crate::config::Config;
use crate::materialize::{TreeMode, materialize, resolve_source_dir};
use crate::sandbox::{MemorySandbox, SandboxFs, SandboxOp, open_sandbox};

#[derive(Args)]
pub struct MaterializeArgs {
    /// Mirror only this directory (default: the configured source tree,
    /// asset trees and entry script)
    #[arg(short, long)]
    pub dir: Option<String>,

    /// Sandbox root on the host (default: sandbox.root from config)
    #[arg(long)]
    pub into: Option<PathBuf>,

    /// Print the operations instead of performing them
    #[arg(long)]
    pub dry_run: bool,

    /// Copy every file of --dir verbatim instead of filtering by extension
    #[arg(long, requires = "dir")]
    pub assets: bool,
}

pub fn run(args: MaterializeArgs, config: &Config) -> Result<()> {
    if args.dry_run {
        let mut sandbox = MemorySandbox::new();
        let summary = execute(&args, config, &mut sandbox)?;
        for op in sandbox.ops() {
            match op {
                SandboxOp::EnsureDirectory(path) => println!("mkdir  {}", path),
                SandboxOp::WriteFile { path, bytes } => {
                    println!("write  {} ({} bytes)", path, bytes)
                }
            }
        }
        print_summary(&summary, "would be written");
        return Ok(());
    }

    let root = args.into.clone().unwrap_or_else(|| config.sandbox_root());
    let _guard = BootstrapLock::for_root(&root).begin_pass()?;
    let mut sandbox = open_sandbox(&config.sandbox, &root)
        .with_context(|| format!("Failed to open sandbox at {}", root.display()))?;

    let summary = execute(&args, config, &mut sandbox)?;
    print_summary(&summary, &format!("written to {}", root.display()));
    Ok(())
}

fn execute<S>(args: &MaterializeArgs, config: &Config, sandbox: &mut S) -> Result<BootstrapSummary>
where
    S: SandboxFs + ?Sized,
{
    let Some(ref dir) = args.dir else {
        return Ok(bootstrap(sandbox, &BootstrapPlan::from_config(config))?);
    };

    let mode = if args.assets {
        TreeMode::Assets
    } else {
        TreeMode::source(&config.source.extension)
    };
    let source = resolve_source_dir(dir)?;
    let report = materialize(sandbox, &source, &mode)?;
    Ok(BootstrapSummary {
        source: report,
        assets: Vec::new(),
        entry_script: None,
    })
}

fn print_summary(summary: &BootstrapSummary, outcome: &str) {
    for report in std::iter::once(&summary.source).chain(&summary.assets) {
        println!(
            "{} -> {}: {} files, {} directories, {} bytes ({} skipped)",
            report.source.display(),
            report.root,
            report.files,
            report.directories,
            report.bytes,
            report.skipped
        );
    }
    if let Some(ref script) = summary.entry_script {
        println!("entry script -> {}", script);
    }
    println!("{} files {}", summary.files(), outcome);
}
