//! CLI subcommand: `sandbox-bootstrap paths`
//!
//! Prints resolved paths for debugging and scripting.

use anyhow::Result;

use crate::concurrency::BootstrapLock;
use crate::config::Config;

pub fn run(config: &Config) -> Result<()> {
    let paths = &config.paths;
    let sandbox_root = config.sandbox_root();
    let lock = BootstrapLock::for_root(&sandbox_root);

    println!("sandbox-bootstrap paths");
    println!("=======================");
    println!();
    println!("Config:     {}", paths.config_dir.display());
    println!("  config.toml:    {}", paths.config_file().display());
    match config.loaded_from {
        Some(ref file) => println!("  loaded from:    {}", file.display()),
        None => println!("  loaded from:    (defaults)"),
    }
    println!();
    println!("Data:       {}", paths.data_dir.display());
    println!("  sandbox root:   {}", sandbox_root.display());
    println!("  bootstrap lock: {}", lock.path().display());

    Ok(())
}
