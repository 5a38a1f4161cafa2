use anyhow::{Context, Result};
use clap::Args;
use std::process::Stdio;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{ChildStdin, ChildStdout, Command};
use tracing::{debug, info, warn};

use crate::bootstrap::{BootstrapPlan, bootstrap};
use crate::bridge::{self, LineOutcome, OutputRelay};
use crate::concurrency::BootstrapLock;
use crate::config::Config;
use crate::sandbox::open_sandbox;

#[derive(Args)]
pub struct RunArgs {
    /// Start the entry point against the sandbox as it is
    #[arg(long)]
    pub skip_materialize: bool,

    /// Entry command to run instead of entry.command
    #[arg(last = true)]
    pub command: Vec<String>,
}

pub async fn run(args: RunArgs, config: &Config) -> Result<()> {
    let root = config.sandbox_root();

    // Materialization must finish before the bridge is installed.
    if args.skip_materialize {
        info!("Skipping materialization of {}", root.display());
    } else {
        let _guard = BootstrapLock::for_root(&root).begin_pass()?;
        let mut sandbox = open_sandbox(&config.sandbox, &root)
            .with_context(|| format!("Failed to open sandbox at {}", root.display()))?;
        bootstrap(&mut sandbox, &BootstrapPlan::from_config(config))
            .context("Bootstrap failed; entry point not started")?;
    }

    let mut input = bridge::host_input();
    let relay = OutputRelay::stdout().with_raw_mode_flag(input.terminal().raw_mode_flag());

    let command = if args.command.is_empty() {
        &config.entry.command
    } else {
        &args.command
    };
    let (program, program_args) = command
        .split_first()
        .context("Entry command is empty")?;

    info!("Starting entry point: {}", command.join(" "));
    let mut child = Command::new(program)
        .args(program_args)
        .current_dir(&root)
        .envs(config.entry.resolved_env())
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::inherit())
        .kill_on_drop(true)
        .spawn()
        .with_context(|| format!("Failed to start entry point '{}'", program))?;

    let mut stdin = child.stdin.take();
    let stdout = child
        .stdout
        .take()
        .context("Entry point stdout was not captured")?;
    let relay_task = tokio::spawn(relay_output(stdout, relay));

    let status = loop {
        tokio::select! {
            status = child.wait() => break status?,
            outcome = input.read_session(), if stdin.is_some() => {
                match outcome? {
                    LineOutcome::StreamClosed => {
                        debug!("Host input closed; closing entry point stdin");
                        stdin = None;
                    }
                    outcome => {
                        let line = outcome.into_line();
                        if let Some(pipe) = stdin.as_mut()
                            && let Err(e) = send_line(pipe, &line).await
                        {
                            warn!("Entry point stopped reading input: {}", e);
                            stdin = None;
                        }
                    }
                }
            }
        }
    };

    relay_task.await.context("Output relay task panicked")??;

    if !status.success() {
        anyhow::bail!("Entry point exited with {}", status);
    }
    info!("Entry point exited cleanly");
    Ok(())
}

async fn send_line(pipe: &mut ChildStdin, line: &str) -> std::io::Result<()> {
    pipe.write_all(line.as_bytes()).await?;
    pipe.write_all(b"\n").await?;
    pipe.flush().await
}

async fn relay_output(mut stdout: ChildStdout, mut relay: OutputRelay<std::io::Stdout>) -> Result<()> {
    let mut buf = vec![0u8; 4096];
    loop {
        let n = stdout.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        relay.print_bytes(&buf[..n])?;
    }
}
