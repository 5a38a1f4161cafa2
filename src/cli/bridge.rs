use anyhow::Result;
use clap::{Args, Subcommand};
use std::io::IsTerminal;

use crate::bridge::{
    self, ByteKeySource, InputBridge, LineOutcome, RecordingTerminal, SandboxIo,
};

#[derive(Args)]
pub struct BridgeArgs {
    #[command(subcommand)]
    pub command: BridgeCommands,
}

#[derive(Subcommand)]
pub enum BridgeCommands {
    /// Show how the bridge would attach to this terminal
    Status,

    /// Run scripted line-editing checks against an in-memory terminal
    Test,

    /// Interactive echo session on the real terminal
    Echo,
}

pub async fn run(args: BridgeArgs) -> Result<()> {
    match args.command {
        BridgeCommands::Status => run_status(),
        BridgeCommands::Test => run_test().await,
        BridgeCommands::Echo => run_echo().await,
    }
}

fn run_status() -> Result<()> {
    let stdin_tty = std::io::stdin().is_terminal();
    let stdout_tty = std::io::stdout().is_terminal();

    println!("Terminal bridge:");
    println!("  stdin is a TTY:  {}", stdin_tty);
    println!("  stdout is a TTY: {}", stdout_tty);
    println!(
        "  Key source:      {}",
        if stdin_tty {
            "crossterm key events (raw mode per line)"
        } else {
            "raw stdin bytes (no mode switching)"
        }
    );
    Ok(())
}

struct Scenario {
    name: &'static str,
    keys: &'static [u8],
    line: &'static str,
    display: &'static str,
}

const SCENARIOS: &[Scenario] = &[
    Scenario {
        name: "Printable echo",
        keys: b"hello\r",
        line: "hello",
        display: "hello\n",
    },
    Scenario {
        name: "Backspace to empty",
        keys: b"hi\x7f\x7f\r",
        line: "",
        display: "hi\x08 \x08\x08 \x08\n",
    },
    Scenario {
        name: "Backspace at line start",
        keys: b"\x7fok\r",
        line: "ok",
        display: "ok\n",
    },
    Scenario {
        name: "Interrupt",
        keys: b"abc\x03",
        line: "",
        display: "abc^C\n",
    },
    Scenario {
        name: "Unsupported bytes",
        keys: b"a\x1b\x09\x00b\r",
        line: "ab",
        display: "ab\n",
    },
    Scenario {
        name: "Stream closed",
        keys: b"partial",
        line: "",
        display: "partial",
    },
];

async fn run_test() -> Result<()> {
    println!("Running line editor checks...");
    println!();

    let total = SCENARIOS.len();
    let mut passed = 0;
    let mut failed = 0;

    for (i, scenario) in SCENARIOS.iter().enumerate() {
        print!("  [{}/{}] {:<26}", i + 1, total, format!("{}:", scenario.name));

        let mut input = InputBridge::new(RecordingTerminal::new(), ByteKeySource::new(scenario.keys));
        match input.read_line().await {
            Ok(line) => {
                let terminal = input.terminal();
                if line != scenario.line {
                    println!("FAIL (line {:?}, expected {:?})", line, scenario.line);
                    failed += 1;
                } else if terminal.display() != scenario.display {
                    println!(
                        "FAIL (display {:?}, expected {:?})",
                        terminal.display(),
                        scenario.display
                    );
                    failed += 1;
                } else if terminal.is_raw() || terminal.mode_changes() != 2 {
                    println!("FAIL (raw mode not restored)");
                    failed += 1;
                } else {
                    println!("ok");
                    passed += 1;
                }
            }
            Err(e) => {
                println!("FAIL ({})", e);
                failed += 1;
            }
        }
    }

    println!();
    if failed == 0 {
        println!("All {} checks passed.", passed);
        Ok(())
    } else {
        anyhow::bail!("{} passed, {} failed", passed, failed)
    }
}

async fn run_echo() -> Result<()> {
    let mut io = bridge::host_console();

    io.print("Lines are echoed back. Ctrl+C cancels a line; 'exit' or end of input quits.\n")?;
    loop {
        match io.input_session("> ").await? {
            LineOutcome::Completed(line) if line.trim() == "exit" => break,
            LineOutcome::Completed(line) => io.print(&format!("{:?}\n", line))?,
            LineOutcome::Interrupted => io.print("(cancelled)\n")?,
            LineOutcome::StreamClosed => break,
        }
    }
    Ok(())
}
