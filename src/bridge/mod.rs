//! Host terminal bridge for a sandbox without terminal access.
//!
//! The sandbox gets two primitives in place of its standard I/O: `input`
//! (suspends until the host user completes or cancels a line) and `print`
//! (forwards text to the host console). Line editing happens here, one raw
//! keystroke at a time.

pub mod key;
pub mod line;
pub mod relay;
pub mod source;
pub mod terminal;

pub use key::KeyEvent;
pub use line::{InputBridge, LineEditor, LineOutcome, SessionState};
pub use relay::OutputRelay;
pub use source::{ByteKeySource, CrosstermKeySource, KeySource};
pub use terminal::{CrosstermTerminal, RawModeFlag, RawModeGuard, RecordingTerminal, Terminal};

use std::io::{self, Write};

use async_trait::async_trait;

use crate::error::Result;

/// The I/O primitives registered with the sandbox collaborator.
#[async_trait]
pub trait SandboxIo: Send {
    /// Show `prompt`, then read one line; empty on cancellation.
    async fn input(&mut self, prompt: &str) -> Result<String>;

    fn print(&mut self, text: &str) -> Result<()>;
}

/// `SandboxIo` backed by an input bridge and an output relay.
pub struct HostIo<T, K, W> {
    input: InputBridge<T, K>,
    output: OutputRelay<W>,
}

/// The bridge wired to this process's own terminal.
pub type HostConsole = HostIo<CrosstermTerminal, Box<dyn KeySource>, io::Stdout>;

impl<T: Terminal, K: KeySource, W: Write + Send> HostIo<T, K, W> {
    pub fn new(input: InputBridge<T, K>, output: OutputRelay<W>) -> Self {
        Self { input, output }
    }

    /// Like `input`, but reports how the session ended.
    pub async fn input_session(&mut self, prompt: &str) -> Result<LineOutcome> {
        if !prompt.is_empty() {
            self.output.print(prompt)?;
        }
        self.input.read_session().await
    }

    pub fn input_bridge(&self) -> &InputBridge<T, K> {
        &self.input
    }

    pub fn into_parts(self) -> (InputBridge<T, K>, OutputRelay<W>) {
        (self.input, self.output)
    }
}

#[async_trait]
impl<T: Terminal, K: KeySource, W: Write + Send> SandboxIo for HostIo<T, K, W> {
    async fn input(&mut self, prompt: &str) -> Result<String> {
        Ok(self.input_session(prompt).await?.into_line())
    }

    fn print(&mut self, text: &str) -> Result<()> {
        self.output.print(text)
    }
}

/// Input bridge over the host terminal: crossterm key events on a TTY,
/// raw stdin bytes otherwise.
pub fn host_input() -> InputBridge<CrosstermTerminal, Box<dyn KeySource>> {
    let terminal = CrosstermTerminal::new();
    let keys: Box<dyn KeySource> = if terminal.is_interactive() {
        Box::new(CrosstermKeySource::new())
    } else {
        Box::new(ByteKeySource::new(tokio::io::stdin()))
    };
    InputBridge::new(terminal, keys)
}

pub fn host_console() -> HostConsole {
    let input = host_input();
    let flag = input.terminal().raw_mode_flag();
    HostIo::new(input, OutputRelay::stdout().with_raw_mode_flag(flag))
}
