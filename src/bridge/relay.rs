use std::borrow::Cow;
use std::io::{self, Write};

use super::terminal::{NewlineExpander, RawModeFlag};
use crate::error::{BootstrapError, Result};

/// Forwards sandbox output to the host console.
///
/// Text is written as-is and flushed per chunk. The one rewrite: while the
/// linked terminal is raw, bare `\n` goes out as `\r\n`.
pub struct OutputRelay<W> {
    writer: W,
    raw_mode: Option<RawModeFlag>,
    newlines: NewlineExpander,
}

impl OutputRelay<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> OutputRelay<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer,
            raw_mode: None,
            newlines: NewlineExpander::default(),
        }
    }

    pub fn with_raw_mode_flag(mut self, flag: RawModeFlag) -> Self {
        self.raw_mode = Some(flag);
        self
    }

    pub fn print(&mut self, text: &str) -> Result<()> {
        self.print_bytes(text.as_bytes())
    }

    pub fn print_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let raw = self.raw_mode.as_ref().is_some_and(RawModeFlag::is_active);
        let out = if raw {
            self.newlines.expand(bytes)
        } else {
            Cow::Borrowed(bytes)
        };
        self.writer
            .write_all(&out)
            .and_then(|()| self.writer.flush())
            .map_err(BootstrapError::ConsoleWriteFailure)
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}
