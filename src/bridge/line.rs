use std::io;

use tracing::{debug, warn};

use super::key::KeyEvent;
use super::source::KeySource;
use super::terminal::{RawModeGuard, Terminal};
use crate::error::{BootstrapError, Result};

/// How an input session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineOutcome {
    Completed(String),
    Interrupted,
    /// The host stream ended or failed mid-session.
    StreamClosed,
}

impl LineOutcome {
    /// The line handed to the sandbox: cancellation reads as empty.
    pub fn into_line(self) -> String {
        match self {
            LineOutcome::Completed(line) => line,
            LineOutcome::Interrupted | LineOutcome::StreamClosed => String::new(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Collecting,
}

/// Single-line editing on top of raw keystrokes.
#[derive(Debug, Default)]
pub struct LineEditor {
    buffer: Vec<char>,
}

impl LineEditor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer(&self) -> String {
        self.buffer.iter().collect()
    }

    /// Apply one keystroke, echoing to `display`. Returns the outcome once
    /// the keystroke ends the line.
    pub fn apply<T>(&mut self, event: KeyEvent, display: &mut T) -> io::Result<Option<LineOutcome>>
    where
        T: Terminal + ?Sized,
    {
        match event {
            KeyEvent::Newline => {
                display.write_display("\n")?;
                let line = self.buffer.drain(..).collect();
                Ok(Some(LineOutcome::Completed(line)))
            }
            KeyEvent::Interrupt => {
                display.write_display("^C\n")?;
                self.buffer.clear();
                Ok(Some(LineOutcome::Interrupted))
            }
            KeyEvent::Backspace => {
                // Never erases past the start of the line (or into the prompt).
                if self.buffer.pop().is_some() {
                    display.write_display("\x08 \x08")?;
                }
                Ok(None)
            }
            KeyEvent::Char(c) => {
                self.buffer.push(c);
                let mut utf8 = [0u8; 4];
                display.write_display(c.encode_utf8(&mut utf8))?;
                Ok(None)
            }
            KeyEvent::Unsupported => Ok(None),
        }
    }
}

/// Resets the session state when a session ends, including when the
/// awaiting future is dropped mid-read.
struct CollectingMarker<'a>(&'a mut SessionState);

impl<'a> CollectingMarker<'a> {
    fn enter(state: &'a mut SessionState) -> Self {
        *state = SessionState::Collecting;
        Self(state)
    }
}

impl Drop for CollectingMarker<'_> {
    fn drop(&mut self) {
        *self.0 = SessionState::Idle;
    }
}

/// Host-side line reader handed to the sandbox as its `input` primitive.
///
/// Owns the terminal and the key source; `&mut self` on `read_session`
/// keeps sessions strictly sequential.
pub struct InputBridge<T, K> {
    terminal: T,
    keys: K,
    state: SessionState,
}

impl<T: Terminal, K: KeySource> InputBridge<T, K> {
    pub fn new(terminal: T, keys: K) -> Self {
        Self {
            terminal,
            keys,
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn terminal(&self) -> &T {
        &self.terminal
    }

    pub fn terminal_mut(&mut self) -> &mut T {
        &mut self.terminal
    }

    /// Collect one line in raw mode.
    ///
    /// Raw mode is held for exactly the session and restored on every exit.
    /// A failing or exhausted key source ends the session as `StreamClosed`.
    pub async fn read_session(&mut self) -> Result<LineOutcome> {
        let _marker = CollectingMarker::enter(&mut self.state);
        let mut guard = RawModeGuard::acquire(&mut self.terminal).map_err(BootstrapError::Terminal)?;
        let mut editor = LineEditor::new();

        let outcome = loop {
            let event = match self.keys.next_key().await {
                Ok(Some(event)) => event,
                Ok(None) => {
                    debug!("Input stream closed mid-line");
                    break LineOutcome::StreamClosed;
                }
                Err(e) => {
                    warn!("Input stream failed: {}", e);
                    break LineOutcome::StreamClosed;
                }
            };

            if let Some(outcome) = editor
                .apply(event, guard.terminal())
                .map_err(BootstrapError::ConsoleWriteFailure)?
            {
                break outcome;
            }
        };

        guard.release().map_err(BootstrapError::Terminal)?;
        Ok(outcome)
    }

    /// The sandbox-facing contract: the completed line, or an empty string
    /// on cancellation.
    pub async fn read_line(&mut self) -> Result<String> {
        Ok(self.read_session().await?.into_line())
    }

    pub fn into_parts(self) -> (T, K) {
        (self.terminal, self.keys)
    }
}
