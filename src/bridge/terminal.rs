use std::borrow::Cow;
use std::io::{self, IsTerminal, Write};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::warn;

/// Host terminal control consumed by the line editor.
pub trait Terminal: Send {
    fn enable_raw_mode(&mut self) -> io::Result<()>;
    fn disable_raw_mode(&mut self) -> io::Result<()>;
    /// Write echo or prompt text and flush it immediately.
    fn write_display(&mut self, text: &str) -> io::Result<()>;
}

impl<T: Terminal + ?Sized> Terminal for Box<T> {
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        (**self).enable_raw_mode()
    }

    fn disable_raw_mode(&mut self) -> io::Result<()> {
        (**self).disable_raw_mode()
    }

    fn write_display(&mut self, text: &str) -> io::Result<()> {
        (**self).write_display(text)
    }
}

/// Read-only view of whether the host terminal is currently raw.
///
/// Only the terminal that owns the flag flips it; everyone else reads.
#[derive(Debug, Clone, Default)]
pub struct RawModeFlag(Arc<AtomicBool>);

impl RawModeFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn set(&self, active: bool) {
        self.0.store(active, Ordering::SeqCst);
    }
}

/// Scoped raw-mode acquisition.
///
/// `release` restores normal mode on the expected exit paths and reports
/// failures; `Drop` covers everything else (errors, a cancelled read).
/// Either way normal mode is restored exactly once.
pub struct RawModeGuard<'a, T: Terminal + ?Sized> {
    terminal: &'a mut T,
    active: bool,
}

impl<'a, T: Terminal + ?Sized> RawModeGuard<'a, T> {
    pub fn acquire(terminal: &'a mut T) -> io::Result<Self> {
        terminal.enable_raw_mode()?;
        Ok(Self {
            terminal,
            active: true,
        })
    }

    pub fn terminal(&mut self) -> &mut T {
        &mut *self.terminal
    }

    pub fn release(mut self) -> io::Result<()> {
        self.active = false;
        self.terminal.disable_raw_mode()
    }
}

impl<T: Terminal + ?Sized> Drop for RawModeGuard<'_, T> {
    fn drop(&mut self) {
        if self.active {
            self.active = false;
            if let Err(e) = self.terminal.disable_raw_mode() {
                warn!("Failed to restore terminal mode: {}", e);
            }
        }
    }
}

/// Rewrites bare `\n` as `\r\n`. Raw mode turns off the terminal's own
/// output translation, so a bare line feed would not return the cursor.
#[derive(Debug, Default)]
pub(crate) struct NewlineExpander {
    last: Option<u8>,
}

impl NewlineExpander {
    pub(crate) fn expand<'a>(&mut self, bytes: &'a [u8]) -> Cow<'a, [u8]> {
        let mut prev = self.last;
        if let Some(&byte) = bytes.last() {
            self.last = Some(byte);
        }

        let needs_rewrite = bytes.iter().enumerate().any(|(i, &b)| {
            let before = if i == 0 { prev } else { Some(bytes[i - 1]) };
            b == b'\n' && before != Some(b'\r')
        });
        if !needs_rewrite {
            return Cow::Borrowed(bytes);
        }

        let mut out = Vec::with_capacity(bytes.len() + bytes.len() / 8 + 1);
        for &b in bytes {
            if b == b'\n' && prev != Some(b'\r') {
                out.push(b'\r');
            }
            out.push(b);
            prev = Some(b);
        }
        Cow::Owned(out)
    }
}

/// The process's own terminal, driven through crossterm.
///
/// When stdin is not a TTY there is no line discipline to switch, so mode
/// changes are skipped and output is written untouched.
pub struct CrosstermTerminal {
    stdout: io::Stdout,
    interactive: bool,
    flag: RawModeFlag,
    newlines: NewlineExpander,
}

impl CrosstermTerminal {
    pub fn new() -> Self {
        Self {
            stdout: io::stdout(),
            interactive: io::stdin().is_terminal(),
            flag: RawModeFlag::new(),
            newlines: NewlineExpander::default(),
        }
    }

    pub fn is_interactive(&self) -> bool {
        self.interactive
    }

    pub fn raw_mode_flag(&self) -> RawModeFlag {
        self.flag.clone()
    }
}

impl Default for CrosstermTerminal {
    fn default() -> Self {
        Self::new()
    }
}

impl Terminal for CrosstermTerminal {
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        if self.interactive {
            crossterm::terminal::enable_raw_mode()?;
            self.flag.set(true);
        }
        Ok(())
    }

    fn disable_raw_mode(&mut self) -> io::Result<()> {
        if self.interactive {
            crossterm::terminal::disable_raw_mode()?;
            self.flag.set(false);
        }
        Ok(())
    }

    fn write_display(&mut self, text: &str) -> io::Result<()> {
        let bytes = if self.flag.is_active() {
            self.newlines.expand(text.as_bytes())
        } else {
            Cow::Borrowed(text.as_bytes())
        };
        let mut out = self.stdout.lock();
        out.write_all(&bytes)?;
        out.flush()
    }
}

/// In-memory terminal that records what was displayed.
#[derive(Debug, Default)]
pub struct RecordingTerminal {
    display: String,
    raw: bool,
    mode_changes: usize,
}

impl RecordingTerminal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn display(&self) -> &str {
        &self.display
    }

    pub fn is_raw(&self) -> bool {
        self.raw
    }

    pub fn mode_changes(&self) -> usize {
        self.mode_changes
    }
}

impl Terminal for RecordingTerminal {
    fn enable_raw_mode(&mut self) -> io::Result<()> {
        self.raw = true;
        self.mode_changes += 1;
        Ok(())
    }

    fn disable_raw_mode(&mut self) -> io::Result<()> {
        self.raw = false;
        self.mode_changes += 1;
        Ok(())
    }

    fn write_display(&mut self, text: &str) -> io::Result<()> {
        self.display.push_str(text);
        Ok(())
    }
}
