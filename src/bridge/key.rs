use crossterm::event::{KeyCode, KeyEventKind, KeyModifiers};

/// One decoded keystroke as seen by the line editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    /// A printable ASCII character.
    Char(char),
    Newline,
    Backspace,
    Interrupt,
    /// Anything else: control bytes, escape sequences, non-ASCII.
    Unsupported,
}

impl KeyEvent {
    /// Decode a single byte from a raw-mode stream.
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            b'\r' | b'\n' => KeyEvent::Newline,
            0x7f | 0x08 => KeyEvent::Backspace,
            0x03 => KeyEvent::Interrupt,
            0x20..=0x7e => KeyEvent::Char(byte as char),
            _ => KeyEvent::Unsupported,
        }
    }

    /// Map a crossterm key event. Key releases are not keystrokes.
    pub fn from_crossterm(event: &crossterm::event::KeyEvent) -> Option<Self> {
        if event.kind == KeyEventKind::Release {
            return None;
        }

        let ctrl = event.modifiers.contains(KeyModifiers::CONTROL);
        let key = match event.code {
            KeyCode::Enter => KeyEvent::Newline,
            KeyCode::Backspace => KeyEvent::Backspace,
            KeyCode::Char('c') | KeyCode::Char('C') if ctrl => KeyEvent::Interrupt,
            KeyCode::Char(_) if ctrl => KeyEvent::Unsupported,
            KeyCode::Char(c) if (' '..='~').contains(&c) => KeyEvent::Char(c),
            _ => KeyEvent::Unsupported,
        };
        Some(key)
    }
}
