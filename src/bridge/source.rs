use std::collections::VecDeque;
use std::io;

use async_trait::async_trait;
use crossterm::event::{Event, EventStream};
use futures::StreamExt;
use tokio::io::{AsyncRead, AsyncReadExt};

use super::key::KeyEvent;

/// Source of raw keystrokes. `Ok(None)` means the host stream has ended.
#[async_trait]
pub trait KeySource: Send {
    async fn next_key(&mut self) -> io::Result<Option<KeyEvent>>;
}

#[async_trait]
impl<K: KeySource + ?Sized> KeySource for Box<K> {
    async fn next_key(&mut self) -> io::Result<Option<KeyEvent>> {
        (**self).next_key().await
    }
}

/// Keystrokes decoded byte by byte from any async reader (piped stdin, a
/// pty, a test buffer).
///
/// A CRLF pair is one line ending: the LF right after a CR is dropped, even
/// when the pair straddles two reads.
pub struct ByteKeySource<R> {
    reader: R,
    pending: VecDeque<u8>,
    after_cr: bool,
}

impl<R> ByteKeySource<R> {
    pub fn new(reader: R) -> Self {
        Self {
            reader,
            pending: VecDeque::new(),
            after_cr: false,
        }
    }
}

#[async_trait]
impl<R: AsyncRead + Unpin + Send> KeySource for ByteKeySource<R> {
    async fn next_key(&mut self) -> io::Result<Option<KeyEvent>> {
        loop {
            if self.pending.is_empty() {
                let mut buf = [0u8; 256];
                let n = self.reader.read(&mut buf).await?;
                if n == 0 {
                    return Ok(None);
                }
                self.pending.extend(&buf[..n]);
            }
            let Some(byte) = self.pending.pop_front() else {
                continue;
            };
            let crlf_tail = self.after_cr && byte == b'\n';
            self.after_cr = byte == b'\r';
            if !crlf_tail {
                return Ok(Some(KeyEvent::from_byte(byte)));
            }
        }
    }
}

/// Keystrokes from crossterm's async event stream. Pasted text is replayed
/// as individual keys; resize, focus and mouse events are dropped.
pub struct CrosstermKeySource {
    events: EventStream,
    pending: VecDeque<KeyEvent>,
}

impl CrosstermKeySource {
    pub fn new() -> Self {
        Self {
            events: EventStream::new(),
            pending: VecDeque::new(),
        }
    }
}

impl Default for CrosstermKeySource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeySource for CrosstermKeySource {
    async fn next_key(&mut self) -> io::Result<Option<KeyEvent>> {
        loop {
            if let Some(key) = self.pending.pop_front() {
                return Ok(Some(key));
            }
            match self.events.next().await {
                None => return Ok(None),
                Some(Err(e)) => return Err(e),
                Some(Ok(Event::Key(event))) => {
                    if let Some(key) = KeyEvent::from_crossterm(&event) {
                        return Ok(Some(key));
                    }
                }
                Some(Ok(Event::Paste(text))) => {
                    self.pending.extend(text.chars().map(|c| {
                        if c.is_ascii() {
                            KeyEvent::from_byte(c as u8)
                        } else {
                            KeyEvent::Unsupported
                        }
                    }));
                }
                Some(Ok(_)) => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::line::{InputBridge, LineOutcome};
    use crate::bridge::terminal::RecordingTerminal;

    #[tokio::test]
    async fn decodes_bytes_in_order() {
        let mut keys = ByteKeySource::new(&b"ok\x7f\x03\r"[..]);
        let mut seen = Vec::new();
        while let Some(key) = keys.next_key().await.unwrap() {
            seen.push(key);
        }
        assert_eq!(
            seen,
            vec![
                KeyEvent::Char('o'),
                KeyEvent::Char('k'),
                KeyEvent::Backspace,
                KeyEvent::Interrupt,
                KeyEvent::Newline,
            ]
        );
    }

    #[tokio::test]
    async fn crlf_is_a_single_newline() {
        let mut keys = ByteKeySource::new(&b"a\r\n\r\r\nb\n\n"[..]);
        let mut seen = Vec::new();
        while let Some(key) = keys.next_key().await.unwrap() {
            seen.push(key);
        }
        assert_eq!(
            seen,
            vec![
                KeyEvent::Char('a'),
                KeyEvent::Newline,
                KeyEvent::Newline,
                KeyEvent::Newline,
                KeyEvent::Char('b'),
                KeyEvent::Newline,
                KeyEvent::Newline,
            ]
        );
    }

    #[tokio::test]
    async fn crlf_split_across_reads() {
        let reader = (&b"ls\r"[..]).chain(&b"\npwd\r\n"[..]);
        let mut input = InputBridge::new(RecordingTerminal::new(), ByteKeySource::new(reader));
        assert_eq!(input.read_line().await.unwrap(), "ls");
        assert_eq!(input.read_line().await.unwrap(), "pwd");
        assert_eq!(input.read_session().await.unwrap(), LineOutcome::StreamClosed);
    }

    #[tokio::test]
    async fn empty_reader_is_end_of_stream() {
        let mut keys = ByteKeySource::new(&b""[..]);
        assert_eq!(keys.next_key().await.unwrap(), None);
    }
}
