//! Content transport for the injected-script channel.
//!
//! File content crosses into the interpreter as a base64 payload embedded in a
//! single-quoted Python literal and is decoded on the sandbox side with
//! `base64.b64decode`. The base64 alphabet contains no quote, backslash or
//! newline, so a payload can never terminate the literal that carries it.
//! Paths and other short strings cross as fully escaped Python string literals.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use std::fmt::Write as _;

/// Encoded file content, safe to embed verbatim inside `'...'`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportPayload {
    encoded: String,
}

impl TransportPayload {
    pub fn encode(content: &[u8]) -> Self {
        Self {
            encoded: STANDARD.encode(content),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.encoded
    }

    /// Host-side inverse of the sandbox decode step.
    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        STANDARD.decode(&self.encoded)
    }

    /// Python expression evaluating to the original bytes.
    pub fn bytes_expr(&self) -> String {
        format!("base64.b64decode('{}')", self.encoded)
    }

    /// Python expression evaluating to the original text (UTF-8 decode wrapper).
    pub fn text_expr(&self) -> String {
        format!("{}.decode('utf-8')", self.bytes_expr())
    }
}

/// Render `value` as a pure-ASCII, single-quoted Python string literal.
pub fn py_str_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\'' => out.push_str("\\'"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            ' '..='~' => out.push(c),
            c if (c as u32) < 0x100 => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if (c as u32) < 0x10000 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => {
                let _ = write!(out, "\\U{:08x}", c as u32);
            }
        }
    }
    out.push('\'');
    out
}
