//! RAPI line codec.
//!
//! Wire format (ASCII, one message per line):
//! ```text
//! ┌───┬─────┬──────────────┬────────┬────────┬────┐
//! │ $ │ CMD │ [ arg …]     │ [ :SS] │ [^CK]  │ \r │
//! └───┴─────┴──────────────┴────────┴────────┴────┘
//!   SS = sequence id, two hex digits
//!   CK = XOR of every byte from '$' up to (not including) '^', two hex digits
//! ```
//!
//! Replies use the same framing with `$OK` / `$NK` in the command position.
//! Unsolicited EVSE events (`$ST`, `$AT`, `$WF` …) carry no sequence id.

use core::fmt::Write as _;

use crate::error::RapiError;

/// Maximum length of one RAPI line, excluding the terminator.
pub const LINE_CAP: usize = 64;

/// Maximum number of tokens kept from one reply.
pub const MAX_TOKENS: usize = 12;

/// Sequence ids the client never issues.
pub const SEQ_NONE: u8 = 0x00;
pub const SEQ_RESERVED: u8 = 0xFF;

/// XOR checksum over `bytes`.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc ^ b)
}

/// Frame a command for transmission.
///
/// `text` is the bare command with arguments, with or without the leading
/// `$` (e.g. `"$GS"` or `"SC 16"`).
pub fn encode_command(text: &str, seq: u8) -> Result<heapless::String<LINE_CAP>, RapiError> {
    let body = text.trim();
    let body = body.strip_prefix('$').unwrap_or(body);
    if body.is_empty() {
        return Err(RapiError::InvalidResponse);
    }

    let mut line: heapless::String<LINE_CAP> = heapless::String::new();
    write!(line, "${} :{:02X}", body, seq).map_err(|_| RapiError::CommandTooLong)?;
    let ck = checksum(line.as_bytes());
    write!(line, "^{:02X}\r", ck).map_err(|_| RapiError::CommandTooLong)?;
    Ok(line)
}

// ───────────────────────────────────────────────────────────────
// Line assembly
// ───────────────────────────────────────────────────────────────

/// What the assembler produced for one input byte.
#[derive(Debug, PartialEq, Eq)]
pub enum LineEvent {
    /// A complete line (terminator stripped).
    Line(heapless::String<LINE_CAP>),
    /// A line overran [`LINE_CAP`] and was dropped.
    Overflow,
}

/// Byte-at-a-time line accumulator.
///
/// A `$` always starts a fresh line, so a truncated or noisy line never
/// swallows the next message.
#[derive(Debug, Default)]
pub struct LineAssembler {
    buf: heapless::String<LINE_CAP>,
    overflowed: bool,
}

impl LineAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one byte.
    pub fn push(&mut self, byte: u8) -> Option<LineEvent> {
        match byte {
            b'\r' | b'\n' => {
                if self.overflowed {
                    self.reset();
                    return Some(LineEvent::Overflow);
                }
                if self.buf.is_empty() {
                    return None;
                }
                let line = core::mem::take(&mut self.buf);
                Some(LineEvent::Line(line))
            }
            b'$' => {
                let dropped = self.overflowed;
                self.reset();
                let _ = self.buf.push('$');
                dropped.then_some(LineEvent::Overflow)
            }
            _ if self.overflowed => None,
            _ if self.buf.is_empty() => None, // noise before '$'
            b if b.is_ascii() && !b.is_ascii_control() => {
                if self.buf.push(b as char).is_err() {
                    self.overflowed = true;
                }
                None
            }
            _ => None,
        }
    }

    /// Discard any partial line (e.g. after a transport reset).
    pub fn reset(&mut self) {
        self.buf.clear();
        self.overflowed = false;
    }

    /// Whether a partial line is buffered.
    pub fn in_progress(&self) -> bool {
        !self.buf.is_empty() || self.overflowed
    }
}

// ───────────────────────────────────────────────────────────────
// Tokens
// ───────────────────────────────────────────────────────────────

/// Ordered tokens of one reply line.
///
/// Backed by the line itself; tokens are stored as byte spans, so no
/// per-token allocation happens.
#[derive(Debug, Clone, Default)]
pub struct ResponseTokens {
    line: heapless::String<LINE_CAP>,
    spans: heapless::Vec<(u8, u8), MAX_TOKENS>,
}

impl ResponseTokens {
    /// Number of tokens.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Token `index`, if present.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.spans
            .get(index)
            .map(|&(start, end)| &self.line[start as usize..end as usize])
    }

    /// Parse token `index` as a decimal integer.
    pub fn get_i32(&self, index: usize) -> Option<i32> {
        self.get(index)?.parse().ok()
    }

    /// Parse token `index` as a hexadecimal integer.
    pub fn get_hex(&self, index: usize) -> Option<u32> {
        let t = self.get(index)?;
        let t = t.strip_prefix("0x").unwrap_or(t);
        u32::from_str_radix(t, 16).ok()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        (0..self.len()).filter_map(|i| self.get(i))
    }

    /// The first token, e.g. `$OK` or `$ST`.
    pub fn head(&self) -> Option<&str> {
        self.get(0)
    }
}

/// One decoded line.
#[derive(Debug, Clone)]
pub struct ParsedLine {
    pub tokens: ResponseTokens,
    /// Sequence id, when the line carried one.
    pub seq: Option<u8>,
    /// `false` if a checksum was present and did not match.
    pub checksum_ok: bool,
}

/// Decode a complete line (terminator already stripped).
pub fn parse_line(line: &str) -> Result<ParsedLine, RapiError> {
    let line = line.trim();
    if !line.starts_with('$') {
        return Err(RapiError::InvalidResponse);
    }

    // Checksum suffix.
    let (body, checksum_ok) = match line.rfind('^') {
        Some(pos) => {
            let ck = u8::from_str_radix(&line[pos + 1..], 16)
                .map_err(|_| RapiError::InvalidResponse)?;
            (&line[..pos], checksum(line[..pos].as_bytes()) == ck)
        }
        None => (line, true),
    };

    let mut tokens = ResponseTokens::default();
    let _ = tokens.line.push_str(body);

    let mut seq = None;
    let bytes = tokens.line.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b' ' {
            i += 1;
            continue;
        }
        let start = i;
        while i < bytes.len() && bytes[i] != b' ' {
            i += 1;
        }
        let word = &tokens.line[start..i];
        if let Some(hex) = word.strip_prefix(':') {
            seq = Some(u8::from_str_radix(hex, 16).map_err(|_| RapiError::InvalidResponse)?);
            continue;
        }
        tokens
            .spans
            .push((start as u8, i as u8))
            .map_err(|_| RapiError::InvalidResponse)?;
    }

    // The head must name a command: `$` followed by letters only.
    match tokens.head().and_then(|h| h.strip_prefix('$')) {
        Some(name) if !name.is_empty() && name.bytes().all(|b| b.is_ascii_alphabetic()) => {}
        _ => return Err(RapiError::InvalidResponse),
    }

    Ok(ParsedLine {
        tokens,
        seq,
        checksum_ok,
    })
}
