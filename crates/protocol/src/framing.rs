//! Newline-delimited JSON line codec.
//!
//! # Line Format
//!
//! Each message is one [`Envelope`] serialized as a single line of JSON
//! followed by `\n`. JSON escapes embedded newlines, so a line never spans
//! more than one message. Lines are capped at [`MAX_LINE_SIZE`] bytes
//! including the terminator.

use crate::error::{ProtocolError, Result};
use crate::messages::Envelope;

/// Maximum line size (16 MB).
pub const MAX_LINE_SIZE: usize = 16 * 1024 * 1024;

/// Encode an envelope as a terminated JSON line.
pub fn encode_line(envelope: &Envelope) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(envelope)?;
    bytes.push(b'\n');

    if bytes.len() > MAX_LINE_SIZE {
        return Err(ProtocolError::LineTooLarge {
            size: bytes.len(),
            max: MAX_LINE_SIZE,
        });
    }

    Ok(bytes)
}

/// Decode one line (with or without its terminator) into an envelope.
pub fn decode_line(line: &[u8]) -> Result<Envelope> {
    if line.len() > MAX_LINE_SIZE {
        return Err(ProtocolError::LineTooLarge {
            size: line.len(),
            max: MAX_LINE_SIZE,
        });
    }

    let trimmed = trim_line_ending(line);
    Ok(serde_json::from_slice(trimmed)?)
}

fn trim_line_ending(line: &[u8]) -> &[u8] {
    let line = line.strip_suffix(b"\n").unwrap_or(line);
    line.strip_suffix(b"\r").unwrap_or(line)
}
