//! Message codec for `;`-terminated segment framing

use bytes::{BufMut, BytesMut};
use lazy_static::lazy_static;
use regex::Regex;
use tokio_util::codec::{Decoder, Encoder};

use crate::messages::{Command, Response, TERMINATOR};

/// Maximum size of one unterminated segment (128 KiB)
///
/// The longest legitimate segment is an `OPEN:` URL of 8192 characters,
/// escaped at up to ten bytes per character.
pub const MAX_SEGMENT_SIZE: usize = 128 * 1024;

lazy_static! {
    static ref RESPONSE_REGEX: Regex = Regex::new(r"RES:(\d+);").unwrap();
}

/// Protocol codec error
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Segment too large: {size} bytes without terminator (max {max})")]
    SegmentTooLarge { size: usize, max: usize },

    #[error("Invalid response pid: {0}")]
    InvalidPid(String),
}

/// Read bytes as Latin-1, one char per byte
///
/// A conforming peer only ever sends 7-bit text.
fn latin1(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| char::from(b)).collect()
}

/// Codec for Command (encoding) and Response (decoding)
/// Used by the secondary instance
#[derive(Debug)]
pub struct ClientCodec;

impl ClientCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ClientCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ClientCodec {
    type Item = Response;
    type Error = CodecError;

    /// Match `RES:<pid>;` anywhere in the cumulative buffer
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let text = latin1(&src[..]);
        let Some(captures) = RESPONSE_REGEX.captures(&text) else {
            if src.len() > MAX_SEGMENT_SIZE {
                return Err(CodecError::SegmentTooLarge {
                    size: src.len(),
                    max: MAX_SEGMENT_SIZE,
                });
            }
            return Ok(None);
        };

        // Latin-1 keeps byte offsets and char offsets aligned
        let (end, digits) = match (captures.get(0), captures.get(1)) {
            (Some(whole), Some(digits)) => (whole.end(), digits.as_str().to_string()),
            _ => return Ok(None),
        };
        let _ = src.split_to(end);

        let pid = digits
            .parse::<u64>()
            .map_err(|_| CodecError::InvalidPid(digits))?;
        Ok(Some(Response { pid }))
    }
}

impl Encoder<Command> for ClientCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_segment(&item.to_string(), dst);
        Ok(())
    }
}

/// Codec for Response (encoding) and Command (decoding)
/// Used by the primary instance
#[derive(Debug)]
pub struct ServerCodec;

impl ServerCodec {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ServerCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl Decoder for ServerCodec {
    type Item = Command;
    type Error = CodecError;

    /// Split off the next complete segment, leaving the tail buffered
    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        let Some(pos) = src.iter().position(|&b| b == TERMINATOR as u8) else {
            if src.len() > MAX_SEGMENT_SIZE {
                return Err(CodecError::SegmentTooLarge {
                    size: src.len(),
                    max: MAX_SEGMENT_SIZE,
                });
            }
            return Ok(None);
        };

        let segment = src.split_to(pos + 1);
        let text = latin1(&segment[..pos]);
        Ok(Some(Command::parse(&text)))
    }
}

impl Encoder<Response> for ServerCodec {
    type Error = CodecError;

    fn encode(&mut self, item: Response, dst: &mut BytesMut) -> Result<(), Self::Error> {
        encode_segment(&item.to_string(), dst);
        Ok(())
    }
}

fn encode_segment(segment: &str, dst: &mut BytesMut) {
    dst.reserve(segment.len());
    dst.put_slice(segment.as_bytes());
}
