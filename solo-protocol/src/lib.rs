//! solo-protocol: Wire definitions for instance-to-instance communication
//!
//! A secondary launch relays its intent to the primary instance as
//! `;`-terminated text segments over a local socket. This crate defines the
//! 7-bit payload escaping, the segment types, and the framing codecs for
//! both directions.

pub mod codec;
pub mod escape;
pub mod messages;

// Re-export main types at crate root
pub use codec::{ClientCodec, CodecError, ServerCodec, MAX_SEGMENT_SIZE};
pub use escape::{escape_to_7bit, unescape_from_7bit};
pub use messages::{Command, Response, MAX_START_URL_CHARS, SHOW_COMMAND};
