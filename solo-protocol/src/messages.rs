//! Instance-to-instance message types
//!
//! A secondary instance sends commands of the form `<TAG>:<payload>;` and the
//! primary answers with `RES:<pid>;`.

use std::fmt;

use crate::escape::{escape_to_7bit, unescape_from_7bit};

/// Tag of an external command such as `show`
pub const CMD_TAG: &str = "CMD:";
/// Tag of a file path handed to the primary
pub const SEND_TAG: &str = "SEND:";
/// Tag of a URL the primary should open
pub const OPEN_TAG: &str = "OPEN:";
/// Tag of the primary's response
pub const RES_TAG: &str = "RES:";
/// Segment terminator
pub const TERMINATOR: char = ';';

/// The only external command with defined behavior
pub const SHOW_COMMAND: &str = "show";

/// Upper bound on a decoded start URL, in characters
pub const MAX_START_URL_CHARS: usize = 8192;

/// Commands sent from a secondary instance to the primary
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `CMD:show` - bring the primary window forward
    Show,
    /// Any other `CMD:` name; acknowledged but performs nothing
    Exec(String),
    /// Queue a file path for the primary's file-open handler
    Send(String),
    /// Open a URL in the primary
    Open(String),
    /// Segment with an unrecognized tag
    Unknown(String),
}

impl Command {
    /// Classify one segment (without its terminator)
    pub fn parse(segment: &str) -> Self {
        if let Some(payload) = segment.strip_prefix(CMD_TAG) {
            let name = unescape_from_7bit(payload);
            if name == SHOW_COMMAND {
                Command::Show
            } else {
                Command::Exec(name)
            }
        } else if let Some(payload) = segment.strip_prefix(SEND_TAG) {
            Command::Send(unescape_from_7bit(payload))
        } else if let Some(payload) = segment.strip_prefix(OPEN_TAG) {
            let url = unescape_from_7bit(payload);
            Command::Open(truncate_chars(url, MAX_START_URL_CHARS))
        } else {
            Command::Unknown(segment.to_string())
        }
    }
}

impl fmt::Display for Command {
    /// Wire form, terminator included
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Show => write!(f, "{}{}{}", CMD_TAG, SHOW_COMMAND, TERMINATOR),
            Command::Exec(name) => write!(f, "{}{}{}", CMD_TAG, escape_to_7bit(name), TERMINATOR),
            Command::Send(path) => write!(f, "{}{}{}", SEND_TAG, escape_to_7bit(path), TERMINATOR),
            Command::Open(url) => write!(f, "{}{}{}", OPEN_TAG, escape_to_7bit(url), TERMINATOR),
            Command::Unknown(segment) => write!(f, "{}{}", segment, TERMINATOR),
        }
    }
}

fn truncate_chars(text: String, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((byte_index, _)) => text[..byte_index].to_string(),
        None => text,
    }
}

/// Response sent from the primary to a secondary instance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Response {
    /// Process id of the primary, or [`Response::NO_ACTIVATION`]
    pub pid: u64,
}

impl Response {
    /// Sentinel meaning "no activation performed, do not activate"
    pub const NO_ACTIVATION: u64 = 0;

    /// Response carrying the primary's own pid
    pub fn activate(pid: u64) -> Self {
        Self { pid }
    }

    /// Response telling the secondary not to activate anything
    pub fn no_activation() -> Self {
        Self {
            pid: Self::NO_ACTIVATION,
        }
    }

    /// Whether the secondary should bring `pid` forward
    pub fn requires_activation(&self) -> bool {
        self.pid != Self::NO_ACTIVATION
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", RES_TAG, self.pid, TERMINATOR)
    }
}
