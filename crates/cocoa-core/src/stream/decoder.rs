//! Tolerant line decoding.
//!
//! A line that fails to parse yields a [`DecodeFailure`] value rather than an
//! error that tears down the stream; the caller logs it and moves on.

use serde::de::DeserializeOwned;
use std::fmt;

/// Maximum number of characters of the offending line kept for diagnostics.
const EXCERPT_CHARS: usize = 120;

/// A single line that could not be decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeFailure {
    /// Leading part of the offending line
    pub excerpt: String,
    pub reason: String,
}

impl fmt::Display for DecodeFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (line: {:?})", self.reason, self.excerpt)
    }
}

impl std::error::Error for DecodeFailure {}

/// Decodes one reassembled line into a wire message.
pub fn decode_line<M: DeserializeOwned>(line: &str) -> Result<M, DecodeFailure> {
    serde_json::from_str(line.trim()).map_err(|err| DecodeFailure {
        excerpt: line.chars().take(EXCERPT_CHARS).collect(),
        reason: err.to_string(),
    })
}

/// Decodes a batch of lines, skipping blank ones.
pub fn decode_lines<M, I>(lines: I) -> impl Iterator<Item = Result<M, DecodeFailure>>
where
    M: DeserializeOwned,
    I: IntoIterator<Item = String>,
{
    lines
        .into_iter()
        .filter(|line| !line.trim().is_empty())
        .map(|line| decode_line(&line))
}
