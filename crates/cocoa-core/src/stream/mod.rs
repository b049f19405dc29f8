//! Stream plumbing shared by the search and QA sessions.
//!
//! - `reassembler`: raw fragments → complete lines (`LineReassembler`)
//! - `decoder`: line → typed message, tolerant of malformed input (`decode_line`)
//! - `handle`: cancel handle and transport sink for one stream (`StreamHandle`, `StreamSink`)

mod decoder;
mod handle;
mod reassembler;

pub use decoder::{DecodeFailure, decode_line, decode_lines};
pub use handle::{StreamHandle, StreamMessage, StreamSignal, StreamSink};
pub use reassembler::{CompleteLines, LineReassembler};

/// What the owner should do with a stream after a session consumed an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamFlow {
    /// Keep the stream open
    Continue,
    /// The backend finished or suspended the stream; release the handle without cancelling
    Close,
    /// The event did not belong to the live state and changed nothing
    Ignored,
}
