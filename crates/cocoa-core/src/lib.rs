//! Domain layer of the Local Cocoa client.
//!
//! Wire models, stream plumbing and the two session state machines. Nothing
//! in this crate performs I/O; transports implement [`backend::SearchBackend`]
//! and feed [`stream::StreamSink`]s.

pub mod backend;
pub mod config;
pub mod error;
pub mod generation;
pub mod mode;
pub mod qa;
pub mod search;
pub mod stream;

// Re-export common error type
pub use error::{CocoaError, Result};

pub use backend::{BackendCapabilities, SearchBackend};
pub use config::ClientConfig;
pub use generation::{Generation, GenerationGuard};
pub use mode::Mode;
