//! Ownership and delivery ends of one in-flight streamed request.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tokio::sync::mpsc;
use tokio_util::sync::{CancellationToken, WaitForCancellationFuture};

use crate::generation::Generation;

/// What a transport reports for one stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamSignal {
    /// A raw text fragment; line boundaries are arbitrary
    Data(String),
    /// The transport failed; the stream is over
    Error(String),
    /// The transport reached end of body
    Done,
}

/// A [`StreamSignal`] tagged with the generation that opened the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamMessage {
    pub generation: Generation,
    pub signal: StreamSignal,
}

/// Transport-side end of a stream.
///
/// Cloned freely into transport tasks. Once the paired [`StreamHandle`] is
/// cancelled, every delivery method becomes a no-op and returns `false`, so a
/// transport that keeps reading after cancellation cannot reach the session.
#[derive(Debug, Clone)]
pub struct StreamSink {
    generation: Generation,
    token: CancellationToken,
    sender: mpsc::UnboundedSender<StreamMessage>,
}

impl StreamSink {
    pub fn new(generation: Generation, sender: mpsc::UnboundedSender<StreamMessage>) -> Self {
        Self {
            generation,
            token: CancellationToken::new(),
            sender,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Creates the cancel handle for this stream.
    pub fn handle(&self) -> StreamHandle {
        StreamHandle {
            generation: self.generation,
            token: self.token.clone(),
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the stream has been cancelled.
    pub fn cancelled(&self) -> WaitForCancellationFuture<'_> {
        self.token.cancelled()
    }

    pub fn data(&self, fragment: impl Into<String>) -> bool {
        self.deliver(StreamSignal::Data(fragment.into()))
    }

    pub fn error(&self, message: impl Into<String>) -> bool {
        self.deliver(StreamSignal::Error(message.into()))
    }

    pub fn done(&self) -> bool {
        self.deliver(StreamSignal::Done)
    }

    fn deliver(&self, signal: StreamSignal) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        self.sender
            .send(StreamMessage {
                generation: self.generation,
                signal,
            })
            .is_ok()
    }
}

/// Owner-side end of a stream, exposing a single idempotent `cancel()`.
///
/// Dropping a handle does not cancel the stream; that is how a stream the
/// backend finished on its own is released.
#[derive(Debug)]
pub struct StreamHandle {
    generation: Generation,
    token: CancellationToken,
    cancelled: Arc<AtomicBool>,
}

impl StreamHandle {
    pub fn generation(&self) -> Generation {
        self.generation
    }

    /// Cancels the stream.
    ///
    /// Returns `true` only for the call that actually tore the stream down;
    /// repeated calls are no-ops.
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.token.cancel();
        tracing::debug!(generation = %self.generation, "stream cancelled");
        true
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}
