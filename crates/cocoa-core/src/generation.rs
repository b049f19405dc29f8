//! Generation guard: the single mechanism that makes late or out-of-order
//! stream delivery harmless.
//!
//! Every logical request (new query, mode switch, resume) begins a new
//! [`Generation`]. Work captured under an older generation is a no-op once a
//! newer one exists. The search and QA sessions share one guard, so switching
//! modes invalidates the other mode's stream as well.

use serde::Serialize;
use std::fmt;

use crate::stream::StreamHandle;

/// Monotonically increasing request id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Generation(u64);

impl Generation {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Owns the generation counter and the at-most-one active [`StreamHandle`].
#[derive(Debug, Default)]
pub struct GenerationGuard {
    counter: u64,
    active: Option<StreamHandle>,
}

impl GenerationGuard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts a new generation, cancelling the previous stream if one is active.
    pub fn begin_generation(&mut self) -> Generation {
        self.cancel_current_if_any();
        self.counter += 1;
        let generation = Generation(self.counter);
        tracing::debug!(%generation, "generation started");
        generation
    }

    /// The current generation, `None` before the first request.
    pub fn current(&self) -> Option<Generation> {
        (self.counter > 0).then_some(Generation(self.counter))
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.counter > 0 && generation.0 == self.counter
    }

    /// Cancels and discards the active stream. Returns whether one was active.
    pub fn cancel_current_if_any(&mut self) -> bool {
        match self.active.take() {
            Some(handle) => {
                handle.cancel();
                true
            }
            None => false,
        }
    }

    /// Registers the stream opened for the current generation.
    ///
    /// A handle from a superseded generation is cancelled on the spot.
    pub fn attach(&mut self, handle: StreamHandle) {
        if !self.is_current(handle.generation()) {
            tracing::debug!(generation = %handle.generation(), "cancelling stream opened for a stale generation");
            handle.cancel();
            return;
        }
        self.cancel_current_if_any();
        self.active = Some(handle);
    }

    /// Drops the active handle without cancelling it (the backend ended the stream).
    pub fn release(&mut self, generation: Generation) -> Option<StreamHandle> {
        match &self.active {
            Some(handle) if handle.generation() == generation => self.active.take(),
            _ => None,
        }
    }

    pub fn has_active_stream(&self) -> bool {
        self.active.is_some()
    }
}
