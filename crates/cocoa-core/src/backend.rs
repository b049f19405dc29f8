//! Backend trait: the transport seam between the sessions and the retrieval service.

use async_trait::async_trait;

use crate::error::Result;
use crate::qa::model::QaRequest;
use crate::search::model::{SearchRequest, SearchResponse};
use crate::stream::{StreamHandle, StreamSink};

/// What the connected backend can do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackendCapabilities {
    /// Streamed search and QA endpoints are reachable
    pub streaming: bool,
    /// The one-shot search endpoint is reachable
    pub one_shot: bool,
}

impl BackendCapabilities {
    pub const fn full() -> Self {
        Self {
            streaming: true,
            one_shot: true,
        }
    }

    pub const fn none() -> Self {
        Self {
            streaming: false,
            one_shot: false,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        !self.streaming && !self.one_shot
    }
}

/// Transport for progressive search and agent QA.
///
/// Streaming calls return immediately with a [`StreamHandle`]; the body is
/// delivered asynchronously through the supplied [`StreamSink`] as raw text
/// fragments followed by exactly one `done` or `error` signal.
#[async_trait]
pub trait SearchBackend: Send + Sync {
    fn capabilities(&self) -> BackendCapabilities;

    /// Opens a progressive search stream (newline-delimited stage events).
    ///
    /// # Arguments
    /// * `request` - Query text and result limit
    /// * `sink` - Delivery end tagged with the caller's generation
    ///
    /// # Returns
    /// The cancel handle for the stream.
    fn stream_search(&self, request: SearchRequest, sink: StreamSink) -> Result<StreamHandle>;

    /// Opens an agent QA stream (newline-delimited tagged events).
    fn stream_answer(&self, request: QaRequest, sink: StreamSink) -> Result<StreamHandle>;

    /// Runs a single non-streaming search.
    async fn search(&self, request: SearchRequest) -> Result<SearchResponse>;
}
