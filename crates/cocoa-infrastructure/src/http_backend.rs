//! HTTP transport for the local retrieval backend.
//!
//! Streamed endpoints answer with newline-delimited JSON. The body is pumped
//! into a [`StreamSink`] by a spawned task that races the body against the
//! sink's cancellation, so cancelling a handle also drops the connection.

use async_trait::async_trait;
use futures::StreamExt;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Serialize;
use uuid::Uuid;

use cocoa_core::backend::{BackendCapabilities, SearchBackend};
use cocoa_core::config::ClientConfig;
use cocoa_core::error::{CocoaError, Result};
use cocoa_core::qa::QaRequest;
use cocoa_core::search::{SearchRequest, SearchResponse};
use cocoa_core::stream::{StreamHandle, StreamSink};

const REQUEST_ID_HEADER: &str = "x-request-id";

/// [`SearchBackend`] over HTTP using reqwest.
#[derive(Debug, Clone)]
pub struct HttpSearchBackend {
    client: Client,
    config: ClientConfig,
}

impl HttpSearchBackend {
    /// Creates a backend for `config.backend_url`.
    ///
    /// Only the connect phase is time-limited; streamed bodies may stay open
    /// as long as the backend keeps producing.
    pub fn new(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout())
            .build()
            .map_err(|err| CocoaError::config(format!("Failed to build HTTP client: {}", err)))?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn post<B: Serialize>(&self, path: &str, body: &B) -> (RequestBuilder, String) {
        let request_id = Uuid::new_v4().to_string();
        let builder = self
            .client
            .post(self.config.endpoint_url(path))
            .header(REQUEST_ID_HEADER, &request_id)
            .json(body);
        (builder, request_id)
    }

    fn open_stream<B: Serialize>(&self, path: &str, body: &B, sink: StreamSink) -> Result<StreamHandle> {
        let runtime = tokio::runtime::Handle::try_current()
            .map_err(|_| CocoaError::internal("HTTP streaming requires a Tokio runtime"))?;

        let (request, request_id) = self.post(path, body);
        let handle = sink.handle();
        tracing::debug!(generation = %sink.generation(), request_id, path, "opening stream");

        runtime.spawn(pump(request, sink, request_id));
        Ok(handle)
    }
}

#[async_trait]
impl SearchBackend for HttpSearchBackend {
    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            streaming: self.config.streaming,
            one_shot: true,
        }
    }

    fn stream_search(&self, request: SearchRequest, sink: StreamSink) -> Result<StreamHandle> {
        self.open_stream(&self.config.endpoints.search_stream, &request, sink)
    }

    fn stream_answer(&self, request: QaRequest, sink: StreamSink) -> Result<StreamHandle> {
        self.open_stream(&self.config.endpoints.qa_stream, &request, sink)
    }

    async fn search(&self, request: SearchRequest) -> Result<SearchResponse> {
        let (builder, request_id) = self.post(&self.config.endpoints.search, &request);
        tracing::debug!(request_id, query = %request.query, "one-shot search");

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let response = ensure_success(response).await?;
        response
            .json::<SearchResponse>()
            .await
            .map_err(|err| CocoaError::decode(format!("Failed to parse search response: {}", err)))
    }
}

/// Forwards one response body into `sink` until it ends, fails or is cancelled.
async fn pump(request: RequestBuilder, sink: StreamSink, request_id: String) {
    tokio::select! {
        _ = sink.cancelled() => {
            tracing::debug!(request_id, "stream cancelled, dropping connection");
        }
        outcome = forward(request, &sink) => match outcome {
            Ok(()) => {
                sink.done();
            }
            Err(err) => {
                tracing::warn!(request_id, error = %err, "stream failed");
                sink.error(err.message());
            }
        }
    }
}

async fn forward(request: RequestBuilder, sink: &StreamSink) -> Result<()> {
    let response = request.send().await.map_err(map_reqwest_error)?;
    let response = ensure_success(response).await?;

    let mut body = response.bytes_stream();
    let mut text = Utf8Fragments::default();
    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(map_reqwest_error)?;
        let fragment = text.push(&chunk);
        if !fragment.is_empty() && !sink.data(fragment) {
            return Ok(());
        }
    }
    if let Some(rest) = text.finish() {
        sink.data(rest);
    }
    Ok(())
}

async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(CocoaError::http(status.as_u16(), error_message(status, &body)))
}

/// Extracts a readable message from an error body (`{"detail": ...}` or plain text).
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(detail) = value
            .get("detail")
            .or_else(|| value.get("message"))
            .and_then(serde_json::Value::as_str)
        {
            return detail.to_string();
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        trimmed.to_string()
    }
}

fn map_reqwest_error(err: reqwest::Error) -> CocoaError {
    if err.is_connect() {
        CocoaError::transport(format!("Cannot reach backend: {}", err))
    } else if err.is_timeout() {
        CocoaError::transport(format!("Backend timed out: {}", err))
    } else {
        CocoaError::transport(err.to_string())
    }
}

/// Decodes byte chunks to text without splitting multi-byte characters.
#[derive(Debug, Default)]
struct Utf8Fragments {
    pending: Vec<u8>,
}

impl Utf8Fragments {
    /// Returns every complete character received so far.
    ///
    /// Invalid bytes become U+FFFD; an incomplete sequence at the end is held
    /// for the next chunk.
    fn push(&mut self, bytes: &[u8]) -> String {
        self.pending.extend_from_slice(bytes);
        let mut text = String::with_capacity(self.pending.len());
        let mut input = self.pending.as_slice();
        loop {
            match std::str::from_utf8(input) {
                Ok(valid) => {
                    text.push_str(valid);
                    input = &[];
                    break;
                }
                Err(err) => {
                    let (valid, rest) = input.split_at(err.valid_up_to());
                    text.push_str(&String::from_utf8_lossy(valid));
                    match err.error_len() {
                        Some(invalid) => {
                            text.push(char::REPLACEMENT_CHARACTER);
                            input = &rest[invalid..];
                        }
                        None => {
                            input = rest;
                            break;
                        }
                    }
                }
            }
        }
        self.pending = input.to_vec();
        text
    }

    fn finish(&mut self) -> Option<String> {
        if self.pending.is_empty() {
            return None;
        }
        let bytes = std::mem::take(&mut self.pending);
        Some(String::from_utf8_lossy(&bytes).into_owned())
    }
}
