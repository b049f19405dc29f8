//! Session controller: the single owner of both sessions and the shared
//! generation guard.
//!
//! All effects (typed input, submits, transport deliveries, debounce timers,
//! one-shot fallback results) arrive as [`ControllerEvent`]s and are applied
//! one at a time by [`SessionController::handle_event`], so session logic never
//! runs concurrently with itself.
//!
//! # Event flow
//!
//! ```text
//! query_changed ─▶ DebouncedTrigger ─▶ Debounced ─┐
//! transport ─▶ StreamSink ─▶ Stream(Data|Error|Done) ─┼─▶ handle_event ─▶ SearchSession | QaSession ─▶ watch
//! backend.search ─▶ Fallback ─────────────────────┘
//! ```

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use cocoa_core::backend::SearchBackend;
use cocoa_core::config::ClientConfig;
use cocoa_core::error::{CocoaError, Result};
use cocoa_core::generation::{Generation, GenerationGuard};
use cocoa_core::mode::Mode;
use cocoa_core::qa::{QaEvent, QaRequest, QaSession, QaState};
use cocoa_core::search::{SearchResponse, SearchSession, SearchState, StageEvent};
use cocoa_core::stream::{
    DecodeFailure, LineReassembler, StreamFlow, StreamMessage, StreamSignal, StreamSink, decode_lines,
};

use crate::debounce::{DebouncedTrigger, Fired};

/// Everything the controller reacts to besides direct method calls.
#[derive(Debug)]
pub enum ControllerEvent {
    /// A transport delivery for the stream opened under `generation`
    Stream(StreamMessage),
    /// The typing quiet period elapsed
    Debounced(Fired<String>),
    /// Result of the one-shot search used when streaming is unavailable
    Fallback {
        generation: Generation,
        outcome: Result<SearchResponse>,
    },
}

impl From<Fired<String>> for ControllerEvent {
    fn from(fired: Fired<String>) -> Self {
        ControllerEvent::Debounced(fired)
    }
}

/// Read-only view published to observers after every change.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub mode: Mode,
    pub search: SearchState,
    pub qa: QaState,
    pub generation: Option<Generation>,
    /// The active mode's session is waiting on the backend
    pub busy: bool,
    /// Lines dropped because they could not be decoded
    pub decode_failures: u64,
}

impl SessionSnapshot {
    /// Status line of the active mode.
    pub fn status(&self) -> &str {
        match self.mode {
            Mode::Search => &self.search.status,
            Mode::Qa => &self.qa.status,
        }
    }
}

/// The stream currently feeding a session.
struct LiveStream {
    generation: Generation,
    mode: Mode,
    reassembler: LineReassembler,
}

/// Drives the search and QA sessions against a [`SearchBackend`].
pub struct SessionController {
    backend: Arc<dyn SearchBackend>,
    config: ClientConfig,
    mode: Mode,
    guard: GenerationGuard,
    search: SearchSession,
    qa: QaSession,
    live: Option<LiveStream>,
    fallback: Option<(Generation, JoinHandle<()>)>,
    debounce: DebouncedTrigger<String, ControllerEvent>,
    stream_tx: mpsc::UnboundedSender<StreamMessage>,
    stream_rx: mpsc::UnboundedReceiver<StreamMessage>,
    events_tx: mpsc::UnboundedSender<ControllerEvent>,
    events_rx: mpsc::UnboundedReceiver<ControllerEvent>,
    decode_failures: u64,
    snapshot_tx: watch::Sender<SessionSnapshot>,
}

impl SessionController {
    /// Creates an idle controller in search mode.
    ///
    /// # Arguments
    /// * `backend` - Transport used for every request
    /// * `config` - Limits and debounce delay
    pub fn new(backend: Arc<dyn SearchBackend>, config: ClientConfig) -> Self {
        let (stream_tx, stream_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        let debounce = DebouncedTrigger::new(config.debounce(), events_tx.clone());

        Self {
            backend,
            config,
            mode: Mode::Search,
            guard: GenerationGuard::new(),
            search: SearchSession::new(),
            qa: QaSession::new(),
            live: None,
            fallback: None,
            debounce,
            stream_tx,
            stream_rx,
            events_tx,
            events_rx,
            decode_failures: 0,
            snapshot_tx,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.mode,
            search: self.search.state().clone(),
            qa: self.qa.state().clone(),
            generation: self.guard.current(),
            busy: match self.mode {
                Mode::Search => self.search.state().is_busy(),
                Mode::Qa => self.qa.state().is_busy(),
            },
            decode_failures: self.decode_failures,
        }
    }

    /// Receives a snapshot after every state change.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot_tx.subscribe()
    }

    /// True while a stream, a fallback request or a debounce timer is outstanding.
    pub fn is_active(&self) -> bool {
        self.live.is_some() || self.fallback.is_some() || self.debounce.is_pending()
    }

    // ============================================================================
    // Commands
    // ============================================================================

    /// Reacts to edited query text.
    ///
    /// Leaves QA mode, forgets any pending decision and restarts the quiet
    /// period. Empty text resets the search immediately.
    pub fn query_changed(&mut self, text: &str) {
        self.debounce.cancel();
        if self.mode == Mode::Qa {
            self.switch_mode(Mode::Search);
        }
        self.qa.clear_pause();

        let query = text.trim();
        if query.is_empty() {
            self.invalidate();
            self.search.reset();
        } else {
            self.debounce.schedule(query.to_string());
        }
        self.publish();
    }

    /// Starts a progressive search immediately, bypassing the debounce.
    pub fn search_now(&mut self, text: &str) {
        self.debounce.cancel();
        if self.mode != Mode::Search {
            self.switch_mode(Mode::Search);
        }

        let query = text.trim();
        if query.is_empty() {
            self.invalidate();
            self.search.reset();
            self.publish();
            return;
        }

        let generation = self.invalidate();
        let request = self.search.start(generation, query, self.config.search_limit);
        tracing::info!(%generation, query, "search requested");

        let capabilities = self.backend.capabilities();
        if capabilities.is_unavailable() {
            self.search
                .fail(generation, CocoaError::TransportUnavailable.status_text());
        } else if capabilities.streaming {
            let sink = StreamSink::new(generation, self.stream_tx.clone());
            match self.backend.stream_search(request, sink) {
                Ok(handle) => {
                    self.guard.attach(handle);
                    self.live = Some(LiveStream::new(generation, Mode::Search));
                }
                Err(err) => {
                    tracing::warn!(%generation, error = %err, "failed to open search stream");
                    self.search.fail(generation, err.status_text());
                }
            }
        } else {
            self.spawn_fallback(generation, request);
        }
        self.publish();
    }

    /// Submits `text` as a fresh question and switches to QA mode.
    pub fn submit(&mut self, text: &str) {
        self.debounce.cancel();
        let query = text.trim();
        if query.is_empty() {
            return;
        }
        if self.mode != Mode::Qa {
            self.switch_mode(Mode::Qa);
        }

        let generation = self.invalidate();
        let request = self
            .qa
            .start(generation, query, None, self.config.qa_context_limit);
        tracing::info!(%generation, query, "question submitted");
        self.open_answer(generation, request);
        self.publish();
    }

    /// Continues a paused answer with its stored resume token.
    ///
    /// Returns `false` when there is nothing to resume.
    pub fn resume(&mut self) -> bool {
        if !self.qa.can_resume() {
            return false;
        }
        self.debounce.cancel();
        if self.mode != Mode::Qa {
            self.switch_mode(Mode::Qa);
        }

        let generation = self.invalidate();
        let Some(request) = self.qa.resume(generation, self.config.qa_context_limit) else {
            return false;
        };
        tracing::info!(%generation, "resuming paused answer");
        self.open_answer(generation, request);
        self.publish();
        true
    }

    /// Continues an answer paused in an earlier process, given its token.
    pub fn resume_with(&mut self, text: &str, resume_token: &str) {
        self.debounce.cancel();
        if self.mode != Mode::Qa {
            self.switch_mode(Mode::Qa);
        }

        let generation = self.invalidate();
        let request = self.qa.start(
            generation,
            text.trim(),
            Some(resume_token.to_string()),
            self.config.qa_context_limit,
        );
        tracing::info!(%generation, "resuming answer from token");
        self.open_answer(generation, request);
        self.publish();
    }

    /// Switches the active mode, invalidating whatever was in flight.
    pub fn set_mode(&mut self, mode: Mode) {
        if mode == self.mode {
            return;
        }
        self.debounce.cancel();
        self.switch_mode(mode);
        self.publish();
    }

    /// Cancels everything and clears both sessions.
    pub fn close(&mut self) {
        self.debounce.cancel();
        self.invalidate();
        self.search.reset();
        self.qa.reset();
        tracing::debug!("session closed");
        self.publish();
    }

    // ============================================================================
    // Event loop
    // ============================================================================

    /// Waits for the next transport delivery, timer or fallback result.
    pub async fn next_event(&mut self) -> Option<ControllerEvent> {
        tokio::select! {
            Some(message) = self.stream_rx.recv() => Some(ControllerEvent::Stream(message)),
            Some(event) = self.events_rx.recv() => Some(event),
            else => None,
        }
    }

    /// Applies one event. Failures end up as status text, never as errors.
    pub fn handle_event(&mut self, event: ControllerEvent) {
        match event {
            ControllerEvent::Stream(message) => self.handle_stream(message),
            ControllerEvent::Debounced(fired) => {
                if let Some(query) = self.debounce.accept(fired) {
                    self.search_now(&query);
                }
            }
            ControllerEvent::Fallback {
                generation,
                outcome,
            } => self.handle_fallback(generation, outcome),
        }
        self.publish();
    }

    /// Applies every event already queued, without waiting.
    ///
    /// Transport deliveries are taken before timers and fallback results.
    pub fn drain_pending(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let event = match self.stream_rx.try_recv() {
                Ok(message) => ControllerEvent::Stream(message),
                Err(_) => match self.events_rx.try_recv() {
                    Ok(event) => event,
                    Err(_) => break,
                },
            };
            self.handle_event(event);
            applied += 1;
        }
        applied
    }

    /// Processes events until no stream, fallback or timer is outstanding.
    pub async fn run_until_settled(&mut self) -> SessionSnapshot {
        while self.is_active() {
            match self.next_event().await {
                Some(event) => self.handle_event(event),
                None => break,
            }
        }
        self.snapshot()
    }

    fn handle_stream(&mut self, message: StreamMessage) {
        let StreamMessage { generation, signal } = message;

        let Some(live) = self.live.as_mut() else {
            tracing::trace!(%generation, "discarding delivery with no live stream");
            return;
        };
        if live.generation != generation || !self.guard.is_current(generation) {
            tracing::debug!(%generation, "discarding stale delivery");
            return;
        }
        let mode = live.mode;

        match signal {
            StreamSignal::Data(fragment) => {
                let lines: Vec<String> = live.reassembler.feed(&fragment).collect();
                self.apply_lines(generation, mode, lines);
            }
            StreamSignal::Done => {
                let tail = live.reassembler.finish();
                self.apply_lines(generation, mode, tail);
                if self.is_live(generation) {
                    let flow = match mode {
                        Mode::Search => self.search.stream_ended(generation),
                        Mode::Qa => self.qa.stream_ended(generation),
                    };
                    tracing::debug!(%generation, ?flow, "stream ended without a terminal event");
                    self.finish_stream(generation);
                }
            }
            StreamSignal::Error(reason) => {
                tracing::warn!(%generation, %reason, "stream error");
                let status = format!("Error: {}", reason);
                match mode {
                    Mode::Search => self.search.fail(generation, status),
                    Mode::Qa => self.qa.fail(generation, status),
                };
                self.finish_stream(generation);
            }
        }
    }

    fn apply_lines<I>(&mut self, generation: Generation, mode: Mode, lines: I)
    where
        I: IntoIterator<Item = String>,
    {
        match mode {
            Mode::Search => {
                for decoded in decode_lines::<StageEvent, _>(lines) {
                    let flow = match decoded {
                        Ok(event) => self.search.apply(generation, event),
                        Err(failure) => {
                            self.record_decode_failure(generation, &failure);
                            continue;
                        }
                    };
                    if flow == StreamFlow::Close {
                        self.finish_stream(generation);
                        break;
                    }
                }
            }
            Mode::Qa => {
                for decoded in decode_lines::<QaEvent, _>(lines) {
                    let flow = match decoded {
                        Ok(event) => self.qa.apply(generation, event),
                        Err(failure) => {
                            self.record_decode_failure(generation, &failure);
                            continue;
                        }
                    };
                    if flow == StreamFlow::Close {
                        self.finish_stream(generation);
                        break;
                    }
                }
            }
        }
    }

    fn handle_fallback(&mut self, generation: Generation, outcome: Result<SearchResponse>) {
        let pending = self.fallback.as_ref().map(|(pending, _)| *pending);
        if pending != Some(generation) || !self.guard.is_current(generation) {
            tracing::debug!(%generation, "discarding stale fallback result");
            return;
        }
        self.fallback = None;
        match outcome {
            Ok(response) => {
                tracing::debug!(%generation, hits = response.hits.len(), "fallback search finished");
                self.search.apply_response(generation, response);
            }
            Err(err) => {
                tracing::warn!(%generation, error = %err, "fallback search failed");
                self.search.fail(generation, err.status_text());
            }
        }
    }

    // ============================================================================
    // Internals
    // ============================================================================

    /// Begins a new generation: cancels the live stream and any fallback request.
    fn invalidate(&mut self) -> Generation {
        self.live = None;
        if let Some((_, task)) = self.fallback.take() {
            task.abort();
        }
        self.guard.begin_generation()
    }

    /// Leaves the current mode; a session interrupted mid-request is cleared.
    fn switch_mode(&mut self, mode: Mode) {
        tracing::debug!(from = %self.mode, to = %mode, "mode switch");
        match self.mode {
            Mode::Search if self.search.state().is_busy() => self.search.reset(),
            Mode::Qa if self.qa.state().is_busy() => self.qa.reset(),
            _ => {}
        }
        self.mode = mode;
        self.invalidate();
    }

    fn open_answer(&mut self, generation: Generation, request: QaRequest) {
        if !self.backend.capabilities().streaming {
            self.qa
                .fail(generation, CocoaError::TransportUnavailable.status_text());
            return;
        }
        let sink = StreamSink::new(generation, self.stream_tx.clone());
        match self.backend.stream_answer(request, sink) {
            Ok(handle) => {
                self.guard.attach(handle);
                self.live = Some(LiveStream::new(generation, Mode::Qa));
            }
            Err(err) => {
                tracing::warn!(%generation, error = %err, "failed to open answer stream");
                self.qa.fail(generation, err.status_text());
            }
        }
    }

    fn spawn_fallback(&mut self, generation: Generation, request: cocoa_core::search::SearchRequest) {
        let backend = Arc::clone(&self.backend);
        let events = self.events_tx.clone();
        let task = tokio::spawn(async move {
            let outcome = backend.search(request).await;
            let _ = events.send(ControllerEvent::Fallback {
                generation,
                outcome,
            });
        });
        self.fallback = Some((generation, task));
    }

    fn is_live(&self, generation: Generation) -> bool {
        self.live
            .as_ref()
            .is_some_and(|live| live.generation == generation)
    }

    /// The backend ended the stream itself: release without cancelling.
    fn finish_stream(&mut self, generation: Generation) {
        if self.is_live(generation) {
            self.live = None;
        }
        self.guard.release(generation);
    }

    fn record_decode_failure(&mut self, generation: Generation, failure: &DecodeFailure) {
        self.decode_failures += 1;
        tracing::warn!(
            target: "cocoa::decode",
            %generation,
            reason = %failure.reason,
            line = %failure.excerpt,
            "dropping undecodable line"
        );
    }

    fn publish(&self) {
        self.snapshot_tx.send_replace(self.snapshot());
    }
}

impl LiveStream {
    fn new(generation: Generation, mode: Mode) -> Self {
        Self {
            generation,
            mode,
            reassembler: LineReassembler::new(),
        }
    }
}

impl Drop for SessionController {
    fn drop(&mut self) {
        self.guard.cancel_current_if_any();
        if let Some((_, task)) = self.fallback.take() {
            task.abort();
        }
    }
}
