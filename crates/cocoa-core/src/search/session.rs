//! Progressive search session state machine.
//!
//! `idle → searching → complete`, re-entering `searching` on every stage
//! event. The session holds no I/O; the owner opens streams and feeds decoded
//! [`StageEvent`]s back in, tagged with the generation they were opened for.

use serde::Serialize;
use std::collections::HashMap;

use crate::generation::Generation;
use crate::search::model::{Hit, SearchRequest, SearchResponse, Stage, StageEvent};
use crate::stream::StreamFlow;

/// Status shown while a stream is open and no stage has reported yet.
pub const SEARCHING_STATUS: &str = "Searching…";

/// Status shown once the backend reports the final stage.
pub const COMPLETE_STATUS: &str = "Search complete";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchPhase {
    #[default]
    Idle,
    Searching,
    Complete,
}

/// Stage latency at which each file was first observed in the current generation.
///
/// Entries are write-once; the index is only cleared when a new generation starts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FirstSeenIndex {
    entries: HashMap<String, u64>,
}

impl FirstSeenIndex {
    /// Records `latency_ms` for `file_id` unless it already has a value.
    ///
    /// # Returns
    /// `true` when this call created the entry.
    pub fn record(&mut self, file_id: &str, latency_ms: u64) -> bool {
        if self.entries.contains_key(file_id) {
            return false;
        }
        self.entries.insert(file_id.to_string(), latency_ms);
        true
    }

    pub fn get(&self, file_id: &str) -> Option<u64> {
        self.entries.get(file_id).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Accumulated search view exposed to observers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SearchState {
    pub phase: SearchPhase,
    pub query: String,
    /// Arrival order across all stages, not deduplicated
    pub hits: Vec<Hit>,
    pub first_seen: FirstSeenIndex,
    pub stage: Option<Stage>,
    pub status: String,
    pub error: bool,
    /// Latency of the most recent stage (or of the one-shot response)
    pub latency_ms: Option<u64>,
    /// Distinct file count reported by the backend, when it sends one
    pub total_hits: Option<usize>,
    pub rewritten_query: Option<String>,
    pub strategy: Option<String>,
    pub query_variants: Vec<String>,
}

impl SearchState {
    pub fn is_busy(&self) -> bool {
        self.phase == SearchPhase::Searching
    }
}

/// The search half of the session controller.
#[derive(Debug, Default)]
pub struct SearchSession {
    generation: Option<Generation>,
    state: SearchState,
}

impl SearchSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SearchState {
        &self.state
    }

    /// Generation the live state belongs to, if any.
    pub fn generation(&self) -> Option<Generation> {
        self.generation
    }

    /// Resets state for `generation` and builds the outbound request.
    ///
    /// # Arguments
    /// * `generation` - Freshly begun generation that owns the new state
    /// * `query` - Non-empty query text
    /// * `limit` - Result limit sent to the backend
    pub fn start(&mut self, generation: Generation, query: &str, limit: u32) -> SearchRequest {
        self.generation = Some(generation);
        self.state = SearchState {
            phase: SearchPhase::Searching,
            query: query.to_string(),
            status: SEARCHING_STATUS.to_string(),
            ..SearchState::default()
        };
        tracing::debug!(%generation, query, "search started");
        SearchRequest {
            query: query.to_string(),
            limit,
        }
    }

    /// Clears everything and returns to `idle`.
    pub fn reset(&mut self) {
        self.generation = None;
        self.state = SearchState::default();
    }

    /// Applies one stage event of `generation`.
    pub fn apply(&mut self, generation: Generation, event: StageEvent) -> StreamFlow {
        if !self.accepts(generation) {
            return StreamFlow::Ignored;
        }

        let StageEvent {
            stage,
            hits,
            done,
            latency_ms,
            total_hits,
        } = event;

        tracing::debug!(%generation, stage = stage.as_str(), hits = hits.len(), done, "stage event");

        let found_hits = !hits.is_empty();
        for hit in &hits {
            self.state.first_seen.record(&hit.file_id, latency_ms);
        }
        self.state.hits.extend(hits);
        self.state.latency_ms = Some(latency_ms);
        if total_hits.is_some() {
            self.state.total_hits = total_hits;
        }

        if done {
            self.state.stage = Some(stage);
            self.state.phase = SearchPhase::Complete;
            self.state.status = COMPLETE_STATUS.to_string();
            return StreamFlow::Close;
        }

        // An empty stage keeps the previous label.
        if found_hits {
            self.state.status = match stage.label() {
                Some(label) => label.to_string(),
                None => self.fallback_status(),
            };
        }
        self.state.stage = Some(stage);
        StreamFlow::Continue
    }

    /// Populates the state from a one-shot response in place of a stream.
    pub fn apply_response(&mut self, generation: Generation, response: SearchResponse) -> StreamFlow {
        if !self.accepts(generation) {
            return StreamFlow::Ignored;
        }

        let SearchResponse {
            hits,
            rewritten_query,
            strategy,
            latency_ms,
            query_variants,
        } = response;

        let latency = latency_ms.unwrap_or(0);
        for hit in &hits {
            self.state.first_seen.record(&hit.file_id, latency);
        }
        self.state.hits = hits;
        self.state.latency_ms = latency_ms;
        self.state.rewritten_query = rewritten_query;
        self.state.strategy = strategy;
        self.state.query_variants = query_variants;
        self.state.stage = Some(Stage::Complete);
        self.state.phase = SearchPhase::Complete;
        self.state.status = COMPLETE_STATUS.to_string();
        StreamFlow::Close
    }

    /// Ends the search of `generation` with an error status.
    pub fn fail(&mut self, generation: Generation, status: impl Into<String>) -> StreamFlow {
        if !self.accepts(generation) {
            return StreamFlow::Ignored;
        }
        self.state.phase = SearchPhase::Complete;
        self.state.error = true;
        self.state.status = status.into();
        StreamFlow::Close
    }

    /// The transport reached end of body without a `done` stage.
    pub fn stream_ended(&mut self, generation: Generation) -> StreamFlow {
        if !self.accepts(generation) {
            return StreamFlow::Ignored;
        }
        self.state.phase = SearchPhase::Complete;
        self.state.status = if self.state.hits.is_empty() {
            COMPLETE_STATUS.to_string()
        } else {
            self.fallback_status()
        };
        StreamFlow::Close
    }

    fn accepts(&self, generation: Generation) -> bool {
        self.generation == Some(generation) && self.state.phase == SearchPhase::Searching
    }

    fn fallback_status(&self) -> String {
        if self.state.hits.is_empty() {
            SEARCHING_STATUS.to_string()
        } else {
            format!("Found {} results", self.state.hits.len())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(stage: &str, files: &[&str], latency_ms: u64) -> StageEvent {
        StageEvent {
            stage: Stage::from(stage.to_string()),
            hits: files.iter().map(|id| Hit::new(*id)).collect(),
            done: false,
            latency_ms,
            total_hits: None,
        }
    }

    fn file_ids(state: &SearchState) -> Vec<&str> {
        state.hits.iter().map(|hit| hit.file_id.as_str()).collect()
    }

    #[test]
    fn test_first_seen_is_write_once() {
        let mut session = SearchSession::new();
        let generation = Generation::new(1);
        session.start(generation, "budget", 15);

        session.apply(generation, stage("filename", &["f1"], 10));
        session.apply(generation, stage("hybrid", &["f1"], 50));

        assert_eq!(session.state().first_seen.get("f1"), Some(10));
        assert_eq!(session.state().first_seen.len(), 1);
    }

    #[test]
    fn test_hits_accumulate_in_arrival_order_without_dedup() {
        let mut session = SearchSession::new();
        let generation = Generation::new(1);
        session.start(generation, "budget", 15);

        session.apply(generation, stage("filename", &["f1"], 5));
        session.apply(generation, stage("summary", &["f2"], 20));
        session.apply(generation, stage("hybrid", &["f1", "f3"], 80));

        assert_eq!(file_ids(session.state()), vec!["f1", "f2", "f1", "f3"]);
        assert_eq!(session.state().status, "Deep semantic search…");
        assert_eq!(session.state().phase, SearchPhase::Searching);
    }

    #[test]
    fn test_done_completes_and_closes() {
        let mut session = SearchSession::new();
        let generation = Generation::new(3);
        session.start(generation, "q", 15);

        let mut last = stage("complete", &[], 120);
        last.done = true;

        assert_eq!(session.apply(generation, last), StreamFlow::Close);
        assert_eq!(session.state().phase, SearchPhase::Complete);
        assert_eq!(session.state().status, COMPLETE_STATUS);
        assert!(!session.state().is_busy());
        assert_eq!(
            session.apply(generation, stage("hybrid", &["late"], 130)),
            StreamFlow::Ignored
        );
    }

    #[test]
    fn test_unknown_stage_uses_generic_label() {
        let mut session = SearchSession::new();
        let generation = Generation::new(1);
        session.start(generation, "q", 15);

        assert_eq!(
            session.apply(generation, stage("ocr", &[], 3)),
            StreamFlow::Continue
        );
        assert_eq!(session.state().status, SEARCHING_STATUS);

        session.apply(generation, stage("ocr", &["f1", "f2"], 9));
        assert_eq!(session.state().status, "Found 2 results");
        assert_eq!(session.state().stage, Some(Stage::Other("ocr".to_string())));
    }

    #[test]
    fn test_empty_stage_keeps_previous_label() {
        let mut session = SearchSession::new();
        let generation = Generation::new(1);
        session.start(generation, "q", 15);

        session.apply(generation, stage("filename", &["f1"], 5));
        assert_eq!(session.state().status, "Searching filenames…");

        session.apply(generation, stage("summary", &[], 20));
        assert_eq!(session.state().status, "Searching filenames…");
        assert_eq!(session.state().stage, Some(Stage::Summary));

        session.apply(generation, stage("hybrid", &["f2"], 40));
        assert_eq!(session.state().status, "Deep semantic search…");
    }

    #[test]
    fn test_stale_generation_is_ignored() {
        let mut session = SearchSession::new();
        session.start(Generation::new(1), "old", 15);
        session.start(Generation::new(2), "new", 15);

        assert_eq!(
            session.apply(Generation::new(1), stage("filename", &["stale"], 1)),
            StreamFlow::Ignored
        );
        assert_eq!(session.fail(Generation::new(1), "Error: boom"), StreamFlow::Ignored);
        assert!(session.state().hits.is_empty());
        assert!(!session.state().error);
        assert_eq!(session.state().query, "new");
    }

    #[test]
    fn test_transport_error_completes_with_error_status() {
        let mut session = SearchSession::new();
        let generation = Generation::new(1);
        session.start(generation, "q", 15);
        session.apply(generation, stage("filename", &["f1"], 4));

        assert_eq!(
            session.fail(generation, "Error: connection reset"),
            StreamFlow::Close
        );
        assert_eq!(session.state().phase, SearchPhase::Complete);
        assert!(session.state().error);
        assert_eq!(session.state().status, "Error: connection reset");
        assert_eq!(session.state().hits.len(), 1);
    }

    #[test]
    fn test_one_shot_response_populates_state() {
        let mut session = SearchSession::new();
        let generation = Generation::new(4);
        session.start(generation, "tax", 15);

        let response = SearchResponse {
            hits: vec![Hit::new("f1"), Hit::new("f2")],
            rewritten_query: Some("tax return".to_string()),
            strategy: Some("hybrid".to_string()),
            latency_ms: Some(33),
            query_variants: vec!["taxes".to_string()],
        };

        assert_eq!(session.apply_response(generation, response), StreamFlow::Close);
        let state = session.state();
        assert_eq!(state.phase, SearchPhase::Complete);
        assert_eq!(file_ids(state), vec!["f1", "f2"]);
        assert_eq!(state.first_seen.get("f2"), Some(33));
        assert_eq!(state.rewritten_query.as_deref(), Some("tax return"));
    }

    #[test]
    fn test_reset_returns_to_idle() {
        let mut session = SearchSession::new();
        let generation = Generation::new(1);
        session.start(generation, "q", 15);
        session.apply(generation, stage("filename", &["f1"], 2));

        session.reset();

        assert_eq!(session.state(), &SearchState::default());
        assert_eq!(session.generation(), None);
    }

    #[test]
    fn test_stream_end_without_done_stage() {
        let mut session = SearchSession::new();
        let generation = Generation::new(1);
        session.start(generation, "q", 15);
        session.apply(generation, stage("summary", &["f1"], 7));

        assert_eq!(session.stream_ended(generation), StreamFlow::Close);
        assert_eq!(session.state().phase, SearchPhase::Complete);
        assert_eq!(session.state().status, "Found 1 results");
    }
}
