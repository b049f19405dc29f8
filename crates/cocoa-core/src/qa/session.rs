//! Resumable agent-QA session state machine.
//!
//! `idle → searching → analyzing → synthesizing → done`, with
//! `paused_for_decision` reachable from every active phase and `error` from
//! anywhere. A resume begins a new generation that keeps appending to the
//! answer collected before the pause.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::generation::Generation;
use crate::qa::model::{ChunkAnalysisItem, ChunkProgress, QaEvent, QaRequest, ThinkingStep};
use crate::search::model::Hit;
use crate::stream::StreamFlow;

static ANALYZING_CHUNKS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^analyzing_(\d+)_chunks$").expect("valid regex"));

static SEARCHING_SUBQUERY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^searching_subquery_(\d+)_of_(\d+)$").expect("valid regex"));

const DECISION_STATUS: &str = "Waiting for your decision…";
const DONE_STATUS: &str = "Answer complete";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum QaPhase {
    #[default]
    Idle,
    Searching,
    Analyzing,
    Synthesizing,
    Done,
    PausedForDecision,
    Error,
}

impl QaPhase {
    /// Whether a stream is expected to be feeding this phase.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            QaPhase::Searching | QaPhase::Analyzing | QaPhase::Synthesizing
        )
    }
}

/// Accumulated QA view exposed to observers.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QaState {
    pub phase: QaPhase,
    pub query: String,
    /// Sources of the answer, replaced wholesale by each `hits` event
    pub hits: Vec<Hit>,
    /// Append-only within a generation; preserved across a resume
    pub answer: Option<String>,
    pub status: String,
    pub paused: bool,
    pub resume_token: Option<String>,
    pub error: bool,
    pub thinking_steps: Vec<ThinkingStep>,
}

impl QaState {
    pub fn is_busy(&self) -> bool {
        self.phase.is_active()
    }
}

/// The QA half of the session controller.
#[derive(Debug, Default)]
pub struct QaSession {
    generation: Option<Generation>,
    state: QaState,
}

impl QaSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &QaState {
        &self.state
    }

    pub fn generation(&self) -> Option<Generation> {
        self.generation
    }

    /// True when paused with a stored resume token.
    pub fn can_resume(&self) -> bool {
        self.state.paused && self.state.resume_token.is_some()
    }

    /// Starts (or resumes) a question under `generation`.
    ///
    /// # Arguments
    /// * `generation` - Freshly begun generation that owns the state from now on
    /// * `query` - Question text
    /// * `resume_token` - `Some` to continue a paused answer, `None` for a fresh question
    /// * `context_limit` - `contextLimit` sent to the backend
    ///
    /// # Returns
    /// The outbound request for the stream.
    pub fn start(
        &mut self,
        generation: Generation,
        query: &str,
        resume_token: Option<String>,
        context_limit: u32,
    ) -> QaRequest {
        self.generation = Some(generation);

        if resume_token.is_some() {
            // Answer, hits and reasoning trail carry over into the new generation.
            self.state.query = query.to_string();
            self.state.phase = QaPhase::Searching;
            self.state.paused = false;
            self.state.resume_token = None;
            self.state.error = false;
            self.state.status = "Resuming…".to_string();
            tracing::debug!(%generation, "qa resumed");
        } else {
            self.state = QaState {
                phase: QaPhase::Searching,
                query: query.to_string(),
                status: "Searching your files…".to_string(),
                ..QaState::default()
            };
            tracing::debug!(%generation, query, "qa started");
        }

        QaRequest::new(query)
            .with_context_limit(context_limit)
            .with_resume_token(resume_token)
    }

    /// Re-issues the paused question with its stored resume token.
    ///
    /// Returns `None` (and changes nothing) unless the session is paused.
    pub fn resume(&mut self, generation: Generation, context_limit: u32) -> Option<QaRequest> {
        if !self.can_resume() {
            return None;
        }
        let token = self.state.resume_token.clone();
        let query = self.state.query.clone();
        Some(self.start(generation, &query, token, context_limit))
    }

    /// Forgets a pending decision.
    pub fn clear_pause(&mut self) {
        self.state.paused = false;
        self.state.resume_token = None;
        if self.state.phase == QaPhase::PausedForDecision {
            self.state.phase = QaPhase::Idle;
        }
    }

    pub fn reset(&mut self) {
        self.generation = None;
        self.state = QaState::default();
    }

    /// Applies one decoded event of `generation`.
    pub fn apply(&mut self, generation: Generation, event: QaEvent) -> StreamFlow {
        if !self.accepts(generation) {
            return StreamFlow::Ignored;
        }

        tracing::debug!(%generation, kind = event.kind(), "qa event");

        match event {
            QaEvent::Token(text) => {
                self.state
                    .answer
                    .get_or_insert_with(String::new)
                    .push_str(&text);
                self.state.phase = QaPhase::Synthesizing;
                StreamFlow::Continue
            }
            QaEvent::Hits(hits) => {
                self.state.status = format!("{} sources found.", hits.len());
                self.state.hits = hits;
                StreamFlow::Continue
            }
            QaEvent::Status(label) => match status_display(&label) {
                Some((text, phase)) => {
                    self.state.status = text;
                    if let Some(phase) = phase {
                        self.state.phase = phase;
                    }
                    StreamFlow::Continue
                }
                None => {
                    tracing::debug!(%generation, label, "unrecognized qa status");
                    StreamFlow::Ignored
                }
            },
            QaEvent::ChunkAnalysisItem(item) => {
                if let Some(progress) = item.progress {
                    self.state.status = progress_status(progress);
                }
                self.merge_analysis(&item, true);
                StreamFlow::Continue
            }
            QaEvent::ChunkAnalysis(items) => {
                for item in &items {
                    self.merge_analysis(item, false);
                }
                StreamFlow::Continue
            }
            QaEvent::ChunkProgress(progress) => {
                self.apply_chunk_progress(progress);
                StreamFlow::Continue
            }
            QaEvent::ThinkingStep(step) => {
                match self
                    .state
                    .thinking_steps
                    .iter_mut()
                    .find(|existing| existing.id == step.id)
                {
                    Some(existing) => *existing = step,
                    None => self.state.thinking_steps.push(step),
                }
                StreamFlow::Continue
            }
            QaEvent::UserDecisionRequired {
                message,
                resume_token,
            } => {
                self.state.phase = QaPhase::PausedForDecision;
                self.state.paused = true;
                self.state.resume_token = Some(resume_token);
                self.state.status = message.unwrap_or_else(|| DECISION_STATUS.to_string());
                StreamFlow::Close
            }
            QaEvent::Error(text) => {
                self.enter_error(format!("Error: {}", text));
                StreamFlow::Close
            }
            QaEvent::Done(message) => {
                self.state.phase = QaPhase::Done;
                self.state.status = message.unwrap_or_else(|| DONE_STATUS.to_string());
                StreamFlow::Close
            }
            QaEvent::Unknown(tag) => {
                tracing::debug!(%generation, tag, "ignoring qa event");
                StreamFlow::Ignored
            }
        }
    }

    /// Ends the stream of `generation` with an error status.
    pub fn fail(&mut self, generation: Generation, status: impl Into<String>) -> StreamFlow {
        if !self.accepts(generation) {
            return StreamFlow::Ignored;
        }
        self.enter_error(status.into());
        StreamFlow::Close
    }

    /// The transport reached end of body without a terminal event.
    pub fn stream_ended(&mut self, generation: Generation) -> StreamFlow {
        if !self.accepts(generation) {
            return StreamFlow::Ignored;
        }
        self.state.phase = QaPhase::Done;
        StreamFlow::Close
    }

    fn accepts(&self, generation: Generation) -> bool {
        self.generation == Some(generation) && self.state.phase.is_active()
    }

    fn enter_error(&mut self, status: String) {
        self.state.phase = QaPhase::Error;
        self.state.error = true;
        self.state.status = status;
    }

    fn apply_chunk_progress(&mut self, progress: ChunkProgress) {
        let fraction = progress.fraction();
        if let Some(fraction) = fraction {
            self.state.status = progress_status(fraction);
        }
        self.state.phase = QaPhase::Analyzing;

        if let Some(mut item) = progress.chunk_result {
            if item.progress.is_none() {
                item.progress = fraction;
            }
            self.merge_analysis(&item, true);
        }
    }

    /// Merges one analysis item onto the hit it targets.
    ///
    /// With `by_chunk_id`, a chunk id match wins over the 1-based index.
    fn merge_analysis(&mut self, item: &ChunkAnalysisItem, by_chunk_id: bool) {
        let hits = &mut self.state.hits;

        let by_chunk = if by_chunk_id {
            item.chunk_id.as_deref().and_then(|chunk_id| {
                hits.iter()
                    .position(|hit| hit.chunk_id.as_deref() == Some(chunk_id))
            })
        } else {
            None
        };
        let position = by_chunk.or_else(|| {
            item.index
                .filter(|index| (1..=hits.len()).contains(index))
                .map(|index| index - 1)
        });

        let Some(hit) = position.and_then(|position| hits.get_mut(position)) else {
            tracing::debug!(index = ?item.index, chunk_id = ?item.chunk_id, "analysis item matched no hit");
            return;
        };

        if let Some(comment) = &item.comment {
            hit.analysis_comment = Some(comment.clone());
        }
        if let Some(has_answer) = item.has_answer {
            hit.has_answer = Some(has_answer);
        }
        if let Some(confidence) = item.confidence {
            hit.analysis_confidence = Some(confidence);
        }
        if let Some(progress) = item.progress {
            hit.analysis_progress = Some(progress);
        }
    }
}

/// Display text for a backend status label, with the phase it implies.
fn status_display(label: &str) -> Option<(String, Option<QaPhase>)> {
    let fixed = match label {
        "searching" => Some(("Searching your files…", Some(QaPhase::Searching))),
        "answering" => Some(("Generating answer…", Some(QaPhase::Synthesizing))),
        "no_results" => Some(("No matching files found.", None)),
        "synthesizing_answer" => Some(("Synthesizing answer…", Some(QaPhase::Synthesizing))),
        "processing_chunks" => Some(("Processing sources…", Some(QaPhase::Analyzing))),
        "direct_answer" => Some(("Answering directly…", Some(QaPhase::Synthesizing))),
        "decomposing_query" => Some(("Breaking down the question…", Some(QaPhase::Searching))),
        "merging_results" => Some(("Merging results…", Some(QaPhase::Analyzing))),
        _ => None,
    };
    if let Some((text, phase)) = fixed {
        return Some((text.to_string(), phase));
    }

    if let Some(caps) = ANALYZING_CHUNKS.captures(label) {
        return Some((
            format!("Analyzing {} sources…", &caps[1]),
            Some(QaPhase::Analyzing),
        ));
    }
    if let Some(caps) = SEARCHING_SUBQUERY.captures(label) {
        return Some((
            format!("Searching sub-query {} of {}…", &caps[1], &caps[2]),
            Some(QaPhase::Searching),
        ));
    }
    None
}

/// Renders analysis progress; values up to 1.0 are fractions, larger ones percentages.
fn progress_status(progress: f64) -> String {
    let percent = if progress <= 1.0 {
        progress * 100.0
    } else {
        progress
    };
    format!("Analyzing sources… {}%", percent.clamp(0.0, 100.0).round() as u32)
}
