//! QA wire models.
//!
//! Every QA line is an envelope `{"type": <tag>, "data": <payload>}`. The
//! envelope is parsed first and the payload is then decoded per tag, so an
//! unknown tag degrades to [`QaEvent::Unknown`] instead of a decode failure.

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::search::model::{Hit, deserialize_optional_id};

/// Outbound QA request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QaRequest {
    pub query: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context_limit: Option<u32>,

    /// Always `"qa"`
    pub mode: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resume_token: Option<String>,
}

impl QaRequest {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            context_limit: None,
            mode: "qa".to_string(),
            resume_token: None,
        }
    }

    pub fn with_context_limit(mut self, limit: u32) -> Self {
        self.context_limit = Some(limit);
        self
    }

    pub fn with_resume_token(mut self, token: Option<String>) -> Self {
        self.resume_token = token;
        self
    }
}

/// Per-source analysis produced while the backend reads each retrieved chunk.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkAnalysisItem {
    /// 1-based position of the source in the current hit list
    #[serde(default)]
    pub index: Option<usize>,

    #[serde(
        default,
        alias = "chunkId",
        deserialize_with = "deserialize_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub chunk_id: Option<String>,

    #[serde(
        default,
        alias = "fileId",
        deserialize_with = "deserialize_optional_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub file_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,

    #[serde(default, alias = "hasAnswer", skip_serializing_if = "Option::is_none")]
    pub has_answer: Option<bool>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

/// Incremental progress of the per-chunk analysis loop.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChunkProgress {
    #[serde(default)]
    pub processed_count: usize,
    #[serde(default)]
    pub total_count: usize,
    #[serde(default)]
    pub high_quality_count: usize,
    #[serde(default)]
    pub is_last: bool,
    #[serde(default)]
    pub current_file: Option<String>,
    #[serde(default)]
    pub chunk_result: Option<ChunkAnalysisItem>,
}

impl ChunkProgress {
    /// Fraction of chunks processed, `None` when the total is unknown.
    pub fn fraction(&self) -> Option<f64> {
        (self.total_count > 0).then(|| self.processed_count as f64 / self.total_count as f64)
    }
}

/// A step of the agent's visible reasoning trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ThinkingStep {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub details: Option<Value>,
    #[serde(default)]
    pub timestamp_ms: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct DecisionPayload {
    #[serde(default)]
    message: Option<String>,
    #[serde(alias = "resumeToken")]
    resume_token: String,
}

/// One decoded line of the QA stream.
#[derive(Debug, Clone, PartialEq)]
pub enum QaEvent {
    Token(String),
    Hits(Vec<Hit>),
    Status(String),
    ChunkAnalysisItem(ChunkAnalysisItem),
    ChunkAnalysis(Vec<ChunkAnalysisItem>),
    ChunkProgress(ChunkProgress),
    ThinkingStep(ThinkingStep),
    UserDecisionRequired {
        message: Option<String>,
        resume_token: String,
    },
    Error(String),
    Done(Option<String>),
    /// Any tag this client does not act on; carries the tag for logging
    Unknown(String),
}

impl QaEvent {
    /// Wire tag of this event.
    pub fn kind(&self) -> &str {
        match self {
            QaEvent::Token(_) => "token",
            QaEvent::Hits(_) => "hits",
            QaEvent::Status(_) => "status",
            QaEvent::ChunkAnalysisItem(_) => "chunk_analysis_item",
            QaEvent::ChunkAnalysis(_) => "chunk_analysis",
            QaEvent::ChunkProgress(_) => "chunk_progress",
            QaEvent::ThinkingStep(_) => "thinking_step",
            QaEvent::UserDecisionRequired { .. } => "user_decision_required",
            QaEvent::Error(_) => "error",
            QaEvent::Done(_) => "done",
            QaEvent::Unknown(tag) => tag,
        }
    }

    fn from_envelope(envelope: Envelope) -> Result<Self, serde_json::Error> {
        let Envelope { kind, data } = envelope;
        let event = match kind.as_str() {
            "token" => QaEvent::Token(serde_json::from_value(data)?),
            "hits" => QaEvent::Hits(serde_json::from_value(data)?),
            "status" => QaEvent::Status(serde_json::from_value(data)?),
            "chunk_analysis_item" => QaEvent::ChunkAnalysisItem(serde_json::from_value(data)?),
            "chunk_analysis" => QaEvent::ChunkAnalysis(serde_json::from_value(data)?),
            "chunk_progress" => QaEvent::ChunkProgress(serde_json::from_value(data)?),
            "thinking_step" => QaEvent::ThinkingStep(serde_json::from_value(data)?),
            "user_decision_required" => {
                let payload: DecisionPayload = serde_json::from_value(data)?;
                QaEvent::UserDecisionRequired {
                    message: payload.message.filter(|m| !m.trim().is_empty()),
                    resume_token: payload.resume_token,
                }
            }
            "error" => QaEvent::Error(match data {
                Value::String(message) => message,
                Value::Null => "Unknown error".to_string(),
                Value::Object(ref map) => map
                    .get("message")
                    .and_then(Value::as_str)
                    .map(str::to_string)
                    .unwrap_or_else(|| data.to_string()),
                other => other.to_string(),
            }),
            "done" => QaEvent::Done(match data {
                Value::String(message) if !message.trim().is_empty() => Some(message),
                _ => None,
            }),
            _ => QaEvent::Unknown(kind),
        };
        Ok(event)
    }
}

#[derive(Deserialize)]
struct Envelope {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Value,
}

impl<'de> Deserialize<'de> for QaEvent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let envelope = Envelope::deserialize(deserializer)?;
        let kind = envelope.kind.clone();
        QaEvent::from_envelope(envelope)
            .map_err(|err| D::Error::custom(format!("invalid `{}` payload: {}", kind, err)))
    }
}
