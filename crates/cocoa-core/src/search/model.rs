//! Search domain models.
//!
//! The progressive search endpoint serializes hits in camelCase while the QA
//! endpoint uses snake_case, so [`Hit`] accepts both spellings.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// A single retrieved source (file or chunk).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hit {
    /// Identity used for search-mode display
    #[serde(alias = "file_id")]
    pub file_id: String,

    /// Precise identity used when merging per-source analysis in QA mode
    #[serde(
        default,
        alias = "chunk_id",
        deserialize_with = "empty_string_as_none",
        skip_serializing_if = "Option::is_none"
    )]
    pub chunk_id: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty_map")]
    pub metadata: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,

    #[serde(default, alias = "analysis_comment", skip_serializing_if = "Option::is_none")]
    pub analysis_comment: Option<String>,

    #[serde(default, alias = "has_answer", skip_serializing_if = "Option::is_none")]
    pub has_answer: Option<bool>,

    #[serde(
        default,
        alias = "analysis_confidence",
        skip_serializing_if = "Option::is_none"
    )]
    pub analysis_confidence: Option<f64>,

    #[serde(
        default,
        alias = "analysis_progress",
        skip_serializing_if = "Option::is_none"
    )]
    pub analysis_progress: Option<f64>,
}

impl Hit {
    /// Creates a hit with only a file identity.
    pub fn new(file_id: impl Into<String>) -> Self {
        Self {
            file_id: file_id.into(),
            chunk_id: None,
            metadata: Map::new(),
            score: None,
            summary: None,
            snippet: None,
            analysis_comment: None,
            has_answer: None,
            analysis_confidence: None,
            analysis_progress: None,
        }
    }

    pub fn with_chunk_id(mut self, chunk_id: impl Into<String>) -> Self {
        self.chunk_id = Some(chunk_id.into());
        self
    }

    /// Human-readable label: the `path` metadata entry when present, otherwise the file id.
    pub fn label(&self) -> &str {
        self.metadata
            .get("path")
            .and_then(Value::as_str)
            .unwrap_or(&self.file_id)
    }
}

/// One phase of progressive search.
///
/// Unrecognized tags are kept verbatim in [`Stage::Other`]; they only affect
/// the status label, never control flow.
#[derive(Debug, Clone, PartialEq, Eq, Hash, strum::EnumString, strum::AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum Stage {
    Filename,
    Summary,
    Metadata,
    Hybrid,
    Complete,
    #[strum(default)]
    Other(String),
}

impl Stage {
    /// Wire spelling of this stage.
    pub fn as_str(&self) -> &str {
        match self {
            Stage::Other(raw) => raw,
            known => known.as_ref(),
        }
    }

    /// Status text for the stage, or `None` for unrecognized stages.
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Stage::Filename => Some("Searching filenames…"),
            Stage::Summary => Some("Searching summaries…"),
            Stage::Metadata => Some("Searching metadata…"),
            Stage::Hybrid => Some("Deep semantic search…"),
            Stage::Complete => Some("Search complete"),
            Stage::Other(_) => None,
        }
    }
}

impl From<String> for Stage {
    fn from(raw: String) -> Self {
        Stage::from_str(&raw).unwrap_or(Stage::Other(raw))
    }
}

impl Serialize for Stage {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Stage {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(Stage::from)
    }
}

/// One line of the progressive search stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageEvent {
    pub stage: Stage,

    #[serde(default)]
    pub hits: Vec<Hit>,

    #[serde(default)]
    pub done: bool,

    /// Time since the request started when this stage was emitted
    #[serde(default, alias = "stageLatencyMs")]
    pub latency_ms: u64,

    /// Running count of distinct files reported so far
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_hits: Option<usize>,
}

/// Outbound search request, shared by the streaming and one-shot endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    pub query: String,
    pub limit: u32,
}

/// Response of the one-shot search endpoint.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchResponse {
    #[serde(default)]
    pub hits: Vec<Hit>,

    #[serde(default, alias = "rewritten_query", skip_serializing_if = "Option::is_none")]
    pub rewritten_query: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,

    #[serde(default, alias = "latency_ms", skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,

    #[serde(default, alias = "query_variants")]
    pub query_variants: Vec<String>,
}

fn empty_string_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.is_empty()))
}

fn null_as_empty_map<'de, D>(deserializer: D) -> Result<Map<String, Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Map<String, Value>>::deserialize(deserializer)?.unwrap_or_default())
}

pub(crate) fn deserialize_optional_id<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    empty_string_as_none(deserializer)
}
