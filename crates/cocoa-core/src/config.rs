//! Client configuration model.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{CocoaError, Result};

/// Default backend address of the local retrieval service.
pub const DEFAULT_BACKEND_URL: &str = "http://127.0.0.1:8890";

/// Default quiet period before a typed query triggers a search.
pub const DEFAULT_DEBOUNCE_MS: u64 = 300;

/// Request paths on the backend, relative to `backend_url`.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Endpoints {
    pub search_stream: String,
    pub search: String,
    pub qa_stream: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            search_stream: "/search/stream".to_string(),
            search: "/search".to_string(),
            qa_stream: "/qa/stream".to_string(),
        }
    }
}

/// Root of `client.toml`.
///
/// Every field has a default, so a partial (or empty) file is valid.
#[derive(Deserialize, Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the retrieval backend
    pub backend_url: String,
    /// `limit` sent with search requests
    pub search_limit: u32,
    /// `contextLimit` sent with QA requests
    pub qa_context_limit: u32,
    /// Quiet period for typed queries, in milliseconds
    pub debounce_ms: u64,
    /// Connect timeout; streamed bodies are not time-limited
    pub request_timeout_secs: u64,
    /// When false, search always uses the one-shot fallback request
    pub streaming: bool,
    pub endpoints: Endpoints,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            search_limit: 15,
            qa_context_limit: 5,
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            request_timeout_secs: 10,
            streaming: true,
            endpoints: Endpoints::default(),
        }
    }
}

impl ClientConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Joins `backend_url` and an endpoint path without doubling slashes.
    pub fn endpoint_url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.backend_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Sets one top-level field from its textual form.
    ///
    /// # Arguments
    /// * `key` - Field name as it appears in `client.toml`
    /// * `value` - New value; numbers and booleans are parsed
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "backend_url" => self.backend_url = value.to_string(),
            "search_limit" => self.search_limit = parse_field(key, value)?,
            "qa_context_limit" => self.qa_context_limit = parse_field(key, value)?,
            "debounce_ms" => self.debounce_ms = parse_field(key, value)?,
            "request_timeout_secs" => self.request_timeout_secs = parse_field(key, value)?,
            "streaming" => self.streaming = parse_field(key, value)?,
            _ => return Err(CocoaError::config(format!("Unknown config key: {}", key))),
        }
        Ok(())
    }
}

fn parse_field<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CocoaError::config(format!("Invalid value for {}: {:?}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_toml_fills_defaults() {
        let config: ClientConfig = toml::from_str(
            r#"
backend_url = "http://localhost:9000/"
search_limit = 20

[endpoints]
qa_stream = "/v2/qa/stream"
"#,
        )
        .unwrap();

        assert_eq!(config.search_limit, 20);
        assert_eq!(config.qa_context_limit, 5);
        assert_eq!(config.debounce(), Duration::from_millis(300));
        assert_eq!(config.endpoints.search_stream, "/search/stream");
        assert_eq!(
            config.endpoint_url(&config.endpoints.qa_stream),
            "http://localhost:9000/v2/qa/stream"
        );
    }

    #[test]
    fn test_set_parses_values() {
        let mut config = ClientConfig::default();
        config.set("search_limit", "25").unwrap();
        config.set("streaming", "false").unwrap();
        config.set("backend_url", "http://127.0.0.1:9999").unwrap();

        assert_eq!(config.search_limit, 25);
        assert!(!config.streaming);
        assert_eq!(config.backend_url, "http://127.0.0.1:9999");
        assert!(config.set("debounce_ms", "soon").unwrap_err().is_config());
        assert!(config.set("colour", "blue").unwrap_err().is_config());
    }
}
