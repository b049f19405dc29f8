//! Error types for the Cocoa client.

use thiserror::Error;

/// A shared error type for the entire Cocoa client.
///
/// This provides typed, structured error variants with automatic conversion
/// from common error types via the `From` trait. Session logic never lets these
/// escape: they are rendered to status text at the session boundary.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum CocoaError {
    /// The backend bridge offers neither streaming nor one-shot requests
    #[error("Bridge unavailable")]
    TransportUnavailable,

    /// Connection-level failure while talking to the backend
    #[error("Transport error: {0}")]
    Transport(String),

    /// The backend answered with a non-success HTTP status
    #[error("HTTP {status}: {message}")]
    Http { status: u16, message: String },

    /// A single wire line could not be decoded
    #[error("Decode error: {0}")]
    Decode(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {format} - {message}")]
    Serialization {
        format: String, // "TOML", "JSON", etc.
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error (file system operations)
    #[error("IO error: {message}")]
    Io { message: String },

    /// Internal error (should not happen in normal operation)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CocoaError {
    // ============================================================================
    // Constructor helpers
    // ============================================================================

    /// Creates a Transport error
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }

    /// Creates an Http error
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self::Http {
            status,
            message: message.into(),
        }
    }

    /// Creates a Decode error
    pub fn decode(message: impl Into<String>) -> Self {
        Self::Decode(message.into())
    }

    /// Creates a Config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Creates an IO error
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    // ============================================================================
    // Type checking methods
    // ============================================================================

    /// Check if the backend bridge is missing entirely
    pub fn is_transport_unavailable(&self) -> bool {
        matches!(self, Self::TransportUnavailable)
    }

    /// Check if this is a connection-level or HTTP failure
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Http { .. })
    }

    /// Check if this is a serialization error
    pub fn is_serialization(&self) -> bool {
        matches!(self, Self::Serialization { .. })
    }

    /// Check if this is a config error
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_))
    }

    /// Renders this error as the status line shown to the user.
    ///
    /// Transport unavailability has a fixed label; everything else is
    /// prefixed so the user can tell a failed request from a progress label.
    pub fn status_text(&self) -> String {
        match self {
            Self::TransportUnavailable => self.to_string(),
            other => format!("Error: {}", other.message()),
        }
    }

    /// The backend-facing message without the variant prefix.
    ///
    /// Transport and HTTP failures yield the bare reason; other variants keep
    /// their full display text.
    pub fn message(&self) -> String {
        match self {
            Self::Http { message, .. } | Self::Transport(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

// ============================================================================
// From implementations for automatic conversion
// ============================================================================

impl From<std::io::Error> for CocoaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{} (kind: {:?})", err, err.kind()),
        }
    }
}

impl From<serde_json::Error> for CocoaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization {
            format: "JSON".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::de::Error> for CocoaError {
    fn from(err: toml::de::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

impl From<toml::ser::Error> for CocoaError {
    fn from(err: toml::ser::Error) -> Self {
        Self::Serialization {
            format: "TOML".to_string(),
            message: err.to_string(),
        }
    }
}

/// Conversion from String (for error messages)
impl From<String> for CocoaError {
    fn from(err: String) -> Self {
        Self::Internal(err)
    }
}

/// A type alias for `Result<T, CocoaError>`.
pub type Result<T> = std::result::Result<T, CocoaError>;
