//! Error types for HostView
//!
//! This module provides the error type hierarchy using `thiserror`
//! for proper error handling across all components.

use thiserror::Error;

use crate::command::Command;

/// The main error type for HostView operations
#[derive(Error, Debug)]
pub enum Error {
    /// Browser engine boundary errors
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Navigation policy errors
    #[error("Policy error: {0}")]
    Policy(#[from] PolicyError),

    /// Frame capture errors
    #[error("Capture error: {0}")]
    Capture(#[from] CaptureError),

    /// Command posting errors
    #[error("Post error: {0}")]
    Post(#[from] PostError),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic error with message
    #[error("{0}")]
    Generic(String),
}

/// Errors reported across the engine trait boundary
#[derive(Error, Debug, Clone)]
pub enum EngineError {
    /// Browser environment creation failed
    #[error("Failed to create browser environment: {0}")]
    EnvironmentFailed(String),

    /// Controller creation failed (either variant)
    #[error("Failed to create controller: {0}")]
    ControllerFailed(String),

    /// Browser control object acquisition failed
    #[error("Failed to obtain browser control: {0}")]
    ControlUnavailable(String),

    /// Compositor target or visual attachment failed
    #[error("Compositor unavailable: {0}")]
    CompositorFailed(String),

    /// Window creation failed on the execution thread
    #[error("Failed to create host window: {0}")]
    WindowFailed(String),

    /// Capture session could not be established or serviced
    #[error("Capture session error: {0}")]
    CaptureSession(String),

    /// The runtime does not support the requested capability
    #[error("Unsupported at this runtime version: {0}")]
    Unsupported(String),

    /// Backend-specific failure
    #[error("Engine backend error: {0}")]
    Backend(String),
}

/// Navigation policy errors
#[derive(Error, Debug)]
pub enum PolicyError {
    /// A supplied pattern failed to compile; no policy state was changed
    #[error("Invalid {kind} pattern: {source}")]
    InvalidPattern {
        /// Which of the three matchers the pattern was for
        kind: PatternKind,
        /// The underlying compile error
        source: regex::Error,
    },
}

/// Identifies one of the three policy matchers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    /// Allow-list matcher
    Allow,
    /// Deny-list matcher
    Deny,
    /// Hook matcher
    Hook,
}

impl std::fmt::Display for PatternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternKind::Allow => write!(f, "allow"),
            PatternKind::Deny => write!(f, "deny"),
            PatternKind::Hook => write!(f, "hook"),
        }
    }
}

/// Frame capture errors
#[derive(Error, Debug)]
pub enum CaptureError {
    /// Snapshot stream could not be decoded into pixels
    #[error("Snapshot decode failed: {0}")]
    DecodeFailed(String),

    /// GPU frame copy into the staging surface failed
    #[error("Frame copy failed: {0}")]
    CopyFailed(String),

    /// The instance was configured without a capture path
    #[error("Capture is disabled for this instance")]
    Disabled,
}

/// A command post failed because the execution thread is gone.
///
/// The undelivered command is handed back so the caller owns (and releases)
/// the payload.
#[derive(Error, Debug)]
#[error("Execution thread is gone; command not delivered")]
pub struct PostError {
    /// The command that could not be delivered
    pub command: Command,
}

/// Result type alias for HostView operations
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for engine boundary calls
pub type EngineResult<T> = std::result::Result<T, EngineError>;

impl Error {
    /// Create a generic error from a string
    pub fn generic<S: Into<String>>(msg: S) -> Self {
        Error::Generic(msg.into())
    }
}

impl EngineError {
    /// Create a backend error from a string
    pub fn backend<S: Into<String>>(msg: S) -> Self {
        EngineError::Backend(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::Engine(EngineError::EnvironmentFailed("runtime missing".to_string()));
        assert!(err.to_string().contains("Failed to create browser environment"));
        assert!(err.to_string().contains("runtime missing"));
    }

    #[test]
    fn test_policy_error_names_matcher() {
        let bad = regex::Regex::new("(").unwrap_err();
        let err = PolicyError::InvalidPattern {
            kind: PatternKind::Deny,
            source: bad,
        };
        assert!(err.to_string().contains("deny"));
    }

    #[test]
    fn test_post_error_returns_payload() {
        let err = PostError {
            command: Command::Navigate("https://example.com".to_string()),
        };
        match err.command {
            Command::Navigate(url) => assert_eq!(url, "https://example.com"),
            _ => panic!("payload lost"),
        }
    }

    #[test]
    fn test_capture_error_display() {
        let err = CaptureError::DecodeFailed("truncated stream".to_string());
        assert!(err.to_string().contains("decode failed"));
    }

    #[test]
    fn test_generic_error() {
        let err = Error::generic("something went wrong");
        assert_eq!(err.to_string(), "something went wrong");
    }
}
