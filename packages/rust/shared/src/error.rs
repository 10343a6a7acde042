//! Error types for welfarebridge.
//!
//! Library crates use [`WelfareBridgeError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all welfarebridge operations.
#[derive(Debug, thiserror::Error)]
pub enum WelfareBridgeError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Outbound HTTP request failed (connectivity, timeout, non-2xx status).
    #[error("network error: {0}")]
    Network(String),

    /// Payload is not well-formed (e.g. the listing XML).
    #[error("parse error: {message}")]
    Parse { message: String },

    /// A required canonical field is missing or a value is out of range.
    #[error("validation error: {message}")]
    Validation { message: String },

    /// No parsable JSON object could be pulled out of generation output.
    #[error("extraction error: {message}")]
    Extraction { message: String },

    /// Database or storage layer error, carrying the driver message.
    #[error("storage error: {0}")]
    Storage(String),

    /// The generation collaborator failed or returned an unusable envelope.
    #[error("generation error: {0}")]
    Generation(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, WelfareBridgeError>;

impl WelfareBridgeError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Create an extraction error from any displayable message.
    pub fn extraction(msg: impl Into<String>) -> Self {
        Self::Extraction {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_extraction(&self) -> bool {
        matches!(self, Self::Extraction { .. })
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = WelfareBridgeError::config("missing service key");
        assert_eq!(err.to_string(), "config error: missing service key");

        let err = WelfareBridgeError::validation("title is required");
        assert!(err.to_string().contains("title is required"));

        let err = WelfareBridgeError::extraction("no JSON object found");
        assert_eq!(err.to_string(), "extraction error: no JSON object found");
    }

    #[test]
    fn classification_helpers() {
        assert!(WelfareBridgeError::extraction("x").is_extraction());
        assert!(!WelfareBridgeError::parse("x").is_extraction());
        assert!(WelfareBridgeError::validation("x").is_validation());
        assert!(!WelfareBridgeError::Storage("x".into()).is_validation());
    }
}
