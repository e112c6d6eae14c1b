//! Error types for the Sweet Claw orchestrator.
//!
//! Command validation, configuration loading and layout persistence all
//! report through [`CoreError`]. Bus and hardware problems never surface
//! here: they are logged where they happen and the command still succeeds.

use std::path::PathBuf;

/// A specialized `Result` type for orchestrator operations.
pub type Result<T> = std::result::Result<T, CoreError>;

/// Errors that can occur in the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    // ========================================================================
    // Command Errors
    // ========================================================================
    /// A command payload was malformed. No state was changed.
    #[error("{message}")]
    Validation {
        /// What was wrong with the payload.
        message: String,
    },

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Invalid JSON syntax in a configuration file.
    #[error("Invalid JSON in config file '{path}': {message}\n\nSuggestion: Validate your sweet.json with a JSON linter")]
    ConfigParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Description of the parse error.
        message: String,
    },

    /// Configuration validation failed.
    #[error("Invalid configuration: {message}\n\nSuggestion: {suggestion}")]
    ConfigValidationError {
        /// Description of the validation failure.
        message: String,
        /// Actionable suggestion for the user.
        suggestion: String,
    },

    // ========================================================================
    // Persistence Errors
    // ========================================================================
    /// The persisted layout could not be understood.
    #[error("Corrupted layout file '{path}': {message}")]
    LayoutFileCorrupted {
        /// Path to the layout file.
        path: PathBuf,
        /// Description of the corruption.
        message: String,
    },

    /// General I/O error during file operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CoreError {
    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a new `ConfigParseError` with the given path and message.
    #[must_use]
    pub fn config_parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::ConfigParseError {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `ConfigValidationError` with the given message and suggestion.
    #[must_use]
    pub fn config_validation(message: impl Into<String>, suggestion: impl Into<String>) -> Self {
        Self::ConfigValidationError {
            message: message.into(),
            suggestion: suggestion.into(),
        }
    }

    /// Creates a new `LayoutFileCorrupted` error.
    #[must_use]
    pub fn layout_corrupted(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self::LayoutFileCorrupted {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns `true` if this error was caused by the caller's input.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    /// Returns `true` if this error should stop the process at startup.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::ConfigParseError { .. } | Self::ConfigValidationError { .. }
        )
    }
}
