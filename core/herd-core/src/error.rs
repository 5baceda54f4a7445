//! Error types for herd-core operations.

use std::path::PathBuf;

/// All errors that can occur in herd-core operations.
#[derive(Debug, thiserror::Error)]
pub enum HerdError {
    // ─────────────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Home directory not found")]
    HomeDirNotFound,

    #[error("Settings file malformed: {path}: {details}")]
    SettingsMalformed { path: PathBuf, details: String },

    // ─────────────────────────────────────────────────────────────────────
    // State Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Invalid session id: {0:?}")]
    InvalidSessionId(String),

    #[error("File watch error: {0}")]
    Watch(#[from] notify::Error),

    // ─────────────────────────────────────────────────────────────────────
    // I/O Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("I/O error: {context}: {source}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON parsing error: {context}: {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    // ─────────────────────────────────────────────────────────────────────
    // Control Plane Errors
    // ─────────────────────────────────────────────────────────────────────
    #[error("Command execution failed: {command}: {details}")]
    CommandFailed { command: String, details: String },

    #[error("Not running inside tmux session")]
    NotInTmux,

    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
}

impl HerdError {
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        HerdError::Io {
            context: context.into(),
            source,
        }
    }

    pub fn json(context: impl Into<String>, source: serde_json::Error) -> Self {
        HerdError::Json {
            context: context.into(),
            source,
        }
    }

    pub fn command(command: impl Into<String>, details: impl Into<String>) -> Self {
        HerdError::CommandFailed {
            command: command.into(),
            details: details.into(),
        }
    }
}

/// Convenience type alias for Results using HerdError.
pub type Result<T> = std::result::Result<T, HerdError>;

impl From<HerdError> for String {
    fn from(err: HerdError) -> String {
        err.to_string()
    }
}
