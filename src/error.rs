// src/error.rs

//! Error types for the repackaging pipeline
//!
//! Every fatal condition halts the whole run. Nothing here is retried;
//! re-running the pipeline is the recovery path.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised by the patch engine, the tool resolver and the pipeline
#[derive(Error, Debug)]
pub enum Error {
    /// A required external tool or remote artifact cannot be located or fetched
    #[error("Tool resolution failed: {0}")]
    Resolution(String),

    /// A patch would break a structural constraint; raised before any write
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// An external process exited with a non-zero status
    #[error("Command `{command}` failed with exit code {}", code.map_or_else(|| "none (terminated by signal)".to_string(), |c| c.to_string()))]
    ExternalTool { command: String, code: Option<i32> },

    /// A resource the pipeline depends on is missing from the working tree
    #[error("Missing resource: {0}")]
    MissingResource(String),

    /// Resource path escapes the working tree
    #[error("Path traversal rejected: {0}")]
    PathTraversal(String),

    /// Resource path is empty or otherwise unusable
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// Configuration could not be loaded or is inconsistent
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// I/O error with context
    #[error("I/O error: {0}")]
    IoError(String),

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid substitution pattern
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// Invalid resource glob
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),

    /// XML parse error
    #[error("XML error in {path}: {reason}")]
    Xml { path: PathBuf, reason: String },
}

/// Result alias used across the crate
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a length-parity or other structural violation
    pub fn invariant(message: impl Into<String>) -> Self {
        Self::InvariantViolation(message.into())
    }
}
