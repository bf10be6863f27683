//! Error types for Bramble
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

/// Result type alias using BrambleError
pub type Result<T> = std::result::Result<T, BrambleError>;

/// Unified error type for Bramble operations
#[derive(Debug, Error)]
pub enum BrambleError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Log Errors
    // -------------------------------------------------------------------------
    #[error("Log entry {position} unavailable (log length {length})")]
    EntryUnavailable { position: u64, length: u64 },

    #[error("Log corruption detected: {0}")]
    LogCorruption(String),

    #[error("Incompatible log: {0}")]
    IncompatibleLog(String),

    // -------------------------------------------------------------------------
    // Tree Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt node: {0}")]
    CorruptNode(String),

    #[error("Invalid version {version} (log length {length})")]
    InvalidVersion { version: u64, length: u64 },

    #[error("Invalid range: {0}")]
    InvalidRange(String),

    #[error("Invalid namespace: {0}")]
    InvalidNamespace(String),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl BrambleError {
    /// Whether the caller may retry the failed operation.
    ///
    /// Log entries are durable once appended, so a missing entry may still
    /// arrive. Structural errors never go away on retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            BrambleError::EntryUnavailable { .. } | BrambleError::Io(_)
        )
    }
}
