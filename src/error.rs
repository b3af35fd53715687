//! Error types for cassette-guard
//!
//! The sanitization hooks themselves never fail. These errors only surface at
//! the fallible edges: loading settings, building API requests, and issuing
//! live calls.

use thiserror::Error;

/// Result type for cassette-guard operations
pub type Result<T> = std::result::Result<T, CassetteError>;

/// Errors that can occur in cassette-guard
#[derive(Debug, Error)]
pub enum CassetteError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// URL could not be used for the requested operation
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL
        url: String,
        /// Why it was rejected
        reason: String,
    },

    /// Live HTTP call failed
    #[error("HTTP error: {0}")]
    Http(String),

    /// Response body was not valid JSON
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Response body too large to capture
    #[error("Data too large: {size} bytes exceeds limit of {limit} bytes")]
    DataTooLarge {
        /// Actual size
        size: usize,
        /// Size limit
        limit: usize,
    },
}
