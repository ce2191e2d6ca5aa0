//! Error types for preform.
//!
//! Three tiers: per-record format failures (recoverable inside the supervised
//! fold), infrastructure failures (IO, network, the remote service), and
//! internal invariant violations.

use std::time::Duration;
use thiserror::Error;

/// Top-level error type for preform.
#[derive(Debug, Error)]
pub enum PreformError {
    // ═══════════════════════════════════════════════════════════════════
    // Expected failures — bad input, bad config
    // ═══════════════════════════════════════════════════════════════════
    #[error("Configuration error: {0}")]
    Config(#[from] super::ConfigError),

    #[error("Format error: {0}")]
    Format(#[from] FormatError),

    #[error("Parse error: {0}")]
    Parse(String),

    // ═══════════════════════════════════════════════════════════════════
    // Infrastructure failures — filesystem, network, remote service
    // ═══════════════════════════════════════════════════════════════════
    #[error("Fine-tuning API error: {0}")]
    Api(#[from] ApiError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Request timeout after {0:?}")]
    Timeout(Duration),

    #[error("Rate limited: retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: f64 },

    #[error("IO error: {context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ═══════════════════════════════════════════════════════════════════
    // Invariant violations — bugs, should not happen
    // ═══════════════════════════════════════════════════════════════════
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A malformed record. Local to one record; the supervised fold collects these
/// and continues, everything else aborts the split.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatError {
    #[error("prompt is empty")]
    EmptyPrompt,

    #[error("input has no messages")]
    EmptyInput,

    #[error("expected exactly one preferred message, got {0}")]
    PreferredArity(usize),

    #[error("expected exactly one non-preferred message, got {0}")]
    NonPreferredArity(usize),
}

/// Errors reported by the fine-tuning service.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Authentication failed: invalid API key")]
    AuthenticationFailed,

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Request failed after {attempts} attempts: {last_error}")]
    MaxRetriesExceeded { attempts: u32, last_error: String },
}

impl PreformError {
    /// Create an IO error with context.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }

    /// Check if this error is retryable at the client boundary.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Timeout(_) | Self::RateLimited { .. } | Self::Network(_)
        )
    }
}

/// Result type alias for preform.
pub type Result<T> = std::result::Result<T, PreformError>;
