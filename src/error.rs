//! Error types for tablequery.
//!
//! Defines the main error enum used throughout the crate. Batch-level
//! variants abort a whole request; the per-query variants are folded into
//! that query's result slot by the executor.

use thiserror::Error;

/// Main error type for tablequery operations.
#[derive(Error, Debug)]
pub enum TableQueryError {
    /// Connection open or health-check failures (host unreachable, auth failed, etc.)
    #[error("Connection error: {0}")]
    Connection(String),

    /// The requested output shape is not `table`.
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Macro interpolation rejected the raw SQL.
    #[error("Sanitization error: {0}")]
    Sanitization(String),

    /// Driver failure while executing a query or iterating its rows.
    #[error("Execution error: {0}")]
    Execution(String),

    /// Configuration errors (invalid config file, bad datasource settings, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The incoming request could not be decoded.
    #[error("Request error: {0}")]
    Request(String),

    /// Internal errors (unexpected states, bugs, etc.)
    #[error("Internal error: {0}")]
    Internal(String),
}

impl TableQueryError {
    /// Creates a connection error with the given message.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Creates an unsupported-format error with the given message.
    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    /// Creates a sanitization error with the given message.
    pub fn sanitization(msg: impl Into<String>) -> Self {
        Self::Sanitization(msg.into())
    }

    /// Creates an execution error with the given message.
    pub fn execution(msg: impl Into<String>) -> Self {
        Self::Execution(msg.into())
    }

    /// Creates a configuration error with the given message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a request decoding error with the given message.
    pub fn request(msg: impl Into<String>) -> Self {
        Self::Request(msg.into())
    }

    /// Creates an internal error with the given message.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Returns the error category as a string for display purposes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "Connection Error",
            Self::UnsupportedFormat(_) => "Unsupported Format",
            Self::Sanitization(_) => "Sanitization Error",
            Self::Execution(_) => "Execution Error",
            Self::Config(_) => "Configuration Error",
            Self::Request(_) => "Request Error",
            Self::Internal(_) => "Internal Error",
        }
    }

    /// Returns the bare message without the category prefix.
    ///
    /// This is what ends up in a failed query's `error` field.
    pub fn message(&self) -> &str {
        match self {
            Self::Connection(m)
            | Self::UnsupportedFormat(m)
            | Self::Sanitization(m)
            | Self::Execution(m)
            | Self::Config(m)
            | Self::Request(m)
            | Self::Internal(m) => m,
        }
    }
}

/// Result type alias using TableQueryError.
pub type Result<T> = std::result::Result<T, TableQueryError>;
