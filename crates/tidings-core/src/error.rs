// SPDX-FileCopyrightText: 2026 Tidings Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Tidings decision engine.

use thiserror::Error;

/// The primary error type used across all Tidings collaborator traits and
/// core operations.
#[derive(Debug, Error)]
pub enum TidingsError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage backend errors (database connection, query failure, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// AI endpoint errors (API failure, malformed response envelope, transport).
    #[error("provider error: {message}")]
    Provider {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Structured output from the classifier failed parsing or schema validation.
    #[error("validation error: {0}")]
    Validation(String),

    /// A daily budget cap was reached; AI-assisted steps must degrade.
    #[error("budget exhausted: {message}")]
    BudgetExhausted { message: String },

    /// A referenced entity is missing at run start. Fatal to that run only.
    #[error("{kind} not found: {id}")]
    NotFound { kind: String, id: String },

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl TidingsError {
    /// True for conditions the caller may retry with backoff (transient
    /// infrastructure or provider failures). Validation, budget, and
    /// not-found errors are never retryable.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            TidingsError::Storage { .. }
                | TidingsError::Provider { .. }
                | TidingsError::Timeout { .. }
        )
    }
}
