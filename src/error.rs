//! Custom error types for change-audit
//!
//! This module defines the error hierarchy for the audit engine using thiserror
//! for ergonomic error definitions.
//!
//! Only loading (configuration, storage) returns these errors. Scope evaluation
//! and change detection never fail; the pipeline reports anything that goes
//! wrong through `tracing` instead of propagating it to the audited caller.

use thiserror::Error;

/// The main error type for change-audit operations
#[derive(Error, Debug)]
pub enum AuditError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// A search pattern that could not be compiled
    #[error("Invalid pattern '{pattern}': {reason}")]
    Pattern { pattern: String, reason: String },

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Event store errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Export errors
    #[error("Export error: {0}")]
    Export(String),

    /// Something in the audited schema could not be resolved
    #[error("Resolution error: {0}")]
    Resolution(String),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: String,
        identifier: String,
    },
}

impl AuditError {
    /// Create an "invalid pattern" error
    pub fn pattern(pattern: impl Into<String>, reason: impl std::fmt::Display) -> Self {
        Self::Pattern {
            pattern: pattern.into(),
            reason: reason.to_string(),
        }
    }

    /// Create a "not found" error for an entity of the given type
    pub fn entity_not_found(entity_type: impl Into<String>, identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: entity_type.into(),
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this error makes the configuration unusable
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::Pattern { .. })
    }
}

// Implement From traits for common error types

impl From<std::io::Error> for AuditError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AuditError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for AuditError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

/// Result type alias for change-audit operations
pub type AuditResult<T> = Result<T, AuditError>;
