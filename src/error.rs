//! Pipeline error taxonomy.
//!
//! Operations inside each stage use `anyhow` with context; the pipeline
//! boundary classifies failures into one of five categories so callers can
//! tell a bad schema file apart from a bad upload or a broken test engine.
//! Coercion failures are deliberately absent from most flows here: they are
//! accumulated per column as diagnostics rather than raised, so the caller
//! sees every problem in one pass.

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum IntakeError {
    /// Malformed schema entry or unsupported data-type descriptor. Fatal to
    /// that catalog entry, never to the catalog load as a whole.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Unreadable or unsupported upload. Fatal to the upload; the pipeline
    /// substitutes an empty-but-valid table so the caller can render a clean
    /// failure state.
    #[error("ingestion error: {0}")]
    Ingestion(String),

    /// Column set mismatch between the file and the schema.
    #[error("validation error: {0}")]
    Validation(String),

    /// A per-column cast failure escalated to the caller (the submit gate).
    #[error("coercion error: {0}")]
    Coercion(String),

    /// Test engine invocation or result-artifact read failure.
    #[error("orchestration error: {0}")]
    Orchestration(String),
}

impl IntakeError {
    pub fn configuration(err: impl std::fmt::Display) -> Self {
        IntakeError::Configuration(err.to_string())
    }

    pub fn ingestion(err: impl std::fmt::Display) -> Self {
        IntakeError::Ingestion(err.to_string())
    }

    pub fn orchestration(err: impl std::fmt::Display) -> Self {
        IntakeError::Orchestration(err.to_string())
    }
}
