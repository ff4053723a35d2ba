//! Error types for the ingestion pipeline.
//!
//! Configuration problems surface at startup through [`ConfigError`]. Request
//! time failures are expressed as [`IngestError`], whose variants map one to
//! one onto webhook responses.

use thiserror::Error;

/// Configuration-related errors, raised while building components.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("word list yielded no valid words after normalization")]
    EmptyWordList,

    #[error("MAILGUN_WEBHOOK_SIGNING_KEY must be set when MAILGUN_REQUIRE_SIGNATURE is enabled")]
    MissingSigningKey,

    #[error("invalid configuration value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// No unique identifier was found within the attempt budget.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("could not generate unique local part after {attempts} attempt(s)")]
pub struct ExhaustedError {
    pub attempts: usize,
}

/// The raw message was too corrupt to recover any header.
#[derive(Debug, Error)]
#[error("malformed MIME message: {0}")]
pub struct MalformedMimeError(pub String);

/// Errors from the alias directory.
#[derive(Debug, Error)]
pub enum AliasError {
    #[error("alias local part is empty after normalization")]
    EmptyLocalPart,

    #[error("alias {0} already exists")]
    Duplicate(String),

    #[error(transparent)]
    Exhausted(#[from] ExhaustedError),
}

/// Request-time failures of the ingestion pipeline.
#[derive(Debug, Error)]
pub enum IngestError {
    /// Bad, missing or stale webhook signature.
    #[error("invalid signature")]
    Authentication,

    /// Missing recipient or body, or an oversized body.
    #[error("bad request: {0}")]
    Validation(&'static str),

    /// Field-level rejection on the JSON dev endpoint.
    #[error("{0}")]
    Unprocessable(String),

    /// Unknown, disabled or malformed recipient. Deliberately a single variant.
    #[error("alias not found")]
    AliasNotFound,

    /// The alias lookup or the persistence sink failed.
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),
}
