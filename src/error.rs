// src/error.rs
// Public error taxonomy for the generation pipeline.
//
// Transient/truncated/malformed outcomes are handled inside the client's
// retry loop and only ever escape summarized inside RetriesExhausted.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum GenerationError {
    /// Caller passed an invalid context or request (e.g. non-positive
    /// counts). Rejected before any network call.
    #[error("input contract violation: {0}")]
    InvalidInput(String),

    /// Structurally well-formed JSON failing the content contract.
    /// Never retried; a reliably wrong-shaped model will not self-correct
    /// by reissuing the same prompt.
    #[error("schema validation failed at {path}: {reason}")]
    SchemaValidation { path: String, reason: String },

    /// Attempt budget consumed without a validated result.
    #[error("retries exhausted after {attempts} attempt(s): {last}")]
    RetriesExhausted { attempts: u32, last: String },

    /// Caller-initiated abort, observed between retries and around the
    /// service call. Never silently retried.
    #[error("generation cancelled by caller")]
    Cancelled,
}

impl GenerationError {
    /// Whether this failure should page anyone. Cancellation is caller
    /// intent, not a fault.
    pub fn is_alertable(&self) -> bool {
        !matches!(self, Self::Cancelled)
    }
}
