// src/llm/client.rs
// The retrying generation client: calls the service, tolerates malformed
// or truncated output, validates the structural contract, and applies the
// retry/backoff/token-growth policy.
//
// The loop is iterative rather than recursive so stack depth stays bounded
// and cancellation is checkable between iterations.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::llm::extract::{extract_json_object, looks_truncated};
use crate::llm::provider::{CompletionRequest, GenerativeService};
use crate::llm::schema::{self, SchemaExpectation, ValidatedPayload};
use crate::prompt::PromptPair;
use crate::types::StageKind;

/// Hard ceiling for token-budget growth on truncated output.
pub const TOKEN_BUDGET_CAP: u32 = 8000;

/// Overridable truncation check; the default brace heuristic can
/// false-positive on complete-looking but still-invalid payloads.
pub type TruncationHeuristic = fn(&str) -> bool;

/// One generation request, created per stage invocation. Token budget and
/// attempt budget are parameters so different stages size them
/// independently.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    pub stage: StageKind,
    pub prompt: PromptPair,
    pub expectation: SchemaExpectation,
    pub token_budget: u32,
    pub max_attempts: u32,
}

/// Validated result plus observability counters for one request.
#[derive(Debug, Clone)]
pub struct GenerationOutcome {
    pub payload: ValidatedPayload,
    /// Service calls actually issued, across transient/truncated/malformed
    /// retries.
    pub attempts_used: u32,
    /// Token budget in effect on the successful attempt.
    pub final_token_budget: u32,
}

/// Retry policy knobs shared by every request through one client.
#[derive(Clone)]
pub struct ClientOptions {
    /// Fixed delay before retrying a transient service failure.
    pub retry_delay: Duration,
    /// Per-call timeout; a hung upstream must not starve the invocation.
    pub call_timeout: Duration,
    /// Ceiling for token-budget growth.
    pub token_budget_cap: u32,
    /// Truncation detector used when a parse fails.
    pub truncation_heuristic: TruncationHeuristic,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            retry_delay: Duration::from_millis(1000),
            call_timeout: Duration::from_secs(20),
            token_budget_cap: TOKEN_BUDGET_CAP,
            truncation_heuristic: looks_truncated,
        }
    }
}

/// How one failed attempt is classified, driving the retry policy.
/// These never escape the loop except summarized in RetriesExhausted.
enum AttemptFailure {
    /// Network/5xx/timeout. Retried after a fixed delay, same budget.
    Transient(String),
    /// Parse failure matching the truncation heuristic. Retried with a
    /// geometrically grown budget, no delay.
    Truncated,
    /// Parse failure not matching the heuristic. Retried immediately with
    /// the same budget.
    Malformed(String),
}

impl AttemptFailure {
    fn describe(&self) -> String {
        match self {
            Self::Transient(detail) => format!("transient service error: {detail}"),
            Self::Truncated => "truncated output (no closing brace)".to_string(),
            Self::Malformed(detail) => format!("malformed output: {detail}"),
        }
    }
}

/// Stateless-per-request client for the generative service. One instance
/// is safely shared across concurrent pipeline invocations; the only
/// shared resource is the optional call limiter.
pub struct GenerationClient {
    service: Arc<dyn GenerativeService>,
    options: ClientOptions,
    limiter: Option<Arc<Semaphore>>,
}

impl GenerationClient {
    pub fn new(service: Arc<dyn GenerativeService>) -> Self {
        Self {
            service,
            options: ClientOptions::default(),
            limiter: None,
        }
    }

    pub fn with_options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Cap concurrent service calls across all invocations sharing this
    /// client. Permits are scoped, so every exit path releases them.
    pub fn with_limiter(mut self, limiter: Arc<Semaphore>) -> Self {
        self.limiter = Some(limiter);
        self
    }

    /// Run one generation request to completion: a validated structured
    /// payload, or a typed failure once the attempt budget is exhausted.
    pub async fn generate(
        &self,
        request: &GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome, GenerationError> {
        if request.max_attempts == 0 {
            return Err(GenerationError::InvalidInput(
                "max_attempts must be at least 1".into(),
            ));
        }
        if request.token_budget == 0 {
            return Err(GenerationError::InvalidInput(
                "token_budget must be positive".into(),
            ));
        }

        let mut token_budget = request.token_budget.min(self.options.token_budget_cap);
        let mut attempt: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return Err(GenerationError::Cancelled);
            }
            attempt += 1;

            let failure = match self.attempt_once(request, token_budget, cancel).await? {
                Ok(payload) => {
                    debug!(
                        stage = request.stage.as_str(),
                        attempt,
                        token_budget,
                        "generation succeeded"
                    );
                    return Ok(GenerationOutcome {
                        payload,
                        attempts_used: attempt,
                        final_token_budget: token_budget,
                    });
                }
                Err(failure) => failure,
            };

            let description = failure.describe();
            warn!(
                stage = request.stage.as_str(),
                attempt,
                token_budget,
                failure = %description,
                "generation attempt failed"
            );

            if attempt >= request.max_attempts {
                return Err(GenerationError::RetriesExhausted {
                    attempts: attempt,
                    last: description,
                });
            }

            match failure {
                AttemptFailure::Truncated => {
                    let grown = grow_token_budget(token_budget, self.options.token_budget_cap);
                    debug!(
                        stage = request.stage.as_str(),
                        from = token_budget,
                        to = grown,
                        "growing token budget after truncated output"
                    );
                    token_budget = grown;
                }
                AttemptFailure::Transient(_) => {
                    tokio::select! {
                        _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                        _ = tokio::time::sleep(self.options.retry_delay) => {}
                    }
                }
                AttemptFailure::Malformed(_) => {}
            }
        }
    }

    /// One service call plus extraction, parse, and schema validation.
    /// Outer Err is terminal (cancellation or schema rejection); inner Err
    /// is a retryable attempt failure.
    async fn attempt_once(
        &self,
        request: &GenerationRequest,
        token_budget: u32,
        cancel: &CancellationToken,
    ) -> Result<Result<ValidatedPayload, AttemptFailure>, GenerationError> {
        let _permit = match &self.limiter {
            Some(limiter) => {
                let acquired = tokio::select! {
                    _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
                    permit = limiter.clone().acquire_owned() => permit,
                };
                // A closed limiter means the owning service is shutting down.
                Some(acquired.map_err(|_| GenerationError::Cancelled)?)
            }
            None => None,
        };

        let completion = CompletionRequest {
            system: request.prompt.system.clone(),
            user: request.prompt.user.clone(),
            max_output_tokens: token_budget,
        };

        let call = self.service.complete(completion);
        let outcome = tokio::select! {
            _ = cancel.cancelled() => return Err(GenerationError::Cancelled),
            result = tokio::time::timeout(self.options.call_timeout, call) => result,
        };

        let raw = match outcome {
            Err(_) => {
                return Ok(Err(AttemptFailure::Transient(format!(
                    "call timed out after {:?}",
                    self.options.call_timeout
                ))));
            }
            Ok(Err(err)) => return Ok(Err(AttemptFailure::Transient(err.to_string()))),
            Ok(Ok(raw)) => raw,
        };

        let json_text = extract_json_object(&raw);
        let value: Value = match serde_json::from_str(json_text) {
            Ok(value) => value,
            Err(err) => {
                if (self.options.truncation_heuristic)(&raw) {
                    return Ok(Err(AttemptFailure::Truncated));
                }
                return Ok(Err(AttemptFailure::Malformed(err.to_string())));
            }
        };

        match schema::validate(&value, &request.expectation) {
            Ok(payload) => Ok(Ok(payload)),
            // Shape defects do not self-correct; surface immediately.
            Err(violation) => Err(GenerationError::SchemaValidation {
                path: violation.path,
                reason: violation.reason,
            }),
        }
    }
}

/// Geometric growth with a floor bump, capped: min(round(b * 1.4 + 200), cap).
fn grow_token_budget(current: u32, cap: u32) -> u32 {
    let grown = (current as f64 * 1.4 + 200.0).round() as u32;
    grown.min(cap)
}
