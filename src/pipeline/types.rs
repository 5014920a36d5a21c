// src/pipeline/types.rs
// Pipeline configuration, run reporting, and stage-tagged failures.

use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::error::GenerationError;
use crate::types::{GeneratedQuestion, GeneratedResult, StageKind};

/// Per-stage sizing for one pipeline. Token budgets and attempt budgets
/// are configuration, never hard-coded: short question lists and long
/// unified generations need different sizes.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Token budget for the questions stage.
    pub questions_token_budget: u32,
    /// Token budget for the results stage.
    pub results_token_budget: u32,
    /// Token budget for the single unified-quiz call.
    pub unified_token_budget: u32,
    /// Attempt budget per generation request, shared across
    /// transient/truncated/malformed outcomes.
    pub max_attempts: u32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            questions_token_budget: 2200,
            results_token_budget: 1800,
            unified_token_budget: 6000,
            max_attempts: 3,
        }
    }
}

impl PipelineConfig {
    /// Load config from environment variables, `.env` included.
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(val) = std::env::var("QUIZFORGE_QUESTIONS_TOKEN_BUDGET") {
            if let Ok(budget) = val.parse() {
                config.questions_token_budget = budget;
            }
        }
        if let Ok(val) = std::env::var("QUIZFORGE_RESULTS_TOKEN_BUDGET") {
            if let Ok(budget) = val.parse() {
                config.results_token_budget = budget;
            }
        }
        if let Ok(val) = std::env::var("QUIZFORGE_UNIFIED_TOKEN_BUDGET") {
            if let Ok(budget) = val.parse() {
                config.unified_token_budget = budget;
            }
        }
        if let Ok(val) = std::env::var("QUIZFORGE_MAX_ATTEMPTS") {
            if let Ok(attempts) = val.parse() {
                config.max_attempts = attempts;
            }
        }

        config
    }
}

/// Observability record for one generation stage.
#[derive(Debug, Clone, Serialize)]
pub struct StageReport {
    pub stage: StageKind,
    pub attempts_used: u32,
    pub final_token_budget: u32,
}

/// Observability record for one whole run.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub generated_at: DateTime<Utc>,
    pub stages: Vec<StageReport>,
}

/// Outputs from stages that succeeded before the run failed. Diagnostic
/// context only; the core never persists them.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PartialOutputs {
    pub questions: Option<Vec<GeneratedQuestion>>,
    pub results: Option<Vec<GeneratedResult>>,
}

/// A pipeline run failure, tagged with the stage that tripped it.
#[derive(Debug, Error)]
#[error("pipeline stage '{stage}' failed: {error}")]
pub struct PipelineError {
    pub stage: StageKind,
    #[source]
    pub error: GenerationError,
    pub partial: PartialOutputs,
}

impl PipelineError {
    pub fn new(stage: StageKind, error: GenerationError) -> Self {
        Self {
            stage,
            error,
            partial: PartialOutputs::default(),
        }
    }

    pub fn with_partial(mut self, partial: PartialOutputs) -> Self {
        self.partial = partial;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let config = PipelineConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert!(config.unified_token_budget > config.questions_token_budget);
    }

    #[test]
    fn error_display_names_the_stage() {
        let err = PipelineError::new(
            StageKind::Results,
            GenerationError::Cancelled,
        );
        assert!(err.to_string().contains("results"));
    }
}
