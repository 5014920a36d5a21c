// src/pipeline/mod.rs
// The orchestrator: sequences multi-stage generation and aggregates
// stage-tagged failures.
//
// Split flow:   StageQuestions -> StageResults -> StageMapping -> Done
// Unified flow: StageUnifiedQuiz -> StageMapping -> Done
//
// Stage order is strict within a run (results prompting depends on the
// generated question texts). Independent runs share nothing mutable
// beyond the client's optional call limiter, so they are free to execute
// concurrently.

mod types;

pub use types::{
    PartialOutputs, PipelineConfig, PipelineError, RunReport, StageReport,
};

use chrono::Utc;
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::GenerationError;
use crate::llm::client::{GenerationClient, GenerationOutcome, GenerationRequest};
use crate::llm::schema::{SchemaExpectation, SchemaKind, ValidatedPayload};
use crate::mapping;
use crate::mapping::AnswerMapping;
use crate::prompt;
use crate::types::{GenerationContext, GeneratedQuiz, StageKind};

/// A completed run: the validated quiz, its answer mapping, and the run
/// report for observability.
#[derive(Debug, Clone, Serialize)]
pub struct QuizBundle {
    pub quiz: GeneratedQuiz,
    pub mapping: AnswerMapping,
    pub report: RunReport,
}

/// Drives generation stages through the injected client. Holds no
/// per-run state; one pipeline serves concurrent invocations.
pub struct QuizPipeline {
    client: GenerationClient,
    config: PipelineConfig,
}

impl QuizPipeline {
    pub fn new(client: GenerationClient, config: PipelineConfig) -> Self {
        Self { client, config }
    }

    /// Multi-call flow: questions, then results (prompted with the
    /// generated question texts), then deterministic answer distribution.
    pub async fn generate_quiz(
        &self,
        ctx: &GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<QuizBundle, PipelineError> {
        let run_id = Uuid::new_v4();
        ctx.validate()
            .map_err(|error| PipelineError::new(StageKind::Questions, error))?;

        debug!(%run_id, questions = ctx.question_count, results = ctx.result_count, "starting split-flow run");

        // Stage 1: questions
        let questions_outcome = self
            .run_stage(
                GenerationRequest {
                    stage: StageKind::Questions,
                    prompt: prompt::build_questions_prompt(ctx),
                    expectation: SchemaExpectation {
                        kind: SchemaKind::Questions,
                        question_count: ctx.question_count,
                        result_count: ctx.result_count,
                    },
                    token_budget: self.config.questions_token_budget,
                    max_attempts: self.config.max_attempts,
                },
                cancel,
            )
            .await
            .map_err(|error| PipelineError::new(StageKind::Questions, error))?;

        let ValidatedPayload::Questions(questions) = questions_outcome.payload.clone() else {
            return Err(PipelineError::new(
                StageKind::Questions,
                payload_kind_mismatch("questions"),
            ));
        };

        // Stage 2: results, topically coupled to stage 1's output
        let question_texts: Vec<String> = questions.iter().map(|q| q.text.clone()).collect();
        let results_outcome = self
            .run_stage(
                GenerationRequest {
                    stage: StageKind::Results,
                    prompt: prompt::build_results_prompt(ctx, &question_texts),
                    expectation: SchemaExpectation {
                        kind: SchemaKind::Results,
                        question_count: ctx.question_count,
                        result_count: ctx.result_count,
                    },
                    token_budget: self.config.results_token_budget,
                    max_attempts: self.config.max_attempts,
                },
                cancel,
            )
            .await
            .map_err(|error| {
                PipelineError::new(StageKind::Results, error).with_partial(PartialOutputs {
                    questions: Some(questions.clone()),
                    results: None,
                })
            })?;

        let ValidatedPayload::Results(results) = results_outcome.payload.clone() else {
            return Err(PipelineError::new(
                StageKind::Results,
                payload_kind_mismatch("results"),
            ));
        };

        // Stage 3: deterministic answer distribution
        let mapping = mapping::assign(&questions, ctx.result_count).map_err(|error| {
            PipelineError::new(StageKind::Mapping, error).with_partial(PartialOutputs {
                questions: Some(questions.clone()),
                results: Some(results.clone()),
            })
        })?;
        let questions = mapping::apply_preserving_existing(&questions, &mapping);

        let quiz = GeneratedQuiz {
            title: format!("The {} Quiz", ctx.niche),
            subtitle: ctx.goal.clone(),
            questions,
            results,
        };

        let report = RunReport {
            run_id,
            generated_at: Utc::now(),
            stages: vec![
                stage_report(StageKind::Questions, &questions_outcome),
                stage_report(StageKind::Results, &results_outcome),
            ],
        };

        info!(
            %run_id,
            questions = quiz.questions.len(),
            results = quiz.results.len(),
            mapped_answers = mapping.len(),
            "split-flow run complete"
        );

        Ok(QuizBundle { quiz, mapping, report })
    }

    /// Single-call flow: the model produces the whole quiz, including
    /// answer assignments; the mapping is collected from them.
    pub async fn generate_unified(
        &self,
        ctx: &GenerationContext,
        cancel: &CancellationToken,
    ) -> Result<QuizBundle, PipelineError> {
        let run_id = Uuid::new_v4();
        ctx.validate()
            .map_err(|error| PipelineError::new(StageKind::UnifiedQuiz, error))?;

        debug!(%run_id, questions = ctx.question_count, results = ctx.result_count, "starting unified run");

        let outcome = self
            .run_stage(
                GenerationRequest {
                    stage: StageKind::UnifiedQuiz,
                    prompt: prompt::build_unified_prompt(ctx),
                    expectation: SchemaExpectation {
                        kind: SchemaKind::UnifiedQuiz,
                        question_count: ctx.question_count,
                        result_count: ctx.result_count,
                    },
                    token_budget: self.config.unified_token_budget,
                    max_attempts: self.config.max_attempts,
                },
                cancel,
            )
            .await
            .map_err(|error| PipelineError::new(StageKind::UnifiedQuiz, error))?;

        let ValidatedPayload::Quiz(quiz) = outcome.payload.clone() else {
            return Err(PipelineError::new(
                StageKind::UnifiedQuiz,
                payload_kind_mismatch("quiz"),
            ));
        };

        let mapping = mapping::from_assigned(&quiz.questions);

        let report = RunReport {
            run_id,
            generated_at: Utc::now(),
            stages: vec![stage_report(StageKind::UnifiedQuiz, &outcome)],
        };

        info!(
            %run_id,
            questions = quiz.questions.len(),
            results = quiz.results.len(),
            mapped_answers = mapping.len(),
            "unified run complete"
        );

        Ok(QuizBundle { quiz, mapping, report })
    }

    async fn run_stage(
        &self,
        request: GenerationRequest,
        cancel: &CancellationToken,
    ) -> Result<GenerationOutcome, GenerationError> {
        debug!(
            stage = request.stage.as_str(),
            token_budget = request.token_budget,
            max_attempts = request.max_attempts,
            "entering stage"
        );
        self.client.generate(&request, cancel).await
    }
}

fn stage_report(stage: StageKind, outcome: &GenerationOutcome) -> StageReport {
    StageReport {
        stage,
        attempts_used: outcome.attempts_used,
        final_token_budget: outcome.final_token_budget,
    }
}

// The expectation kind pins the payload variant, so this is unreachable in
// practice; kept as a typed failure instead of a panic.
fn payload_kind_mismatch(expected: &str) -> GenerationError {
    GenerationError::SchemaValidation {
        path: expected.to_string(),
        reason: "unexpected payload kind".to_string(),
    }
}
