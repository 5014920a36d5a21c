// src/types.rs
// Domain types shared across the generation pipeline

use serde::{Deserialize, Serialize};

use crate::error::GenerationError;

/// Immutable input to a generation run. Supplied by the surrounding API
/// layer after auth/billing/parsing have already been handled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationContext {
    /// Who the quiz is for ("busy startup founders", "new dog owners", ...)
    pub audience: String,
    /// What the business wants out of the lead magnet
    pub goal: String,
    /// Niche or short topic the content is about
    pub niche: String,
    /// Optional brand voice instructions
    pub brand_voice: Option<String>,
    /// How many questions the quiz must have
    pub question_count: usize,
    /// How many result buckets the quiz must have
    pub result_count: usize,
}

impl GenerationContext {
    /// Caller contract check. Rejected before any network call is attempted.
    pub fn validate(&self) -> Result<(), GenerationError> {
        if self.question_count == 0 {
            return Err(GenerationError::InvalidInput(
                "question_count must be positive".into(),
            ));
        }
        if self.result_count == 0 {
            return Err(GenerationError::InvalidInput(
                "result_count must be positive".into(),
            ));
        }
        if self.niche.trim().is_empty() {
            return Err(GenerationError::InvalidInput(
                "niche/topic must not be empty".into(),
            ));
        }
        Ok(())
    }
}

/// One discrete step in the pipeline, used for error tagging and logging.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StageKind {
    Questions,
    Results,
    UnifiedQuiz,
    Mapping,
}

impl StageKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Questions => "questions",
            Self::Results => "results",
            Self::UnifiedQuiz => "unified_quiz",
            Self::Mapping => "mapping",
        }
    }
}

impl std::fmt::Display for StageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single answer option within a question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOption {
    pub text: String,
    /// Which result bucket this answer points at. Unset until the mapper
    /// (or the unified generation call) fills it in.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_index: Option<usize>,
}

/// A generated quiz question with its ordered answer options.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedQuestion {
    pub text: String,
    pub answers: Vec<AnswerOption>,
}

/// One result bucket a quiz taker can land in.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedResult {
    pub name: String,
    pub emoji: String,
    pub summary: String,
    pub traits: Vec<String>,
    pub recommendation: String,
}

/// The fully assembled quiz aggregate.
///
/// Invariant once a pipeline run succeeds: question and result counts match
/// the requested counts, and every answer's `result_index` is set and in
/// `[0, results.len())`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedQuiz {
    pub title: String,
    pub subtitle: String,
    pub questions: Vec<GeneratedQuestion>,
    pub results: Vec<GeneratedResult>,
}
