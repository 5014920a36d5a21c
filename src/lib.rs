// src/lib.rs
//! Resilient structured-generation pipeline for lead-magnet quizzes.
//!
//! Turns a business context (audience, goal, niche, brand voice) into a
//! validated quiz via an external generative text service, tolerating
//! malformed or truncated output, retrying under a typed failure taxonomy,
//! and distributing answers across result buckets under a balance
//! invariant. Library-level component: HTTP routing, auth, billing,
//! persistence, and notifications all live in the surrounding service.

pub mod error;
pub mod llm;
pub mod mapping;
pub mod pipeline;
pub mod prompt;
pub mod types;

pub use error::GenerationError;
pub use llm::client::{ClientOptions, GenerationClient, GenerationOutcome, GenerationRequest};
pub use llm::provider::{CompletionRequest, GenerativeService, OpenAiService, ServiceError};
pub use llm::schema::{SchemaExpectation, SchemaKind, SchemaViolation, ValidatedPayload};
pub use mapping::{AnswerKey, AnswerMapping};
pub use pipeline::{
    PartialOutputs, PipelineConfig, PipelineError, QuizBundle, QuizPipeline, RunReport,
    StageReport,
};
pub use prompt::PromptPair;
pub use types::{
    AnswerOption, GeneratedQuestion, GeneratedQuiz, GeneratedResult, GenerationContext,
    StageKind,
};
