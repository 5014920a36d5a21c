// src/llm/mod.rs
// Generative-service boundary: provider trait, tolerant extraction,
// schema validation, and the retrying generation client.

pub mod client;
pub mod extract;
pub mod provider;
pub mod schema;

pub use client::{ClientOptions, GenerationClient, GenerationOutcome, GenerationRequest};
pub use provider::{CompletionRequest, GenerativeService, OpenAiService, ServiceError};
pub use schema::{SchemaExpectation, SchemaKind, SchemaViolation, ValidatedPayload};
