// tests/stub/mod.rs
// Deterministic scripted stand-in for the generative service, plus
// payload builders shared by the integration tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::json;

use quizforge::{CompletionRequest, GenerativeService, ServiceError};

/// One scripted reply from the fake service.
pub enum ScriptStep {
    Reply(String),
    ApiError(u16, &'static str),
}

/// Plays back a fixed script, recording the token budget of every call.
pub struct ScriptedService {
    steps: Mutex<VecDeque<ScriptStep>>,
    budgets: Mutex<Vec<u32>>,
}

impl ScriptedService {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        init_tracing();
        Self {
            steps: Mutex::new(steps.into()),
            budgets: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> usize {
        self.budgets.lock().unwrap().len()
    }

    pub fn budgets(&self) -> Vec<u32> {
        self.budgets.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerativeService for ScriptedService {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ServiceError> {
        self.budgets.lock().unwrap().push(request.max_output_tokens);
        let step = self
            .steps
            .lock()
            .unwrap()
            .pop_front()
            .expect("scripted service called more times than scripted");
        match step {
            ScriptStep::Reply(text) => Ok(text),
            ScriptStep::ApiError(status, body) => Err(ServiceError::Api {
                status,
                body: body.to_string(),
            }),
        }
    }
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_test_writer()
        .try_init();
}

/// Valid questions payload: `question_count` questions with
/// `answers_per_question` answers each, no result indexes.
pub fn questions_payload(question_count: usize, answers_per_question: usize) -> String {
    let questions: Vec<_> = (0..question_count)
        .map(|qi| {
            json!({
                "text": format!("Question {qi}?"),
                "answers": (0..answers_per_question)
                    .map(|ai| json!({"text": format!("Answer {qi}.{ai}")}))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();
    json!({"questions": questions}).to_string()
}

/// Valid results payload with `result_count` buckets.
pub fn results_payload(result_count: usize) -> String {
    let results: Vec<_> = (0..result_count)
        .map(|ri| {
            json!({
                "name": format!("Result {ri}"),
                "emoji": "✨",
                "summary": format!("Summary for result {ri}."),
                "traits": [format!("trait-{ri}-a"), format!("trait-{ri}-b")],
                "recommendation": format!("Recommendation {ri}."),
            })
        })
        .collect();
    json!({"results": results}).to_string()
}

/// Complete unified quiz payload with every resultIndex assigned round
/// robin across `result_count`.
pub fn unified_payload(
    question_count: usize,
    answers_per_question: usize,
    result_count: usize,
) -> String {
    let questions: Vec<_> = (0..question_count)
        .map(|qi| {
            json!({
                "text": format!("Question {qi}?"),
                "answers": (0..answers_per_question)
                    .map(|ai| json!({
                        "text": format!("Answer {qi}.{ai}"),
                        "resultIndex": ai % result_count,
                    }))
                    .collect::<Vec<_>>(),
            })
        })
        .collect();

    let results: serde_json::Value =
        serde_json::from_str(&results_payload(result_count)).unwrap();
    json!({
        "title": "Which founder are you?",
        "subtitle": "Two minutes to find out",
        "questions": questions,
        "results": results["results"],
    })
    .to_string()
}
