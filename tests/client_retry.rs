// tests/client_retry.rs
// Retry policy of the generation client against a scripted service:
// truncation-triggered budget growth, fixed-budget transient retries,
// immediate schema rejection, and cancellation.

mod stub;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use quizforge::{
    CompletionRequest, GenerationClient, GenerationError, GenerationRequest, GenerativeService,
    PromptPair, SchemaExpectation, SchemaKind, ServiceError, StageKind, ValidatedPayload,
};
use stub::{ScriptStep, ScriptedService, questions_payload, unified_payload};

fn request(kind: SchemaKind, question_count: usize, result_count: usize) -> GenerationRequest {
    GenerationRequest {
        stage: match kind {
            SchemaKind::Questions => StageKind::Questions,
            SchemaKind::Results => StageKind::Results,
            SchemaKind::UnifiedQuiz => StageKind::UnifiedQuiz,
        },
        prompt: PromptPair {
            system: "system".into(),
            user: "user".into(),
        },
        expectation: SchemaExpectation {
            kind,
            question_count,
            result_count,
        },
        token_budget: 1000,
        max_attempts: 3,
    }
}

#[tokio::test(start_paused = true)]
async fn truncated_output_grows_budget_until_success() {
    let service = Arc::new(ScriptedService::new(vec![
        ScriptStep::Reply("{\"questions\": [".into()),
        ScriptStep::Reply("{\"questions\": [{\"text\": \"Quest".into()),
        ScriptStep::Reply(questions_payload(2, 3)),
    ]));
    let client = GenerationClient::new(service.clone());

    let outcome = client
        .generate(&request(SchemaKind::Questions, 2, 3), &CancellationToken::new())
        .await
        .expect("third attempt should succeed");

    assert_eq!(outcome.attempts_used, 3);
    let budgets = service.budgets();
    assert_eq!(budgets.len(), 3);
    assert!(budgets[1] > budgets[0], "attempt 2 must grow the budget");
    assert!(budgets[2] > budgets[1], "attempt 3 must grow it again");
    assert_eq!(outcome.final_token_budget, budgets[2]);
    assert!(matches!(outcome.payload, ValidatedPayload::Questions(_)));
}

#[tokio::test(start_paused = true)]
async fn transient_failures_retry_with_same_budget() {
    let service = Arc::new(ScriptedService::new(vec![
        ScriptStep::ApiError(503, "upstream overloaded"),
        ScriptStep::Reply(questions_payload(2, 3)),
    ]));
    let client = GenerationClient::new(service.clone());

    let outcome = client
        .generate(&request(SchemaKind::Questions, 2, 3), &CancellationToken::new())
        .await
        .expect("second attempt should succeed");

    assert_eq!(outcome.attempts_used, 2);
    assert_eq!(service.budgets(), vec![1000, 1000]);
}

#[tokio::test(start_paused = true)]
async fn malformed_output_retries_with_same_budget() {
    let service = Arc::new(ScriptedService::new(vec![
        ScriptStep::Reply("I'd rather not produce JSON today.".into()),
        ScriptStep::Reply(questions_payload(2, 3)),
    ]));
    let client = GenerationClient::new(service.clone());

    let outcome = client
        .generate(&request(SchemaKind::Questions, 2, 3), &CancellationToken::new())
        .await
        .expect("second attempt should succeed");

    assert_eq!(outcome.attempts_used, 2);
    assert_eq!(service.budgets(), vec![1000, 1000]);
}

#[tokio::test(start_paused = true)]
async fn schema_rejection_is_not_retried() {
    // Syntactically valid, but one resultIndex equals result_count (out of
    // range). Must yield exactly one call and a path-tagged error.
    let mut payload: serde_json::Value =
        serde_json::from_str(&unified_payload(1, 2, 3)).unwrap();
    payload["questions"][0]["answers"][1]["resultIndex"] = serde_json::json!(3);

    let service = Arc::new(ScriptedService::new(vec![
        ScriptStep::Reply(payload.to_string()),
        // never reached
        ScriptStep::Reply(unified_payload(1, 2, 3)),
    ]));
    let client = GenerationClient::new(service.clone());

    let err = client
        .generate(&request(SchemaKind::UnifiedQuiz, 1, 3), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(service.calls(), 1, "schema defects must not be retried");
    match err {
        GenerationError::SchemaValidation { path, reason } => {
            assert_eq!(path, "questions[0].answers[1].resultIndex");
            assert!(reason.contains("out of range"));
        }
        other => panic!("expected SchemaValidation, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn exhausted_attempts_summarize_last_failure() {
    let service = Arc::new(ScriptedService::new(vec![
        ScriptStep::ApiError(500, "boom"),
        ScriptStep::ApiError(500, "boom"),
        ScriptStep::ApiError(502, "bad gateway"),
    ]));
    let client = GenerationClient::new(service.clone());

    let err = client
        .generate(&request(SchemaKind::Questions, 2, 3), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(service.calls(), 3);
    match err {
        GenerationError::RetriesExhausted { attempts, last } => {
            assert_eq!(attempts, 3);
            assert!(last.contains("bad gateway"));
        }
        other => panic!("expected RetriesExhausted, got {other:?}"),
    }
}

/// Hangs far past the per-call timeout on its first call, then answers
/// normally, recording the token budget of every call.
struct SlowFirstCallService {
    calls: AtomicUsize,
    budgets: Mutex<Vec<u32>>,
}

#[async_trait]
impl GenerativeService for SlowFirstCallService {
    fn name(&self) -> &'static str {
        "slow-first-call"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, ServiceError> {
        self.budgets.lock().unwrap().push(request.max_output_tokens);
        if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(questions_payload(2, 3))
    }
}

#[tokio::test(start_paused = true)]
async fn hung_call_times_out_and_retries_with_same_budget() {
    stub::init_tracing();
    let service = Arc::new(SlowFirstCallService {
        calls: AtomicUsize::new(0),
        budgets: Mutex::new(Vec::new()),
    });
    let client = GenerationClient::new(service.clone());

    let outcome = client
        .generate(&request(SchemaKind::Questions, 2, 3), &CancellationToken::new())
        .await
        .expect("second attempt should succeed after the timeout");

    // the hung call counts as transient: one retry, same budget
    assert_eq!(outcome.attempts_used, 2);
    assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    assert_eq!(*service.budgets.lock().unwrap(), vec![1000, 1000]);
}

/// Fails transiently and cancels the caller's token from inside the call,
/// so the client sees the cancellation before its retry sleep completes.
struct CancellingService {
    token: CancellationToken,
    calls: AtomicUsize,
}

#[async_trait]
impl GenerativeService for CancellingService {
    fn name(&self) -> &'static str {
        "cancelling"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<String, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.token.cancel();
        Err(ServiceError::Api {
            status: 500,
            body: "flaky".to_string(),
        })
    }
}

#[tokio::test(start_paused = true)]
async fn cancellation_before_second_attempt_stops_the_loop() {
    stub::init_tracing();
    let token = CancellationToken::new();
    let service = Arc::new(CancellingService {
        token: token.clone(),
        calls: AtomicUsize::new(0),
    });
    let client = GenerationClient::new(service.clone());

    let err = client
        .generate(&request(SchemaKind::Questions, 2, 3), &token)
        .await
        .unwrap_err();

    assert!(matches!(err, GenerationError::Cancelled));
    assert_eq!(
        service.calls.load(Ordering::SeqCst),
        1,
        "no further network call after cancellation"
    );
}

#[tokio::test(start_paused = true)]
async fn limiter_permit_is_released_on_cancellation() {
    stub::init_tracing();
    let limiter = Arc::new(Semaphore::new(1));

    // run 1: the service cancels the caller's token mid-attempt
    let token = CancellationToken::new();
    let service = Arc::new(CancellingService {
        token: token.clone(),
        calls: AtomicUsize::new(0),
    });
    let client = GenerationClient::new(service).with_limiter(limiter.clone());
    let err = client
        .generate(&request(SchemaKind::Questions, 2, 3), &token)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::Cancelled));

    // the cancelled run must not leak its permit
    assert_eq!(limiter.available_permits(), 1);

    // run 2: a fresh request through the same limiter still acquires it
    let follow_up = Arc::new(ScriptedService::new(vec![ScriptStep::Reply(
        questions_payload(2, 3),
    )]));
    let client = GenerationClient::new(follow_up).with_limiter(limiter.clone());
    let outcome = client
        .generate(&request(SchemaKind::Questions, 2, 3), &CancellationToken::new())
        .await
        .expect("permit should be available for the next run");
    assert_eq!(outcome.attempts_used, 1);
    assert_eq!(limiter.available_permits(), 1);
}

#[tokio::test]
async fn zero_attempt_budget_is_an_input_error() {
    let service = Arc::new(ScriptedService::new(vec![]));
    let client = GenerationClient::new(service.clone());

    let mut req = request(SchemaKind::Questions, 2, 3);
    req.max_attempts = 0;
    let err = client.generate(&req, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, GenerationError::InvalidInput(_)));
    assert_eq!(service.calls(), 0);
}
