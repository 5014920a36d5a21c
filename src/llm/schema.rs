// src/llm/schema.rs
// Structural contracts for generated content.
//
// Validation stops at the first violation and reports a dotted field path
// plus a human-readable reason, so callers can branch without exception
// style control flow. Validation failures are terminal for a generation
// request: they indicate a shape defect, not truncation.

use serde_json::Value;

use crate::types::{
    AnswerOption, GeneratedQuestion, GeneratedQuiz, GeneratedResult,
};

/// Which content contract a generation stage expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaKind {
    Questions,
    Results,
    UnifiedQuiz,
}

/// Expected shape for one generation request. Counts mirror what the
/// prompt explicitly asked the model for.
#[derive(Debug, Clone, Copy)]
pub struct SchemaExpectation {
    pub kind: SchemaKind,
    pub question_count: usize,
    pub result_count: usize,
}

/// First contract violation found, with a dotted path like
/// `questions[2].answers[1].resultIndex`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub reason: String,
}

impl SchemaViolation {
    fn new(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

/// Typed value produced by a successful validation.
#[derive(Debug, Clone)]
pub enum ValidatedPayload {
    Questions(Vec<GeneratedQuestion>),
    Results(Vec<GeneratedResult>),
    Quiz(GeneratedQuiz),
}

/// Validate a parsed object against the contract for `expected.kind`.
pub fn validate(
    value: &Value,
    expected: &SchemaExpectation,
) -> Result<ValidatedPayload, SchemaViolation> {
    match expected.kind {
        SchemaKind::Questions => {
            let questions = validate_questions(value, expected.question_count, None)?;
            Ok(ValidatedPayload::Questions(questions))
        }
        SchemaKind::Results => {
            let results = validate_results(value, expected.result_count)?;
            Ok(ValidatedPayload::Results(results))
        }
        SchemaKind::UnifiedQuiz => {
            let questions = validate_questions(
                value,
                expected.question_count,
                Some(expected.result_count),
            )?;
            let results = validate_results(value, expected.result_count)?;
            let title = optional_field_str(value, "title");
            let subtitle = optional_field_str(value, "subtitle");
            Ok(ValidatedPayload::Quiz(GeneratedQuiz {
                title,
                subtitle,
                questions,
                results,
            }))
        }
    }
}

/// `questions` must be a list of exactly `expected_count` entries, each
/// with non-empty text and at least two answers with non-empty text.
/// For the unified contract, `result_range` additionally forces every
/// answer's `resultIndex` to be an integer in `[0, result_count)`.
fn validate_questions(
    value: &Value,
    expected_count: usize,
    result_range: Option<usize>,
) -> Result<Vec<GeneratedQuestion>, SchemaViolation> {
    let list = value
        .get("questions")
        .and_then(Value::as_array)
        .ok_or_else(|| SchemaViolation::new("questions", "expected a list"))?;

    if list.len() != expected_count {
        return Err(SchemaViolation::new(
            "questions",
            format!("expected exactly {} questions, got {}", expected_count, list.len()),
        ));
    }

    let mut questions = Vec::with_capacity(list.len());
    for (qi, question) in list.iter().enumerate() {
        let text = required_str(question, "text")
            .map_err(|reason| SchemaViolation::new(format!("questions[{qi}].text"), reason))?;

        let answers_path = format!("questions[{qi}].answers");
        let answers = question
            .get("answers")
            .and_then(Value::as_array)
            .ok_or_else(|| SchemaViolation::new(&answers_path, "expected a list"))?;
        if answers.len() < 2 {
            return Err(SchemaViolation::new(
                &answers_path,
                format!("expected at least 2 answers, got {}", answers.len()),
            ));
        }

        let mut parsed_answers = Vec::with_capacity(answers.len());
        for (ai, answer) in answers.iter().enumerate() {
            let text = required_str(answer, "text").map_err(|reason| {
                SchemaViolation::new(format!("questions[{qi}].answers[{ai}].text"), reason)
            })?;

            let index_path = format!("questions[{qi}].answers[{ai}].resultIndex");
            let result_index = match answer.get("resultIndex") {
                None | Some(Value::Null) => {
                    if result_range.is_some() {
                        return Err(SchemaViolation::new(index_path, "resultIndex is required"));
                    }
                    None
                }
                Some(v) => match v.as_u64() {
                    Some(n) => Some(n as usize),
                    None => {
                        return Err(SchemaViolation::new(
                            index_path,
                            "resultIndex must be a non-negative integer",
                        ));
                    }
                },
            };

            if let (Some(result_count), Some(index)) = (result_range, result_index) {
                if index >= result_count {
                    return Err(SchemaViolation::new(
                        index_path,
                        format!("resultIndex {index} out of range [0, {result_count})"),
                    ));
                }
            }

            parsed_answers.push(AnswerOption { text, result_index });
        }

        questions.push(GeneratedQuestion {
            text,
            answers: parsed_answers,
        });
    }

    Ok(questions)
}

/// `results` must be a list of exactly `expected_count` entries, each with
/// non-empty name and summary; `traits` must be present as a list (possibly
/// empty) of strings.
fn validate_results(
    value: &Value,
    expected_count: usize,
) -> Result<Vec<GeneratedResult>, SchemaViolation> {
    let list = value
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| SchemaViolation::new("results", "expected a list"))?;

    if list.len() != expected_count {
        return Err(SchemaViolation::new(
            "results",
            format!("expected exactly {} results, got {}", expected_count, list.len()),
        ));
    }

    let mut results = Vec::with_capacity(list.len());
    for (ri, result) in list.iter().enumerate() {
        let name = required_str(result, "name")
            .map_err(|reason| SchemaViolation::new(format!("results[{ri}].name"), reason))?;
        let summary = required_str(result, "summary")
            .map_err(|reason| SchemaViolation::new(format!("results[{ri}].summary"), reason))?;

        let traits_path = format!("results[{ri}].traits");
        let traits_value = result
            .get("traits")
            .ok_or_else(|| SchemaViolation::new(&traits_path, "traits is required"))?;
        let traits_list = traits_value
            .as_array()
            .ok_or_else(|| SchemaViolation::new(&traits_path, "expected a list"))?;

        let mut traits = Vec::with_capacity(traits_list.len());
        for (ti, item) in traits_list.iter().enumerate() {
            let s = item.as_str().ok_or_else(|| {
                SchemaViolation::new(format!("results[{ri}].traits[{ti}]"), "expected a string")
            })?;
            traits.push(s.to_string());
        }

        results.push(GeneratedResult {
            name,
            emoji: optional_field_str(result, "emoji"),
            summary,
            traits,
            recommendation: optional_field_str(result, "recommendation"),
        });
    }

    Ok(results)
}

fn required_str(value: &Value, field: &str) -> Result<String, String> {
    match value.get(field).and_then(Value::as_str) {
        Some(s) if !s.trim().is_empty() => Ok(s.to_string()),
        Some(_) => Err(format!("{field} must not be empty")),
        None => Err(format!("{field} must be a string")),
    }
}

fn optional_field_str(value: &Value, field: &str) -> String {
    value
        .get(field)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}
