// src/mapping/mod.rs
// Deterministic answer-to-result assignment.
//
// Round-robin over a running answer position: the aggregate count of
// answers pointing at any two results differs by at most 1 for arbitrary
// input shapes, and within any single question with at least result_count
// answers every result stays reachable (consecutive positions cover all
// residues). Deliberately not semantic clustering; no semantic signal is
// available at this stage.

use std::collections::HashMap;

use serde::ser::{Serialize, SerializeSeq, Serializer};

use crate::error::GenerationError;
use crate::types::GeneratedQuestion;

/// Answer identity: (question index, answer index), scoped to one quiz.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnswerKey {
    pub question: usize,
    pub answer: usize,
}

/// Mapping from answer identity to result index. Key uniqueness is the
/// only ordering guarantee; iteration order is irrelevant.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerMapping {
    entries: HashMap<AnswerKey, usize>,
}

impl AnswerMapping {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, question: usize, answer: usize) -> Option<usize> {
        self.entries.get(&AnswerKey { question, answer }).copied()
    }

    pub fn insert(&mut self, question: usize, answer: usize, result: usize) {
        self.entries.insert(AnswerKey { question, answer }, result);
    }

    pub fn iter(&self) -> impl Iterator<Item = (AnswerKey, usize)> + '_ {
        self.entries.iter().map(|(k, v)| (*k, *v))
    }

    /// How many answers map to each of `result_count` results.
    pub fn result_counts(&self, result_count: usize) -> Vec<usize> {
        let mut counts = vec![0usize; result_count];
        for (_, result) in self.iter() {
            if result < result_count {
                counts[result] += 1;
            }
        }
        counts
    }
}

// Serialized as a deterministic entry list; JSON maps cannot key on
// (question, answer) pairs.
impl Serialize for AnswerMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut entries: Vec<(AnswerKey, usize)> = self.iter().collect();
        entries.sort();

        #[derive(serde::Serialize)]
        struct Entry {
            question: usize,
            answer: usize,
            result: usize,
        }

        let mut seq = serializer.serialize_seq(Some(entries.len()))?;
        for (key, result) in entries {
            seq.serialize_element(&Entry {
                question: key.question,
                answer: key.answer,
                result,
            })?;
        }
        seq.end()
    }
}

/// Assign every answer to a result bucket under the balance invariant.
/// `result_count == 0` is a caller contract violation and fails fast.
pub fn assign(
    questions: &[GeneratedQuestion],
    result_count: usize,
) -> Result<AnswerMapping, GenerationError> {
    if result_count == 0 {
        return Err(GenerationError::InvalidInput(
            "result_count must be positive for answer distribution".into(),
        ));
    }

    let mut mapping = AnswerMapping::default();
    let mut position = 0usize;
    for (qi, question) in questions.iter().enumerate() {
        for ai in 0..question.answers.len() {
            mapping.insert(qi, ai, position % result_count);
            position += 1;
        }
    }
    Ok(mapping)
}

/// Collect the already-assigned indexes from a quiz (unified flow).
pub fn from_assigned(questions: &[GeneratedQuestion]) -> AnswerMapping {
    let mut mapping = AnswerMapping::default();
    for (qi, question) in questions.iter().enumerate() {
        for (ai, answer) in question.answers.iter().enumerate() {
            if let Some(result) = answer.result_index {
                mapping.insert(qi, ai, result);
            }
        }
    }
    mapping
}

/// Fill in only unset `result_index` values from `mapping`, leaving
/// already-set values untouched. Idempotent, so safe to call repeatedly
/// across partial edits.
pub fn apply_preserving_existing(
    questions: &[GeneratedQuestion],
    mapping: &AnswerMapping,
) -> Vec<GeneratedQuestion> {
    let mut filled = questions.to_vec();
    for (qi, question) in filled.iter_mut().enumerate() {
        for (ai, answer) in question.answers.iter_mut().enumerate() {
            if answer.result_index.is_none() {
                answer.result_index = mapping.get(qi, ai);
            }
        }
    }
    filled
}
