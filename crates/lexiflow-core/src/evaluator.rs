//! Answer evaluation.
//!
//! Single-choice questions are graded by exact, case-sensitive equality with
//! the designated option. The matching question is graded pair by pair with
//! a case-insensitive, trimmed comparison and is correct only when every
//! pair is.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SessionError};
use crate::model::{Matching, Question, QuestionBody, SingleChoice, Submission, UserAnswer};

/// Outcome of grading one submission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evaluation {
    pub is_correct: bool,
    /// The answer to store in the session answer map.
    pub answer: UserAnswer,
    /// Per-pair detail for the matching question; empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pair_verdicts: Vec<PairVerdict>,
}

/// Grading detail for one matching pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairVerdict {
    pub pair_id: String,
    pub correct_term: String,
    pub given: Option<String>,
    pub is_correct: bool,
}

/// Grade `submission` against `question`.
///
/// Missing matching entries count as wrong for their pair; callers that
/// must reject partial answers use [`check_complete`] first.
pub fn evaluate(question: &Question, submission: Submission) -> Result<Evaluation> {
    match (&question.body, submission) {
        (QuestionBody::Apply(matching), Submission::Matching(placed)) => {
            let pair_verdicts = grade_matching(matching, &placed);
            let is_correct = pair_verdicts.iter().all(|v| v.is_correct);
            Ok(Evaluation {
                is_correct,
                answer: UserAnswer {
                    question_id: question.id.clone(),
                    submission: Submission::Matching(placed),
                    is_correct,
                },
                pair_verdicts,
            })
        }
        (QuestionBody::Apply(_), Submission::Choice(_)) => Err(SessionError::SubmissionMismatch {
            question_id: question.id.clone(),
            expected: "matching",
        }),
        (
            QuestionBody::Remember(choice)
            | QuestionBody::Understand(choice)
            | QuestionBody::Analyse(choice),
            Submission::Choice(selected),
        ) => {
            let is_correct = grade_choice(choice, &selected);
            Ok(Evaluation {
                is_correct,
                answer: UserAnswer {
                    question_id: question.id.clone(),
                    submission: Submission::Choice(selected),
                    is_correct,
                },
                pair_verdicts: Vec::new(),
            })
        }
        (_, Submission::Matching(_)) => Err(SessionError::SubmissionMismatch {
            question_id: question.id.clone(),
            expected: "single-choice",
        }),
    }
}

/// Reject submissions that are not gradeable yet: an empty choice, or a
/// matching answer that leaves any pair without an entry.
pub fn check_complete(question: &Question, submission: &Submission) -> Result<()> {
    match (&question.body, submission) {
        (QuestionBody::Apply(matching), Submission::Matching(placed)) => {
            let missing: Vec<String> = matching
                .pairs
                .iter()
                .filter(|p| !placed.get(&p.id).is_some_and(|t| !t.trim().is_empty()))
                .map(|p| p.id.clone())
                .collect();
            if missing.is_empty() {
                Ok(())
            } else {
                Err(SessionError::IncompleteSubmission { missing })
            }
        }
        (QuestionBody::Apply(_), Submission::Choice(_)) => Err(SessionError::SubmissionMismatch {
            question_id: question.id.clone(),
            expected: "matching",
        }),
        (_, Submission::Choice(selected)) => {
            if selected.is_empty() {
                Err(SessionError::EmptyChoice)
            } else {
                Ok(())
            }
        }
        (_, Submission::Matching(_)) => Err(SessionError::SubmissionMismatch {
            question_id: question.id.clone(),
            expected: "single-choice",
        }),
    }
}

fn grade_choice(choice: &SingleChoice, selected: &str) -> bool {
    selected == choice.correct_option
}

fn grade_matching(
    matching: &Matching,
    placed: &std::collections::HashMap<String, String>,
) -> Vec<PairVerdict> {
    matching
        .pairs
        .iter()
        .map(|pair| {
            let given = placed.get(&pair.id).cloned();
            let is_correct = given
                .as_deref()
                .is_some_and(|term| terms_match(term, &pair.correct_term));
            PairVerdict {
                pair_id: pair.id.clone(),
                correct_term: pair.correct_term.clone(),
                given,
                is_correct,
            }
        })
        .collect()
}

/// Case-insensitive comparison after trimming surrounding whitespace.
fn terms_match(given: &str, expected: &str) -> bool {
    given.trim().to_lowercase() == expected.trim().to_lowercase()
}
