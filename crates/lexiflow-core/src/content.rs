//! Normalization of raw test content.
//!
//! Content services return flat question records in which Apply-level
//! questions may be split across several records. This module turns them
//! into the typed [`Question`] union, consolidating every Apply record into
//! one matching question, and validates the result.

use std::collections::{HashMap, HashSet};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::SessionError;
use crate::model::{
    BloomLevel, Matching, MatchingPair, Question, QuestionBody, SingleChoice, Word,
};
use crate::text::repair_gap;

/// Identifier of the consolidated Apply question.
pub const MATCHING_QUESTION_ID: &str = "level-3-master";
const MATCHING_TEXT: &str = "Match the words to the correct sentences.";
const MATCHING_EXPLANATION: &str = "Match each word to its context.";

/// A question record as produced by a content service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawQuestion {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub word_term: Option<String>,
    pub level: String,
    #[serde(default)]
    pub question_text: String,
    #[serde(default)]
    pub question_text_vi: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<String>>,
    #[serde(default)]
    pub options_vi: Option<Vec<String>>,
    #[serde(default)]
    pub correct_option: Option<String>,
    #[serde(default)]
    pub matching_pairs: Option<Vec<RawMatchingPair>>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub explanation_vi: Option<String>,
}

/// A matching-pair record as produced by a content service.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawMatchingPair {
    #[serde(default)]
    pub id: String,
    pub question_text: String,
    #[serde(default)]
    pub question_text_vi: Option<String>,
    pub correct_answer: String,
}

/// Parse a JSON array of raw question records and normalize it.
pub fn parse_test_json(json: &str) -> Result<Vec<Question>> {
    let raw: Vec<RawQuestion> =
        serde_json::from_str(json).context("failed to parse question records")?;
    Ok(normalize_test(raw)?)
}

/// Convert raw records into typed questions.
///
/// All Apply records are merged into a single matching question appended
/// after the other questions. Pair terms are trimmed, pair ids are
/// reassigned, and sentences missing their gap marker are repaired.
/// Records with an unknown level, or single-choice records without options
/// or a correct option, fail with [`SessionError::MalformedQuestion`].
pub fn normalize_test(raw: Vec<RawQuestion>) -> Result<Vec<Question>, SessionError> {
    let batch = uuid::Uuid::new_v4().simple().to_string();
    let batch = &batch[..8];

    let mut questions = Vec::with_capacity(raw.len());
    let mut pairs = Vec::new();
    let mut matching_translation = None;

    for (index, record) in raw.into_iter().enumerate() {
        let id = if record.id.trim().is_empty() {
            format!("q-{index}")
        } else {
            record.id.clone()
        };

        let level: BloomLevel =
            record
                .level
                .parse()
                .map_err(|reason: String| SessionError::MalformedQuestion {
                    question_id: id.clone(),
                    reason,
                })?;

        if level == BloomLevel::Apply {
            if matching_translation.is_none() {
                matching_translation = record.question_text_vi.clone();
            }
            for pair in record.matching_pairs.unwrap_or_default() {
                pairs.push(normalize_pair(&id, pair));
            }
            continue;
        }

        let options = record.options.unwrap_or_default();
        if options.is_empty() {
            return Err(SessionError::MalformedQuestion {
                question_id: id,
                reason: "single-choice question has no options".into(),
            });
        }
        let Some(correct_option) = record.correct_option else {
            return Err(SessionError::MalformedQuestion {
                question_id: id,
                reason: "single-choice question has no correct option".into(),
            });
        };

        let choice = SingleChoice {
            options,
            options_translated: record.options_vi.unwrap_or_default(),
            correct_option,
        };
        let body = QuestionBody::single_choice(level, choice).ok_or_else(|| {
            SessionError::MalformedQuestion {
                question_id: id.clone(),
                reason: "Apply level cannot be single choice".into(),
            }
        })?;

        questions.push(Question {
            id,
            word_term: record.word_term,
            text: record.question_text,
            text_translated: record.question_text_vi,
            explanation: record.explanation,
            explanation_translated: record.explanation_vi,
            body,
        });
    }

    if !pairs.is_empty() {
        for (index, pair) in pairs.iter_mut().enumerate() {
            pair.id = format!("pair-{index}-{batch}");
        }
        questions.push(Question {
            id: MATCHING_QUESTION_ID.to_string(),
            word_term: None,
            text: MATCHING_TEXT.to_string(),
            text_translated: matching_translation,
            explanation: Some(MATCHING_EXPLANATION.to_string()),
            explanation_translated: None,
            body: QuestionBody::Apply(Matching { pairs }),
        });
    }

    Ok(questions)
}

fn normalize_pair(question_id: &str, raw: RawMatchingPair) -> MatchingPair {
    let sentence = match repair_gap(&raw.question_text) {
        Some(repaired) => {
            let err = SessionError::MalformedQuestion {
                question_id: question_id.to_string(),
                reason: format!("sentence without gap marker: {:?}", raw.question_text),
            };
            tracing::warn!("{err}; appending gap");
            repaired
        }
        None => raw.question_text,
    };

    MatchingPair {
        id: raw.id,
        sentence,
        sentence_translated: raw.question_text_vi,
        correct_term: raw.correct_answer.trim().to_string(),
    }
}

/// Number of questions a complete test over `word_count` words contains.
pub fn expected_question_count(word_count: usize) -> usize {
    if word_count == 0 {
        0
    } else {
        3 * word_count + 1
    }
}

/// A warning from test validation.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The question ID (if applicable).
    pub question_id: Option<String>,
    /// Warning message.
    pub message: String,
}

/// Validate a normalized test for common content issues.
///
/// When `words` is non-empty the per-level distribution is checked against
/// it as well.
pub fn validate_test(questions: &[Question], words: &[Word]) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();

    let mut seen_ids = HashSet::new();
    for q in questions {
        if !seen_ids.insert(q.id.as_str()) {
            warnings.push(ValidationWarning {
                question_id: Some(q.id.clone()),
                message: format!("duplicate question ID: {}", q.id),
            });
        }
    }

    for q in questions {
        if let Some(choice) = q.single_choice() {
            if !choice.options.contains(&choice.correct_option) {
                warnings.push(ValidationWarning {
                    question_id: Some(q.id.clone()),
                    message: "correct option is not among the options".into(),
                });
            }
            if !choice.options_translated.is_empty()
                && choice.options_translated.len() != choice.options.len()
            {
                warnings.push(ValidationWarning {
                    question_id: Some(q.id.clone()),
                    message: format!(
                        "{} translated options for {} options",
                        choice.options_translated.len(),
                        choice.options.len()
                    ),
                });
            }
            if choice.options.len() < 2 {
                warnings.push(ValidationWarning {
                    question_id: Some(q.id.clone()),
                    message: "fewer than two options".into(),
                });
            }
        }
    }

    let mut per_level: HashMap<BloomLevel, usize> = HashMap::new();
    for q in questions {
        *per_level.entry(q.level()).or_default() += 1;
    }
    let apply_count = per_level.get(&BloomLevel::Apply).copied().unwrap_or(0);
    if apply_count > 1 {
        warnings.push(ValidationWarning {
            question_id: None,
            message: format!("{apply_count} Apply questions; expected one consolidated question"),
        });
    }

    if words.is_empty() {
        return warnings;
    }

    let expected = expected_question_count(words.len());
    if questions.len() != expected {
        warnings.push(ValidationWarning {
            question_id: None,
            message: format!(
                "{} questions for {} studied words; expected {expected}",
                questions.len(),
                words.len()
            ),
        });
    }

    for level in [BloomLevel::Remember, BloomLevel::Understand, BloomLevel::Analyse] {
        let count = per_level.get(&level).copied().unwrap_or(0);
        if count != words.len() {
            warnings.push(ValidationWarning {
                question_id: None,
                message: format!(
                    "{count} {level} questions for {} studied words",
                    words.len()
                ),
            });
        }
    }

    let pair_count: usize = questions
        .iter()
        .filter_map(Question::matching)
        .map(|m| m.pairs.len())
        .sum();
    if pair_count != words.len() {
        warnings.push(ValidationWarning {
            question_id: Some(MATCHING_QUESTION_ID.to_string()),
            message: format!("{pair_count} matching pairs for {} studied words", words.len()),
        });
    }

    let terms: HashSet<String> = words.iter().map(|w| w.term.to_lowercase()).collect();
    for q in questions {
        if let Some(term) = &q.word_term {
            if !terms.contains(&term.to_lowercase()) {
                warnings.push(ValidationWarning {
                    question_id: Some(q.id.clone()),
                    message: format!("question tests '{term}', which was not studied"),
                });
            }
        }
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;

    const RAW_TEST: &str = r#"[
        {
            "id": "r1", "wordTerm": "ocean", "level": "Remember",
            "questionText": "What does 'ocean' mean?",
            "options": ["a very big sea", "a small river", "a tall hill"],
            "correctOption": "a very big sea"
        },
        {
            "id": "ap1", "level": "Apply", "questionText": "Match",
            "questionTextVi": "Nối",
            "matchingPairs": [
                {"id": "x", "questionText": "The [[GAP]] was calm.", "correctAnswer": " ocean "}
            ]
        },
        {
            "id": "ap2", "level": "Apply", "questionText": "Match",
            "matchingPairs": [
                {"id": "y", "questionText": "She made a _____ fast.", "correctAnswer": "decision"}
            ]
        },
        {
            "id": "an1", "wordTerm": "decision", "level": "Analyse",
            "questionText": "Pick the correct sentence",
            "options": ["He **made a decision**.", "He **did a decision**."],
            "correctOption": "He **made a decision**."
        }
    ]"#;

    fn word(term: &str) -> Word {
        Word {
            term: term.into(),
            meaning: String::new(),
            pronunciation: String::new(),
            part_of_speech: String::new(),
            examples: vec![],
            term_translated: None,
            meaning_translated: None,
            examples_translated: vec![],
        }
    }

    #[test]
    fn consolidates_apply_records() {
        let questions = parse_test_json(RAW_TEST).unwrap();
        assert_eq!(questions.len(), 3);

        let apply: Vec<_> = questions
            .iter()
            .filter(|q| q.level() == BloomLevel::Apply)
            .collect();
        assert_eq!(apply.len(), 1);
        assert_eq!(apply[0].id, MATCHING_QUESTION_ID);
        assert_eq!(apply[0].text_translated.as_deref(), Some("Nối"));

        let pairs = &apply[0].matching().unwrap().pairs;
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].correct_term, "ocean");
        assert!(pairs[0].id.starts_with("pair-0-"));
        assert!(pairs[1].id.starts_with("pair-1-"));
        assert_ne!(pairs[0].id, pairs[1].id);
    }

    #[test]
    fn repairs_missing_gap_marker() {
        let questions = parse_test_json(RAW_TEST).unwrap();
        let pairs = &questions
            .iter()
            .find_map(Question::matching)
            .unwrap()
            .pairs;
        assert_eq!(pairs[1].sentence, "She made a  fast. [[GAP]]");
    }

    #[test]
    fn rejects_choice_without_correct_option() {
        let raw = vec![RawQuestion {
            id: "bad".into(),
            level: "Understand".into(),
            question_text: "?".into(),
            options: Some(vec!["a".into(), "b".into()]),
            ..Default::default()
        }];
        let err = normalize_test(raw).unwrap_err();
        assert!(matches!(err, SessionError::MalformedQuestion { ref question_id, .. } if question_id == "bad"));
    }

    #[test]
    fn rejects_unknown_level() {
        let raw = vec![RawQuestion {
            level: "Create".into(),
            options: Some(vec!["a".into()]),
            correct_option: Some("a".into()),
            ..Default::default()
        }];
        let err = normalize_test(raw).unwrap_err();
        assert!(err.to_string().contains("q-0"));
    }

    #[test]
    fn validate_reports_distribution_gaps() {
        let questions = parse_test_json(RAW_TEST).unwrap();
        let warnings = validate_test(&questions, &[word("ocean"), word("decision")]);
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("0 Understand questions")));
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("1 Remember questions")));
        assert!(!warnings.iter().any(|w| w.message.contains("matching pairs")));
    }

    #[test]
    fn validate_flags_missing_correct_option() {
        let mut questions = parse_test_json(RAW_TEST).unwrap();
        if let QuestionBody::Remember(choice) = &mut questions[0].body {
            choice.correct_option = "something else".into();
        }
        let warnings = validate_test(&questions, &[]);
        assert!(warnings
            .iter()
            .any(|w| w.message.contains("not among the options")));
    }

    #[test]
    fn validate_reports_total_question_count() {
        assert_eq!(expected_question_count(0), 0);
        assert_eq!(expected_question_count(2), 7);

        let questions = parse_test_json(RAW_TEST).unwrap();
        let warnings = validate_test(&questions, &[word("ocean"), word("decision")]);
        assert!(warnings
            .iter()
            .any(|w| w.question_id.is_none() && w.message.contains("3 questions for 2 studied words; expected 7")));

        let unscoped = validate_test(&questions, &[]);
        assert!(!unscoped.iter().any(|w| w.message.contains("expected 7")));
    }
}
