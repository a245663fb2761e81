//! Core data model types for lexiflow.
//!
//! These are the types the whole system uses to represent studied words,
//! assessment questions, learner submissions, and session configuration.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Literal token marking the gap in a matching-pair sentence.
pub const GAP_MARKER: &str = "[[GAP]]";

/// Word count used when the learner supplies no explicit target words.
pub const DEFAULT_WORD_COUNT: usize = 5;

// ---------------------------------------------------------------------------
// Levels
// ---------------------------------------------------------------------------

/// CEFR proficiency level the session targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CefrLevel {
    A1,
    A2,
    #[default]
    B1,
    B2,
    C1,
    C2,
}

impl CefrLevel {
    pub const ALL: [CefrLevel; 6] = [
        CefrLevel::A1,
        CefrLevel::A2,
        CefrLevel::B1,
        CefrLevel::B2,
        CefrLevel::C1,
        CefrLevel::C2,
    ];
}

impl fmt::Display for CefrLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            CefrLevel::A1 => "A1",
            CefrLevel::A2 => "A2",
            CefrLevel::B1 => "B1",
            CefrLevel::B2 => "B2",
            CefrLevel::C1 => "C1",
            CefrLevel::C2 => "C2",
        };
        f.write_str(s)
    }
}

impl FromStr for CefrLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A1" => Ok(CefrLevel::A1),
            "A2" => Ok(CefrLevel::A2),
            "B1" => Ok(CefrLevel::B1),
            "B2" => Ok(CefrLevel::B2),
            "C1" => Ok(CefrLevel::C1),
            "C2" => Ok(CefrLevel::C2),
            other => Err(format!("unknown CEFR level: {other}")),
        }
    }
}

/// The four assessment tiers, in their fixed difficulty progression.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum BloomLevel {
    Remember,
    Understand,
    Apply,
    Analyse,
}

impl BloomLevel {
    /// All levels in presentation order.
    pub const ALL: [BloomLevel; 4] = [
        BloomLevel::Remember,
        BloomLevel::Understand,
        BloomLevel::Apply,
        BloomLevel::Analyse,
    ];

    /// Short learner-facing label ("Level 1" .. "Level 4").
    pub fn label(self) -> &'static str {
        match self {
            BloomLevel::Remember => "Level 1",
            BloomLevel::Understand => "Level 2",
            BloomLevel::Apply => "Level 3",
            BloomLevel::Analyse => "Level 4",
        }
    }
}

impl fmt::Display for BloomLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BloomLevel::Remember => write!(f, "Remember"),
            BloomLevel::Understand => write!(f, "Understand"),
            BloomLevel::Apply => write!(f, "Apply"),
            BloomLevel::Analyse => write!(f, "Analyse"),
        }
    }
}

impl FromStr for BloomLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "remember" => Ok(BloomLevel::Remember),
            "understand" => Ok(BloomLevel::Understand),
            "apply" => Ok(BloomLevel::Apply),
            "analyse" | "analyze" => Ok(BloomLevel::Analyse),
            other => Err(format!("unknown bloom level: {other}")),
        }
    }
}

// ---------------------------------------------------------------------------
// Words
// ---------------------------------------------------------------------------

/// A studied vocabulary entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Word {
    pub term: String,
    pub meaning: String,
    /// IPA notation.
    #[serde(default)]
    pub pronunciation: String,
    #[serde(default)]
    pub part_of_speech: String,
    /// Example sentences; each may wrap its collocation in `**...**`.
    #[serde(default)]
    pub examples: Vec<String>,
    #[serde(default, alias = "termVi", skip_serializing_if = "Option::is_none")]
    pub term_translated: Option<String>,
    #[serde(default, alias = "meaningVi", skip_serializing_if = "Option::is_none")]
    pub meaning_translated: Option<String>,
    /// Translations parallel to `examples`.
    #[serde(default, alias = "examplesVi", skip_serializing_if = "Vec::is_empty")]
    pub examples_translated: Vec<String>,
}

/// Column a pool candidate is listed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum WordCategory {
    Nouns,
    Verbs,
    Adjectives,
    Adverbs,
    #[serde(rename = "Mix (Other)", alias = "Other")]
    Other,
}

impl WordCategory {
    pub const ALL: [WordCategory; 5] = [
        WordCategory::Nouns,
        WordCategory::Verbs,
        WordCategory::Adjectives,
        WordCategory::Adverbs,
        WordCategory::Other,
    ];
}

impl fmt::Display for WordCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WordCategory::Nouns => write!(f, "Nouns"),
            WordCategory::Verbs => write!(f, "Verbs"),
            WordCategory::Adjectives => write!(f, "Adjectives"),
            WordCategory::Adverbs => write!(f, "Adverbs"),
            WordCategory::Other => write!(f, "Mix (Other)"),
        }
    }
}

/// A candidate term offered for selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordPoolItem {
    pub term: String,
    pub category: WordCategory,
}

/// Candidate pool plus the topic it was generated for.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordPool {
    pub topic: String,
    pub pool: Vec<WordPoolItem>,
}

/// Full word details plus the topic they belong to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocabulary {
    pub topic: String,
    pub words: Vec<Word>,
}

// ---------------------------------------------------------------------------
// Questions
// ---------------------------------------------------------------------------

/// One gapped sentence of the consolidated Apply question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchingPair {
    pub id: String,
    /// Sentence containing [`GAP_MARKER`].
    #[serde(alias = "questionText")]
    pub sentence: String,
    #[serde(default, alias = "questionTextVi", skip_serializing_if = "Option::is_none")]
    pub sentence_translated: Option<String>,
    /// The exact term that fills the gap.
    #[serde(alias = "correctAnswer")]
    pub correct_term: String,
}

/// Payload of a single-choice question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleChoice {
    pub options: Vec<String>,
    /// Translations parallel to `options` (may be empty).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options_translated: Vec<String>,
    pub correct_option: String,
}

/// Payload of the matching question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matching {
    pub pairs: Vec<MatchingPair>,
}

/// Level-tagged question body. Apply is always a matching exercise;
/// the other levels are always single choice.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "level")]
pub enum QuestionBody {
    Remember(SingleChoice),
    Understand(SingleChoice),
    Apply(Matching),
    Analyse(SingleChoice),
}

impl QuestionBody {
    /// Build a single-choice body for `level`. Returns `None` for Apply.
    pub fn single_choice(level: BloomLevel, choice: SingleChoice) -> Option<Self> {
        match level {
            BloomLevel::Remember => Some(QuestionBody::Remember(choice)),
            BloomLevel::Understand => Some(QuestionBody::Understand(choice)),
            BloomLevel::Analyse => Some(QuestionBody::Analyse(choice)),
            BloomLevel::Apply => None,
        }
    }

    pub fn level(&self) -> BloomLevel {
        match self {
            QuestionBody::Remember(_) => BloomLevel::Remember,
            QuestionBody::Understand(_) => BloomLevel::Understand,
            QuestionBody::Apply(_) => BloomLevel::Apply,
            QuestionBody::Analyse(_) => BloomLevel::Analyse,
        }
    }
}

/// An assessment question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    /// Term this question tests (absent for the consolidated Apply question).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_term: Option<String>,
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_translated: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation_translated: Option<String>,
    #[serde(flatten)]
    pub body: QuestionBody,
}

impl Question {
    pub fn level(&self) -> BloomLevel {
        self.body.level()
    }

    pub fn single_choice(&self) -> Option<&SingleChoice> {
        match &self.body {
            QuestionBody::Remember(c) | QuestionBody::Understand(c) | QuestionBody::Analyse(c) => {
                Some(c)
            }
            QuestionBody::Apply(_) => None,
        }
    }

    pub fn matching(&self) -> Option<&Matching> {
        match &self.body {
            QuestionBody::Apply(m) => Some(m),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Answers
// ---------------------------------------------------------------------------

/// What the learner submitted for a question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Submission {
    /// The chosen option string.
    Choice(String),
    /// Pair id → term placed in that gap.
    Matching(HashMap<String, String>),
}

/// A graded submission, keyed by question id in the session answer map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAnswer {
    pub question_id: String,
    pub submission: Submission,
    pub is_correct: bool,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Learner-provided session setup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionConfig {
    pub level: CefrLevel,
    /// Requested topic; `None` lets the content service choose.
    #[serde(default)]
    pub topic: Option<String>,
    /// Raw comma-separated list of explicit target words.
    #[serde(default)]
    pub target_words: Option<String>,
    pub num_words: usize,
}

impl SessionConfig {
    /// Build a configuration, deriving the word count from `target_words`.
    ///
    /// Blank topic or word list are treated as absent.
    pub fn new(level: CefrLevel, topic: Option<String>, target_words: Option<String>) -> Self {
        let topic = topic.filter(|t| !t.trim().is_empty());
        let target_words = target_words.filter(|w| !w.trim().is_empty());
        let num_words = match &target_words {
            Some(raw) => count_target_words(raw),
            None => DEFAULT_WORD_COUNT,
        };
        Self {
            level,
            topic,
            target_words,
            num_words,
        }
    }

    /// Whether setup should skip the candidate pool.
    pub fn has_target_words(&self) -> bool {
        self.target_words
            .as_deref()
            .is_some_and(|w| count_target_words(w) > 0)
    }

    /// The explicit target words, trimmed, with empty entries dropped.
    pub fn target_word_list(&self) -> Vec<String> {
        self.target_words
            .as_deref()
            .map(split_target_words)
            .unwrap_or_default()
    }

    /// Replace the target words with a confirmed pool selection.
    pub fn with_selection(&self, selected: &[String]) -> Self {
        Self {
            level: self.level,
            topic: self.topic.clone(),
            target_words: Some(selected.join(", ")),
            num_words: selected.len(),
        }
    }
}

/// Count the non-empty comma-separated entries in `raw`.
pub fn count_target_words(raw: &str) -> usize {
    raw.split(',').filter(|w| !w.trim().is_empty()).count()
}

fn split_target_words(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|w| !w.is_empty())
        .map(String::from)
        .collect()
}
