//! Deterministic, network-free content service.
//!
//! Builds words and a complete test from the requested terms alone, so a
//! session can run without an API key. Tests use it as a mock: failures can
//! be injected per stage and every call is counted.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use lexiflow_core::content::{normalize_test, RawMatchingPair, RawQuestion};
use lexiflow_core::error::AcquisitionStage;
use lexiflow_core::model::{
    Question, Vocabulary, Word, WordCategory, WordPool, WordPoolItem, DEFAULT_WORD_COUNT,
};
use lexiflow_core::traits::{ContentService, TestRequest, VocabularyRequest, WordPoolRequest};

const DEFAULT_TOPIC: &str = "Everyday Life";

/// Built-in candidates per pool column.
const POOL: [(WordCategory, &[&str]); 5] = [
    (
        WordCategory::Nouns,
        &["journey", "habit", "decision", "neighbour", "schedule", "advice"],
    ),
    (
        WordCategory::Verbs,
        &["borrow", "arrange", "improve", "remind", "avoid", "celebrate"],
    ),
    (
        WordCategory::Adjectives,
        &["reliable", "crowded", "curious", "tidy", "generous", "narrow"],
    ),
    (
        WordCategory::Adverbs,
        &["rarely", "nearly", "suddenly", "gently", "eventually", "abroad"],
    ),
    (
        WordCategory::Other,
        &["by the way", "on time", "take turns", "in charge of", "make sense", "at least"],
    ),
];

const FILLER_MEANINGS: [&str; 2] = [
    "a kind of weather that comes in winter",
    "a way of moving quickly with your feet",
];

/// Offline content service.
pub struct OfflineContentService {
    default_topic: String,
    failing: Mutex<HashSet<AcquisitionStage>>,
    pool_calls: AtomicU32,
    vocabulary_calls: AtomicU32,
    test_calls: AtomicU32,
    last_vocabulary_request: Mutex<Option<VocabularyRequest>>,
}

impl Default for OfflineContentService {
    fn default() -> Self {
        Self::new(None)
    }
}

impl OfflineContentService {
    pub fn new(default_topic: Option<String>) -> Self {
        Self {
            default_topic: default_topic.unwrap_or_else(|| DEFAULT_TOPIC.to_string()),
            failing: Mutex::new(HashSet::new()),
            pool_calls: AtomicU32::new(0),
            vocabulary_calls: AtomicU32::new(0),
            test_calls: AtomicU32::new(0),
            last_vocabulary_request: Mutex::new(None),
        }
    }

    /// Make every later call for `stage` fail.
    pub fn fail_on(&self, stage: AcquisitionStage) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(stage);
    }

    /// Stop failing calls for `stage`.
    pub fn recover(&self, stage: AcquisitionStage) {
        self.failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&stage);
    }

    /// Number of calls made for `stage`.
    pub fn call_count(&self, stage: AcquisitionStage) -> u32 {
        match stage {
            AcquisitionStage::WordPool => self.pool_calls.load(Ordering::Relaxed),
            AcquisitionStage::Vocabulary => self.vocabulary_calls.load(Ordering::Relaxed),
            AcquisitionStage::Test => self.test_calls.load(Ordering::Relaxed),
        }
    }

    pub fn last_vocabulary_request(&self) -> Option<VocabularyRequest> {
        self.last_vocabulary_request
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn check(&self, stage: AcquisitionStage) -> anyhow::Result<()> {
        let counter = match stage {
            AcquisitionStage::WordPool => &self.pool_calls,
            AcquisitionStage::Vocabulary => &self.vocabulary_calls,
            AcquisitionStage::Test => &self.test_calls,
        };
        counter.fetch_add(1, Ordering::Relaxed);

        let failing = self
            .failing
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(&stage);
        if failing {
            anyhow::bail!("offline service configured to fail {stage} requests");
        }
        Ok(())
    }
}

fn part_of_speech(term: &str) -> &'static str {
    let category = POOL
        .iter()
        .find(|(_, terms)| terms.iter().any(|t| t.eq_ignore_ascii_case(term)))
        .map(|(category, _)| *category);
    match category {
        Some(WordCategory::Nouns) => "noun",
        Some(WordCategory::Verbs) => "verb",
        Some(WordCategory::Adjectives) => "adjective",
        Some(WordCategory::Adverbs) => "adverb",
        Some(WordCategory::Other) => "phrase",
        None => "word",
    }
}

fn meaning(term: &str) -> String {
    format!("the everyday sense of \"{term}\"")
}

fn offline_word(term: &str) -> Word {
    Word {
        term: term.to_string(),
        meaning: meaning(term),
        pronunciation: format!("/{term}/"),
        part_of_speech: part_of_speech(term).to_string(),
        examples: vec![
            format!("I **noticed the {term}** yesterday."),
            format!("She **talked about the {term}** at work."),
            format!("We **need more {term}** here."),
        ],
        term_translated: None,
        meaning_translated: None,
        examples_translated: vec![],
    }
}

/// Put the correct option at a position that varies with `index`.
fn placed_options(correct: String, distractors: [String; 2], index: usize) -> Vec<String> {
    let mut options = vec![correct];
    options.extend(distractors);
    options.rotate_right(index % 3);
    options
}

fn remember(word: &Word, others: &[&Word], index: usize) -> RawQuestion {
    let mut distractors = others
        .iter()
        .map(|w| w.meaning.clone())
        .chain(FILLER_MEANINGS.iter().map(|m| m.to_string()));
    let distractors = [
        distractors.next().unwrap_or_default(),
        distractors.next().unwrap_or_default(),
    ];
    RawQuestion {
        id: format!("remember-{index}"),
        word_term: Some(word.term.clone()),
        level: "Remember".into(),
        question_text: format!("What does \"{}\" mean?", word.term),
        options: Some(placed_options(word.meaning.clone(), distractors, index)),
        correct_option: Some(word.meaning.clone()),
        explanation: Some(format!("\"{}\" means {}.", word.term, word.meaning)),
        ..RawQuestion::default()
    }
}

fn understand(word: &Word, index: usize) -> RawQuestion {
    let term = &word.term;
    let correct = format!("I noticed the {term} yesterday.");
    RawQuestion {
        id: format!("understand-{index}"),
        word_term: Some(term.clone()),
        level: "Understand".into(),
        question_text: format!("Select the sentence that uses the word '{term}' correctly."),
        options: Some(placed_options(
            correct.clone(),
            [
                format!("The {term} yesterday noticed I."),
                format!("I {term} the noticed yesterday."),
            ],
            index + 1,
        )),
        correct_option: Some(correct),
        explanation: Some("Only this sentence puts the word in a normal place.".into()),
        ..RawQuestion::default()
    }
}

fn analyse(word: &Word, index: usize) -> RawQuestion {
    let term = &word.term;
    let correct = word.examples.get(1).cloned().unwrap_or_default();
    RawQuestion {
        id: format!("analyse-{index}"),
        word_term: Some(term.clone()),
        level: "Analyse".into(),
        question_text: format!("Select the sentence that uses the word '{term}' correctly."),
        options: Some(placed_options(
            correct.clone(),
            [
                format!("She **talked the {term}** at work."),
                format!("She **spoke over the {term}** at work."),
            ],
            index + 2,
        )),
        correct_option: Some(correct),
        explanation: Some(format!("We say \"talk about the {term}\".")),
        ..RawQuestion::default()
    }
}

fn apply(words: &[Word]) -> RawQuestion {
    RawQuestion {
        id: "apply".into(),
        level: "Apply".into(),
        question_text: "Match the words to the correct sentences.".into(),
        matching_pairs: Some(
            words
                .iter()
                .map(|w| RawMatchingPair {
                    id: String::new(),
                    question_text: format!(
                        "We need more [[GAP]] here. (starts with \"{}\")",
                        w.term.chars().next().unwrap_or_default()
                    ),
                    question_text_vi: None,
                    correct_answer: w.term.clone(),
                })
                .collect(),
        ),
        ..RawQuestion::default()
    }
}

#[async_trait]
impl ContentService for OfflineContentService {
    fn name(&self) -> &str {
        "offline"
    }

    async fn fetch_word_pool(&self, request: &WordPoolRequest) -> anyhow::Result<WordPool> {
        self.check(AcquisitionStage::WordPool)?;
        let topic = request
            .topic
            .clone()
            .unwrap_or_else(|| self.default_topic.clone());
        let pool = POOL
            .iter()
            .flat_map(|(category, terms)| {
                terms.iter().map(|term| WordPoolItem {
                    term: term.to_string(),
                    category: *category,
                })
            })
            .collect();
        Ok(WordPool { topic, pool })
    }

    async fn fetch_vocabulary(&self, request: &VocabularyRequest) -> anyhow::Result<Vocabulary> {
        self.check(AcquisitionStage::Vocabulary)?;
        *self
            .last_vocabulary_request
            .lock()
            .unwrap_or_else(|e| e.into_inner()) = Some(request.clone());

        let terms: Vec<String> = if request.target_words.is_empty() {
            let count = if request.count == 0 {
                DEFAULT_WORD_COUNT
            } else {
                request.count
            };
            POOL.iter()
                .flat_map(|(_, terms)| terms.iter())
                .step_by(5)
                .take(count)
                .map(|t| t.to_string())
                .collect()
        } else {
            request.target_words.clone()
        };

        Ok(Vocabulary {
            topic: request
                .topic
                .clone()
                .unwrap_or_else(|| self.default_topic.clone()),
            words: terms.iter().map(|t| offline_word(t)).collect(),
        })
    }

    async fn fetch_test(&self, request: &TestRequest) -> anyhow::Result<Vec<Question>> {
        self.check(AcquisitionStage::Test)?;
        if request.words.is_empty() {
            anyhow::bail!("cannot build a test without words");
        }

        let mut raw = Vec::with_capacity(3 * request.words.len() + 1);
        for (i, word) in request.words.iter().enumerate() {
            let others: Vec<&Word> = request
                .words
                .iter()
                .filter(|w| w.term != word.term)
                .collect();
            raw.push(remember(word, &others, i));
            raw.push(understand(word, i));
            raw.push(analyse(word, i));
        }
        raw.push(apply(&request.words));

        Ok(normalize_test(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lexiflow_core::content::validate_test;
    use lexiflow_core::model::{BloomLevel, CefrLevel};

    fn vocabulary_request(words: &[&str]) -> VocabularyRequest {
        VocabularyRequest {
            level: CefrLevel::B1,
            topic: None,
            target_words: words.iter().map(|w| w.to_string()).collect(),
            count: words.len(),
        }
    }

    #[tokio::test]
    async fn pool_has_every_column() {
        let service = OfflineContentService::default();
        let pool = service
            .fetch_word_pool(&WordPoolRequest {
                level: CefrLevel::A2,
                topic: None,
            })
            .await
            .unwrap();
        assert_eq!(pool.topic, "Everyday Life");
        for category in WordCategory::ALL {
            assert!(pool.pool.iter().any(|item| item.category == category));
        }
        assert_eq!(service.call_count(AcquisitionStage::WordPool), 1);
    }

    #[tokio::test]
    async fn vocabulary_uses_target_words() {
        let service = OfflineContentService::default();
        let vocabulary = service
            .fetch_vocabulary(&vocabulary_request(&["ocean", "decision"]))
            .await
            .unwrap();
        assert_eq!(vocabulary.words.len(), 2);
        assert_eq!(vocabulary.words[1].part_of_speech, "noun");
        assert_eq!(vocabulary.words[0].examples.len(), 3);
        assert_eq!(
            service.last_vocabulary_request().unwrap().target_words,
            vec!["ocean", "decision"]
        );
    }

    #[tokio::test]
    async fn vocabulary_without_targets_picks_count() {
        let service = OfflineContentService::default();
        let mut request = vocabulary_request(&[]);
        request.count = 4;
        let vocabulary = service.fetch_vocabulary(&request).await.unwrap();
        assert_eq!(vocabulary.words.len(), 4);
    }

    #[tokio::test]
    async fn test_has_expected_shape() {
        let service = OfflineContentService::default();
        let words = service
            .fetch_vocabulary(&vocabulary_request(&["ocean", "decision"]))
            .await
            .unwrap()
            .words;
        let questions = service
            .fetch_test(&TestRequest {
                level: CefrLevel::B1,
                words: words.clone(),
            })
            .await
            .unwrap();

        assert_eq!(questions.len(), 7);
        for level in [BloomLevel::Remember, BloomLevel::Understand, BloomLevel::Analyse] {
            assert_eq!(questions.iter().filter(|q| q.level() == level).count(), 2);
        }
        let matching = questions.iter().find(|q| q.matching().is_some()).unwrap();
        assert_eq!(matching.matching().unwrap().pairs.len(), 2);
        assert!(validate_test(&questions, &words).is_empty());
    }

    #[tokio::test]
    async fn injected_failure_and_recovery() {
        let service = OfflineContentService::default();
        service.fail_on(AcquisitionStage::Test);
        let request = TestRequest {
            level: CefrLevel::B1,
            words: vec![offline_word("calm")],
        };
        let err = service.fetch_test(&request).await.unwrap_err();
        assert!(err.to_string().contains("test"));

        service.recover(AcquisitionStage::Test);
        assert_eq!(service.fetch_test(&request).await.unwrap().len(), 4);
        assert_eq!(service.call_count(AcquisitionStage::Test), 2);
    }
}
