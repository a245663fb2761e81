//! Port definitions for the content service and the scheduler's storage.
//!
//! The content service is implemented by the `lexiflow-providers` crate;
//! stores live in [`crate::store`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{CefrLevel, Question, Vocabulary, Word, WordPool};

// ---------------------------------------------------------------------------
// Content service
// ---------------------------------------------------------------------------

/// Backend that generates word pools, word details, and tests.
#[async_trait]
pub trait ContentService: Send + Sync {
    /// Human-readable backend name (e.g. "gemini").
    fn name(&self) -> &str;

    /// Generate a candidate pool. When `request.topic` is `None` the
    /// service picks a topic and returns it.
    async fn fetch_word_pool(&self, request: &WordPoolRequest) -> anyhow::Result<WordPool>;

    /// Generate full details for the requested words.
    async fn fetch_vocabulary(&self, request: &VocabularyRequest) -> anyhow::Result<Vocabulary>;

    /// Generate a test over `request.words`: one single-choice question per
    /// word for Remember, Understand, and Analyse, and one matching question
    /// for Apply with one pair per word.
    async fn fetch_test(&self, request: &TestRequest) -> anyhow::Result<Vec<Question>>;
}

/// Request for a candidate word pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordPoolRequest {
    pub level: CefrLevel,
    #[serde(default)]
    pub topic: Option<String>,
}

/// Request for vocabulary details.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VocabularyRequest {
    pub level: CefrLevel,
    #[serde(default)]
    pub topic: Option<String>,
    /// Explicit words to cover; empty lets the service choose.
    #[serde(default)]
    pub target_words: Vec<String>,
    /// Number of words to generate.
    pub count: usize,
}

/// Request for a test over studied words.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRequest {
    pub level: CefrLevel,
    pub words: Vec<Word>,
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

/// Minimal key-value blob port backing the spaced-repetition scheduler.
pub trait SrsStore: Send + Sync {
    /// Load the stored blob, or `None` if nothing has been saved yet.
    fn load(&self) -> anyhow::Result<Option<String>>;

    /// Replace the stored blob.
    fn save(&self, blob: &str) -> anyhow::Result<()>;
}
