//! Presentation ordering for a generated question set.
//!
//! Questions are grouped by Bloom level in the fixed progression
//! Remember → Understand → Apply → Analyse. Every group except Apply is
//! shuffled uniformly; the Apply group keeps its received order.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::model::{BloomLevel, Matching, Question, SingleChoice};

/// Orders questions for a test and shuffles presentation details.
#[derive(Debug, Clone)]
pub struct QuestionOrderingPolicy {
    rng: StdRng,
}

impl QuestionOrderingPolicy {
    /// A policy seeded from the operating system.
    pub fn random() -> Self {
        Self::seeded(rand::random())
    }

    /// A reproducible policy.
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Group `questions` by level and shuffle each non-Apply group.
    pub fn order(&mut self, questions: Vec<Question>) -> Vec<Question> {
        let mut groups: [Vec<Question>; 4] = Default::default();
        for question in questions {
            // Discriminants follow `BloomLevel::ALL`.
            groups[question.level() as usize].push(question);
        }

        let mut ordered = Vec::with_capacity(groups.iter().map(Vec::len).sum());
        for (level, mut group) in BloomLevel::ALL.into_iter().zip(groups) {
            if level != BloomLevel::Apply {
                group.shuffle(&mut self.rng);
            }
            ordered.extend(group);
        }
        ordered
    }

    /// Options paired with their translations, shuffled together.
    pub fn shuffle_options(&mut self, choice: &SingleChoice) -> Vec<(String, Option<String>)> {
        let mut options: Vec<(String, Option<String>)> = choice
            .options
            .iter()
            .enumerate()
            .map(|(i, option)| (option.clone(), choice.options_translated.get(i).cloned()))
            .collect();
        options.shuffle(&mut self.rng);
        options
    }

    /// The correct terms of a matching question in shuffled order.
    pub fn word_bank(&mut self, matching: &Matching) -> Vec<String> {
        let mut bank: Vec<String> = matching
            .pairs
            .iter()
            .map(|p| p.correct_term.clone())
            .collect();
        bank.shuffle(&mut self.rng);
        bank
    }
}

impl Default for QuestionOrderingPolicy {
    fn default() -> Self {
        Self::random()
    }
}
