//! Score statistics for a finished test.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::model::{BloomLevel, Question, UserAnswer};

/// Overall result of a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Score {
    pub correct: usize,
    pub total: usize,
    /// Rounded percentage; 0 for an empty test.
    pub percent: u32,
}

impl Score {
    pub fn compute(questions: &[Question], answers: &HashMap<String, UserAnswer>) -> Self {
        let total = questions.len();
        let correct = count_correct(questions.iter(), answers);
        Self {
            correct,
            total,
            percent: percent(correct, total),
        }
    }

    pub fn is_perfect(&self) -> bool {
        self.total > 0 && self.correct == self.total
    }
}

/// Results for one Bloom level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelStats {
    pub level: BloomLevel,
    pub correct: usize,
    pub total: usize,
}

/// Per-level breakdown in progression order, skipping levels with no
/// questions.
pub fn level_breakdown(
    questions: &[Question],
    answers: &HashMap<String, UserAnswer>,
) -> Vec<LevelStats> {
    BloomLevel::ALL
        .into_iter()
        .filter_map(|level| {
            let total = questions.iter().filter(|q| q.level() == level).count();
            if total == 0 {
                return None;
            }
            let correct = count_correct(questions.iter().filter(|q| q.level() == level), answers);
            Some(LevelStats {
                level,
                correct,
                total,
            })
        })
        .collect()
}

fn count_correct<'a>(
    questions: impl Iterator<Item = &'a Question>,
    answers: &HashMap<String, UserAnswer>,
) -> usize {
    questions
        .filter(|q| answers.get(&q.id).is_some_and(|a| a.is_correct))
        .count()
}

fn percent(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    (correct as f64 / total as f64 * 100.0).round() as u32
}
