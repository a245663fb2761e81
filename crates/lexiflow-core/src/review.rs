//! Wrong-answer review subset.

use std::collections::HashMap;

use crate::model::{Question, UserAnswer};

/// Ids of questions without a correct answer, in question order.
///
/// A question counts as wrong when its answer is missing or marked
/// incorrect.
pub fn derive_wrong_ids(questions: &[Question], answers: &HashMap<String, UserAnswer>) -> Vec<String> {
    questions
        .iter()
        .filter(|q| !answers.get(&q.id).is_some_and(|a| a.is_correct))
        .map(|q| q.id.clone())
        .collect()
}

/// The ordered subset addressed during a retry pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewQueue {
    ids: Vec<String>,
}

impl ReviewQueue {
    /// Derive a fresh queue from the full question set and current answers.
    pub fn derive(questions: &[Question], answers: &HashMap<String, UserAnswer>) -> Self {
        Self {
            ids: derive_wrong_ids(questions, answers),
        }
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    /// The question id at review position `pos`.
    pub fn get(&self, pos: usize) -> Option<&str> {
        self.ids.get(pos).map(String::as_str)
    }

    /// Look up the question at review position `pos` by id.
    pub fn resolve<'a>(&self, pos: usize, questions: &'a [Question]) -> Option<&'a Question> {
        let id = self.get(pos)?;
        questions.iter().find(|q| q.id == id)
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }
}
