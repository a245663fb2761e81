//! Session report with JSON persistence.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{CefrLevel, Question, UserAnswer, Word};
use crate::review::derive_wrong_ids;
use crate::statistics::{level_breakdown, LevelStats, Score};

/// Snapshot of a finished (or abandoned) test.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionReport {
    /// Unique report identifier.
    pub id: Uuid,
    /// When the report was created.
    pub created_at: DateTime<Utc>,
    pub level: CefrLevel,
    pub topic: Option<String>,
    pub words: Vec<Word>,
    /// Questions in presentation order.
    pub questions: Vec<Question>,
    /// Latest answer per question, in question order.
    pub answers: Vec<UserAnswer>,
    pub score: Score,
    pub levels: Vec<LevelStats>,
    /// Ids still without a correct answer.
    pub wrong_ids: Vec<String>,
}

impl SessionReport {
    pub fn new(
        level: CefrLevel,
        topic: Option<String>,
        words: &[Word],
        questions: &[Question],
        answers: &HashMap<String, UserAnswer>,
    ) -> Self {
        let ordered_answers = questions
            .iter()
            .filter_map(|q| answers.get(&q.id).cloned())
            .collect();
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            level,
            topic,
            words: words.to_vec(),
            questions: questions.to_vec(),
            answers: ordered_answers,
            score: Score::compute(questions, answers),
            levels: level_breakdown(questions, answers),
            wrong_ids: derive_wrong_ids(questions, answers),
        }
    }

    /// Save the report as JSON to a file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self).context("failed to serialize report")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, json)
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        Ok(())
    }

    /// Load a report from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read report from {}", path.display()))?;
        let report: SessionReport =
            serde_json::from_str(&content).context("failed to parse report JSON")?;
        Ok(report)
    }

    /// Default file name for this report.
    pub fn file_name(&self) -> String {
        format!(
            "session-{}-{}.json",
            self.created_at.format("%Y%m%d-%H%M%S"),
            &self.id.simple().to_string()[..8]
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{BloomLevel, QuestionBody, SingleChoice, Submission};

    fn question(id: &str) -> Question {
        Question {
            id: id.into(),
            word_term: Some("ocean".into()),
            text: "What does 'ocean' mean?".into(),
            text_translated: None,
            explanation: Some("An ocean is a very large sea.".into()),
            explanation_translated: None,
            body: QuestionBody::single_choice(
                BloomLevel::Remember,
                SingleChoice {
                    options: vec!["a big sea".into(), "a lake".into()],
                    options_translated: vec![],
                    correct_option: "a big sea".into(),
                },
            )
            .unwrap(),
        }
    }

    #[test]
    fn report_round_trips_through_file() {
        let questions = vec![question("q1"), question("q2")];
        let answers: HashMap<String, UserAnswer> = [(
            "q2".to_string(),
            UserAnswer {
                question_id: "q2".into(),
                submission: Submission::Choice("a big sea".into()),
                is_correct: true,
            },
        )]
        .into_iter()
        .collect();

        let report = SessionReport::new(CefrLevel::B1, Some("Sea".into()), &[], &questions, &answers);
        assert_eq!(report.score.percent, 50);
        assert_eq!(report.wrong_ids, vec!["q1"]);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reports").join(report.file_name());
        report.save_json(&path).unwrap();

        let loaded = SessionReport::load_json(&path).unwrap();
        assert_eq!(loaded.id, report.id);
        assert_eq!(loaded.answers.len(), 1);
        assert_eq!(loaded.questions, questions);
        assert_eq!(loaded.topic.as_deref(), Some("Sea"));
    }
}
