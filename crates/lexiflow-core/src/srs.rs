//! Spaced-repetition scheduling.
//!
//! A simplified SM-2 variant with binary feedback: a correct answer grows
//! the interval (0 → 1 → 3 → ⌈interval × ease⌉ days) and raises the ease;
//! an incorrect answer resets the interval and lowers the ease down to a
//! floor. Intervals are capped at [`MAX_INTERVAL_DAYS`] so a long streak
//! cannot push the review date out of range. Items are persisted as one JSON blob through an [`SrsStore`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::evaluator::Evaluation;
use crate::model::{Question, QuestionBody};
use crate::traits::SrsStore;

/// Longest interval a correct streak can reach, about a century.
pub const MAX_INTERVAL_DAYS: u32 = 36_500;

/// Scheduling state for one term.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SrsItem {
    pub term: String,
    /// Days until the next review; 0 means due now.
    pub interval: u32,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub next_review_date: DateTime<Utc>,
    pub ease_factor: f64,
}

impl SrsItem {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.next_review_date <= now
    }

    fn matches(&self, term: &str) -> bool {
        self.term.to_lowercase() == term.to_lowercase()
    }
}

/// Scheduler constants.
#[derive(Debug, Clone)]
pub struct SrsScheduler {
    pub initial_ease: f64,
    pub minimum_ease: f64,
    pub ease_bonus: f64,
    pub ease_penalty: f64,
    pub maximum_interval: u32,
}

impl Default for SrsScheduler {
    fn default() -> Self {
        Self {
            initial_ease: 2.5,
            minimum_ease: 1.3,
            ease_bonus: 0.1,
            ease_penalty: 0.2,
            maximum_interval: MAX_INTERVAL_DAYS,
        }
    }
}

impl SrsScheduler {
    /// State for a term graded for the first time, before the grade applies.
    pub fn initial_item(&self, term: &str, now: DateTime<Utc>) -> SrsItem {
        SrsItem {
            term: term.to_string(),
            interval: 0,
            next_review_date: now,
            ease_factor: self.initial_ease,
        }
    }

    /// Apply one graded outcome to `item`.
    pub fn schedule(&self, item: &SrsItem, is_correct: bool, now: DateTime<Utc>) -> SrsItem {
        let (interval, ease_factor) = if is_correct {
            let interval = match item.interval {
                0 => 1,
                1 => 3,
                n => self.grow(n, item.ease_factor),
            };
            (interval.min(self.maximum_interval), item.ease_factor + self.ease_bonus)
        } else {
            (0, (item.ease_factor - self.ease_penalty).max(self.minimum_ease))
        };

        SrsItem {
            term: item.term.clone(),
            interval,
            next_review_date: self.review_date(now, interval),
            ease_factor,
        }
    }

    fn grow(&self, interval: u32, ease_factor: f64) -> u32 {
        let grown = (f64::from(interval) * ease_factor).ceil();
        if !grown.is_finite() || grown >= f64::from(self.maximum_interval) {
            self.maximum_interval
        } else {
            // Finite and below a u32 bound, so the cast is exact.
            grown.max(0.0) as u32
        }
    }

    fn review_date(&self, now: DateTime<Utc>, interval: u32) -> DateTime<Utc> {
        Duration::try_days(i64::from(interval))
            .and_then(|delta| now.checked_add_signed(delta))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

/// The flat collection of scheduled terms.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SrsDeck {
    items: Vec<SrsItem>,
}

impl SrsDeck {
    /// Load the deck from `store`.
    ///
    /// A blob that cannot be parsed is treated as an empty deck.
    pub fn load(store: &dyn SrsStore) -> anyhow::Result<Self> {
        let Some(blob) = store.load()? else {
            return Ok(Self::default());
        };
        match serde_json::from_str(&blob) {
            Ok(deck) => Ok(deck),
            Err(e) => {
                warn!(error = %e, "unreadable SRS data, starting from an empty deck");
                Ok(Self::default())
            }
        }
    }

    pub fn save(&self, store: &dyn SrsStore) -> anyhow::Result<()> {
        let blob = serde_json::to_string(self)?;
        store.save(&blob)
    }

    /// Case-insensitive lookup.
    pub fn get(&self, term: &str) -> Option<&SrsItem> {
        self.items.iter().find(|item| item.matches(term))
    }

    /// Grade `term`, creating its item on first sight. Returns the new state.
    pub fn record(
        &mut self,
        scheduler: &SrsScheduler,
        term: &str,
        is_correct: bool,
        now: DateTime<Utc>,
    ) -> SrsItem {
        match self.items.iter_mut().find(|item| item.matches(term)) {
            Some(item) => {
                *item = scheduler.schedule(item, is_correct, now);
                item.clone()
            }
            None => {
                let item = scheduler.schedule(&scheduler.initial_item(term, now), is_correct, now);
                self.items.push(item.clone());
                item
            }
        }
    }

    /// Items whose next review is at or before `now`.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<SrsItem> {
        self.items.iter().filter(|i| i.is_due(now)).cloned().collect()
    }

    pub fn items(&self) -> &[SrsItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Read-modify-write one outcome against `store` with default constants.
pub fn record_outcome(
    term: &str,
    is_correct: bool,
    store: &dyn SrsStore,
    now: DateTime<Utc>,
) -> anyhow::Result<SrsItem> {
    let mut deck = SrsDeck::load(store)?;
    let item = deck.record(&SrsScheduler::default(), term, is_correct, now);
    deck.save(store)?;
    debug!(term, is_correct, interval = item.interval, "recorded SRS outcome");
    Ok(item)
}

/// Items in `store` that are due at `now`.
pub fn get_due(store: &dyn SrsStore, now: DateTime<Utc>) -> anyhow::Result<Vec<SrsItem>> {
    Ok(SrsDeck::load(store)?.due(now))
}

/// Terms graded by one evaluation, with their individual verdicts.
///
/// Single-choice questions yield their word term (if any) with the whole
/// verdict; the matching question yields one entry per pair.
pub fn outcomes_for(question: &Question, evaluation: &Evaluation) -> Vec<(String, bool)> {
    match &question.body {
        QuestionBody::Apply(_) => evaluation
            .pair_verdicts
            .iter()
            .map(|v| (v.correct_term.clone(), v.is_correct))
            .collect(),
        _ => question
            .word_term
            .iter()
            .map(|term| (term.clone(), evaluation.is_correct))
            .collect(),
    }
}
