//! The session state machine.
//!
//! A [`SessionController`] owns one session aggregate and moves it through
//! setup, content acquisition, study, testing, results, and the optional
//! wrong-answer review loop. Learner actions are methods on the controller.
//!
//! Content acquisition is two-phase so that a resolution arriving after the
//! learner went home can be recognized and dropped: actions that need
//! content return a [`PendingFetch`] carrying an [`AcquisitionTicket`], and
//! the matching `complete_*` method takes the ticket back together with the
//! service result. [`SessionController::dispatch`] wraps both phases for
//! callers that simply await the service.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{AcquisitionStage, Result, SessionError};
use crate::evaluator::{check_complete, evaluate, Evaluation};
use crate::model::{
    CefrLevel, Question, SessionConfig, Submission, UserAnswer, Vocabulary, Word, WordPool,
    WordPoolItem,
};
use crate::ordering::QuestionOrderingPolicy;
use crate::report::SessionReport;
use crate::review::ReviewQueue;
use crate::statistics::{level_breakdown, LevelStats, Score};
use crate::traits::{ContentService, TestRequest, VocabularyRequest, WordPoolRequest};

// ---------------------------------------------------------------------------
// States
// ---------------------------------------------------------------------------

/// Where the session currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SessionState {
    Setup,
    AcquiringPool,
    SelectingWords,
    AcquiringVocabulary,
    Studying,
    AcquiringTest,
    /// `review` is set while only the wrong-answer subset is addressed.
    Testing {
        review: bool,
    },
    Results,
}

impl SessionState {
    /// Whether a content request is outstanding.
    pub fn is_acquiring(self) -> bool {
        self.stage().is_some()
    }

    /// The acquisition this state is waiting for.
    pub fn stage(self) -> Option<AcquisitionStage> {
        match self {
            SessionState::AcquiringPool => Some(AcquisitionStage::WordPool),
            SessionState::AcquiringVocabulary => Some(AcquisitionStage::Vocabulary),
            SessionState::AcquiringTest => Some(AcquisitionStage::Test),
            _ => None,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Setup => write!(f, "setup"),
            SessionState::AcquiringPool => write!(f, "acquiring word pool"),
            SessionState::SelectingWords => write!(f, "selecting words"),
            SessionState::AcquiringVocabulary => write!(f, "acquiring vocabulary"),
            SessionState::Studying => write!(f, "studying"),
            SessionState::AcquiringTest => write!(f, "acquiring test"),
            SessionState::Testing { review: false } => write!(f, "testing"),
            SessionState::Testing { review: true } => write!(f, "reviewing"),
            SessionState::Results => write!(f, "results"),
        }
    }
}

// ---------------------------------------------------------------------------
// Acquisition handshake
// ---------------------------------------------------------------------------

/// Identifies one outstanding content request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AcquisitionTicket {
    epoch: u64,
    stage: AcquisitionStage,
}

impl AcquisitionTicket {
    pub fn stage(&self) -> AcquisitionStage {
        self.stage
    }
}

/// A content request the caller must send to the service.
#[derive(Debug, Clone)]
pub enum PendingFetch {
    WordPool(AcquisitionTicket, WordPoolRequest),
    Vocabulary(AcquisitionTicket, VocabularyRequest),
    Test(AcquisitionTicket, TestRequest),
}

impl PendingFetch {
    pub fn ticket(&self) -> AcquisitionTicket {
        match self {
            PendingFetch::WordPool(t, _)
            | PendingFetch::Vocabulary(t, _)
            | PendingFetch::Test(t, _) => *t,
        }
    }
}

/// What happened to a completed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// The content was committed to the session.
    Applied,
    /// The request failed and the failure policy for its stage was applied.
    Failed,
    /// The session moved on before the request completed; nothing changed.
    Discarded,
}

// ---------------------------------------------------------------------------
// Actions
// ---------------------------------------------------------------------------

/// Learner actions accepted by [`SessionController::dispatch`].
#[derive(Debug, Clone)]
pub enum Action {
    SubmitConfig(SessionConfig),
    ConfirmSelection(Vec<String>),
    AdvanceStudy,
    SubmitAnswer(Submission),
    AdvanceTest,
    RetryWrong,
    NewTest,
    GoHome,
}

impl Action {
    fn name(&self) -> &'static str {
        match self {
            Action::SubmitConfig(_) => "submit configuration",
            Action::ConfirmSelection(_) => "confirm selection",
            Action::AdvanceStudy => "advance study",
            Action::SubmitAnswer(_) => "submit answer",
            Action::AdvanceTest => "advance test",
            Action::RetryWrong => "retry wrong answers",
            Action::NewTest => "start a new test",
            Action::GoHome => "go home",
        }
    }
}

/// Result of a dispatched action.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The state changed (or stayed) without touching the content service.
    Moved,
    /// An answer was graded and stored.
    Evaluated(Evaluation),
    /// A content request was made and resolved.
    Acquired {
        stage: AcquisitionStage,
        resolution: Resolution,
    },
}

// ---------------------------------------------------------------------------
// Progress
// ---------------------------------------------------------------------------

/// How the presentation layer should label progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProgressFraming {
    Word,
    Question,
    Reviewing,
}

/// 1-based position within the current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Progress {
    pub position: usize,
    pub total: usize,
    pub framing: ProgressFraming,
}

// ---------------------------------------------------------------------------
// Session aggregate
// ---------------------------------------------------------------------------

/// Everything that belongs to one learner session. Dropped wholesale on
/// return to home.
#[derive(Debug, Default)]
struct Session {
    config: Option<SessionConfig>,
    topic: Option<String>,
    pool: Vec<WordPoolItem>,
    words: Vec<Word>,
    questions: Vec<Question>,
    answers: HashMap<String, UserAnswer>,
    review: ReviewQueue,
    study_cursor: usize,
    test_cursor: usize,
}

/// Drives one learner session.
#[derive(Debug)]
pub struct SessionController {
    state: SessionState,
    session: Session,
    ordering: QuestionOrderingPolicy,
    /// Bumped on every return to home; tickets from older epochs are stale.
    epoch: u64,
    notice: Option<String>,
}

impl Default for SessionController {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionController {
    /// A controller in `Setup` with a randomly seeded ordering policy.
    pub fn new() -> Self {
        Self::with_ordering(QuestionOrderingPolicy::random())
    }

    pub fn with_ordering(ordering: QuestionOrderingPolicy) -> Self {
        Self {
            state: SessionState::Setup,
            session: Session::default(),
            ordering,
            epoch: 0,
            notice: None,
        }
    }

    // -- actions -------------------------------------------------------------

    /// Start a session from `config`.
    ///
    /// With explicit target words the pool is skipped and vocabulary is
    /// requested directly; otherwise a candidate pool is requested.
    pub fn submit_config(&mut self, config: SessionConfig) -> Result<PendingFetch> {
        self.guard("submit configuration", |s| s == SessionState::Setup)?;
        self.notice = None;

        let pending = if config.has_target_words() {
            let request = VocabularyRequest {
                level: config.level,
                topic: config.topic.clone(),
                target_words: config.target_word_list(),
                count: config.num_words,
            };
            self.transition(SessionState::AcquiringVocabulary);
            PendingFetch::Vocabulary(self.ticket(AcquisitionStage::Vocabulary), request)
        } else {
            let request = WordPoolRequest {
                level: config.level,
                topic: config.topic.clone(),
            };
            self.transition(SessionState::AcquiringPool);
            PendingFetch::WordPool(self.ticket(AcquisitionStage::WordPool), request)
        };

        self.session = Session {
            topic: config.topic.clone(),
            config: Some(config),
            ..Session::default()
        };
        Ok(pending)
    }

    /// Confirm the learner's pool selection; it replaces the configured
    /// target words and word count.
    pub fn confirm_selection(&mut self, selected: Vec<String>) -> Result<PendingFetch> {
        self.guard("confirm selection", |s| s == SessionState::SelectingWords)?;

        let selected: Vec<String> = selected
            .into_iter()
            .map(|w| w.trim().to_string())
            .filter(|w| !w.is_empty())
            .collect();
        if selected.is_empty() {
            return Err(SessionError::EmptySelection);
        }

        let config = self
            .session
            .config
            .as_ref()
            .map(|c| c.with_selection(&selected))
            .unwrap_or_else(|| SessionConfig::new(CefrLevel::default(), None, Some(selected.join(", "))));
        let request = VocabularyRequest {
            level: config.level,
            topic: self.session.topic.clone(),
            target_words: selected,
            count: config.num_words,
        };
        self.session.config = Some(config);
        self.transition(SessionState::AcquiringVocabulary);
        Ok(PendingFetch::Vocabulary(
            self.ticket(AcquisitionStage::Vocabulary),
            request,
        ))
    }

    /// Move to the next word; past the last word the test is requested.
    pub fn advance_study(&mut self) -> Result<Option<PendingFetch>> {
        self.guard("advance study", |s| s == SessionState::Studying)?;
        if self.session.study_cursor + 1 < self.session.words.len() {
            self.session.study_cursor += 1;
            return Ok(None);
        }
        Ok(Some(self.start_test_acquisition()))
    }

    /// Grade `submission` against the current question and store the answer.
    pub fn submit_answer(&mut self, submission: Submission) -> Result<Evaluation> {
        self.guard("submit an answer", |s| matches!(s, SessionState::Testing { .. }))?;
        let question = self
            .current_question()
            .cloned()
            .ok_or(SessionError::NoActiveQuestion)?;

        check_complete(&question, &submission)?;
        let evaluation = evaluate(&question, submission)?;
        debug!(
            question_id = %question.id,
            level = %question.level(),
            is_correct = evaluation.is_correct,
            "answer graded"
        );
        self.session
            .answers
            .insert(question.id.clone(), evaluation.answer.clone());
        Ok(evaluation)
    }

    /// Move to the next question; past the last one the session shows
    /// results. Leaving a review pass clears the review subset.
    pub fn advance_test(&mut self) -> Result<()> {
        self.guard("advance test", |s| matches!(s, SessionState::Testing { .. }))?;
        let review = matches!(self.state, SessionState::Testing { review: true });
        let total = if review {
            self.session.review.len()
        } else {
            self.session.questions.len()
        };

        if self.session.test_cursor + 1 < total {
            self.session.test_cursor += 1;
        } else {
            if review {
                self.session.review.clear();
            }
            self.transition(SessionState::Results);
        }
        Ok(())
    }

    /// Re-enter testing over the questions that still lack a correct answer.
    pub fn retry_wrong(&mut self) -> Result<()> {
        self.guard("retry wrong answers", |s| s == SessionState::Results)?;
        let queue = ReviewQueue::derive(&self.session.questions, &self.session.answers);
        if queue.is_empty() {
            return Err(SessionError::NothingToReview);
        }
        info!(count = queue.len(), "starting review pass");
        self.session.review = queue;
        self.session.test_cursor = 0;
        self.transition(SessionState::Testing { review: true });
        Ok(())
    }

    /// Discard answers and request a fresh test over the same words.
    pub fn new_test(&mut self) -> Result<PendingFetch> {
        self.guard("start a new test", |s| s == SessionState::Results)?;
        self.session.answers.clear();
        self.session.review.clear();
        Ok(self.start_test_acquisition())
    }

    /// Discard the session from any state. Outstanding requests become stale.
    pub fn go_home(&mut self) {
        self.epoch += 1;
        self.session = Session::default();
        self.notice = None;
        self.transition(SessionState::Setup);
    }

    // -- completions ---------------------------------------------------------

    /// Commit a word-pool result. On failure the session is discarded.
    pub fn complete_word_pool(
        &mut self,
        ticket: AcquisitionTicket,
        result: anyhow::Result<WordPool>,
    ) -> Resolution {
        if !self.accepts(ticket) {
            return Resolution::Discarded;
        }
        match result {
            Ok(pool) => {
                info!(topic = %pool.topic, candidates = pool.pool.len(), "word pool acquired");
                if !pool.topic.trim().is_empty() {
                    self.session.topic = Some(pool.topic.clone());
                    if let Some(config) = self.session.config.as_mut() {
                        config.topic = Some(pool.topic);
                    }
                }
                self.session.pool = pool.pool;
                self.transition(SessionState::SelectingWords);
                Resolution::Applied
            }
            Err(e) => self.fail_to_setup(AcquisitionStage::WordPool, &e),
        }
    }

    /// Commit a vocabulary result and start studying. On failure (or an
    /// empty word list) the session is discarded.
    pub fn complete_vocabulary(
        &mut self,
        ticket: AcquisitionTicket,
        result: anyhow::Result<Vocabulary>,
    ) -> Resolution {
        if !self.accepts(ticket) {
            return Resolution::Discarded;
        }
        let vocabulary = match result {
            Ok(v) if v.words.is_empty() => {
                return self.fail_to_setup(
                    AcquisitionStage::Vocabulary,
                    &anyhow::anyhow!("content service returned no words"),
                )
            }
            Ok(v) => v,
            Err(e) => return self.fail_to_setup(AcquisitionStage::Vocabulary, &e),
        };

        info!(words = vocabulary.words.len(), "vocabulary acquired");
        if self.session.topic.is_none() && !vocabulary.topic.trim().is_empty() {
            self.session.topic = Some(vocabulary.topic);
        }
        self.session.words = vocabulary.words;
        self.session.study_cursor = 0;
        self.transition(SessionState::Studying);
        Resolution::Applied
    }

    /// Order and commit a generated test. On failure the session falls back
    /// to results with whatever it already has.
    pub fn complete_test(
        &mut self,
        ticket: AcquisitionTicket,
        result: anyhow::Result<Vec<Question>>,
    ) -> Resolution {
        if !self.accepts(ticket) {
            return Resolution::Discarded;
        }
        let questions = match result {
            Ok(q) if q.is_empty() => {
                return self.fail_to_results(&anyhow::anyhow!("content service returned no questions"))
            }
            Ok(q) => q,
            Err(e) => return self.fail_to_results(&e),
        };

        info!(questions = questions.len(), "test acquired");
        self.session.questions = self.ordering.order(questions);
        self.session.test_cursor = 0;
        self.session.review.clear();
        self.transition(SessionState::Testing { review: false });
        Resolution::Applied
    }

    // -- one-shot driver -----------------------------------------------------

    /// Run `action`, awaiting `service` when the action needs content.
    pub async fn dispatch(&mut self, action: Action, service: &dyn ContentService) -> Result<Outcome> {
        debug!(action = action.name(), state = %self.state, "dispatch");
        let pending = match action {
            Action::SubmitConfig(config) => Some(self.submit_config(config)?),
            Action::ConfirmSelection(selected) => Some(self.confirm_selection(selected)?),
            Action::AdvanceStudy => self.advance_study()?,
            Action::SubmitAnswer(submission) => {
                return self.submit_answer(submission).map(Outcome::Evaluated)
            }
            Action::AdvanceTest => {
                self.advance_test()?;
                None
            }
            Action::RetryWrong => {
                self.retry_wrong()?;
                None
            }
            Action::NewTest => Some(self.new_test()?),
            Action::GoHome => {
                self.go_home();
                None
            }
        };

        match pending {
            Some(pending) => Ok(self.acquire(pending, service).await),
            None => Ok(Outcome::Moved),
        }
    }

    /// Send `pending` to `service` and complete it.
    pub async fn acquire(&mut self, pending: PendingFetch, service: &dyn ContentService) -> Outcome {
        let stage = pending.ticket().stage;
        debug!(service = service.name(), %stage, "requesting content");
        let resolution = match pending {
            PendingFetch::WordPool(ticket, request) => {
                let result = service.fetch_word_pool(&request).await;
                self.complete_word_pool(ticket, result)
            }
            PendingFetch::Vocabulary(ticket, request) => {
                let result = service.fetch_vocabulary(&request).await;
                self.complete_vocabulary(ticket, result)
            }
            PendingFetch::Test(ticket, request) => {
                let result = service.fetch_test(&request).await;
                self.complete_test(ticket, result)
            }
        };
        Outcome::Acquired { stage, resolution }
    }

    // -- views ---------------------------------------------------------------

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn topic(&self) -> Option<&str> {
        self.session.topic.as_deref()
    }

    pub fn config(&self) -> Option<&SessionConfig> {
        self.session.config.as_ref()
    }

    pub fn pool(&self) -> &[WordPoolItem] {
        &self.session.pool
    }

    pub fn words(&self) -> &[Word] {
        &self.session.words
    }

    /// Questions in presentation order.
    pub fn questions(&self) -> &[Question] {
        &self.session.questions
    }

    pub fn answers(&self) -> &HashMap<String, UserAnswer> {
        &self.session.answers
    }

    pub fn review_ids(&self) -> &[String] {
        self.session.review.ids()
    }

    pub fn current_word(&self) -> Option<&Word> {
        match self.state {
            SessionState::Studying => self.session.words.get(self.session.study_cursor),
            _ => None,
        }
    }

    /// The question under the test cursor, resolved through the review
    /// subset when one is active.
    pub fn current_question(&self) -> Option<&Question> {
        match self.state {
            SessionState::Testing { review: true } => self
                .session
                .review
                .resolve(self.session.test_cursor, &self.session.questions),
            SessionState::Testing { review: false } => {
                self.session.questions.get(self.session.test_cursor)
            }
            _ => None,
        }
    }

    /// The stored answer for the current question, if any.
    pub fn current_answer(&self) -> Option<&UserAnswer> {
        self.current_question()
            .and_then(|q| self.session.answers.get(&q.id))
    }

    pub fn progress(&self) -> Option<Progress> {
        let (cursor, total, framing) = match self.state {
            SessionState::Studying => (
                self.session.study_cursor,
                self.session.words.len(),
                ProgressFraming::Word,
            ),
            SessionState::Testing { review: false } => (
                self.session.test_cursor,
                self.session.questions.len(),
                ProgressFraming::Question,
            ),
            SessionState::Testing { review: true } => (
                self.session.test_cursor,
                self.session.review.len(),
                ProgressFraming::Reviewing,
            ),
            _ => return None,
        };
        Some(Progress {
            position: cursor + 1,
            total,
            framing,
        })
    }

    pub fn score(&self) -> Score {
        Score::compute(&self.session.questions, &self.session.answers)
    }

    pub fn level_breakdown(&self) -> Vec<LevelStats> {
        level_breakdown(&self.session.questions, &self.session.answers)
    }

    /// Ids that a retry pass would cover right now.
    pub fn wrong_ids(&self) -> Vec<String> {
        crate::review::derive_wrong_ids(&self.session.questions, &self.session.answers)
    }

    /// The last acquisition failure shown to the learner.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn take_notice(&mut self) -> Option<String> {
        self.notice.take()
    }

    /// Policy used for test ordering; also available to the presentation
    /// layer for option and word-bank shuffles.
    pub fn ordering_mut(&mut self) -> &mut QuestionOrderingPolicy {
        &mut self.ordering
    }

    pub fn report(&self) -> SessionReport {
        let level = self
            .session
            .config
            .as_ref()
            .map(|c| c.level)
            .unwrap_or_default();
        SessionReport::new(
            level,
            self.session.topic.clone(),
            &self.session.words,
            &self.session.questions,
            &self.session.answers,
        )
    }

    // -- internals -----------------------------------------------------------

    fn guard(&self, action: &'static str, allowed: impl Fn(SessionState) -> bool) -> Result<()> {
        if self.state.is_acquiring() {
            return Err(SessionError::Busy(self.state));
        }
        if !allowed(self.state) {
            return Err(SessionError::InvalidTransition {
                action,
                state: self.state,
            });
        }
        Ok(())
    }

    fn ticket(&self, stage: AcquisitionStage) -> AcquisitionTicket {
        AcquisitionTicket {
            epoch: self.epoch,
            stage,
        }
    }

    fn accepts(&self, ticket: AcquisitionTicket) -> bool {
        let live = ticket.epoch == self.epoch && self.state.stage() == Some(ticket.stage);
        if !live {
            debug!(
                stage = %ticket.stage,
                state = %self.state,
                "discarding stale content resolution"
            );
        }
        live
    }

    fn start_test_acquisition(&mut self) -> PendingFetch {
        let request = TestRequest {
            level: self
                .session
                .config
                .as_ref()
                .map(|c| c.level)
                .unwrap_or_default(),
            words: self.session.words.clone(),
        };
        self.session.questions.clear();
        self.session.test_cursor = 0;
        self.transition(SessionState::AcquiringTest);
        PendingFetch::Test(self.ticket(AcquisitionStage::Test), request)
    }

    fn fail_to_setup(&mut self, stage: AcquisitionStage, error: &anyhow::Error) -> Resolution {
        self.record_failure(stage, error);
        self.session = Session::default();
        self.transition(SessionState::Setup);
        Resolution::Failed
    }

    fn fail_to_results(&mut self, error: &anyhow::Error) -> Resolution {
        self.record_failure(AcquisitionStage::Test, error);
        self.transition(SessionState::Results);
        Resolution::Failed
    }

    fn record_failure(&mut self, stage: AcquisitionStage, error: &anyhow::Error) {
        let failure = SessionError::ContentAcquisition {
            stage,
            message: format!("{error:#}"),
        };
        warn!(%stage, error = %failure, "content acquisition failed");
        self.notice = Some(failure.to_string());
    }

    fn transition(&mut self, to: SessionState) {
        debug!(from = %self.state, %to, "session transition");
        self.state = to;
    }
}
