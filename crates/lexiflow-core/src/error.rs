//! Session error types.
//!
//! Content-service failures are carried as `ContentAcquisition` so the
//! session controller can apply its per-stage fallback policy; the other
//! variants reject learner actions that are not valid in the current state.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::session::SessionState;

/// Result type alias using [`SessionError`].
pub type Result<T> = std::result::Result<T, SessionError>;

/// Which content-service call a failure (or a pending request) belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionStage {
    WordPool,
    Vocabulary,
    Test,
}

impl fmt::Display for AcquisitionStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AcquisitionStage::WordPool => write!(f, "word pool"),
            AcquisitionStage::Vocabulary => write!(f, "vocabulary"),
            AcquisitionStage::Test => write!(f, "test"),
        }
    }
}

/// Errors raised by the session engine.
#[derive(Debug, Error)]
pub enum SessionError {
    /// A content-service call was rejected or returned unusable data.
    #[error("failed to acquire {stage}: {message}")]
    ContentAcquisition {
        stage: AcquisitionStage,
        message: String,
    },

    /// Returned content could not be turned into a valid question.
    #[error("malformed question {question_id}: {reason}")]
    MalformedQuestion { question_id: String, reason: String },

    /// The action is not available in the current state.
    #[error("cannot {action} while in {state}")]
    InvalidTransition {
        action: &'static str,
        state: SessionState,
    },

    /// A content request is outstanding.
    #[error("waiting for content ({0}); only returning home is allowed")]
    Busy(SessionState),

    /// Pool selection was confirmed with nothing selected.
    #[error("select at least one word")]
    EmptySelection,

    /// A single-choice submission carried no option.
    #[error("no option selected")]
    EmptyChoice,

    /// A matching submission left gaps unfilled.
    #[error("matching answer incomplete: {} gap(s) unfilled", .missing.len())]
    IncompleteSubmission { missing: Vec<String> },

    /// The submission shape does not fit the question variant.
    #[error("question {question_id} expects a {expected} answer")]
    SubmissionMismatch {
        question_id: String,
        expected: &'static str,
    },

    /// The test cursor does not address any question.
    #[error("no active question")]
    NoActiveQuestion,

    /// Retry was requested but every question is already correct.
    #[error("no wrong answers to review")]
    NothingToReview,
}
