//! lexiflow-core — Assessment session engine, evaluation, and scheduling.
//!
//! This crate defines the vocabulary data model, the session state machine
//! that drives study and testing, answer evaluation, question ordering,
//! the wrong-answer review loop, and the spaced-repetition scheduler.

pub mod content;
pub mod error;
pub mod evaluator;
pub mod model;
pub mod ordering;
pub mod report;
pub mod review;
pub mod session;
pub mod srs;
pub mod statistics;
pub mod store;
pub mod text;
pub mod traits;

pub use error::{AcquisitionStage, Result, SessionError};
pub use evaluator::{check_complete, evaluate, Evaluation};
pub use model::{BloomLevel, CefrLevel, Question, QuestionBody, SessionConfig, Submission, Word};
pub use ordering::QuestionOrderingPolicy;
pub use review::{derive_wrong_ids, ReviewQueue};
pub use session::{
    Action, AcquisitionTicket, Outcome, PendingFetch, Progress, ProgressFraming, Resolution,
    SessionController, SessionState,
};
pub use srs::{get_due, record_outcome, SrsDeck, SrsItem, SrsScheduler, MAX_INTERVAL_DAYS};
pub use store::{FileStore, MemoryStore};
pub use traits::{ContentService, SrsStore, TestRequest, VocabularyRequest, WordPoolRequest};
