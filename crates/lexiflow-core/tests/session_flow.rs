//! End-to-end session tests against a scripted content service.
//!
//! The service builds a complete test from the studied words (one
//! Remember, Understand, and Analyse question per word plus a single
//! matching question) through the same normalizer real backends use.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::Utc;

use lexiflow_core::content::{normalize_test, RawMatchingPair, RawQuestion};
use lexiflow_core::model::{Vocabulary, WordCategory, WordPool, WordPoolItem};
use lexiflow_core::srs::{get_due, outcomes_for, record_outcome};
use lexiflow_core::{
    Action, BloomLevel, CefrLevel, ContentService, MemoryStore, Outcome, Question,
    QuestionOrderingPolicy, Resolution, SessionConfig, SessionController, SessionError,
    SessionState, Submission, TestRequest, VocabularyRequest, Word, WordPoolRequest,
};

#[derive(Default)]
struct ScriptedService {
    fail_pool: AtomicBool,
    fail_vocabulary: AtomicBool,
    fail_test: AtomicBool,
    test_calls: AtomicU32,
}

fn word(term: &str) -> Word {
    Word {
        term: term.to_string(),
        meaning: format!("the meaning of {term}"),
        pronunciation: format!("/{term}/"),
        part_of_speech: "noun".into(),
        examples: vec![format!("I **saw the {term}** today.")],
        term_translated: None,
        meaning_translated: None,
        examples_translated: vec![],
    }
}

fn single_choice(term: &str, level: &str) -> RawQuestion {
    RawQuestion {
        id: format!("{}-{term}", level.to_lowercase()),
        word_term: Some(term.to_string()),
        level: level.to_string(),
        question_text: format!("{level}: {term}?"),
        options: Some(vec![
            format!("correct {term}"),
            format!("wrong {term}"),
            "something else".into(),
        ]),
        correct_option: Some(format!("correct {term}")),
        ..RawQuestion::default()
    }
}

#[async_trait]
impl ContentService for ScriptedService {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn fetch_word_pool(&self, request: &WordPoolRequest) -> anyhow::Result<WordPool> {
        if self.fail_pool.load(Ordering::SeqCst) {
            anyhow::bail!("pool service unavailable");
        }
        Ok(WordPool {
            topic: request.topic.clone().unwrap_or_else(|| "Ocean Life".into()),
            pool: ["whale", "swim", "deep"]
                .iter()
                .zip([WordCategory::Nouns, WordCategory::Verbs, WordCategory::Adjectives])
                .map(|(term, category)| WordPoolItem {
                    term: term.to_string(),
                    category,
                })
                .collect(),
        })
    }

    async fn fetch_vocabulary(&self, request: &VocabularyRequest) -> anyhow::Result<Vocabulary> {
        if self.fail_vocabulary.load(Ordering::SeqCst) {
            anyhow::bail!("vocabulary service unavailable");
        }
        Ok(Vocabulary {
            topic: request.topic.clone().unwrap_or_else(|| "General Knowledge".into()),
            words: request.target_words.iter().map(|t| word(t)).collect(),
        })
    }

    async fn fetch_test(&self, request: &TestRequest) -> anyhow::Result<Vec<Question>> {
        self.test_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_test.load(Ordering::SeqCst) {
            anyhow::bail!("test service unavailable");
        }
        let mut raw = Vec::new();
        for level in ["Analyse", "Understand", "Remember"] {
            for w in &request.words {
                raw.push(single_choice(&w.term, level));
            }
        }
        for w in &request.words {
            raw.push(RawQuestion {
                id: format!("apply-{}", w.term),
                level: "Apply".into(),
                question_text: "Fill the gap".into(),
                matching_pairs: Some(vec![RawMatchingPair {
                    id: String::new(),
                    question_text: format!("Yesterday the [[GAP]] was mentioned ({}).", w.term),
                    question_text_vi: None,
                    correct_answer: format!(" {} ", w.term),
                }]),
                ..RawQuestion::default()
            });
        }
        Ok(normalize_test(raw)?)
    }
}

fn correct_submission(question: &Question) -> Submission {
    match question.matching() {
        Some(matching) => Submission::Matching(
            matching
                .pairs
                .iter()
                .map(|p| (p.id.clone(), p.correct_term.to_uppercase()))
                .collect::<HashMap<_, _>>(),
        ),
        None => Submission::Choice(
            question
                .single_choice()
                .map(|c| c.correct_option.clone())
                .unwrap_or_default(),
        ),
    }
}

fn wrong_submission(question: &Question) -> Submission {
    let choice = question.single_choice().expect("single choice");
    let wrong = choice
        .options
        .iter()
        .find(|o| **o != choice.correct_option)
        .cloned()
        .unwrap_or_default();
    Submission::Choice(wrong)
}

async fn study_all(controller: &mut SessionController, service: &ScriptedService) {
    while controller.state() == SessionState::Studying {
        controller
            .dispatch(Action::AdvanceStudy, service)
            .await
            .unwrap();
    }
}

/// Answer every addressed question, wrong for `miss`, and advance to results.
async fn answer_all(
    controller: &mut SessionController,
    service: &ScriptedService,
    miss: impl Fn(&Question) -> bool,
) -> Vec<String> {
    let mut seen = Vec::new();
    while let Some(question) = controller.current_question().cloned() {
        let submission = if miss(&question) {
            wrong_submission(&question)
        } else {
            correct_submission(&question)
        };
        seen.push(question.id.clone());
        controller
            .dispatch(Action::SubmitAnswer(submission), service)
            .await
            .unwrap();
        controller
            .dispatch(Action::AdvanceTest, service)
            .await
            .unwrap();
    }
    seen
}

async fn tested_controller(service: &ScriptedService, seed: u64) -> SessionController {
    let mut controller = SessionController::with_ordering(QuestionOrderingPolicy::seeded(seed));
    let config = SessionConfig::new(CefrLevel::B1, None, Some("ocean, decision".into()));
    assert_eq!(config.num_words, 2);

    let outcome = controller
        .dispatch(Action::SubmitConfig(config), service)
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        Outcome::Acquired {
            resolution: Resolution::Applied,
            ..
        }
    ));
    assert_eq!(controller.state(), SessionState::Studying);
    assert_eq!(controller.words().len(), 2);
    study_all(&mut controller, service).await;
    controller
}

#[tokio::test]
async fn two_word_session_yields_seven_ordered_questions() {
    let service = ScriptedService::default();
    let controller = tested_controller(&service, 11).await;

    assert_eq!(controller.state(), SessionState::Testing { review: false });
    let levels: Vec<BloomLevel> = controller.questions().iter().map(Question::level).collect();
    assert_eq!(
        levels,
        vec![
            BloomLevel::Remember,
            BloomLevel::Remember,
            BloomLevel::Understand,
            BloomLevel::Understand,
            BloomLevel::Apply,
            BloomLevel::Analyse,
            BloomLevel::Analyse,
        ]
    );
    let matching = controller.questions()[4].matching().unwrap();
    assert_eq!(matching.pairs.len(), 2);
    assert_eq!(matching.pairs[0].correct_term, "ocean");
}

#[tokio::test]
async fn all_correct_scores_full_marks() {
    let service = ScriptedService::default();
    let mut controller = tested_controller(&service, 3).await;

    let seen = answer_all(&mut controller, &service, |_| false).await;
    assert_eq!(seen.len(), 7);
    assert_eq!(controller.state(), SessionState::Results);
    assert!(controller.wrong_ids().is_empty());
    assert_eq!(controller.score().percent, 100);
    assert!(matches!(
        controller.dispatch(Action::RetryWrong, &service).await,
        Err(SessionError::NothingToReview)
    ));
}

#[tokio::test]
async fn wrong_remember_answers_are_collected_in_test_order() {
    let service = ScriptedService::default();
    let mut controller = tested_controller(&service, 5).await;

    let remember_ids: Vec<String> = controller
        .questions()
        .iter()
        .filter(|q| q.level() == BloomLevel::Remember)
        .map(|q| q.id.clone())
        .collect();

    answer_all(&mut controller, &service, |q| q.level() == BloomLevel::Remember).await;
    assert_eq!(controller.wrong_ids(), remember_ids);
    assert_eq!(controller.score().percent, 71);
}

#[tokio::test]
async fn retry_loop_terminates() {
    let service = ScriptedService::default();
    let mut controller = tested_controller(&service, 8).await;

    answer_all(&mut controller, &service, |q| q.level() != BloomLevel::Apply).await;
    let first_wrong = controller.wrong_ids();
    assert_eq!(first_wrong.len(), 6);

    // First pass: fix only the Understand questions.
    controller
        .dispatch(Action::RetryWrong, &service)
        .await
        .unwrap();
    let reviewed = answer_all(&mut controller, &service, |q| {
        q.level() != BloomLevel::Understand
    })
    .await;
    assert_eq!(reviewed, first_wrong);
    assert_eq!(controller.state(), SessionState::Results);
    assert!(controller.review_ids().is_empty());
    assert_eq!(controller.wrong_ids().len(), 4);

    // Second pass: fix everything left.
    controller
        .dispatch(Action::RetryWrong, &service)
        .await
        .unwrap();
    assert_eq!(controller.review_ids().len(), 4);
    answer_all(&mut controller, &service, |_| false).await;
    assert!(controller.wrong_ids().is_empty());
    assert_eq!(controller.state(), SessionState::Results);
    assert_eq!(service.test_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn new_test_regenerates_for_same_words() {
    let service = ScriptedService::default();
    let mut controller = tested_controller(&service, 2).await;
    answer_all(&mut controller, &service, |_| true).await;

    controller.dispatch(Action::NewTest, &service).await.unwrap();
    assert_eq!(service.test_calls.load(Ordering::SeqCst), 2);
    assert_eq!(controller.state(), SessionState::Testing { review: false });
    assert!(controller.answers().is_empty());
    assert_eq!(controller.questions().len(), 7);
    assert_eq!(controller.words().len(), 2);
}

#[tokio::test]
async fn pool_path_uses_service_topic_and_selection() {
    let service = ScriptedService::default();
    let mut controller = SessionController::new();

    controller
        .dispatch(
            Action::SubmitConfig(SessionConfig::new(CefrLevel::A2, None, None)),
            &service,
        )
        .await
        .unwrap();
    assert_eq!(controller.state(), SessionState::SelectingWords);
    assert_eq!(controller.topic(), Some("Ocean Life"));

    controller
        .dispatch(
            Action::ConfirmSelection(vec!["whale".into(), "deep".into()]),
            &service,
        )
        .await
        .unwrap();
    assert_eq!(controller.state(), SessionState::Studying);
    assert_eq!(controller.config().unwrap().num_words, 2);
    assert_eq!(controller.topic(), Some("Ocean Life"));
    assert_eq!(controller.progress().unwrap().total, 2);
}

#[tokio::test]
async fn failures_follow_stage_policy() {
    let service = ScriptedService::default();
    service.fail_pool.store(true, Ordering::SeqCst);

    let mut controller = SessionController::new();
    let outcome = controller
        .dispatch(
            Action::SubmitConfig(SessionConfig::new(CefrLevel::B1, None, None)),
            &service,
        )
        .await
        .unwrap();
    assert!(matches!(
        outcome,
        Outcome::Acquired {
            resolution: Resolution::Failed,
            ..
        }
    ));
    assert_eq!(controller.state(), SessionState::Setup);
    assert!(controller.notice().unwrap().contains("pool service unavailable"));

    service.fail_test.store(true, Ordering::SeqCst);
    let mut controller = tested_controller(&service, 1).await;
    assert_eq!(controller.state(), SessionState::Results);
    assert_eq!(controller.words().len(), 2);
    assert!(controller.questions().is_empty());
    assert!(controller.take_notice().unwrap().contains("test"));
}

#[tokio::test]
async fn late_resolution_after_home_is_dropped() {
    let service = ScriptedService::default();
    let mut controller = SessionController::new();

    let pending = controller
        .submit_config(SessionConfig::new(CefrLevel::C1, None, Some("ocean".into())))
        .unwrap();
    assert!(matches!(
        controller.dispatch(Action::AdvanceStudy, &service).await,
        Err(SessionError::Busy(SessionState::AcquiringVocabulary))
    ));

    controller.dispatch(Action::GoHome, &service).await.unwrap();
    let outcome = controller.acquire(pending, &service).await;
    assert!(matches!(
        outcome,
        Outcome::Acquired {
            resolution: Resolution::Discarded,
            ..
        }
    ));
    assert_eq!(controller.state(), SessionState::Setup);
    assert!(controller.words().is_empty());
    assert!(controller.config().is_none());
}

#[tokio::test]
async fn graded_answers_feed_the_scheduler() {
    let service = ScriptedService::default();
    let mut controller = tested_controller(&service, 4).await;
    let store = MemoryStore::default();
    let now = Utc::now();

    while let Some(question) = controller.current_question().cloned() {
        let submission = if question.level() == BloomLevel::Analyse
            && question.word_term.as_deref() == Some("decision")
        {
            wrong_submission(&question)
        } else {
            correct_submission(&question)
        };
        let outcome = controller
            .dispatch(Action::SubmitAnswer(submission), &service)
            .await
            .unwrap();
        let Outcome::Evaluated(evaluation) = outcome else {
            panic!("expected evaluation");
        };
        for (term, correct) in outcomes_for(&question, &evaluation) {
            record_outcome(&term, correct, &store, now).unwrap();
        }
        controller.dispatch(Action::AdvanceTest, &service).await.unwrap();
    }

    let due = get_due(&store, now).unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].term, "decision");
    assert_eq!(due[0].interval, 0);
}
