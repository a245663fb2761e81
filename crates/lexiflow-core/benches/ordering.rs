use std::collections::HashMap;

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use lexiflow_core::model::{Matching, MatchingPair, SingleChoice, UserAnswer};
use lexiflow_core::{
    derive_wrong_ids, evaluate, BloomLevel, Question, QuestionBody, QuestionOrderingPolicy,
    Submission,
};

fn bench_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("question_ordering");

    for words in [5usize, 20, 100] {
        let questions = generate_test(words);
        group.bench_function(format!("{words}_words"), |b| {
            let mut policy = QuestionOrderingPolicy::seeded(42);
            b.iter(|| policy.order(black_box(questions.clone())))
        });
    }

    group.finish();
}

fn bench_evaluation(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluation");

    let questions = generate_test(50);
    let matching = questions
        .iter()
        .find(|q| q.level() == BloomLevel::Apply)
        .cloned()
        .unwrap();
    let placed: HashMap<String, String> = matching
        .matching()
        .unwrap()
        .pairs
        .iter()
        .map(|p| (p.id.clone(), format!("  {}  ", p.correct_term.to_uppercase())))
        .collect();

    group.bench_function("matching_50_pairs", |b| {
        b.iter(|| evaluate(black_box(&matching), Submission::Matching(placed.clone())))
    });

    let answers: HashMap<String, UserAnswer> = questions
        .iter()
        .enumerate()
        .map(|(i, q)| {
            (
                q.id.clone(),
                UserAnswer {
                    question_id: q.id.clone(),
                    submission: Submission::Choice("x".into()),
                    is_correct: i % 3 != 0,
                },
            )
        })
        .collect();

    group.bench_function("derive_wrong_ids_151", |b| {
        b.iter(|| derive_wrong_ids(black_box(&questions), black_box(&answers)))
    });

    group.finish();
}

fn generate_test(words: usize) -> Vec<Question> {
    let mut questions = Vec::with_capacity(3 * words + 1);
    for level in [BloomLevel::Analyse, BloomLevel::Remember, BloomLevel::Understand] {
        for i in 0..words {
            let choice = SingleChoice {
                options: (0..4).map(|o| format!("option {o} for word {i}")).collect(),
                options_translated: vec![],
                correct_option: format!("option 0 for word {i}"),
            };
            questions.push(Question {
                id: format!("{level}-{i}"),
                word_term: Some(format!("word{i}")),
                text: format!("{level} question for word{i}"),
                text_translated: None,
                explanation: None,
                explanation_translated: None,
                body: QuestionBody::single_choice(level, choice).unwrap(),
            });
        }
    }
    questions.push(Question {
        id: "level-3-master".into(),
        word_term: None,
        text: "Match the words to the correct sentences.".into(),
        text_translated: None,
        explanation: None,
        explanation_translated: None,
        body: QuestionBody::Apply(Matching {
            pairs: (0..words)
                .map(|i| MatchingPair {
                    id: format!("pair-{i}"),
                    sentence: format!("Sentence {i} has a [[GAP]] in it."),
                    sentence_translated: None,
                    correct_term: format!("word{i}"),
                })
                .collect(),
        }),
    });
    questions
}

criterion_group!(benches, bench_ordering, bench_evaluation);
criterion_main!(benches);
