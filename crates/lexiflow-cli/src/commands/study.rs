//! The `lexiflow study` command.
//!
//! Drives a [`SessionController`] from stdin: setup, word selection, study
//! cards, the test, and results with the retry/new-test/home menu. Every
//! prompt accepts `:h` (home) and `:q` (quit); end of input quits.

use std::collections::HashMap;
use std::io::{IsTerminal, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use comfy_table::{Cell, Table};
use rand::seq::IndexedRandom;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader, Lines};

use lexiflow_core::model::{Matching, SingleChoice, Word, WordCategory};
use lexiflow_core::srs::outcomes_for;
use lexiflow_core::text::{parse_emphasis, split_gap, strip_emphasis, Span};
use lexiflow_core::{
    CefrLevel, ContentService, Evaluation, FileStore, ProgressFraming, Question,
    QuestionOrderingPolicy, SessionConfig, SessionController, SessionError, SessionState, SrsDeck,
    SrsScheduler, SrsStore, Submission,
};
use lexiflow_providers::load_config_from;

const CONGRATS_PHRASES: [&str; 7] = [
    "Outstanding work!",
    "Spot on!",
    "Excellent!",
    "Perfect!",
    "You nailed it!",
    "Brilliant!",
    "That's correct!",
];

const SYMPATHY_PHRASES: [&str; 6] = [
    "Not quite, but nice try!",
    "Close, but give it another go!",
    "Tricky one, keep learning!",
    "Don't worry, you'll get it next time!",
    "Oops! Review the definition.",
    "Almost there!",
];

pub struct StudyOptions {
    pub level: Option<CefrLevel>,
    pub topic: Option<String>,
    pub words: Option<String>,
    pub provider: Option<String>,
    pub seed: Option<u64>,
    pub srs_file: Option<PathBuf>,
    pub no_srs: bool,
    pub save_report: bool,
    pub config: Option<PathBuf>,
}

pub async fn execute(options: StudyOptions) -> Result<()> {
    let config = load_config_from(options.config.as_deref())?;
    let provider = options
        .provider
        .unwrap_or_else(|| config.default_provider.clone());
    let service = lexiflow_providers::create_service(&provider, &config.provider(&provider)?)?;

    let store = (!options.no_srs)
        .then(|| FileStore::new(options.srs_file.unwrap_or_else(|| config.srs_path.clone())));

    let ordering = match options.seed {
        Some(seed) => QuestionOrderingPolicy::seeded(seed),
        None => QuestionOrderingPolicy::random(),
    };

    let mut session = StudySession {
        controller: SessionController::with_ordering(ordering),
        service: service.as_ref(),
        console: Console::new(BufReader::new(tokio::io::stdin())),
        store: store.as_ref().map(|s| s as &dyn SrsStore),
        reports_dir: options.save_report.then(|| config.reports_dir.clone()),
        setup: SessionConfig::new(
            options.level.unwrap_or(config.default_level),
            options.topic,
            options.words,
        ),
        bold: std::io::stdout().is_terminal(),
    };
    session.run().await
}

/// One line of learner input.
#[derive(Debug, PartialEq)]
enum Reply<T> {
    Answer(T),
    Home,
    Quit,
}

#[derive(Debug, PartialEq)]
enum Step {
    Continue,
    Quit,
}

struct Console<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin> Console<R> {
    fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }

    async fn ask(&mut self, prompt: &str) -> Result<Reply<String>> {
        print!("{prompt} ");
        std::io::stdout().flush()?;
        let line = self
            .lines
            .next_line()
            .await
            .context("failed to read from stdin")?;
        let Some(line) = line else {
            println!();
            return Ok(Reply::Quit);
        };
        Ok(parse_reply(&line))
    }
}

fn parse_reply(line: &str) -> Reply<String> {
    match line.trim() {
        ":q" | ":quit" => Reply::Quit,
        ":h" | ":home" => Reply::Home,
        other => Reply::Answer(other.to_string()),
    }
}

struct StudySession<'a, R> {
    controller: SessionController,
    service: &'a dyn ContentService,
    console: Console<R>,
    store: Option<&'a dyn SrsStore>,
    reports_dir: Option<PathBuf>,
    setup: SessionConfig,
    bold: bool,
}

impl<R: AsyncBufRead + Unpin> StudySession<'_, R> {
    async fn run(&mut self) -> Result<()> {
        let mut started = false;
        loop {
            if let Some(notice) = self.controller.take_notice() {
                println!("\n! {notice}");
            }

            let step = match self.controller.state() {
                SessionState::Setup if started => self.restart().await?,
                SessionState::Setup => {
                    started = true;
                    self.start().await?
                }
                SessionState::SelectingWords => self.select_words().await?,
                SessionState::Studying => self.study_word().await?,
                SessionState::Testing { .. } => self.answer_question().await?,
                SessionState::Results => self.results().await?,
                state => anyhow::bail!("session stuck in {state} with no request in flight"),
            };

            if step == Step::Quit {
                println!("Goodbye.");
                return Ok(());
            }
        }
    }

    fn home(&mut self) -> Step {
        self.controller.go_home();
        Step::Continue
    }

    async fn start(&mut self) -> Result<Step> {
        let pending = self.controller.submit_config(self.setup.clone())?;
        println!("Preparing a {} session ...", self.setup.level);
        self.controller.acquire(pending, self.service).await;
        Ok(Step::Continue)
    }

    async fn restart(&mut self) -> Result<Step> {
        match self
            .console
            .ask("\nStart another session with the same settings? [y/N]")
            .await?
        {
            Reply::Answer(a) if a.eq_ignore_ascii_case("y") || a.eq_ignore_ascii_case("yes") => {
                self.start().await
            }
            _ => Ok(Step::Quit),
        }
    }

    async fn select_words(&mut self) -> Result<Step> {
        let pool = self.controller.pool().to_vec();
        println!("\nTopic: {}", self.controller.topic().unwrap_or("-"));
        if pool.is_empty() {
            println!("No candidate words came back for this topic. Returning home.");
            return Ok(self.home());
        }
        for category in WordCategory::ALL {
            let entries: Vec<String> = pool
                .iter()
                .enumerate()
                .filter(|(_, item)| item.category == category)
                .map(|(i, item)| format!("{:>3}) {}", i + 1, item.term))
                .collect();
            if !entries.is_empty() {
                println!("\n{category}:");
                println!("  {}", entries.join("  "));
            }
        }

        let line = match self
            .console
            .ask("\nPick words by number (e.g. 1,4,12):")
            .await?
        {
            Reply::Answer(line) => line,
            Reply::Home => return Ok(self.home()),
            Reply::Quit => return Ok(Step::Quit),
        };

        let terms: Vec<String> = pool.iter().map(|item| item.term.clone()).collect();
        let selected = match parse_selection(&line, &terms) {
            Ok(selected) => selected,
            Err(message) => {
                println!("{message}");
                return Ok(Step::Continue);
            }
        };

        match self.controller.confirm_selection(selected) {
            Ok(pending) => {
                println!("Fetching word details ...");
                self.controller.acquire(pending, self.service).await;
            }
            Err(SessionError::EmptySelection) => println!("Select at least one word."),
            Err(e) => return Err(e.into()),
        }
        Ok(Step::Continue)
    }

    async fn study_word(&mut self) -> Result<Step> {
        let word = self
            .controller
            .current_word()
            .cloned()
            .context("no word to study")?;
        if let Some(progress) = self.controller.progress() {
            println!("\nWord {}/{}", progress.position, progress.total);
        }
        print!("{}", render_word(&word, self.bold));

        match self
            .console
            .ask("\nPress Enter to continue (:h home, :q quit)")
            .await?
        {
            Reply::Answer(_) => {
                if let Some(pending) = self.controller.advance_study()? {
                    println!("Generating your test ...");
                    self.controller.acquire(pending, self.service).await;
                }
                Ok(Step::Continue)
            }
            Reply::Home => Ok(self.home()),
            Reply::Quit => Ok(Step::Quit),
        }
    }

    async fn answer_question(&mut self) -> Result<Step> {
        let question = self
            .controller
            .current_question()
            .cloned()
            .context("no active question")?;

        if let Some(progress) = self.controller.progress() {
            let label = match progress.framing {
                ProgressFraming::Reviewing => "Reviewing",
                _ => "Question",
            };
            println!(
                "\n{label} {}/{}  [{}: {}]",
                progress.position,
                progress.total,
                question.level().label(),
                question.level()
            );
        }
        println!("{}", render(&question.text, self.bold));
        if let Some(translated) = &question.text_translated {
            println!("({})", render(translated, self.bold));
        }

        let reply = if let Some(choice) = question.single_choice() {
            self.ask_choice(choice).await?
        } else if let Some(matching) = question.matching() {
            self.ask_matching(matching).await?
        } else {
            anyhow::bail!("question {} has no answerable body", question.id);
        };
        let submission = match reply {
            Reply::Answer(submission) => submission,
            Reply::Home => return Ok(self.home()),
            Reply::Quit => return Ok(Step::Quit),
        };

        let evaluation = match self.controller.submit_answer(submission) {
            Ok(evaluation) => evaluation,
            Err(e @ (SessionError::EmptyChoice | SessionError::IncompleteSubmission { .. })) => {
                println!("{e}");
                return Ok(Step::Continue);
            }
            Err(e) => return Err(e.into()),
        };

        self.show_feedback(&question, &evaluation);
        self.record(&question, &evaluation);
        self.controller.advance_test()?;
        Ok(Step::Continue)
    }

    async fn ask_choice(&mut self, choice: &SingleChoice) -> Result<Reply<Submission>> {
        let options = self.controller.ordering_mut().shuffle_options(choice);
        for (i, (text, translated)) in options.iter().enumerate() {
            println!("  {}. {}", i + 1, render(text, self.bold));
            if let Some(translated) = translated {
                println!("     ({})", render(translated, self.bold));
            }
        }

        loop {
            let prompt = format!("Your answer [1-{}]:", options.len());
            match self.console.ask(&prompt).await? {
                Reply::Answer(line) => match pick_number(&line, options.len()) {
                    Some(i) => return Ok(Reply::Answer(Submission::Choice(options[i].0.clone()))),
                    None => println!("Enter a number between 1 and {}.", options.len()),
                },
                Reply::Home => return Ok(Reply::Home),
                Reply::Quit => return Ok(Reply::Quit),
            }
        }
    }

    async fn ask_matching(&mut self, matching: &Matching) -> Result<Reply<Submission>> {
        let bank = self.controller.ordering_mut().word_bank(matching);
        let listed: Vec<String> = bank
            .iter()
            .enumerate()
            .map(|(i, term)| format!("{}) {term}", i + 1))
            .collect();
        println!("  Word bank: {}", listed.join("  "));

        let mut placed = HashMap::new();
        for (n, pair) in matching.pairs.iter().enumerate() {
            let gap = split_gap(&pair.sentence);
            println!(
                "  {}. {}_____{}",
                n + 1,
                render(&gap.before, self.bold),
                render(&gap.after, self.bold)
            );
            if let Some(translated) = &pair.sentence_translated {
                println!("     ({translated})");
            }

            loop {
                match self.console.ask(&format!("Word for gap {}:", n + 1)).await? {
                    Reply::Answer(line) => match resolve_bank_entry(&line, &bank) {
                        Some(term) => {
                            placed.insert(pair.id.clone(), term);
                            break;
                        }
                        None => println!("Type a word, or its number from the bank."),
                    },
                    Reply::Home => return Ok(Reply::Home),
                    Reply::Quit => return Ok(Reply::Quit),
                }
            }
        }
        Ok(Reply::Answer(Submission::Matching(placed)))
    }

    fn show_feedback(&self, question: &Question, evaluation: &Evaluation) {
        let phrases: &[&str] = if evaluation.is_correct {
            &CONGRATS_PHRASES
        } else {
            &SYMPATHY_PHRASES
        };
        let phrase = phrases.choose(&mut rand::rng()).copied().unwrap_or_default();
        let verdict = if evaluation.is_correct { "Correct" } else { "Wrong" };
        println!("\n{verdict}: {phrase}");

        if !evaluation.is_correct {
            if let Some(choice) = question.single_choice() {
                println!("Answer: {}", render(&choice.correct_option, self.bold));
            }
            for (n, verdict) in evaluation.pair_verdicts.iter().enumerate() {
                if !verdict.is_correct {
                    println!(
                        "  gap {}: {} (you wrote {})",
                        n + 1,
                        verdict.correct_term,
                        verdict.given.as_deref().unwrap_or("nothing")
                    );
                }
            }
        }
        if let Some(explanation) = &question.explanation {
            println!("{}", render(explanation, self.bold));
        }
    }

    /// Feed graded terms to the scheduler. Storage failures do not end the
    /// session.
    fn record(&self, question: &Question, evaluation: &Evaluation) {
        let Some(store) = self.store else {
            return;
        };
        let outcomes = outcomes_for(question, evaluation);
        if outcomes.is_empty() {
            return;
        }

        let result = SrsDeck::load(store).and_then(|mut deck| {
            let scheduler = SrsScheduler::default();
            let now = Utc::now();
            for (term, is_correct) in &outcomes {
                deck.record(&scheduler, term, *is_correct, now);
            }
            deck.save(store)
        });
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to update spaced-repetition data");
        }
    }

    async fn results(&mut self) -> Result<Step> {
        let score = self.controller.score();
        println!("\nSession complete! Score: {}% ({}/{})", score.percent, score.correct, score.total);

        let mut table = Table::new();
        table.set_header(vec!["#", "Level", "Word", "Result", "Correct answer"]);
        for (i, question) in self.controller.questions().iter().enumerate() {
            let correct = self
                .controller
                .answers()
                .get(&question.id)
                .is_some_and(|a| a.is_correct);
            let expected = if correct {
                String::new()
            } else {
                correct_answer(question)
            };
            table.add_row(vec![
                Cell::new(i + 1),
                Cell::new(question.level().label()),
                Cell::new(question.word_term.as_deref().unwrap_or("")),
                Cell::new(if correct { "OK" } else { "WRONG" }),
                Cell::new(expected),
            ]);
        }
        println!("{table}");

        for stats in self.controller.level_breakdown() {
            println!(
                "  {} ({}): {}/{}",
                stats.level.label(),
                stats.level,
                stats.correct,
                stats.total
            );
        }

        if let Some(dir) = &self.reports_dir {
            let report = self.controller.report();
            let path = dir.join(report.file_name());
            report.save_json(&path)?;
            println!("Report saved to: {}", path.display());
        }

        let wrong = self.controller.wrong_ids().len();
        let menu = if wrong > 0 {
            format!("\n[r] retry {wrong} wrong  [n] new test  [h] home  [q] quit:")
        } else {
            "\n[n] new test  [h] home  [q] quit:".to_string()
        };

        loop {
            let choice = match self.console.ask(&menu).await? {
                Reply::Answer(choice) => choice.to_lowercase(),
                Reply::Home => return Ok(self.home()),
                Reply::Quit => return Ok(Step::Quit),
            };
            match choice.as_str() {
                "r" if wrong > 0 => {
                    self.controller.retry_wrong()?;
                    return Ok(Step::Continue);
                }
                "n" => {
                    let pending = self.controller.new_test()?;
                    println!("Generating a new test ...");
                    self.controller.acquire(pending, self.service).await;
                    return Ok(Step::Continue);
                }
                "h" => return Ok(self.home()),
                "q" => return Ok(Step::Quit),
                _ => println!("Unknown choice."),
            }
        }
    }
}

/// Render emphasis spans, bold on a terminal and `*starred*` otherwise.
fn render(text: &str, bold: bool) -> String {
    parse_emphasis(text)
        .into_iter()
        .map(|span| match span {
            Span::Plain(s) => s,
            Span::Emphasis(s) if bold => format!("\x1b[1m{s}\x1b[0m"),
            Span::Emphasis(s) => format!("*{s}*"),
        })
        .collect()
}

fn render_word(word: &Word, bold: bool) -> String {
    let mut out = format!("  {}", word.term);
    if !word.pronunciation.is_empty() {
        out.push_str(&format!("  {}", word.pronunciation));
    }
    if !word.part_of_speech.is_empty() {
        out.push_str(&format!("  ({})", word.part_of_speech));
    }
    if let Some(translated) = &word.term_translated {
        out.push_str(&format!("  = {translated}"));
    }
    out.push_str(&format!("\n  Meaning: {}\n", word.meaning));
    if let Some(translated) = &word.meaning_translated {
        out.push_str(&format!("           {translated}\n"));
    }
    for (i, example) in word.examples.iter().enumerate() {
        out.push_str(&format!("  {}. {}\n", i + 1, render(example, bold)));
        if let Some(translated) = word.examples_translated.get(i) {
            out.push_str(&format!("     {}\n", render(translated, bold)));
        }
    }
    out
}

fn correct_answer(question: &Question) -> String {
    if let Some(choice) = question.single_choice() {
        return strip_emphasis(&choice.correct_option);
    }
    question
        .matching()
        .map(|m| {
            m.pairs
                .iter()
                .map(|p| p.correct_term.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        })
        .unwrap_or_default()
}

/// 1-based option number to index.
fn pick_number(line: &str, count: usize) -> Option<usize> {
    match line.trim().parse::<usize>() {
        Ok(n) if (1..=count).contains(&n) => Some(n - 1),
        _ => None,
    }
}

/// Terms for a comma- or space-separated list of 1-based pool numbers.
/// Duplicates are dropped, keeping first occurrence order.
fn parse_selection(line: &str, terms: &[String]) -> Result<Vec<String>, String> {
    let mut selected: Vec<String> = Vec::new();
    for token in line.split([',', ' ']).filter(|t| !t.trim().is_empty()) {
        let index = pick_number(token, terms.len())
            .ok_or_else(|| format!("'{}' is not a number between 1 and {}.", token.trim(), terms.len()))?;
        let term = &terms[index];
        if !selected.contains(term) {
            selected.push(term.clone());
        }
    }
    Ok(selected)
}

/// A bank number resolves to that term; anything else is taken as typed.
fn resolve_bank_entry(line: &str, bank: &[String]) -> Option<String> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }
    match pick_number(line, bank.len()) {
        Some(i) => Some(bank[i].clone()),
        None => Some(line.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use lexiflow_core::model::{QuestionBody, WordPool};
    use lexiflow_providers::OfflineContentService;

    use super::*;

    fn terms(list: &[&str]) -> Vec<String> {
        list.iter().map(|t| t.to_string()).collect()
    }

    #[test]
    fn replies_recognize_commands() {
        assert_eq!(parse_reply(" :q "), Reply::Quit);
        assert_eq!(parse_reply(":home"), Reply::Home);
        assert_eq!(parse_reply(" 2 "), Reply::Answer("2".into()));
    }

    #[test]
    fn selection_maps_numbers_to_terms() {
        let pool = terms(&["ocean", "decision", "borrow"]);
        assert_eq!(
            parse_selection("3, 1 3", &pool).unwrap(),
            vec!["borrow", "ocean"]
        );
        assert!(parse_selection("", &pool).unwrap().is_empty());
        assert!(parse_selection("4", &pool).is_err());
        assert!(parse_selection("two", &pool).is_err());
    }

    #[test]
    fn bank_entries_accept_numbers_or_words() {
        let bank = terms(&["ocean", "decision"]);
        assert_eq!(resolve_bank_entry("2", &bank).as_deref(), Some("decision"));
        assert_eq!(resolve_bank_entry(" Ocean ", &bank).as_deref(), Some("Ocean"));
        assert_eq!(resolve_bank_entry("   ", &bank), None);
    }

    #[test]
    fn render_marks_emphasis() {
        assert_eq!(
            render("He **made a decision** today.", false),
            "He *made a decision* today."
        );
        assert_eq!(
            render("**made**", true),
            "\x1b[1mmade\x1b[0m"
        );
    }

    #[test]
    fn correct_answer_drops_emphasis_markers() {
        let question = Question {
            id: "an1".into(),
            word_term: Some("decision".into()),
            text: "Pick the correct sentence".into(),
            text_translated: None,
            explanation: None,
            explanation_translated: None,
            body: QuestionBody::Analyse(SingleChoice {
                options: terms(&["He **made a decision**.", "He **did a decision**."]),
                options_translated: vec![],
                correct_option: "He **made a decision**.".into(),
            }),
        };
        assert_eq!(correct_answer(&question), "He made a decision.");
    }

    #[tokio::test]
    async fn empty_pool_returns_home() {
        let service = OfflineContentService::new(None);
        let mut controller = SessionController::new();
        let pending = controller
            .submit_config(SessionConfig::new(CefrLevel::B1, Some("Travel".into()), None))
            .unwrap();
        controller.complete_word_pool(
            pending.ticket(),
            Ok(WordPool {
                topic: "Travel".into(),
                pool: vec![],
            }),
        );
        assert_eq!(controller.state(), SessionState::SelectingWords);

        let mut session = StudySession {
            controller,
            service: &service,
            console: Console::new(BufReader::new(&b""[..])),
            store: None,
            reports_dir: None,
            setup: SessionConfig::new(CefrLevel::B1, None, None),
            bold: false,
        };
        assert_eq!(session.select_words().await.unwrap(), Step::Continue);
        assert_eq!(session.controller.state(), SessionState::Setup);
    }

    #[test]
    fn pick_number_bounds() {
        assert_eq!(pick_number("1", 3), Some(0));
        assert_eq!(pick_number("3", 3), Some(2));
        assert_eq!(pick_number("0", 3), None);
        assert_eq!(pick_number("4", 3), None);
    }

    #[tokio::test]
    async fn console_treats_eof_as_quit() {
        let mut console = Console::new(BufReader::new(&b"first\n"[..]));
        assert_eq!(
            console.ask(">").await.unwrap(),
            Reply::Answer("first".into())
        );
        assert_eq!(console.ask(">").await.unwrap(), Reply::Quit);
    }
}
