//! Interactive terminal sessions.
//!
//! `TrainerState` bundles the engine state so planning and completion can be
//! exercised without a terminal; `run_interactive` wraps it in the stdin
//! prompt loop.

use std::io::{self, BufRead, Write};
use std::time::Instant;

use chrono::Utc;
use rand::Rng;

use vocab_core::{
    build_quiz, complete_session, extract_features, LeitnerScheduler, PlanError, PlannerConfig,
    ProgressStore, QuizItem, SessionCounter, SessionKind, SessionLog, SessionPlan, SessionPlanner,
    UserModel, WordOutcome, WordPair,
};

use crate::error::Result;
use crate::store::DataStore;

/// All mutable engine state for one user.
pub struct TrainerState {
    pub vocab: Vec<WordPair>,
    pub progress: ProgressStore,
    pub model: UserModel,
    pub counter: SessionCounter,
    pub logs: Vec<SessionLog>,
    planner: SessionPlanner,
}

impl TrainerState {
    /// Load persisted state and seed progress entries for every word.
    pub fn load(store: &DataStore, vocab: Vec<WordPair>) -> Self {
        let mut progress = store.load_progress();
        progress.ensure_words(&vocab);
        Self {
            vocab,
            progress,
            model: store.load_model(),
            counter: store.load_counter(),
            logs: store.load_logs(),
            planner: SessionPlanner::new(PlannerConfig::default()),
        }
    }

    pub fn scheduler(&self) -> &LeitnerScheduler {
        &self.planner.scheduler
    }

    /// Words currently due for revision.
    pub fn due_count(&self) -> usize {
        self.scheduler()
            .due_words(&self.progress, self.counter.current_session())
            .len()
    }

    /// Plan the next session from the current state.
    pub fn plan(&self, rng: &mut impl Rng) -> std::result::Result<SessionPlan, PlanError> {
        let features = extract_features(
            &self.progress,
            &self.logs,
            &self.model,
            self.counter.current_session(),
        );
        self.planner.plan_session(
            &self.vocab,
            &self.progress,
            &self.model,
            &features,
            self.counter.current_session(),
            rng,
        )
    }

    /// Apply a finished session's outcomes and return the log entry.
    pub fn complete(&mut self, plan: &SessionPlan, outcomes: Vec<WordOutcome>) -> SessionLog {
        let scheduler = self.planner.scheduler.clone();
        complete_session(
            &scheduler,
            &mut self.progress,
            &mut self.model,
            &mut self.counter,
            &mut self.logs,
            plan,
            outcomes,
            Utc::now(),
        )
    }

    /// Words the learner has seen at least once.
    pub fn learned_count(&self) -> usize {
        self.progress.iter().filter(|(_, p)| !p.is_new()).count()
    }

    /// Words with a high mastery score.
    pub fn mastered_count(&self) -> usize {
        self.progress.iter().filter(|(_, p)| p.mastery >= 8).count()
    }
}

/// Run one full session against stdin/stdout, then persist.
pub fn run_interactive(state: &mut TrainerState, store: &DataStore, rng: &mut impl Rng) -> Result<()> {
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut output = io::stdout();
    run_session_loop(state, store, rng, &mut input, &mut output)
}

fn run_session_loop(
    state: &mut TrainerState,
    store: &DataStore,
    rng: &mut impl Rng,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<()> {
    writeln!(output, "Welcome to your Spanish vocabulary trainer!")?;
    writeln!(output, "Session #{}", state.counter.current_session())?;

    let due = state.due_count();
    if due > 0 {
        writeln!(output, "{due} word(s) due for review.")?;
    }

    let plan = match state.plan(rng) {
        Ok(plan) => plan,
        Err(err) => {
            writeln!(output, "Cannot start a session: {err}")?;
            return Ok(());
        }
    };

    match plan.kind {
        SessionKind::Revision => {
            writeln!(output, "Revision session: {} due words.", plan.len())?
        }
        SessionKind::Learning => writeln!(
            output,
            "Learning session ({}): {} words, {} new.",
            plan.mode.as_str(),
            plan.len(),
            plan.new_selected
        )?,
    }

    let mut outcomes = Vec::with_capacity(plan.len());
    let mut new_hits = (0usize, 0usize);
    let mut review_hits = (0usize, 0usize);
    let total = plan.len();
    for (index, word) in plan.words.iter().enumerate() {
        writeln!(output, "\nWord {} of {total}", index + 1)?;

        let is_new = state
            .progress
            .get(&word.english)
            .map(|p| p.is_new())
            .unwrap_or(true);
        if is_new {
            show_flashcard(word, input, output)?;
        }

        let quiz = build_quiz(word, &state.vocab, rng);
        let (correct, response_time) = ask_quiz(&quiz, input, output)?;
        let tally = if is_new { &mut new_hits } else { &mut review_hits };
        tally.1 += 1;
        tally.0 += usize::from(correct);
        outcomes.push(WordOutcome::new(word.key(), correct, response_time));
    }

    let log = state.complete(&plan, outcomes);
    store.save(&state.progress, &state.counter, &state.model, &state.logs)?;

    writeln!(output, "\nSession #{} complete!", log.session)?;
    writeln!(
        output,
        "Accuracy: {:.0}% ({} of {})",
        log.accuracy * 100.0,
        log.outcomes.iter().filter(|o| o.correct).count(),
        log.size
    )?;
    if new_hits.1 > 0 {
        writeln!(output, "New words: {} of {} correct", new_hits.0, new_hits.1)?;
    }
    if review_hits.1 > 0 {
        writeln!(
            output,
            "Reviews: {} of {} correct",
            review_hits.0, review_hits.1
        )?;
    }
    writeln!(
        output,
        "Progress: {}/{} words learned, {} mastered",
        state.learned_count(),
        state.vocab.len(),
        state.mastered_count()
    )?;
    Ok(())
}

fn show_flashcard(word: &WordPair, input: &mut impl BufRead, output: &mut impl Write) -> Result<()> {
    writeln!(output, "New word: {}", word.english)?;
    write!(output, "Think of the translation, then press Enter...")?;
    output.flush()?;
    read_line(input)?;
    writeln!(output, "Spanish: {}", word.spanish)?;
    write!(output, "Press Enter when ready for the quiz...")?;
    output.flush()?;
    read_line(input)?;
    Ok(())
}

fn ask_quiz(
    quiz: &QuizItem,
    input: &mut impl BufRead,
    output: &mut impl Write,
) -> Result<(bool, f64)> {
    writeln!(output, "What is the Spanish translation of '{}'?", quiz.prompt)?;
    for (index, option) in quiz.options.iter().enumerate() {
        writeln!(output, "  {}. {option}", index + 1)?;
    }

    let started = Instant::now();
    let choice = loop {
        write!(output, "Your answer (number): ")?;
        output.flush()?;
        let line = read_line(input)?;
        match line.trim().parse::<usize>() {
            Ok(n) if (1..=quiz.options.len()).contains(&n) => break &quiz.options[n - 1],
            _ => writeln!(
                output,
                "Please enter a number between 1 and {}.",
                quiz.options.len()
            )?,
        }
    };
    let response_time = started.elapsed().as_secs_f64();

    let correct = quiz.is_correct(choice);
    if correct {
        writeln!(output, "Correcto!")?;
    } else {
        writeln!(output, "Incorrecto. The correct answer is '{}'.", quiz.answer)?;
    }
    Ok((correct, response_time))
}

fn read_line(input: &mut impl BufRead) -> Result<String> {
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(line)
}
