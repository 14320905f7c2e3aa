//! Core types for the vocabulary scheduling engine.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A vocabulary pair as provided by the external loader.
///
/// Immutable for the lifetime of a run; the normalized english word is the
/// unique key into [`ProgressStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordPair {
    pub english: String,
    pub spanish: String,
}

impl WordPair {
    pub fn new(english: impl Into<String>, spanish: impl Into<String>) -> Self {
        Self {
            english: english.into(),
            spanish: spanish.into(),
        }
    }

    /// Normalized lookup key for this pair.
    pub fn key(&self) -> String {
        normalize_key(&self.english)
    }
}

/// Normalize a source-language word into its progress-table key.
pub fn normalize_key(word: &str) -> String {
    word.trim().to_lowercase()
}

/// Per-word learning state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WordProgress {
    /// Bounded cumulative score, 0..=10.
    pub mastery: u8,
    pub attempts: u32,
    pub correct: u32,
    /// Leitner box, 1..=5.
    #[serde(rename = "box")]
    pub box_level: u8,
    /// Peak box ever reached; used to detect regression.
    #[serde(default = "default_box")]
    pub highest_box: u8,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub last_reviewed_session: Option<u64>,
}

fn default_box() -> u8 {
    1
}

impl Default for WordProgress {
    fn default() -> Self {
        Self {
            mastery: 0,
            attempts: 0,
            correct: 0,
            box_level: 1,
            highest_box: 1,
            last_reviewed_session: None,
        }
    }
}

impl WordProgress {
    /// A word never answered in any session.
    pub fn is_new(&self) -> bool {
        self.attempts == 0
    }

    /// Lifetime accuracy, 0.0 when never attempted.
    pub fn accuracy(&self) -> f64 {
        if self.attempts == 0 {
            0.0
        } else {
            f64::from(self.correct) / f64::from(self.attempts)
        }
    }

    /// Clamp every field back into its declared range.
    ///
    /// Persisted state is never trusted; corrupt entries are repaired rather
    /// than rejected. Returns true when anything had to change.
    pub fn sanitize(&mut self) -> bool {
        let before = self.clone();
        self.mastery = self.mastery.min(10);
        self.box_level = self.box_level.clamp(1, 5);
        self.highest_box = self.highest_box.clamp(self.box_level, 5);
        if self.correct > self.attempts {
            self.correct = self.attempts;
        }
        if self.attempts == 0 {
            self.last_reviewed_session = None;
        }
        *self != before
    }
}

/// In-memory table of per-word learning state, keyed by normalized word.
///
/// A `BTreeMap` keeps iteration order deterministic, which the planner's
/// stable tie-breaks rely on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgressStore {
    entries: BTreeMap<String, WordProgress>,
}

impl ProgressStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from persisted entries, repairing anything out of range.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, WordProgress)>) -> Self {
        let mut store = Self::new();
        for (word, mut progress) in entries {
            if progress.sanitize() {
                tracing::warn!(word = %word, "repaired out-of-range progress entry");
            }
            store.entries.insert(normalize_key(&word), progress);
        }
        store
    }

    /// Make sure every vocabulary word has an entry, defaulting the missing
    /// ones. Entries for words no longer in the vocabulary are left alone.
    pub fn ensure_words<'a>(&mut self, words: impl IntoIterator<Item = &'a WordPair>) {
        for pair in words {
            self.entries.entry(pair.key()).or_default();
        }
    }

    pub fn get(&self, word: &str) -> Option<&WordProgress> {
        self.entries.get(&normalize_key(word))
    }

    /// Mutable access, inserting a default entry when absent.
    pub fn entry_mut(&mut self, word: &str) -> &mut WordProgress {
        self.entries.entry(normalize_key(word)).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &WordProgress)> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Monotonic counter identifying the current session.
///
/// Holds the number of completed sessions; the session being planned or run
/// is always `completed + 1`. Absent persisted state means zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionCounter {
    session_counter: u64,
}

impl SessionCounter {
    pub fn new(completed: u64) -> Self {
        Self {
            session_counter: completed,
        }
    }

    /// Sessions completed so far.
    pub fn completed(&self) -> u64 {
        self.session_counter
    }

    /// Id of the session currently being planned or run.
    pub fn current_session(&self) -> u64 {
        self.session_counter + 1
    }

    /// Advance once per completed session. Never decrements.
    pub fn advance(&mut self) {
        self.session_counter += 1;
    }
}

/// Difficulty-mix mode for a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionMode {
    Balanced,
    Challenging,
    ReviewHeavy,
    Easy,
}

impl Default for SessionMode {
    fn default() -> Self {
        Self::Balanced
    }
}

impl SessionMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Balanced => "balanced",
            Self::Challenging => "challenging",
            Self::ReviewHeavy => "review_heavy",
            Self::Easy => "easy",
        }
    }
}

/// Whether a session introduces new words or only revises due ones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    Learning,
    Revision,
}

impl Default for SessionKind {
    fn default() -> Self {
        Self::Learning
    }
}

/// One answered word within a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordOutcome {
    pub word: String,
    pub correct: bool,
    pub response_time_secs: f64,
}

impl WordOutcome {
    pub fn new(word: impl Into<String>, correct: bool, response_time_secs: f64) -> Self {
        Self {
            word: word.into(),
            correct,
            response_time_secs,
        }
    }
}

/// Append-only record of one completed session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionLog {
    pub session: u64,
    pub size: usize,
    pub mode: SessionMode,
    #[serde(default)]
    pub kind: SessionKind,
    pub outcomes: Vec<WordOutcome>,
    pub accuracy: f64,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub predicted_accuracy: Option<f64>,
    pub completed_at: DateTime<Utc>,
}

impl SessionLog {
    pub fn from_outcomes(
        session: u64,
        mode: SessionMode,
        kind: SessionKind,
        outcomes: Vec<WordOutcome>,
        predicted_accuracy: Option<f64>,
        completed_at: DateTime<Utc>,
    ) -> Self {
        let size = outcomes.len();
        let accuracy = mean_accuracy(&outcomes);
        Self {
            session,
            size,
            mode,
            kind,
            outcomes,
            accuracy,
            predicted_accuracy,
            completed_at,
        }
    }

    /// Mean per-answer response time, 0.0 for an empty session.
    pub fn mean_response_time(&self) -> f64 {
        if self.outcomes.is_empty() {
            return 0.0;
        }
        let total: f64 = self.outcomes.iter().map(|o| o.response_time_secs).sum();
        total / self.outcomes.len() as f64
    }
}

/// Fraction of correct outcomes in a slice, 0.0 when empty.
pub(crate) fn mean_accuracy(outcomes: &[WordOutcome]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let correct = outcomes.iter().filter(|o| o.correct).count();
    correct as f64 / outcomes.len() as f64
}

/// Heuristic constants for session planning.
///
/// The exact percentages and scale factors are tunable, not load-bearing
/// precision; these defaults reproduce the documented behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannerConfig {
    /// Floor for any learning session.
    pub min_session_size: usize,
    /// Cap to bound presentation load.
    pub max_session_size: usize,
    /// Base size used until the model has accepted sizes to draw from.
    pub default_session_size: usize,
    /// Due-word count at which a revision-only session is proposed.
    pub revision_threshold: usize,
    /// Recent accuracy at or above which a session is scaled up.
    pub challenge_accuracy: f64,
    /// Recent accuracy below which the mix turns review-heavy.
    pub low_accuracy: f64,
    /// Forgetting rate at or above which the mix turns review-heavy.
    pub high_forgetting_rate: f64,
    /// Size multiplier for high-accuracy, non-fatigued learners.
    pub challenge_scale: f64,
    /// Size multiplier once fatigue is detected.
    pub fatigue_scale: f64,
    /// Per-slot probability of actually including a high-mastery word in a
    /// balanced session.
    pub high_mastery_probability: f64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            min_session_size: 5,
            max_session_size: 30,
            default_session_size: 10,
            revision_threshold: 5,
            challenge_accuracy: 0.85,
            low_accuracy: 0.6,
            high_forgetting_rate: 0.3,
            challenge_scale: 1.3,
            fatigue_scale: 0.8,
            high_mastery_probability: 0.3,
        }
    }
}
