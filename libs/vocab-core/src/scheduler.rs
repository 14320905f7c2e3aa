//! Leitner scheduler: session-counter-driven due dates and box transitions.
//!
//! Intervals are measured in sessions, not days, so irregular study habits do
//! not inflate or starve the review queue.

use crate::types::{ProgressStore, WordProgress};

/// Review interval per box, in sessions. Index 0 is box 1.
pub const LEITNER_INTERVALS: [u64; 5] = [1, 2, 4, 7, 15];

/// Leitner scheduler with a configurable interval table.
#[derive(Debug, Clone)]
pub struct LeitnerScheduler {
    pub intervals: [u64; 5],
}

impl Default for LeitnerScheduler {
    fn default() -> Self {
        Self {
            intervals: LEITNER_INTERVALS,
        }
    }
}

impl LeitnerScheduler {
    /// Required session gap for a box. Out-of-range boxes are clamped.
    pub fn interval(&self, box_level: u8) -> u64 {
        let index = box_level.clamp(1, 5) as usize - 1;
        self.intervals[index]
    }

    /// Whether a word should be presented at `current_session`.
    ///
    /// A never-reviewed word is immediately eligible. No side effects.
    pub fn is_due(&self, progress: &WordProgress, current_session: u64) -> bool {
        match progress.last_reviewed_session {
            None => true,
            Some(last) => {
                current_session.saturating_sub(last) >= self.interval(progress.box_level)
            }
        }
    }

    /// Apply a quiz outcome to a word's progress.
    ///
    /// Total over valid and corrupted inputs alike: state is sanitized first,
    /// then nudged one step and clamped at the bounds.
    pub fn apply_outcome(&self, progress: &mut WordProgress, correct: bool, current_session: u64) {
        if progress.sanitize() {
            tracing::warn!("repaired out-of-range progress before applying outcome");
        }

        progress.attempts += 1;
        if correct {
            progress.correct += 1;
            progress.mastery = (progress.mastery + 1).min(10);
            progress.box_level = (progress.box_level + 1).min(5);
        } else {
            progress.mastery = progress.mastery.saturating_sub(1);
            progress.box_level = progress.box_level.saturating_sub(1).max(1);
        }
        progress.highest_box = progress.highest_box.max(progress.box_level);
        progress.last_reviewed_session = Some(current_session);
    }

    /// Keys of previously-reviewed words that are due at `current_session`.
    ///
    /// Never-reviewed words are introduced through learning quotas instead,
    /// so they do not count toward the revision trigger.
    pub fn due_words(&self, store: &ProgressStore, current_session: u64) -> Vec<String> {
        store
            .iter()
            .filter(|(_, p)| !p.is_new() && self.is_due(p, current_session))
            .map(|(word, _)| word.clone())
            .collect()
    }
}
