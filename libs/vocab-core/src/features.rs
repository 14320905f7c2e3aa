//! Session-planning features derived from progress, history and the model.
//!
//! `extract_features` is a pure function of its inputs; the planner and its
//! tests never depend on hidden state.

use crate::model::UserModel;
use crate::types::{ProgressStore, SessionLog, WordOutcome};

/// Sessions considered for the recent-accuracy window.
const ACCURACY_WINDOW: usize = 5;
/// Sessions considered for the response-time trend.
const RESPONSE_TIME_WINDOW: usize = 3;
/// Accuracy assumed for a learner with no history at all.
const COLD_START_ACCURACY: f64 = 0.75;
/// Mastery level at which a word counts as previously mastered.
const MASTERED_AT: u8 = 7;
/// Minimum outcomes in a session before a fatigue split is meaningful.
const FATIGUE_MIN_OUTCOMES: usize = 4;

/// Signals the planner uses to size and shape the next session.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureSet {
    /// Mean accuracy over the last few sessions; neutral on cold start.
    pub recent_accuracy: f64,
    /// Recent mean response time minus the model baseline, in seconds.
    /// Positive means the learner is slowing down.
    pub response_time_trend: f64,
    /// Whether the last session's accuracy collapsed in its second half.
    pub fatigue_detected: bool,
    /// Fraction of previously-mastered words whose box regressed from peak.
    pub forgetting_rate: f64,
    /// Sessions elapsed since the previous completed session.
    pub recency_gap: u64,
}

/// Compute planning features from current state and session history.
pub fn extract_features(
    store: &ProgressStore,
    logs: &[SessionLog],
    model: &UserModel,
    current_session: u64,
) -> FeatureSet {
    FeatureSet {
        recent_accuracy: recent_accuracy(logs),
        response_time_trend: response_time_trend(logs, model),
        fatigue_detected: fatigue_detected(logs, model.fatigue_threshold),
        forgetting_rate: forgetting_rate(store),
        recency_gap: recency_gap(logs, current_session),
    }
}

fn recent_accuracy(logs: &[SessionLog]) -> f64 {
    let window = last_window(logs, ACCURACY_WINDOW);
    if window.is_empty() {
        return COLD_START_ACCURACY;
    }
    window.iter().map(|log| log.accuracy).sum::<f64>() / window.len() as f64
}

fn response_time_trend(logs: &[SessionLog], model: &UserModel) -> f64 {
    let window: Vec<&SessionLog> = last_window(logs, RESPONSE_TIME_WINDOW)
        .iter()
        .filter(|log| !log.outcomes.is_empty())
        .collect();
    if window.is_empty() {
        return 0.0;
    }
    let recent_mean =
        window.iter().map(|log| log.mean_response_time()).sum::<f64>() / window.len() as f64;
    recent_mean - model.response_time_baseline
}

/// Fatigue is an accuracy collapse within the most recent session: the
/// second half scoring below `threshold` times the first half.
fn fatigue_detected(logs: &[SessionLog], threshold: f64) -> bool {
    let Some(last) = logs.last() else {
        return false;
    };
    if last.outcomes.len() < FATIGUE_MIN_OUTCOMES {
        return false;
    }
    let mid = last.outcomes.len() / 2;
    let first = slice_accuracy(&last.outcomes[..mid]);
    let second = slice_accuracy(&last.outcomes[mid..]);
    first > 0.0 && second < first * threshold
}

fn slice_accuracy(outcomes: &[WordOutcome]) -> f64 {
    crate::types::mean_accuracy(outcomes)
}

fn forgetting_rate(store: &ProgressStore) -> f64 {
    let mastered: Vec<_> = store
        .iter()
        .filter(|(_, p)| !p.is_new() && p.mastery >= MASTERED_AT)
        .collect();
    if mastered.is_empty() {
        return 0.0;
    }
    let regressed = mastered
        .iter()
        .filter(|(_, p)| p.box_level < p.highest_box)
        .count();
    regressed as f64 / mastered.len() as f64
}

fn recency_gap(logs: &[SessionLog], current_session: u64) -> u64 {
    match logs.last() {
        Some(last) => current_session.saturating_sub(last.session),
        None => 0,
    }
}

fn last_window(logs: &[SessionLog], window: usize) -> &[SessionLog] {
    let start = logs.len().saturating_sub(window);
    &logs[start..]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SessionKind, SessionMode, WordProgress};
    use chrono::Utc;
    use pretty_assertions::assert_eq;

    fn log_with_accuracy(session: u64, accuracy: f64) -> SessionLog {
        let total = 10;
        let correct = (accuracy * total as f64).round() as usize;
        let outcomes = (0..total)
            .map(|i| WordOutcome::new(format!("w{i}"), i < correct, 3.0))
            .collect();
        SessionLog::from_outcomes(
            session,
            SessionMode::Balanced,
            SessionKind::Learning,
            outcomes,
            None,
            Utc::now(),
        )
    }

    #[test]
    fn cold_start_is_neutral() {
        let features = extract_features(&ProgressStore::new(), &[], &UserModel::default(), 1);
        assert_eq!(
            features,
            FeatureSet {
                recent_accuracy: 0.75,
                response_time_trend: 0.0,
                fatigue_detected: false,
                forgetting_rate: 0.0,
                recency_gap: 0,
            }
        );
    }

    #[test]
    fn recent_accuracy_averages_last_five_sessions() {
        let logs: Vec<_> = [0.1, 0.2, 0.5, 0.7, 0.9, 0.9, 0.5]
            .iter()
            .enumerate()
            .map(|(i, acc)| log_with_accuracy(i as u64 + 1, *acc))
            .collect();
        let features = extract_features(&ProgressStore::new(), &logs, &UserModel::default(), 8);
        // Mean of the last five: 0.5, 0.7, 0.9, 0.9, 0.5
        assert!((features.recent_accuracy - 0.7).abs() < 1e-9);
    }

    #[test]
    fn slowdown_shows_as_positive_trend() {
        let mut log = log_with_accuracy(1, 0.8);
        for outcome in &mut log.outcomes {
            outcome.response_time_secs = 5.0;
        }
        let features = extract_features(&ProgressStore::new(), &[log], &UserModel::default(), 2);
        assert!((features.response_time_trend - 2.0).abs() < 1e-9);
    }

    #[test]
    fn second_half_collapse_is_fatigue() {
        // First half 0.9, second half 0.5, threshold 0.7.
        let mut outcomes = Vec::new();
        for i in 0..10 {
            outcomes.push(WordOutcome::new(format!("a{i}"), i != 0, 3.0));
        }
        for i in 0..10 {
            outcomes.push(WordOutcome::new(format!("b{i}"), i < 5, 3.0));
        }
        let log = SessionLog::from_outcomes(
            1,
            SessionMode::Balanced,
            SessionKind::Learning,
            outcomes,
            None,
            Utc::now(),
        );

        let features = extract_features(&ProgressStore::new(), &[log], &UserModel::default(), 2);
        assert!(features.fatigue_detected);
    }

    #[test]
    fn steady_session_is_not_fatigue() {
        let log = log_with_accuracy(1, 0.8);
        let mut even = log.clone();
        // One miss per half so both halves score 0.8.
        for (i, outcome) in even.outcomes.iter_mut().enumerate() {
            outcome.correct = i % 5 != 4;
        }
        let features = extract_features(&ProgressStore::new(), &[even], &UserModel::default(), 2);
        assert!(!features.fatigue_detected);
    }

    #[test]
    fn tiny_sessions_carry_no_fatigue_signal() {
        let outcomes = vec![
            WordOutcome::new("a", true, 3.0),
            WordOutcome::new("b", false, 3.0),
        ];
        let log = SessionLog::from_outcomes(
            1,
            SessionMode::Balanced,
            SessionKind::Learning,
            outcomes,
            None,
            Utc::now(),
        );
        let features = extract_features(&ProgressStore::new(), &[log], &UserModel::default(), 2);
        assert!(!features.fatigue_detected);
    }

    #[test]
    fn forgetting_rate_counts_regressed_mastered_words() {
        let mut store = ProgressStore::new();
        *store.entry_mut("solid") = WordProgress {
            mastery: 9,
            attempts: 12,
            correct: 11,
            box_level: 5,
            highest_box: 5,
            last_reviewed_session: Some(4),
        };
        *store.entry_mut("slipping") = WordProgress {
            mastery: 8,
            attempts: 12,
            correct: 10,
            box_level: 3,
            highest_box: 5,
            last_reviewed_session: Some(4),
        };
        *store.entry_mut("learning") = WordProgress {
            mastery: 2,
            attempts: 4,
            correct: 2,
            box_level: 2,
            highest_box: 3,
            last_reviewed_session: Some(4),
        };

        let features = extract_features(&store, &[], &UserModel::default(), 5);
        assert_eq!(features.forgetting_rate, 0.5);
    }

    #[test]
    fn recency_gap_counts_sessions_since_last_log() {
        let logs = vec![log_with_accuracy(3, 0.8)];
        let features = extract_features(&ProgressStore::new(), &logs, &UserModel::default(), 7);
        assert_eq!(features.recency_gap, 4);
    }
}
