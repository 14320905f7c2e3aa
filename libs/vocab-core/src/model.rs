//! Per-user adaptive model, updated once per completed session.
//!
//! Every update is a bounded smoothing step toward the observed evidence, so
//! no field can drift outside its declared range no matter how long the
//! session history grows.

use serde::{Deserialize, Serialize};

/// Smoothing factor for the response-time moving average.
const RESPONSE_TIME_ALPHA: f64 = 0.3;
/// Smoothing factor for forgetting-curve nudges.
const CURVE_STEP: f64 = 0.1;
/// Confidence adjustment per session.
const CONFIDENCE_STEP: f64 = 0.05;
/// Predicted-vs-actual accuracy window that counts as a hit.
const PREDICTION_TOLERANCE: f64 = 0.15;
/// Retained per-session accuracy history.
const ACCURACY_TREND_CAP: usize = 20;
/// Retained accepted session sizes.
const SESSION_SIZE_CAP: usize = 3;

/// Exponential-decay-style retention coefficients.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ForgettingCurve {
    pub a: f64,
    pub b: f64,
}

impl Default for ForgettingCurve {
    fn default() -> Self {
        Self { a: 0.9, b: 1.2 }
    }
}

impl ForgettingCurve {
    /// Nudge the coefficients toward the retention observed this session.
    ///
    /// `retention` is the fraction of interval-due words that were recalled.
    /// Good retention raises `a` and flattens the decay `b`; poor retention
    /// does the opposite. Steps are small enough not to oscillate.
    fn observe_retention(&mut self, retention: f64) {
        let retention = retention.clamp(0.0, 1.0);
        self.a += CURVE_STEP * (retention - self.a);
        let target_b = 2.0 - retention;
        self.b += CURVE_STEP * (target_b - self.b);
        self.clamp();
    }

    fn clamp(&mut self) {
        self.a = self.a.clamp(0.5, 0.99);
        self.b = self.b.clamp(0.5, 2.0);
    }
}

/// Evidence about interval-due words gathered during one session.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetentionEvidence {
    /// Words reviewed at or past their scheduled interval.
    pub reviewed_after_interval: u32,
    /// How many of those were answered correctly.
    pub recalled: u32,
}

impl RetentionEvidence {
    /// Observed retention fraction, if any interval-due word was seen.
    pub fn retention(&self) -> Option<f64> {
        if self.reviewed_after_interval == 0 {
            None
        } else {
            Some(f64::from(self.recalled) / f64::from(self.reviewed_after_interval))
        }
    }
}

/// Aggregated result of one completed session, fed to the model exactly once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session: u64,
    pub accuracy: f64,
    pub mean_response_time: f64,
    pub accepted_size: usize,
    pub predicted_accuracy: Option<f64>,
    pub retention: RetentionEvidence,
}

/// Adaptive per-user parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserModel {
    pub forgetting_curve: ForgettingCurve,
    /// Recent accepted session sizes, newest last, capped at 3.
    pub optimal_session_sizes: Vec<usize>,
    /// Within-session accuracy-drop fraction that signals fatigue, in (0,1].
    pub fatigue_threshold: f64,
    /// Exponential moving average of per-answer response time, in seconds.
    pub response_time_baseline: f64,
    /// Per-session accuracy history, newest last, capped at 20.
    pub accuracy_trends: Vec<f64>,
    /// Self-reported confidence in [0,1].
    pub confidence_level: f64,
    /// Replay guard: highest session already folded into this model.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_updated_session: Option<u64>,
}

impl Default for UserModel {
    fn default() -> Self {
        Self {
            forgetting_curve: ForgettingCurve::default(),
            optimal_session_sizes: Vec::new(),
            fatigue_threshold: 0.7,
            response_time_baseline: 3.0,
            accuracy_trends: Vec::new(),
            confidence_level: 0.8,
            last_updated_session: None,
        }
    }
}

impl UserModel {
    /// Clamp every bounded field back into range after an untrusted load.
    ///
    /// Returns true when anything had to change.
    pub fn sanitize(&mut self) -> bool {
        let before = self.clone();
        self.forgetting_curve.clamp();
        self.fatigue_threshold = self.fatigue_threshold.clamp(0.05, 1.0);
        self.response_time_baseline = self.response_time_baseline.clamp(0.1, 120.0);
        self.confidence_level = self.confidence_level.clamp(0.0, 1.0);
        for accuracy in &mut self.accuracy_trends {
            *accuracy = accuracy.clamp(0.0, 1.0);
        }
        truncate_oldest(&mut self.accuracy_trends, ACCURACY_TREND_CAP);
        truncate_oldest(&mut self.optimal_session_sizes, SESSION_SIZE_CAP);
        *self != before
    }

    /// Fold one session summary into the model.
    ///
    /// Replaying a summary for an already-counted session is a no-op, so
    /// double saves cannot double-count. Returns whether the summary was
    /// applied.
    pub fn apply_summary(&mut self, summary: &SessionSummary) -> bool {
        if let Some(last) = self.last_updated_session {
            if summary.session <= last {
                tracing::warn!(
                    session = summary.session,
                    last_updated = last,
                    "ignoring replayed session summary"
                );
                return false;
            }
        }

        self.accuracy_trends.push(summary.accuracy.clamp(0.0, 1.0));
        truncate_oldest(&mut self.accuracy_trends, ACCURACY_TREND_CAP);

        if summary.mean_response_time > 0.0 {
            self.response_time_baseline = RESPONSE_TIME_ALPHA * summary.mean_response_time
                + (1.0 - RESPONSE_TIME_ALPHA) * self.response_time_baseline;
        }

        if let Some(retention) = summary.retention.retention() {
            self.forgetting_curve.observe_retention(retention);
        }

        if summary.accepted_size > 0 {
            self.optimal_session_sizes.push(summary.accepted_size);
            truncate_oldest(&mut self.optimal_session_sizes, SESSION_SIZE_CAP);
        }

        if let Some(predicted) = summary.predicted_accuracy {
            let step = if (predicted - summary.accuracy).abs() <= PREDICTION_TOLERANCE {
                CONFIDENCE_STEP
            } else {
                -CONFIDENCE_STEP
            };
            self.confidence_level = (self.confidence_level + step).clamp(0.0, 1.0);
        }

        self.last_updated_session = Some(summary.session);
        true
    }

    /// Mean of the recently accepted session sizes, or `fallback` when the
    /// model has no history yet.
    pub fn base_session_size(&self, fallback: usize) -> usize {
        if self.optimal_session_sizes.is_empty() {
            return fallback;
        }
        let total: usize = self.optimal_session_sizes.iter().sum();
        let mean = total as f64 / self.optimal_session_sizes.len() as f64;
        mean.round() as usize
    }
}

fn truncate_oldest<T>(values: &mut Vec<T>, cap: usize) {
    if values.len() > cap {
        let excess = values.len() - cap;
        values.drain(..excess);
    }
}
