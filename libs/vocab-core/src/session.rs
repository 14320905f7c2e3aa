//! Session completion: the single point where outcomes mutate state.
//!
//! A session that never reaches this step leaves progress, model and counter
//! untouched; there is no partial credit for abandoned sessions.

use chrono::{DateTime, Utc};

use crate::model::{RetentionEvidence, SessionSummary, UserModel};
use crate::planner::SessionPlan;
use crate::scheduler::LeitnerScheduler;
use crate::types::{ProgressStore, SessionCounter, SessionLog, WordOutcome};

/// Apply a finished session's outcomes as one unit.
///
/// Outcomes are applied in presentation order, the user model is updated
/// from the aggregated summary, the counter advances, and the resulting log
/// entry is appended and returned for persistence.
pub fn complete_session(
    scheduler: &LeitnerScheduler,
    store: &mut ProgressStore,
    model: &mut UserModel,
    counter: &mut SessionCounter,
    logs: &mut Vec<SessionLog>,
    plan: &SessionPlan,
    outcomes: Vec<WordOutcome>,
    completed_at: DateTime<Utc>,
) -> SessionLog {
    let session = counter.current_session();

    let mut retention = RetentionEvidence::default();
    for outcome in &outcomes {
        let progress = store.entry_mut(&outcome.word);
        // Retention evidence comes from words that waited out their full
        // interval, judged before the outcome moves them.
        if !progress.is_new() && scheduler.is_due(progress, session) {
            retention.reviewed_after_interval += 1;
            if outcome.correct {
                retention.recalled += 1;
            }
        }
        scheduler.apply_outcome(progress, outcome.correct, session);
    }

    let log = SessionLog::from_outcomes(
        session,
        plan.mode,
        plan.kind,
        outcomes,
        Some(plan.predicted_accuracy),
        completed_at,
    );

    let summary = SessionSummary {
        session,
        accuracy: log.accuracy,
        mean_response_time: log.mean_response_time(),
        accepted_size: log.size,
        predicted_accuracy: log.predicted_accuracy,
        retention,
    };
    model.apply_summary(&summary);
    counter.advance();

    tracing::info!(
        session,
        size = log.size,
        accuracy = log.accuracy,
        mode = log.mode.as_str(),
        "session completed"
    );

    logs.push(log.clone());
    log
}
