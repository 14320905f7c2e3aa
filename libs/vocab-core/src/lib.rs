//! Core scheduling engine for adaptive vocabulary review.
//!
//! Provides:
//! - Leitner box scheduling driven by a session counter
//! - An online per-user model (forgetting curve, fatigue, confidence)
//! - Feature extraction and quota-based session planning
//! - Multiple-choice quiz generation
//!
//! The engine is pure and synchronous: it consumes already-loaded state and
//! returns decisions and updated state. Persistence and presentation belong
//! to the caller.

pub mod error;
pub mod features;
pub mod model;
pub mod planner;
pub mod quiz;
pub mod scheduler;
pub mod session;
pub mod types;

pub use error::{PlanError, Result};
pub use features::{extract_features, FeatureSet};
pub use model::{ForgettingCurve, RetentionEvidence, SessionSummary, UserModel};
pub use planner::{Category, CategoryShortfall, SessionPlan, SessionPlanner};
pub use quiz::{build_quiz, QuizItem};
pub use scheduler::{LeitnerScheduler, LEITNER_INTERVALS};
pub use session::complete_session;
pub use types::{
    normalize_key, PlannerConfig, ProgressStore, SessionCounter, SessionKind, SessionLog,
    SessionMode, WordOutcome, WordPair, WordProgress,
};
