//! Session planning: mode classification, sizing, and quota-based word
//! selection with deterministic shortfall redistribution.

use std::cmp::Reverse;
use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::error::{PlanError, Result};
use crate::features::FeatureSet;
use crate::model::UserModel;
use crate::scheduler::LeitnerScheduler;
use crate::types::{PlannerConfig, ProgressStore, SessionKind, SessionMode, WordPair, WordProgress};

/// Difficulty category a word falls into for quota selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    New,
    LowMastery,
    MidMastery,
    HighMastery,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::LowMastery => "low_mastery",
            Self::MidMastery => "mid_mastery",
            Self::HighMastery => "high_mastery",
        }
    }

    fn of(progress: &WordProgress) -> Self {
        if progress.is_new() {
            Self::New
        } else if progress.mastery <= 2 {
            Self::LowMastery
        } else if progress.mastery <= 6 {
            Self::MidMastery
        } else {
            Self::HighMastery
        }
    }
}

const CATEGORIES: [Category; 4] = [
    Category::New,
    Category::LowMastery,
    Category::MidMastery,
    Category::HighMastery,
];

/// A quota that could not be filled from its own category.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CategoryShortfall {
    pub category: Category,
    pub requested: usize,
    pub available: usize,
}

/// Ordered word selection plus the decisions that produced it.
#[derive(Debug, Clone)]
pub struct SessionPlan {
    pub words: Vec<WordPair>,
    pub mode: SessionMode,
    pub kind: SessionKind,
    /// Size the planner aimed for before supply limits.
    pub requested_size: usize,
    /// Sanity-check prediction, logged for confidence calibration.
    pub predicted_accuracy: f64,
    pub new_selected: usize,
    pub low_selected: usize,
    pub mid_selected: usize,
    pub high_selected: usize,
    /// Categories that ran out of eligible words.
    pub shortfalls: Vec<CategoryShortfall>,
}

impl SessionPlan {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

/// Plans sessions from extracted features and current progress.
#[derive(Debug, Clone, Default)]
pub struct SessionPlanner {
    pub config: PlannerConfig,
    pub scheduler: LeitnerScheduler,
}

impl SessionPlanner {
    pub fn new(config: PlannerConfig) -> Self {
        Self {
            config,
            scheduler: LeitnerScheduler::default(),
        }
    }

    /// Pick the difficulty mix by the dominant signal.
    ///
    /// Fatigue always wins (cut the load), then visible forgetting or low
    /// accuracy (shore up struggling words), then sustained high accuracy
    /// (raise the challenge).
    pub fn classify_mode(&self, features: &FeatureSet) -> SessionMode {
        if features.fatigue_detected {
            SessionMode::Easy
        } else if features.forgetting_rate >= self.config.high_forgetting_rate
            || features.recent_accuracy < self.config.low_accuracy
        {
            SessionMode::ReviewHeavy
        } else if features.recent_accuracy >= self.config.challenge_accuracy {
            SessionMode::Challenging
        } else {
            SessionMode::Balanced
        }
    }

    /// Plan the next session.
    ///
    /// Proposes a revision-only session when enough words are due, otherwise
    /// a learning session whose size, mix and ordering follow the extracted
    /// features. Never returns an empty plan silently: an unusable
    /// vocabulary is an explicit error.
    pub fn plan_session(
        &self,
        vocab: &[WordPair],
        store: &ProgressStore,
        model: &UserModel,
        features: &FeatureSet,
        current_session: u64,
        rng: &mut impl Rng,
    ) -> Result<SessionPlan> {
        if vocab.is_empty() {
            return Err(PlanError::EmptyVocabulary);
        }

        let candidates = dedupe(vocab);
        let base_size = model.base_session_size(self.config.default_session_size);

        let due = self.scheduler.due_words(store, current_session);
        if due.len() >= self.config.revision_threshold {
            return self.plan_revision(&candidates, store, features, &due, base_size);
        }

        self.plan_learning(&candidates, store, features, base_size, rng)
    }

    fn plan_revision(
        &self,
        candidates: &[&WordPair],
        store: &ProgressStore,
        features: &FeatureSet,
        due: &[String],
        base_size: usize,
    ) -> Result<SessionPlan> {
        let due_keys: HashSet<&str> = due.iter().map(String::as_str).collect();
        let mut selected: Vec<(&WordPair, &WordProgress)> = candidates
            .iter()
            .filter(|pair| due_keys.contains(pair.key().as_str()))
            .filter_map(|pair| store.get(&pair.english).map(|p| (*pair, p)))
            .collect();

        // Stalest review first, struggling words breaking ties.
        selected.sort_by_key(|(_, p)| (p.last_reviewed_session.unwrap_or(0), p.mastery));
        selected.truncate(base_size.min(due.len()));

        if selected.is_empty() {
            return Err(PlanError::ExhaustedVocabulary {
                requested: base_size,
            });
        }

        let mut counts = [0usize; 4];
        for (_, progress) in &selected {
            counts[category_index(Category::of(progress))] += 1;
        }

        let mode = SessionMode::ReviewHeavy;
        tracing::debug!(
            due = due.len(),
            size = selected.len(),
            "proposing revision session"
        );

        Ok(SessionPlan {
            words: selected.into_iter().map(|(pair, _)| pair.clone()).collect(),
            mode,
            kind: SessionKind::Revision,
            requested_size: base_size.min(due.len()),
            predicted_accuracy: predicted_accuracy(features.recent_accuracy, mode),
            new_selected: 0,
            low_selected: counts[1],
            mid_selected: counts[2],
            high_selected: counts[3],
            shortfalls: Vec::new(),
        })
    }

    fn plan_learning(
        &self,
        candidates: &[&WordPair],
        store: &ProgressStore,
        features: &FeatureSet,
        base_size: usize,
        rng: &mut impl Rng,
    ) -> Result<SessionPlan> {
        let mode = self.classify_mode(features);
        let size = self.scaled_size(base_size, features);

        // Partition the vocabulary; every word lands in exactly one bucket,
        // so a session can never contain duplicates.
        let mut buckets: [Vec<(usize, &WordPair, WordProgress)>; 4] =
            std::array::from_fn(|_| Vec::new());
        for (index, pair) in candidates.iter().enumerate() {
            let progress = store.get(&pair.english).cloned().unwrap_or_default();
            let category = Category::of(&progress);
            buckets[category_index(category)].push((index, *pair, progress));
        }

        if buckets.iter().all(Vec::is_empty) {
            return Err(PlanError::ExhaustedVocabulary { requested: size });
        }

        // New words: longest first, stable on input order. Everything else:
        // stalest review first, then lowest mastery, then input order.
        buckets[0].sort_by_key(|(index, pair, _)| (Reverse(pair.english.chars().count()), *index));
        for bucket in &mut buckets[1..] {
            bucket.sort_by_key(|(index, _, progress)| {
                (
                    progress.last_reviewed_session.unwrap_or(0),
                    progress.mastery,
                    *index,
                )
            });
        }

        let mut quotas = quota_counts(mode, size);

        // High-mastery reinforcement is probabilistic in balanced sessions;
        // a failed draw hands the slot to a struggling word instead.
        if mode == SessionMode::Balanced {
            let high = quotas[3];
            for _ in 0..high {
                if !rng.gen_bool(self.config.high_mastery_probability) {
                    quotas[3] -= 1;
                    quotas[1] += 1;
                }
            }
        }

        let available: [usize; 4] = std::array::from_fn(|i| buckets[i].len());
        let (take, shortfalls) = redistribute(quotas, available);

        let mut selected: Vec<&WordPair> = Vec::with_capacity(size);
        for (index, bucket) in buckets.iter().enumerate() {
            selected.extend(bucket.iter().take(take[index]).map(|(_, pair, _)| *pair));
        }
        selected.shuffle(rng);

        tracing::debug!(
            mode = mode.as_str(),
            size,
            selected = selected.len(),
            new = take[0],
            low = take[1],
            mid = take[2],
            high = take[3],
            "planned learning session"
        );

        Ok(SessionPlan {
            words: selected.into_iter().cloned().collect(),
            mode,
            kind: SessionKind::Learning,
            requested_size: size,
            predicted_accuracy: predicted_accuracy(features.recent_accuracy, mode),
            new_selected: take[0],
            low_selected: take[1],
            mid_selected: take[2],
            high_selected: take[3],
            shortfalls,
        })
    }

    fn scaled_size(&self, base_size: usize, features: &FeatureSet) -> usize {
        let scale = if features.fatigue_detected {
            self.config.fatigue_scale
        } else if features.recent_accuracy >= self.config.challenge_accuracy {
            self.config.challenge_scale
        } else {
            1.0
        };
        let scaled = (base_size as f64 * scale).round() as usize;
        scaled.clamp(self.config.min_session_size, self.config.max_session_size)
    }
}

fn category_index(category: Category) -> usize {
    match category {
        Category::New => 0,
        Category::LowMastery => 1,
        Category::MidMastery => 2,
        Category::HighMastery => 3,
    }
}

/// Quota fractions per mode, ordered new / low / mid / high.
fn quota_fractions(mode: SessionMode) -> [f64; 4] {
    match mode {
        SessionMode::Balanced => [0.40, 0.30, 0.25, 0.05],
        SessionMode::Challenging => [0.50, 0.25, 0.25, 0.0],
        SessionMode::ReviewHeavy => [0.0, 0.50, 0.25, 0.25],
        SessionMode::Easy => [0.10, 0.10, 0.40, 0.40],
    }
}

/// Integer quotas that sum exactly to `size`: floor every share, then give
/// the whole remainder to the mode's largest category.
fn quota_counts(mode: SessionMode, size: usize) -> [usize; 4] {
    let fractions = quota_fractions(mode);
    let mut counts = [0usize; 4];
    for (index, fraction) in fractions.iter().enumerate() {
        counts[index] = (fraction * size as f64).floor() as usize;
    }
    let assigned: usize = counts.iter().sum();
    let largest = fractions
        .iter()
        .enumerate()
        .max_by(|(_, a), (_, b)| a.total_cmp(b))
        .map(|(index, _)| index)
        .unwrap_or(0);
    counts[largest] += size - assigned;
    counts
}

/// Preferred donors for each category's unmet quota, nearest-similar first.
fn neighbors(category_index: usize) -> [usize; 3] {
    match category_index {
        0 => [1, 2, 3],
        1 => [2, 0, 3],
        2 => [1, 3, 0],
        _ => [2, 1, 0],
    }
}

/// Constraint pass: cap each quota by availability, then reassign unmet
/// slots to neighbouring categories that still have supply. Deterministic,
/// and the total selected equals the requested size whenever the overall
/// supply allows.
fn redistribute(
    quotas: [usize; 4],
    available: [usize; 4],
) -> ([usize; 4], Vec<CategoryShortfall>) {
    let mut take = [0usize; 4];
    let mut shortfalls = Vec::new();

    for index in 0..4 {
        take[index] = quotas[index].min(available[index]);
        if quotas[index] > available[index] {
            shortfalls.push(CategoryShortfall {
                category: CATEGORIES[index],
                requested: quotas[index],
                available: available[index],
            });
        }
    }

    for index in 0..4 {
        let mut unmet = quotas[index].saturating_sub(take[index]);
        for neighbor in neighbors(index) {
            if unmet == 0 {
                break;
            }
            let spare = available[neighbor] - take[neighbor];
            let moved = unmet.min(spare);
            take[neighbor] += moved;
            unmet -= moved;
        }
    }

    (take, shortfalls)
}

fn predicted_accuracy(recent_accuracy: f64, mode: SessionMode) -> f64 {
    let shift = match mode {
        SessionMode::Challenging => -0.10,
        SessionMode::ReviewHeavy => -0.05,
        SessionMode::Easy => 0.10,
        SessionMode::Balanced => 0.0,
    };
    (recent_accuracy + shift).clamp(0.0, 1.0)
}

/// Drop repeated keys while preserving input order.
fn dedupe(vocab: &[WordPair]) -> Vec<&WordPair> {
    let mut seen = HashSet::new();
    vocab
        .iter()
        .filter(|pair| {
            let key = pair.key();
            !key.is_empty() && seen.insert(key)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::WordProgress;
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    fn neutral_features() -> FeatureSet {
        FeatureSet {
            recent_accuracy: 0.75,
            response_time_trend: 0.0,
            fatigue_detected: false,
            forgetting_rate: 0.0,
            recency_gap: 0,
        }
    }

    fn vocab(n: usize) -> Vec<WordPair> {
        (0..n)
            .map(|i| WordPair::new(format!("word{i:03}"), format!("palabra{i:03}")))
            .collect()
    }

    fn store_with_mastery(words: &[WordPair], mastery: u8, last: u64) -> ProgressStore {
        let mut store = ProgressStore::new();
        for pair in words {
            *store.entry_mut(&pair.english) = WordProgress {
                mastery,
                attempts: 5,
                correct: 3,
                box_level: 2,
                highest_box: 2,
                last_reviewed_session: Some(last),
            };
        }
        store
    }

    #[test]
    fn empty_vocabulary_is_an_error() {
        let planner = SessionPlanner::default();
        let result = planner.plan_session(
            &[],
            &ProgressStore::new(),
            &UserModel::default(),
            &neutral_features(),
            1,
            &mut rng(),
        );
        assert_eq!(result.unwrap_err(), PlanError::EmptyVocabulary);
    }

    #[test]
    fn cold_start_selects_only_new_words() {
        let planner = SessionPlanner::default();
        let words = vocab(30);
        let mut store = ProgressStore::new();
        store.ensure_words(&words);

        let plan = planner
            .plan_session(
                &words,
                &store,
                &UserModel::default(),
                &neutral_features(),
                1,
                &mut rng(),
            )
            .unwrap();

        assert_eq!(plan.kind, SessionKind::Learning);
        assert_eq!(plan.len(), plan.requested_size);
        assert_eq!(plan.new_selected, plan.len());
        assert!(plan
            .words
            .iter()
            .all(|pair| store.get(&pair.english).unwrap().is_new()));
    }

    #[test]
    fn balanced_quota_counts_are_exact() {
        assert_eq!(quota_counts(SessionMode::Balanced, 10), [5, 3, 2, 0]);
        assert_eq!(quota_counts(SessionMode::Challenging, 10), [6, 2, 2, 0]);
        assert_eq!(quota_counts(SessionMode::ReviewHeavy, 10), [0, 6, 2, 2]);
        assert_eq!(quota_counts(SessionMode::Easy, 10), [1, 1, 4, 4]);
        for mode in [
            SessionMode::Balanced,
            SessionMode::Challenging,
            SessionMode::ReviewHeavy,
            SessionMode::Easy,
        ] {
            for size in 1..=30 {
                let total: usize = quota_counts(mode, size).iter().sum();
                assert_eq!(total, size, "mode {mode:?} size {size}");
            }
        }
    }

    #[test]
    fn plan_has_no_duplicates_and_exact_size() {
        let planner = SessionPlanner::default();
        let words = vocab(60);
        let mut store = ProgressStore::new();
        store.ensure_words(&words);
        // Spread words across categories: 15 low, 15 mid, 15 high, 15 new.
        for (i, pair) in words.iter().enumerate().take(45) {
            let mastery = match i / 15 {
                0 => 1,
                1 => 5,
                _ => 8,
            };
            *store.entry_mut(&pair.english) = WordProgress {
                mastery,
                attempts: 4,
                correct: 2,
                box_level: 2,
                highest_box: 2,
                // Recent enough that no revision triggers.
                last_reviewed_session: Some(10),
            };
        }

        let plan = planner
            .plan_session(
                &words,
                &store,
                &UserModel::default(),
                &neutral_features(),
                11,
                &mut rng(),
            )
            .unwrap();

        assert_eq!(plan.len(), plan.requested_size);
        let keys: HashSet<String> = plan.words.iter().map(WordPair::key).collect();
        assert_eq!(keys.len(), plan.len());
        assert_eq!(
            plan.new_selected + plan.low_selected + plan.mid_selected + plan.high_selected,
            plan.len()
        );
    }

    #[test]
    fn revision_triggers_at_five_due_words_not_four() {
        let planner = SessionPlanner::default();
        let words = vocab(40);

        for due_count in [4usize, 5] {
            let mut store = ProgressStore::new();
            store.ensure_words(&words);
            for pair in words.iter().take(due_count) {
                // Box 1, last reviewed long ago: due at any later session.
                *store.entry_mut(&pair.english) = WordProgress {
                    mastery: 2,
                    attempts: 3,
                    correct: 1,
                    box_level: 1,
                    highest_box: 2,
                    last_reviewed_session: Some(1),
                };
            }

            let plan = planner
                .plan_session(
                    &words,
                    &store,
                    &UserModel::default(),
                    &neutral_features(),
                    10,
                    &mut rng(),
                )
                .unwrap();

            if due_count == 4 {
                assert_eq!(plan.kind, SessionKind::Learning);
            } else {
                assert_eq!(plan.kind, SessionKind::Revision);
                assert_eq!(plan.len(), 5);
                assert_eq!(plan.new_selected, 0);
            }
        }
    }

    #[test]
    fn revision_session_is_capped_at_base_size_and_stalest_first() {
        let planner = SessionPlanner::default();
        let words = vocab(30);
        let mut store = ProgressStore::new();
        store.ensure_words(&words);
        for (i, pair) in words.iter().enumerate().take(20) {
            *store.entry_mut(&pair.english) = WordProgress {
                mastery: 3,
                attempts: 6,
                correct: 4,
                box_level: 1,
                highest_box: 3,
                last_reviewed_session: Some(i as u64 + 1),
            };
        }

        let plan = planner
            .plan_session(
                &words,
                &store,
                &UserModel::default(),
                &neutral_features(),
                50,
                &mut rng(),
            )
            .unwrap();

        assert_eq!(plan.kind, SessionKind::Revision);
        assert_eq!(plan.len(), 10);
        // Stalest reviews come first.
        let staleness: Vec<u64> = plan
            .words
            .iter()
            .map(|pair| store.get(&pair.english).unwrap().last_reviewed_session.unwrap())
            .collect();
        let mut sorted = staleness.clone();
        sorted.sort_unstable();
        assert_eq!(staleness, sorted);
    }

    #[test]
    fn high_accuracy_without_fatigue_scales_up_and_challenges() {
        let planner = SessionPlanner::default();
        let words = vocab(60);
        let mut store = ProgressStore::new();
        store.ensure_words(&words);

        let features = FeatureSet {
            recent_accuracy: 0.92,
            ..neutral_features()
        };
        assert_eq!(planner.classify_mode(&features), SessionMode::Challenging);

        let plan = planner
            .plan_session(&words, &store, &UserModel::default(), &features, 1, &mut rng())
            .unwrap();
        // Base 10 scaled by 1.3.
        assert_eq!(plan.requested_size, 13);
        assert_eq!(plan.mode, SessionMode::Challenging);
    }

    #[test]
    fn fatigue_scales_down_and_eases() {
        let planner = SessionPlanner::default();
        let words = vocab(60);
        let mut store = ProgressStore::new();
        store.ensure_words(&words);

        let features = FeatureSet {
            recent_accuracy: 0.9,
            fatigue_detected: true,
            ..neutral_features()
        };
        assert_eq!(planner.classify_mode(&features), SessionMode::Easy);

        let plan = planner
            .plan_session(&words, &store, &UserModel::default(), &features, 1, &mut rng())
            .unwrap();
        // Base 10 scaled by 0.8.
        assert_eq!(plan.requested_size, 8);
        assert_eq!(plan.mode, SessionMode::Easy);
    }

    #[test]
    fn forgetting_turns_the_mix_review_heavy() {
        let planner = SessionPlanner::default();
        let features = FeatureSet {
            forgetting_rate: 0.4,
            ..neutral_features()
        };
        assert_eq!(planner.classify_mode(&features), SessionMode::ReviewHeavy);

        let low = FeatureSet {
            recent_accuracy: 0.5,
            ..neutral_features()
        };
        assert_eq!(planner.classify_mode(&low), SessionMode::ReviewHeavy);
    }

    #[test]
    fn undersupplied_categories_redistribute_to_neighbours() {
        // Only new words exist but the mode wants struggling ones.
        let planner = SessionPlanner::default();
        let words = vocab(20);
        let mut store = ProgressStore::new();
        store.ensure_words(&words);

        let features = FeatureSet {
            recent_accuracy: 0.4,
            ..neutral_features()
        };
        let plan = planner
            .plan_session(&words, &store, &UserModel::default(), &features, 1, &mut rng())
            .unwrap();

        assert_eq!(plan.mode, SessionMode::ReviewHeavy);
        assert_eq!(plan.len(), plan.requested_size);
        assert_eq!(plan.new_selected, plan.len());
        assert!(!plan.shortfalls.is_empty());
    }

    #[test]
    fn high_mastery_slots_obey_the_probability_draw() {
        let words = vocab(60);
        let store = store_with_mastery(&words, 8, 10);
        let mut model = UserModel::default();
        model.optimal_session_sizes = vec![30];

        let mut config = PlannerConfig::default();
        config.high_mastery_probability = 0.0;
        let planner = SessionPlanner::new(config);
        let plan = planner
            .plan_session(&words, &store, &model, &neutral_features(), 11, &mut rng())
            .unwrap();
        // Every high slot failed its draw and went to low mastery instead,
        // but low/mid supply is empty here so high words still fill in.
        assert_eq!(plan.len(), plan.requested_size);

        let mut config = PlannerConfig::default();
        config.high_mastery_probability = 1.0;
        let planner = SessionPlanner::new(config);
        let plan = planner
            .plan_session(&words, &store, &model, &neutral_features(), 11, &mut rng())
            .unwrap();
        assert!(plan.high_selected >= 1);
        assert_eq!(plan.len(), plan.requested_size);
    }

    #[test]
    fn new_words_prefer_longer_ones_first() {
        let words = vec![
            WordPair::new("cat", "gato"),
            WordPair::new("extraordinary", "extraordinario"),
            WordPair::new("house", "casa"),
            WordPair::new("magnificent", "magnifico"),
            WordPair::new("dog", "perro"),
            WordPair::new("sun", "sol"),
        ];
        let mut store = ProgressStore::new();
        store.ensure_words(&words);

        let mut model = UserModel::default();
        model.optimal_session_sizes = vec![2];

        let planner = SessionPlanner::new(PlannerConfig {
            min_session_size: 2,
            ..PlannerConfig::default()
        });
        let plan = planner
            .plan_session(&words, &store, &model, &neutral_features(), 1, &mut rng())
            .unwrap();

        let selected: HashSet<&str> =
            plan.words.iter().map(|pair| pair.english.as_str()).collect();
        assert!(selected.contains("extraordinary"));
        assert!(selected.contains("magnificent"));
    }

    #[test]
    fn predicted_accuracy_tracks_mode_difficulty() {
        assert_eq!(predicted_accuracy(0.8, SessionMode::Balanced), 0.8);
        assert!((predicted_accuracy(0.8, SessionMode::Challenging) - 0.7).abs() < 1e-9);
        assert!((predicted_accuracy(0.8, SessionMode::Easy) - 0.9).abs() < 1e-9);
        assert_eq!(predicted_accuracy(0.98, SessionMode::Easy), 1.0);
    }
}
