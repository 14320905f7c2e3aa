//! Multiple-choice quiz generation.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;

use crate::types::{normalize_key, WordPair};

/// Distractors accompanying the correct translation.
pub const DISTRACTOR_COUNT: usize = 3;

/// One multiple-choice question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizItem {
    /// Source-language word being asked.
    pub prompt: String,
    /// Correct translation.
    pub answer: String,
    /// Presented options in randomized order; always contains `answer`.
    pub options: Vec<String>,
}

impl QuizItem {
    pub fn is_correct(&self, choice: &str) -> bool {
        normalize_key(choice) == normalize_key(&self.answer)
    }
}

/// Build a quiz for `word`: the correct translation plus up to three
/// distractors sampled without replacement from the pool.
///
/// Duplicate translations (after normalization) are excluded so a distractor
/// can never equal the answer. A pool with fewer than four distinct
/// translations degrades to fewer options; that is expected for tiny
/// vocabularies, not an error.
pub fn build_quiz(word: &WordPair, pool: &[WordPair], rng: &mut impl Rng) -> QuizItem {
    let answer = word.spanish.clone();
    let answer_key = normalize_key(&answer);

    let mut seen = HashSet::new();
    let candidates: Vec<&str> = pool
        .iter()
        .map(|pair| pair.spanish.as_str())
        .filter(|translation| {
            let key = normalize_key(translation);
            !key.is_empty() && key != answer_key && seen.insert(key)
        })
        .collect();

    let distractors: Vec<String> = candidates
        .choose_multiple(rng, DISTRACTOR_COUNT)
        .map(|s| (*s).to_string())
        .collect();
    if distractors.len() < DISTRACTOR_COUNT {
        tracing::warn!(
            word = %word.english,
            distractors = distractors.len(),
            "vocabulary too small for a full option set"
        );
    }

    let mut options = distractors;
    options.push(answer.clone());
    options.shuffle(rng);

    QuizItem {
        prompt: word.english.clone(),
        answer,
        options,
    }
}
