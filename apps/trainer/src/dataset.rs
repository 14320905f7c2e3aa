//! CSV vocabulary ingestion.
//!
//! Datasets in the wild label their columns inconsistently, so the loader
//! matches a handful of header spellings case-insensitively, lowercases and
//! trims every pair, and drops duplicates by normalized key while keeping
//! the original row order.

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use vocab_core::{normalize_key, WordPair};

use crate::error::{AppError, Result};

const ENGLISH_HEADERS: [&str; 3] = ["english", "eng", "en"];
const SPANISH_HEADERS: [&str; 3] = ["spanish", "esp", "es"];

/// Load and normalize the vocabulary dataset from a CSV file.
pub fn load_vocabulary(path: &Path) -> Result<Vec<WordPair>> {
    let content = fs::read_to_string(path).map_err(|err| {
        AppError::Dataset(format!("cannot read dataset {}: {err}", path.display()))
    })?;
    parse_vocabulary(&content)
}

/// Parse CSV content into deduplicated vocabulary pairs.
pub fn parse_vocabulary(content: &str) -> Result<Vec<WordPair>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = reader.headers()?.clone();
    let english_col = find_column(&headers, &ENGLISH_HEADERS)
        .ok_or_else(|| AppError::Dataset("no english column found".to_string()))?;
    let spanish_col = find_column(&headers, &SPANISH_HEADERS)
        .ok_or_else(|| AppError::Dataset("no spanish column found".to_string()))?;

    let mut seen = HashSet::new();
    let mut vocab = Vec::new();
    for record in reader.records() {
        let record = record?;
        let english = record.get(english_col).unwrap_or("").trim().to_lowercase();
        let spanish = record.get(spanish_col).unwrap_or("").trim().to_lowercase();
        if english.is_empty() || spanish.is_empty() {
            continue;
        }
        if seen.insert(normalize_key(&english)) {
            vocab.push(WordPair::new(english, spanish));
        }
    }

    if vocab.is_empty() {
        return Err(AppError::Dataset(
            "no valid vocabulary pairs found".to_string(),
        ));
    }

    tracing::info!(pairs = vocab.len(), "vocabulary loaded");
    Ok(vocab)
}

fn find_column(headers: &csv::StringRecord, names: &[&str]) -> Option<usize> {
    headers
        .iter()
        .position(|header| names.contains(&header.trim().to_lowercase().as_str()))
}
