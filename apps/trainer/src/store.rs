//! JSON file persistence for progress, counter, model and session logs.
//!
//! The engine does not trust persisted state: everything loaded here runs
//! through the core sanitizers, missing files become documented defaults,
//! and a corrupt file is logged and replaced rather than aborting the run.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Serialize;

use vocab_core::{ProgressStore, SessionCounter, SessionLog, UserModel, WordProgress};

use crate::error::Result;

const PROGRESS_FILE: &str = "vocab_progress.json";
const COUNTER_FILE: &str = "session_counter.json";
const MODEL_FILE: &str = "user_model.json";
const LOG_FILE: &str = "session_log.json";

/// File-backed store rooted at a data directory.
pub struct DataStore {
    dir: PathBuf,
}

impl DataStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn load_progress(&self) -> ProgressStore {
        let entries: BTreeMap<String, WordProgress> = self.load_or_default(PROGRESS_FILE);
        ProgressStore::from_entries(entries)
    }

    pub fn load_counter(&self) -> SessionCounter {
        self.load_or_default(COUNTER_FILE)
    }

    pub fn load_model(&self) -> UserModel {
        let mut model: UserModel = self.load_or_default(MODEL_FILE);
        if model.sanitize() {
            tracing::warn!("repaired out-of-range user model on load");
        }
        model
    }

    pub fn load_logs(&self) -> Vec<SessionLog> {
        self.load_or_default(LOG_FILE)
    }

    /// Persist all state after a completed session.
    pub fn save(
        &self,
        progress: &ProgressStore,
        counter: &SessionCounter,
        model: &UserModel,
        logs: &[SessionLog],
    ) -> Result<()> {
        self.write(PROGRESS_FILE, progress)?;
        self.write(COUNTER_FILE, counter)?;
        self.write(MODEL_FILE, model)?;
        self.write(LOG_FILE, &logs)?;
        tracing::info!(dir = %self.dir.display(), "state saved");
        Ok(())
    }

    fn load_or_default<T: DeserializeOwned + Default>(&self, name: &str) -> T {
        let path = self.path(name);
        if !path.exists() {
            return T::default();
        }
        match read_json(&path) {
            Ok(value) => value,
            Err(err) => {
                tracing::warn!(file = %path.display(), %err, "corrupt state file, starting fresh");
                T::default()
            }
        }
    }

    fn write<T: Serialize>(&self, name: &str, value: &T) -> Result<()> {
        let json = serde_json::to_string_pretty(value)?;
        fs::write(self.path(name), json)?;
        Ok(())
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&content)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn temp_store(tag: &str) -> DataStore {
        let dir = std::env::temp_dir().join(format!(
            "vocab-trainer-test-{tag}-{}",
            std::process::id()
        ));
        let _ = fs::remove_dir_all(&dir);
        DataStore::new(dir).unwrap()
    }

    #[test]
    fn missing_files_yield_defaults() {
        let store = temp_store("missing");
        assert!(store.load_progress().is_empty());
        assert_eq!(store.load_counter(), SessionCounter::default());
        assert_eq!(store.load_model(), UserModel::default());
        assert!(store.load_logs().is_empty());
    }

    #[test]
    fn save_and_reload_round_trip() {
        let store = temp_store("roundtrip");
        let mut progress = ProgressStore::new();
        let entry = progress.entry_mut("hola");
        entry.attempts = 3;
        entry.correct = 2;
        entry.mastery = 2;
        entry.box_level = 3;
        entry.highest_box = 3;
        entry.last_reviewed_session = Some(4);
        let counter = SessionCounter::new(4);
        let model = UserModel::default();

        store.save(&progress, &counter, &model, &[]).unwrap();

        assert_eq!(store.load_counter(), counter);
        assert_eq!(store.load_model(), model);
        let reloaded = store.load_progress();
        assert_eq!(reloaded.get("hola"), progress.get("hola"));
    }

    #[test]
    fn corrupt_file_falls_back_to_defaults() {
        let store = temp_store("corrupt");
        fs::write(store.path(COUNTER_FILE), "not json at all").unwrap();
        assert_eq!(store.load_counter(), SessionCounter::default());
    }

    #[test]
    fn out_of_range_progress_is_repaired_on_load() {
        let store = temp_store("repair");
        fs::write(
            store.path(PROGRESS_FILE),
            r#"{"hola": {"mastery": 99, "attempts": 2, "correct": 5, "box": 0}}"#,
        )
        .unwrap();

        let progress = store.load_progress();
        let entry = progress.get("hola").unwrap();
        assert_eq!(entry.mastery, 10);
        assert_eq!(entry.box_level, 1);
        assert_eq!(entry.correct, 2);
    }
}
