//! Persisted UI preferences
//!
//! Preferences are cosmetic: a missing or unreadable record falls back to
//! defaults and a failed write is logged, never surfaced.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use tracing::{debug, warn};

/// Durable key-value storage scoped to one origin/profile
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Option<String>;

    fn set(&self, key: &str, value: &str) -> Result<()>;

    fn remove(&self, key: &str) -> Result<()>;
}

/// In-memory store
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Store persisted as one JSON object on disk
///
/// The whole file is rewritten on every change.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: RefCell<BTreeMap<String, String>>,
}

impl JsonFileStore {
    /// Open a store; a missing file starts empty, a corrupt one starts empty with a warning
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "Store file unreadable, starting empty");
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(Error::Io(e)),
        };

        debug!(path = %path.display(), keys = entries.len(), "Opened store");

        Ok(Self {
            path,
            entries: RefCell::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn flush(&self) -> Result<()> {
        let content = serde_json::to_string_pretty(&*self.entries.borrow())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, content)?;
        Ok(())
    }
}

impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.borrow().get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        self.flush()
    }

    fn remove(&self, key: &str) -> Result<()> {
        self.entries.borrow_mut().remove(key);
        self.flush()
    }
}

/// Subtitle language preference: a language code or off
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum SubtitlePreference {
    #[default]
    Off,
    Language(String),
}

impl From<String> for SubtitlePreference {
    fn from(value: String) -> Self {
        if value.is_empty() || value.eq_ignore_ascii_case("off") {
            SubtitlePreference::Off
        } else {
            SubtitlePreference::Language(value)
        }
    }
}

impl From<SubtitlePreference> for String {
    fn from(value: SubtitlePreference) -> Self {
        match value {
            SubtitlePreference::Off => "off".to_string(),
            SubtitlePreference::Language(code) => code,
        }
    }
}

/// Persisted preference record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreferenceRecord {
    pub playback_rate: f64,
    pub subtitle_language: SubtitlePreference,
}

impl Default for PreferenceRecord {
    fn default() -> Self {
        Self {
            playback_rate: 1.0,
            subtitle_language: SubtitlePreference::Off,
        }
    }
}

/// Partial update; `None` fields keep their stored value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PreferenceUpdate {
    pub playback_rate: Option<f64>,
    pub subtitle_language: Option<SubtitlePreference>,
}

impl PreferenceUpdate {
    pub fn rate(rate: f64) -> Self {
        Self {
            playback_rate: Some(rate),
            ..Default::default()
        }
    }

    pub fn subtitles(language: SubtitlePreference) -> Self {
        Self {
            subtitle_language: Some(language),
            ..Default::default()
        }
    }
}

/// Reads and writes the preference record in a [`KeyValueStore`]
#[derive(Clone)]
pub struct PreferenceStore {
    store: Rc<dyn KeyValueStore>,
    key: String,
}

impl PreferenceStore {
    pub fn new(store: Rc<dyn KeyValueStore>, namespace: &str) -> Self {
        Self {
            store,
            key: format!("{namespace}.preferences"),
        }
    }

    /// Read the record; missing or malformed data yields defaults
    pub fn load(&self) -> PreferenceRecord {
        let Some(raw) = self.store.get(&self.key) else {
            return PreferenceRecord::default();
        };

        match serde_json::from_str::<PreferenceRecord>(&raw) {
            Ok(record) if record.playback_rate.is_finite() && record.playback_rate > 0.0 => record,
            Ok(record) => {
                warn!(rate = record.playback_rate, "Stored playback rate out of range, using default");
                PreferenceRecord {
                    playback_rate: 1.0,
                    ..record
                }
            }
            Err(e) => {
                warn!(error = %e, "Stored preferences unreadable, using defaults");
                PreferenceRecord::default()
            }
        }
    }

    /// Merge and persist a partial update; failures are logged
    pub fn save(&self, update: PreferenceUpdate) {
        let mut record = self.load();
        if let Some(rate) = update.playback_rate {
            record.playback_rate = rate;
        }
        if let Some(language) = update.subtitle_language {
            record.subtitle_language = language;
        }

        let result = serde_json::to_string(&record)
            .map_err(Error::from)
            .and_then(|json| self.store.set(&self.key, &json));

        match result {
            Ok(()) => debug!(?record, "Preferences saved"),
            Err(e) => warn!(error = %e, "Failed to save preferences"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> (Rc<MemoryStore>, PreferenceStore) {
        let backing = Rc::new(MemoryStore::new());
        let prefs = PreferenceStore::new(backing.clone(), "lumen");
        (backing, prefs)
    }

    #[test]
    fn test_defaults_when_missing() {
        let (_, prefs) = store();
        let record = prefs.load();
        assert_eq!(record.playback_rate, 1.0);
        assert_eq!(record.subtitle_language, SubtitlePreference::Off);
    }

    #[test]
    fn test_partial_save_merges() {
        let (_, prefs) = store();
        prefs.save(PreferenceUpdate::subtitles(SubtitlePreference::Language("bn".into())));
        prefs.save(PreferenceUpdate::rate(1.25));

        let record = prefs.load();
        assert_eq!(record.playback_rate, 1.25);
        assert_eq!(record.subtitle_language, SubtitlePreference::Language("bn".into()));
    }

    #[test]
    fn test_corrupt_record_yields_defaults() {
        let (backing, prefs) = store();
        backing.set("lumen.preferences", "{not json").unwrap();
        assert_eq!(prefs.load(), PreferenceRecord::default());

        backing.set("lumen.preferences", r#"{"playback_rate": -3}"#).unwrap();
        assert_eq!(prefs.load().playback_rate, 1.0);
    }

    #[test]
    fn test_off_sentinel_on_the_wire() {
        let (backing, prefs) = store();
        prefs.save(PreferenceUpdate::subtitles(SubtitlePreference::Off));
        let raw = backing.get("lumen.preferences").unwrap();
        assert!(raw.contains(r#""subtitle_language":"off""#));
    }

    #[test]
    fn test_json_file_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("store.json");

        let store = JsonFileStore::open(&path).unwrap();
        store.set("lumen.preferences", r#"{"playback_rate":1.5}"#).unwrap();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        assert_eq!(
            reopened.get("lumen.preferences").as_deref(),
            Some(r#"{"playback_rate":1.5}"#)
        );
    }

    #[test]
    fn test_json_file_store_corrupt_file_opens_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, "garbage").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.get("anything").is_none());
    }
}
