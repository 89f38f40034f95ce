//! Watch history
//!
//! Progress from on-demand playback is kept per content item (and per
//! episode for series) so a catalog can offer "continue watching" and
//! resume from the last position. Live channels are never recorded.

use crate::player::PlayerObserver;
use crate::preferences::KeyValueStore;
use crate::types::{PlayableItem, ProgressUpdate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::rc::Rc;
use tracing::{trace, warn};

/// One history entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub content_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode_id: Option<String>,
    pub progress_percent: f64,
    pub position_secs: f64,
    pub duration_secs: f64,
    pub last_watched: DateTime<Utc>,
}

/// History key: `content_id` or `content_id_episode_id`
pub fn history_key(content_id: &str, episode_id: Option<&str>) -> String {
    match episode_id {
        Some(episode) => format!("{content_id}_{episode}"),
        None => content_id.to_string(),
    }
}

/// Persisted watch history
#[derive(Clone)]
pub struct WatchHistory {
    store: Rc<dyn KeyValueStore>,
    key: String,
}

impl WatchHistory {
    pub fn new(store: Rc<dyn KeyValueStore>, namespace: &str) -> Self {
        Self {
            store,
            key: format!("{namespace}.history"),
        }
    }

    /// All entries by history key; unreadable data reads as empty
    pub fn entries(&self) -> BTreeMap<String, HistoryEntry> {
        let Some(raw) = self.store.get(&self.key) else {
            return BTreeMap::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Stored history unreadable, treating as empty");
            BTreeMap::new()
        })
    }

    /// Record progress for an item; live channels are skipped
    pub fn record(&self, item: &PlayableItem, progress: &ProgressUpdate) {
        if item.is_live() {
            return;
        }

        let entry = HistoryEntry {
            content_id: item.id().to_string(),
            episode_id: item.episode_id().map(str::to_string),
            progress_percent: progress.percent,
            position_secs: progress.position_secs,
            duration_secs: progress.duration_secs,
            last_watched: Utc::now(),
        };

        let mut entries = self.entries();
        entries.insert(history_key(item.id(), item.episode_id()), entry);

        let result = serde_json::to_string(&entries)
            .map_err(crate::Error::from)
            .and_then(|json| self.store.set(&self.key, &json));
        match result {
            Ok(()) => trace!(item = %item.id(), percent = progress.percent, "History updated"),
            Err(e) => warn!(item = %item.id(), error = %e, "Failed to persist history"),
        }
    }

    pub fn entry(&self, item: &PlayableItem) -> Option<HistoryEntry> {
        self.entries()
            .remove(&history_key(item.id(), item.episode_id()))
    }

    /// Position to resume `item` from, zero when never watched
    pub fn resume_position(&self, item: &PlayableItem) -> f64 {
        if item.is_live() {
            return 0.0;
        }
        self.entry(item).map(|e| e.position_secs).unwrap_or(0.0)
    }

    /// Entries ordered by most recently watched first
    pub fn continue_watching(&self) -> Vec<HistoryEntry> {
        let mut entries: Vec<_> = self.entries().into_values().collect();
        entries.sort_by(|a, b| b.last_watched.cmp(&a.last_watched));
        entries
    }

    pub fn clear(&self) -> crate::Result<()> {
        self.store.remove(&self.key)
    }
}

impl PlayerObserver for WatchHistory {
    fn on_progress(&self, item: &PlayableItem, progress: &ProgressUpdate) {
        self.record(item, progress);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::MemoryStore;
    use crate::types::{ChannelItem, Episode, VideoItem};

    fn history() -> (Rc<MemoryStore>, WatchHistory) {
        let store = Rc::new(MemoryStore::new());
        (store.clone(), WatchHistory::new(store, "lumen"))
    }

    fn progress(position: f64, duration: f64) -> ProgressUpdate {
        ProgressUpdate {
            position_secs: position,
            duration_secs: duration,
            percent: position / duration * 100.0,
        }
    }

    #[test]
    fn test_records_and_resumes() {
        let (_, history) = history();
        let movie: PlayableItem = VideoItem::movie("m1", "Film", "https://x/f.mp4").into();
        history.record(&movie, &progress(150.0, 600.0));

        assert_eq!(history.resume_position(&movie), 150.0);
        let entry = history.entry(&movie).unwrap();
        assert_eq!(entry.progress_percent, 25.0);
        assert_eq!(entry.episode_id, None);
    }

    #[test]
    fn test_channels_are_not_recorded() {
        let (store, history) = history();
        let channel: PlayableItem = ChannelItem::new("c1", "News", "https://x/live.m3u8").into();
        history.on_progress(&channel, &progress(10.0, 100.0));
        assert!(store.is_empty());
    }

    #[test]
    fn test_episode_keyed_separately() {
        let (_, history) = history();
        let episodes = vec![
            Episode {
                id: "e1".into(),
                title: "One".into(),
                description: String::new(),
                source_url: "https://x/e1.mp4".into(),
                subtitles: Vec::new(),
            },
            Episode {
                id: "e2".into(),
                title: "Two".into(),
                description: String::new(),
                source_url: "https://x/e2.mp4".into(),
                subtitles: Vec::new(),
            },
        ];
        let series = VideoItem::series("s1", "Show", episodes);
        let second = series.on_episode(&series.episodes[1]);

        history.record(&series.clone().into(), &progress(100.0, 1000.0));
        history.record(&second.into(), &progress(50.0, 1000.0));

        let keys: Vec<_> = history.entries().into_keys().collect();
        assert_eq!(keys, vec!["s1_e1".to_string(), "s1_e2".to_string()]);
        assert_eq!(history.continue_watching().len(), 2);
    }

    #[test]
    fn test_continue_watching_newest_first() {
        let (store, history) = history();
        store
            .set(
                "lumen.history",
                r#"{
                    "a": {"content_id":"a","progress_percent":10,"position_secs":6,"duration_secs":60,"last_watched":"2026-03-01T10:00:00Z"},
                    "b": {"content_id":"b","progress_percent":50,"position_secs":30,"duration_secs":60,"last_watched":"2026-03-02T10:00:00Z"}
                }"#,
            )
            .unwrap();
        let ids: Vec<_> = history
            .continue_watching()
            .into_iter()
            .map(|e| e.content_id)
            .collect();
        assert_eq!(ids, vec!["b".to_string(), "a".to_string()]);
    }

    #[test]
    fn test_corrupt_history_reads_empty() {
        let (store, history) = history();
        store.set("lumen.history", "not json").unwrap();
        assert!(history.entries().is_empty());
        assert!(history.continue_watching().is_empty());
    }
}
