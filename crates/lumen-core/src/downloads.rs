//! Simulated offline downloads
//!
//! A download is a repeating tick that advances a percentage. At 100 the
//! item joins the persisted downloaded list.

use crate::config::PlayerConfig;
use crate::preferences::KeyValueStore;
use crate::scheduler::{FiredTimer, Scheduler, TimerId, TimerKind};
use crate::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::rc::Rc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// A finished download
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub id: String,
    pub downloaded_at: DateTime<Utc>,
}

/// Progress reported on each tick
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadProgress {
    pub id: String,
    pub percent: u8,
}

impl DownloadProgress {
    pub fn is_complete(&self) -> bool {
        self.percent >= 100
    }
}

#[derive(Debug)]
struct ActiveDownload {
    timer: TimerId,
    percent: u8,
}

/// Drives simulated downloads on the injected scheduler
pub struct DownloadSimulator {
    store: Rc<dyn KeyValueStore>,
    key: String,
    tick: Duration,
    step: u8,
    active: HashMap<String, ActiveDownload>,
}

impl DownloadSimulator {
    pub fn new(store: Rc<dyn KeyValueStore>, config: &PlayerConfig) -> Self {
        Self {
            store,
            key: format!("{}.downloads", config.storage_namespace),
            tick: config.download_tick(),
            step: config.download_step_percent.max(1),
            active: HashMap::new(),
        }
    }

    /// Begin downloading `id`; refused while running or once downloaded
    pub fn start(&mut self, scheduler: &dyn Scheduler, id: &str) -> bool {
        if self.active.contains_key(id) || self.is_downloaded(id) {
            debug!(id, "Download already running or complete");
            return false;
        }
        let timer = scheduler.after(self.tick, TimerKind::DownloadTick(id.to_string()));
        self.active.insert(id.to_string(), ActiveDownload { timer, percent: 0 });
        info!(id, "Download started");
        true
    }

    /// Advance the download a fired tick belongs to
    pub fn on_tick(&mut self, scheduler: &dyn Scheduler, fired: &FiredTimer) -> Option<DownloadProgress> {
        let TimerKind::DownloadTick(id) = &fired.kind else {
            return None;
        };
        let download = self.active.get_mut(id).filter(|d| d.timer == fired.id)?;

        download.percent = download.percent.saturating_add(self.step).min(100);
        let percent = download.percent;

        if percent < 100 {
            download.timer = scheduler.after(self.tick, fired.kind.clone());
        } else {
            self.active.remove(id);
            self.record(id);
            info!(id = %id, "Download complete");
        }

        Some(DownloadProgress {
            id: id.clone(),
            percent,
        })
    }

    /// Stop every running download
    pub fn cancel_all(&mut self, scheduler: &dyn Scheduler) {
        for (id, download) in self.active.drain() {
            scheduler.cancel(download.timer);
            debug!(id = %id, percent = download.percent, "Download cancelled");
        }
    }

    pub fn progress(&self, id: &str) -> Option<u8> {
        self.active.get(id).map(|d| d.percent)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Persisted downloads; unreadable data reads as empty
    pub fn downloads(&self) -> Vec<DownloadRecord> {
        let Some(raw) = self.store.get(&self.key) else {
            return Vec::new();
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            warn!(error = %e, "Stored downloads unreadable, treating as empty");
            Vec::new()
        })
    }

    pub fn is_downloaded(&self, id: &str) -> bool {
        self.downloads().iter().any(|r| r.id == id)
    }

    /// Forget a finished download; returns whether it existed
    pub fn remove(&self, id: &str) -> Result<bool> {
        let mut records = self.downloads();
        let before = records.len();
        records.retain(|r| r.id != id);
        if records.len() == before {
            return Ok(false);
        }
        self.store.set(&self.key, &serde_json::to_string(&records)?)?;
        Ok(true)
    }

    fn record(&self, id: &str) {
        let mut records = self.downloads();
        records.push(DownloadRecord {
            id: id.to_string(),
            downloaded_at: Utc::now(),
        });
        let result = serde_json::to_string(&records)
            .map_err(crate::Error::from)
            .and_then(|json| self.store.set(&self.key, &json));
        if let Err(e) = result {
            warn!(id, error = %e, "Failed to persist download");
        }
    }
}
