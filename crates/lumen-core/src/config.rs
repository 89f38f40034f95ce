//! Player configuration
//!
//! Every timing window the player uses is a field here rather than a
//! constant, so hosts can tune them per catalog. All fields default, which
//! lets a config file name only what it changes.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Window in which the "skip intro" affordance is offered
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SkipIntroWindow {
    /// Exclusive lower bound (seconds)
    pub start_secs: f64,
    /// Exclusive upper bound (seconds)
    pub end_secs: f64,
    /// Where "skip intro" jumps to (seconds)
    pub target_secs: f64,
}

impl Default for SkipIntroWindow {
    fn default() -> Self {
        Self {
            start_secs: 5.0,
            end_secs: 85.0,
            target_secs: 90.0,
        }
    }
}

impl SkipIntroWindow {
    pub fn contains(&self, position: f64) -> bool {
        position > self.start_secs && position < self.end_secs
    }
}

/// Player configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerConfig {
    /// Inactivity before the control chrome hides (ms)
    pub idle_timeout_ms: u64,
    /// How long the channel banner stays up after a switch (ms)
    pub osd_duration_ms: u64,
    /// Skip intro window
    pub skip_intro: SkipIntroWindow,
    /// Playback dwell before "next episode" is offered (ms)
    pub next_episode_dwell_ms: u64,
    /// Step for the skip back/forward buttons (seconds)
    pub skip_step_secs: f64,
    /// Volumes below this are treated as mute
    pub mute_floor: f64,
    /// Volume restored when unmuting from zero
    pub unmute_volume: f64,
    /// Rates offered in the speed menu
    pub playback_rates: Vec<f64>,
    /// Simulated download tick interval (ms)
    pub download_tick_ms: u64,
    /// Simulated download progress per tick (percent)
    pub download_step_percent: u8,
    /// Prefix for persisted keys
    pub storage_namespace: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            idle_timeout_ms: 3000,
            osd_duration_ms: 4000,
            skip_intro: SkipIntroWindow::default(),
            next_episode_dwell_ms: 5000,
            skip_step_secs: 15.0,
            mute_floor: 0.01,
            unmute_volume: 0.5,
            playback_rates: vec![0.5, 1.0, 1.5, 2.0],
            download_tick_ms: 500,
            download_step_percent: 10,
            storage_namespace: "lumen".to_string(),
        }
    }
}

impl PlayerConfig {
    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self> {
        let config: PlayerConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON config file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Check invariants the player relies on
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(Error::InvalidConfig(msg.to_string()));

        if self.idle_timeout_ms == 0 || self.osd_duration_ms == 0 || self.download_tick_ms == 0 {
            return invalid("timer durations must be positive");
        }
        if !(self.skip_intro.start_secs < self.skip_intro.end_secs) {
            return invalid("skip_intro.start_secs must be below skip_intro.end_secs");
        }
        if self.skip_intro.target_secs < 0.0 {
            return invalid("skip_intro.target_secs must not be negative");
        }
        if !(0.0..=1.0).contains(&self.mute_floor) || !(0.0..=1.0).contains(&self.unmute_volume) {
            return invalid("volumes must be within 0.0..=1.0");
        }
        if self.unmute_volume <= self.mute_floor {
            return invalid("unmute_volume must be above mute_floor");
        }
        if self.playback_rates.is_empty()
            || self.playback_rates.iter().any(|r| !r.is_finite() || *r <= 0.0)
        {
            return invalid("playback_rates must be non-empty and positive");
        }
        if self.download_step_percent == 0 || self.download_step_percent > 100 {
            return invalid("download_step_percent must be within 1..=100");
        }
        if self.skip_step_secs <= 0.0 {
            return invalid("skip_step_secs must be positive");
        }
        Ok(())
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    pub fn osd_duration(&self) -> Duration {
        Duration::from_millis(self.osd_duration_ms)
    }

    pub fn next_episode_dwell(&self) -> Duration {
        Duration::from_millis(self.next_episode_dwell_ms)
    }

    pub fn download_tick(&self) -> Duration {
        Duration::from_millis(self.download_tick_ms)
    }
}
