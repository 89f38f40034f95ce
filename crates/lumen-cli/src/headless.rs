//! Media element and engine stand-ins for running a session in a terminal
//!
//! Nothing is decoded; every call is traced so `--verbose` shows exactly
//! what a real host would have been asked to do.

use lumen_core::{
    AdaptiveSession, EngineFactory, MediaSink, QualityLevel, QualitySelection, SubtitleTrack,
    TextTrackMode,
};
use tracing::debug;

/// Media sink that logs every call
#[derive(Debug)]
pub struct LoggingSink {
    position: f64,
    tracks: usize,
}

impl LoggingSink {
    pub fn new() -> Self {
        Self {
            position: 0.0,
            tracks: 0,
        }
    }
}

impl MediaSink for LoggingSink {
    fn load_source(&mut self, url: &str) {
        debug!(url, "sink: load");
        self.position = 0.0;
    }

    fn clear_source(&mut self) {
        debug!("sink: clear");
        self.tracks = 0;
    }

    fn play(&mut self) -> lumen_core::Result<()> {
        debug!("sink: play");
        Ok(())
    }

    fn pause(&mut self) {
        debug!("sink: pause");
    }

    fn seek(&mut self, position_secs: f64) {
        debug!(position_secs, "sink: seek");
        self.position = position_secs;
    }

    fn set_rate(&mut self, rate: f64) {
        debug!(rate, "sink: rate");
    }

    fn set_volume(&mut self, volume: f64) {
        debug!(volume, "sink: volume");
    }

    fn set_muted(&mut self, muted: bool) {
        debug!(muted, "sink: muted");
    }

    fn current_time(&self) -> f64 {
        self.position
    }

    fn duration(&self) -> f64 {
        f64::NAN
    }

    fn set_text_tracks(&mut self, tracks: &[SubtitleTrack]) {
        debug!(count = tracks.len(), "sink: text tracks");
        self.tracks = tracks.len();
    }

    fn text_track_count(&self) -> usize {
        self.tracks
    }

    fn set_text_track_mode(&mut self, index: usize, mode: TextTrackMode) {
        debug!(index, ?mode, "sink: text track mode");
    }
}

/// Engine factory whose sessions only log
#[derive(Debug, Default)]
pub struct LoggingEngine;

impl EngineFactory for LoggingEngine {
    fn create(&self) -> Box<dyn AdaptiveSession> {
        Box::new(LoggingSession::default())
    }
}

#[derive(Debug, Default)]
struct LoggingSession {
    manifest: Option<String>,
}

impl AdaptiveSession for LoggingSession {
    fn load(&mut self, manifest_url: &str) -> lumen_core::Result<()> {
        debug!(manifest_url, "engine: load");
        self.manifest = Some(manifest_url.to_string());
        Ok(())
    }

    fn levels(&self) -> Vec<QualityLevel> {
        Vec::new()
    }

    fn select_level(&mut self, selection: QualitySelection) {
        debug!(?selection, "engine: select level");
    }

    fn destroy(&mut self) {
        if let Some(manifest) = self.manifest.take() {
            debug!(manifest, "engine: destroy");
        }
    }
}
