//! In-memory fakes for the host seams
//!
//! Every fake is a cheap handle over shared state: clone it, hand one copy
//! to the player, keep the other to drive and inspect.

use crate::media::{AdaptiveSession, EngineFactory, MediaSink, PresentationSurface, TextTrackMode};
use crate::types::{quality_name, QualityLevel, QualitySelection, SubtitleTrack};
use crate::{Error, Result};
use std::cell::RefCell;
use std::rc::Rc;

// =============================================================================
// Media sink
// =============================================================================

/// Calls recorded by [`FakeMediaSink`]
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    Load(String),
    Clear,
    Play,
    Pause,
    Seek(f64),
    Rate(f64),
    Volume(f64),
    Muted(bool),
    Tracks(usize),
}

#[derive(Debug)]
pub struct FakeMediaState {
    pub events: Vec<MediaEvent>,
    pub source: Option<String>,
    pub position: f64,
    pub duration: f64,
    pub playing: bool,
    pub muted: bool,
    pub volume: f64,
    pub rate: f64,
    pub tracks: Vec<SubtitleTrack>,
    pub modes: Vec<TextTrackMode>,
    pub reject_play: bool,
}

impl Default for FakeMediaState {
    fn default() -> Self {
        Self {
            events: Vec::new(),
            source: None,
            position: 0.0,
            duration: f64::NAN,
            playing: false,
            muted: false,
            volume: 1.0,
            rate: 1.0,
            tracks: Vec::new(),
            modes: Vec::new(),
            reject_play: false,
        }
    }
}

/// Media element stand-in
#[derive(Debug, Clone, Default)]
pub struct FakeMediaSink {
    state: Rc<RefCell<FakeMediaState>>,
}

impl FakeMediaSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `play` fail as an autoplay policy would
    pub fn reject_play(&self, reject: bool) {
        self.state.borrow_mut().reject_play = reject;
    }

    /// Simulate the element advancing
    pub fn set_position(&self, position: f64) {
        self.state.borrow_mut().position = position;
    }

    pub fn set_duration(&self, duration: f64) {
        self.state.borrow_mut().duration = duration;
    }

    pub fn events(&self) -> Vec<MediaEvent> {
        self.state.borrow().events.clone()
    }

    pub fn clear_events(&self) {
        self.state.borrow_mut().events.clear();
    }

    pub fn source(&self) -> Option<String> {
        self.state.borrow().source.clone()
    }

    pub fn track_modes(&self) -> Vec<TextTrackMode> {
        self.state.borrow().modes.clone()
    }

    pub fn is_playing(&self) -> bool {
        self.state.borrow().playing
    }

    pub fn is_muted(&self) -> bool {
        self.state.borrow().muted
    }

    pub fn rate(&self) -> f64 {
        self.state.borrow().rate
    }

    pub fn volume(&self) -> f64 {
        self.state.borrow().volume
    }

    fn record(&self, event: MediaEvent) {
        self.state.borrow_mut().events.push(event);
    }
}

impl MediaSink for FakeMediaSink {
    fn load_source(&mut self, url: &str) {
        let mut state = self.state.borrow_mut();
        state.source = Some(url.to_string());
        state.position = 0.0;
        state.events.push(MediaEvent::Load(url.to_string()));
    }

    fn clear_source(&mut self) {
        let mut state = self.state.borrow_mut();
        state.source = None;
        state.playing = false;
        state.tracks.clear();
        state.modes.clear();
        state.events.push(MediaEvent::Clear);
    }

    fn play(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.reject_play {
            return Err(Error::PlaybackRejected("autoplay blocked".to_string()));
        }
        state.playing = true;
        state.events.push(MediaEvent::Play);
        Ok(())
    }

    fn pause(&mut self) {
        self.state.borrow_mut().playing = false;
        self.record(MediaEvent::Pause);
    }

    fn seek(&mut self, position_secs: f64) {
        self.state.borrow_mut().position = position_secs;
        self.record(MediaEvent::Seek(position_secs));
    }

    fn set_rate(&mut self, rate: f64) {
        self.state.borrow_mut().rate = rate;
        self.record(MediaEvent::Rate(rate));
    }

    fn set_volume(&mut self, volume: f64) {
        self.state.borrow_mut().volume = volume;
        self.record(MediaEvent::Volume(volume));
    }

    fn set_muted(&mut self, muted: bool) {
        self.state.borrow_mut().muted = muted;
        self.record(MediaEvent::Muted(muted));
    }

    fn current_time(&self) -> f64 {
        self.state.borrow().position
    }

    fn duration(&self) -> f64 {
        self.state.borrow().duration
    }

    fn set_text_tracks(&mut self, tracks: &[SubtitleTrack]) {
        let mut state = self.state.borrow_mut();
        state.tracks = tracks.to_vec();
        state.modes = vec![TextTrackMode::Hidden; tracks.len()];
        state.events.push(MediaEvent::Tracks(tracks.len()));
    }

    fn text_track_count(&self) -> usize {
        self.state.borrow().tracks.len()
    }

    fn set_text_track_mode(&mut self, index: usize, mode: TextTrackMode) {
        if let Some(slot) = self.state.borrow_mut().modes.get_mut(index) {
            *slot = mode;
        }
    }
}

// =============================================================================
// Adaptive engine
// =============================================================================

#[derive(Debug, Default)]
pub struct EngineStats {
    /// Sessions created
    pub created: usize,
    /// Sessions currently attached to the media element
    pub attached: usize,
    /// High-water mark of `attached`
    pub max_attached: usize,
    pub loaded: Vec<String>,
    pub selections: Vec<QualitySelection>,
    pub fail_load: bool,
    pub levels: Vec<QualityLevel>,
}

/// Engine factory that counts attached sessions
#[derive(Debug, Clone, Default)]
pub struct FakeEngineFactory {
    stats: Rc<RefCell<EngineStats>>,
}

impl FakeEngineFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise levels at the given heights on every session
    pub fn with_heights(self, heights: &[u32]) -> Self {
        self.stats.borrow_mut().levels = heights
            .iter()
            .enumerate()
            .map(|(index, &height)| QualityLevel {
                index,
                label: quality_name(height).to_string(),
                bandwidth: u64::from(height) * 2_000,
                height: Some(height),
            })
            .collect();
        self
    }

    pub fn fail_loads(&self, fail: bool) {
        self.stats.borrow_mut().fail_load = fail;
    }

    pub fn attached(&self) -> usize {
        self.stats.borrow().attached
    }

    pub fn max_attached(&self) -> usize {
        self.stats.borrow().max_attached
    }

    pub fn created(&self) -> usize {
        self.stats.borrow().created
    }

    pub fn loaded(&self) -> Vec<String> {
        self.stats.borrow().loaded.clone()
    }

    pub fn selections(&self) -> Vec<QualitySelection> {
        self.stats.borrow().selections.clone()
    }
}

impl EngineFactory for FakeEngineFactory {
    fn create(&self) -> Box<dyn AdaptiveSession> {
        self.stats.borrow_mut().created += 1;
        Box::new(FakeSession {
            stats: Rc::clone(&self.stats),
            attached: false,
        })
    }
}

struct FakeSession {
    stats: Rc<RefCell<EngineStats>>,
    attached: bool,
}

impl AdaptiveSession for FakeSession {
    fn load(&mut self, manifest_url: &str) -> Result<()> {
        let mut stats = self.stats.borrow_mut();
        if stats.fail_load {
            return Err(Error::EngineLoad {
                url: manifest_url.to_string(),
                reason: "fake failure".to_string(),
            });
        }
        stats.loaded.push(manifest_url.to_string());
        if !self.attached {
            self.attached = true;
            stats.attached += 1;
            stats.max_attached = stats.max_attached.max(stats.attached);
        }
        Ok(())
    }

    fn levels(&self) -> Vec<QualityLevel> {
        self.stats.borrow().levels.clone()
    }

    fn select_level(&mut self, selection: QualitySelection) {
        self.stats.borrow_mut().selections.push(selection);
    }

    fn destroy(&mut self) {
        if self.attached {
            self.attached = false;
            self.stats.borrow_mut().attached -= 1;
        }
    }
}

// =============================================================================
// Presentation surface
// =============================================================================

#[derive(Debug, Default)]
pub struct SurfaceState {
    pub fullscreen: bool,
    pub picture_in_picture: bool,
    pub landscape_locked: bool,
    pub reject_picture_in_picture: bool,
    pub reject_orientation: bool,
}

/// Presentation surface stand-in
#[derive(Debug, Clone, Default)]
pub struct FakeSurface {
    state: Rc<RefCell<SurfaceState>>,
}

impl FakeSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reject_picture_in_picture(&self, reject: bool) {
        self.state.borrow_mut().reject_picture_in_picture = reject;
    }

    pub fn reject_orientation(&self, reject: bool) {
        self.state.borrow_mut().reject_orientation = reject;
    }

    pub fn landscape_locked(&self) -> bool {
        self.state.borrow().landscape_locked
    }
}

impl PresentationSurface for FakeSurface {
    fn is_fullscreen(&self) -> bool {
        self.state.borrow().fullscreen
    }

    fn request_fullscreen(&mut self) -> Result<()> {
        self.state.borrow_mut().fullscreen = true;
        Ok(())
    }

    fn exit_fullscreen(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        state.fullscreen = false;
        state.landscape_locked = false;
        Ok(())
    }

    fn lock_landscape(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.reject_orientation {
            return Err(Error::capability("orientation lock", "not supported"));
        }
        state.landscape_locked = true;
        Ok(())
    }

    fn is_picture_in_picture(&self) -> bool {
        self.state.borrow().picture_in_picture
    }

    fn request_picture_in_picture(&mut self) -> Result<()> {
        let mut state = self.state.borrow_mut();
        if state.reject_picture_in_picture {
            return Err(Error::capability("Picture-in-Picture", "request denied"));
        }
        state.picture_in_picture = true;
        Ok(())
    }

    fn exit_picture_in_picture(&mut self) -> Result<()> {
        self.state.borrow_mut().picture_in_picture = false;
        Ok(())
    }
}
