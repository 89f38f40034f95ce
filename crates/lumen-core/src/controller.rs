//! Playback controller
//!
//! Owns [`PlaybackState`] and the media element for one player. Loading an
//! item always tears the previous source down first, so at most one
//! adaptive session is ever attached.

use crate::config::PlayerConfig;
use crate::media::{AdaptiveSession, Capabilities, EngineFactory, MediaSink, TextTrackMode};
use crate::preferences::{PreferenceStore, PreferenceUpdate, SubtitlePreference};
use crate::source::{self, AttachPlan, ResolvedSource};
use crate::types::{
    PlayableItem, PlaybackState, ProgressUpdate, QualityLevel, QualitySelection, SourceKind,
    SubtitleTrack,
};
use crate::{Error, Result};
use tracing::{debug, info, warn};

/// Transport and media-element owner
pub struct PlaybackController {
    config: PlayerConfig,
    sink: Box<dyn MediaSink>,
    engines: Box<dyn EngineFactory>,
    /// Attached segmented-loading session, if any
    session: Option<Box<dyn AdaptiveSession>>,
    capabilities: Capabilities,
    preferences: PreferenceStore,
    state: PlaybackState,
    /// Last known position in seconds
    position: f64,
    source: Option<ResolvedSource>,
    plan: Option<AttachPlan>,
    live: bool,
    episodic: bool,
    subtitles: Vec<SubtitleTrack>,
    quality: QualitySelection,
}

impl PlaybackController {
    pub fn new(
        config: PlayerConfig,
        sink: Box<dyn MediaSink>,
        engines: Box<dyn EngineFactory>,
        capabilities: Capabilities,
        preferences: PreferenceStore,
    ) -> Self {
        Self {
            config,
            sink,
            engines,
            session: None,
            capabilities,
            preferences,
            state: PlaybackState::default(),
            position: 0.0,
            source: None,
            plan: None,
            live: false,
            episodic: false,
            subtitles: Vec::new(),
            quality: QualitySelection::Auto,
        }
    }

    // =========================================================================
    // Source lifecycle
    // =========================================================================

    /// Resolve and attach an item, replacing whatever was loaded
    pub fn load(&mut self, item: &PlayableItem, start_offset: f64) -> AttachPlan {
        self.teardown();

        let resolved = source::resolve(item);
        let mut plan = source::plan(&resolved, &self.capabilities);

        self.live = item.is_live();
        self.episodic = item.is_episodic();
        self.subtitles = item.subtitles().to_vec();
        self.position = 0.0;
        self.quality = QualitySelection::Auto;
        self.state.progress_percent = 0.0;
        self.state.active_subtitle = None;
        self.state.is_playing = false;

        let mut engine_failure = None;
        match &plan {
            AttachPlan::Native { url } => self.attach_native(url),
            AttachPlan::NativeAdaptive { manifest_url } => self.attach_native(manifest_url),
            AttachPlan::Engine { manifest_url } => {
                let mut session = self.engines.create();
                match session.load(manifest_url) {
                    Ok(()) => {
                        self.sink.set_text_tracks(&self.subtitles);
                        self.session = Some(session);
                    }
                    Err(e) => {
                        warn!(url = %manifest_url, error = %e, "Adaptive engine failed to attach");
                        session.destroy();
                        engine_failure = Some(e.to_string());
                    }
                }
            }
            AttachPlan::Frame { src } => debug!(src = %src, "Embed source, no transport"),
            AttachPlan::Unavailable { kind, reason } => {
                warn!(item = %item.id(), %kind, %reason, "Source unavailable");
            }
        }
        if let Some(reason) = engine_failure {
            plan = AttachPlan::Unavailable {
                kind: SourceKind::AdaptiveStream,
                reason,
            };
        }

        info!(
            item = %item.id(),
            kind = %resolved.kind(),
            available = plan.is_available(),
            "Source attached"
        );

        self.source = Some(resolved);
        self.plan = Some(plan.clone());

        if self.has_transport() {
            let stored = self.preferences.load();
            self.state.playback_rate = stored.playback_rate;
            self.sink.set_rate(stored.playback_rate);
            self.sink.set_volume(self.state.volume);
            self.sink.set_muted(self.state.is_muted);

            if let SubtitlePreference::Language(code) = &stored.subtitle_language {
                if let Some(index) = self.subtitles.iter().position(|t| &t.language == code) {
                    self.apply_subtitle(Some(index));
                }
            }

            if start_offset > 0.0 && !self.live {
                self.sink.seek(start_offset);
                self.position = start_offset;
            }

            self.play();
        }

        plan
    }

    fn attach_native(&mut self, url: &str) {
        self.sink.load_source(url);
        self.sink.set_text_tracks(&self.subtitles);
    }

    /// Destroy the adaptive session and clear the media element
    pub fn teardown(&mut self) {
        if let Some(mut session) = self.session.take() {
            session.destroy();
            debug!("Adaptive session destroyed");
        }
        if self.plan.as_ref().is_some_and(AttachPlan::uses_media_element) {
            self.sink.clear_source();
        }
        self.plan = None;
        self.source = None;
        self.state.is_playing = false;
    }

    // =========================================================================
    // Transport
    // =========================================================================

    /// True when the media element is in use and controllable
    pub fn has_transport(&self) -> bool {
        self.plan.as_ref().is_some_and(AttachPlan::uses_media_element)
    }

    fn seekable(&self) -> bool {
        self.has_transport() && !self.live
    }

    pub fn play(&mut self) {
        if !self.has_transport() {
            return;
        }
        match self.sink.play() {
            Ok(()) => self.state.is_playing = true,
            Err(e) => {
                warn!(error = %e, "Playback did not start");
                self.state.is_playing = false;
            }
        }
    }

    pub fn pause(&mut self) {
        if !self.has_transport() {
            return;
        }
        self.sink.pause();
        self.state.is_playing = false;
    }

    pub fn toggle(&mut self) {
        if self.state.is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    /// Seek to a percentage of the duration; ignored on live and embed sources
    pub fn seek_to(&mut self, percent: f64) {
        if !self.seekable() || !percent.is_finite() {
            return;
        }
        let Some(duration) = self.known_duration() else {
            return;
        };
        self.seek_position(percent.clamp(0.0, 100.0) / 100.0 * duration);
    }

    /// Move the position by `delta` seconds; ignored on live and embed sources
    pub fn skip(&mut self, delta: f64) {
        if !self.seekable() || !delta.is_finite() {
            return;
        }
        let mut target = (self.sink.current_time() + delta).max(0.0);
        if let Some(duration) = self.known_duration() {
            target = target.min(duration);
        }
        self.seek_position(target);
    }

    fn seek_position(&mut self, target: f64) {
        self.sink.seek(target);
        self.position = target;
        if let Some(duration) = self.known_duration() {
            self.state.progress_percent = (target / duration * 100.0).clamp(0.0, 100.0);
        }
        debug!(position = target, "Seeked");
    }

    fn known_duration(&self) -> Option<f64> {
        let duration = self.sink.duration();
        (duration.is_finite() && duration > 0.0).then_some(duration)
    }

    // =========================================================================
    // Volume and rate
    // =========================================================================

    pub fn set_volume(&mut self, volume: f64) {
        if !self.has_transport() || volume.is_nan() {
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        if volume < self.config.mute_floor {
            self.state.volume = 0.0;
            self.state.is_muted = true;
        } else {
            self.state.volume = volume;
            self.state.is_muted = false;
        }
        self.sink.set_volume(self.state.volume);
        self.sink.set_muted(self.state.is_muted);
    }

    pub fn toggle_mute(&mut self) {
        if !self.has_transport() {
            return;
        }
        if self.state.is_muted {
            self.state.is_muted = false;
            if self.state.volume <= 0.0 {
                self.state.volume = self.config.unmute_volume;
                self.sink.set_volume(self.state.volume);
            }
        } else {
            self.state.is_muted = true;
        }
        self.sink.set_muted(self.state.is_muted);
    }

    /// Apply and persist a playback rate
    pub fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        if !rate.is_finite() || rate <= 0.0 {
            return Err(Error::InvalidRate(rate));
        }
        if !self.has_transport() {
            return Ok(());
        }
        self.state.playback_rate = rate;
        self.sink.set_rate(rate);
        self.preferences.save(PreferenceUpdate::rate(rate));
        info!(rate, "Playback rate changed");
        Ok(())
    }

    // =========================================================================
    // Subtitles
    // =========================================================================

    /// Show exactly one subtitle track, or none
    pub fn select_subtitle(&mut self, index: Option<usize>) -> Result<()> {
        let count = if self.has_transport() {
            self.sink.text_track_count()
        } else {
            0
        };
        if let Some(index) = index {
            if index >= count {
                return Err(Error::NoSuchTrack { index, count });
            }
        }

        if !self.has_transport() {
            return Ok(());
        }

        self.apply_subtitle(index);

        let language = index
            .and_then(|i| self.subtitles.get(i))
            .map(|t| SubtitlePreference::Language(t.language.clone()))
            .unwrap_or(SubtitlePreference::Off);
        self.preferences.save(PreferenceUpdate::subtitles(language));
        Ok(())
    }

    fn apply_subtitle(&mut self, index: Option<usize>) {
        for i in 0..self.sink.text_track_count() {
            let mode = if Some(i) == index {
                TextTrackMode::Showing
            } else {
                TextTrackMode::Hidden
            };
            self.sink.set_text_track_mode(i, mode);
        }
        self.state.active_subtitle = index;
        debug!(track = ?index, "Subtitle selection applied");
    }

    // =========================================================================
    // Media events
    // =========================================================================

    /// Recompute progress from the media element
    pub fn on_time_update(&mut self) -> Option<ProgressUpdate> {
        if !self.has_transport() {
            return None;
        }
        let position = self.sink.current_time();
        if position.is_finite() {
            self.position = position;
        }
        let duration = self.known_duration()?;
        let percent = (self.position / duration * 100.0).clamp(0.0, 100.0);
        self.state.progress_percent = percent;
        Some(ProgressUpdate {
            position_secs: self.position,
            duration_secs: duration,
            percent,
        })
    }

    pub fn on_ended(&mut self) {
        self.state.is_playing = false;
        info!("Playback ended");
    }

    // =========================================================================
    // Skip intro and quality
    // =========================================================================

    pub fn skip_intro_available(&self) -> bool {
        self.episodic && self.seekable() && self.config.skip_intro.contains(self.position)
    }

    /// Jump past the intro; returns false when not offered
    pub fn skip_intro(&mut self) -> bool {
        if !self.skip_intro_available() {
            return false;
        }
        self.seek_position(self.config.skip_intro.target_secs);
        true
    }

    pub fn quality_levels(&self) -> Vec<QualityLevel> {
        self.session
            .as_ref()
            .map(|s| s.levels())
            .unwrap_or_default()
    }

    pub fn set_quality(&mut self, selection: QualitySelection) -> Result<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| Error::capability("quality selection", "no adaptive session attached"))?;

        if let QualitySelection::Level(index) = selection {
            let count = session.levels().len();
            if index >= count {
                return Err(Error::capability(
                    "quality selection",
                    format!("no level {index} ({count} available)"),
                ));
            }
        }

        session.select_level(selection);
        self.quality = selection;
        info!(?selection, "Quality changed");
        Ok(())
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    pub fn plan(&self) -> Option<&AttachPlan> {
        self.plan.as_ref()
    }

    pub fn source(&self) -> Option<&ResolvedSource> {
        self.source.as_ref()
    }

    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn is_live(&self) -> bool {
        self.live
    }

    pub fn subtitles(&self) -> &[SubtitleTrack] {
        &self.subtitles
    }

    pub fn quality(&self) -> QualitySelection {
        self.quality
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preferences::{KeyValueStore, MemoryStore};
    use crate::testing::{FakeEngineFactory, FakeMediaSink, MediaEvent};
    use crate::types::{ChannelItem, Episode, VideoItem};
    use std::rc::Rc;

    struct Rig {
        sink: FakeMediaSink,
        engines: FakeEngineFactory,
        store: Rc<MemoryStore>,
        controller: PlaybackController,
    }

    fn rig_with(capabilities: Capabilities) -> Rig {
        let sink = FakeMediaSink::new();
        let engines = FakeEngineFactory::new().with_heights(&[360, 720, 1080]);
        let store = Rc::new(MemoryStore::new());
        let preferences = PreferenceStore::new(store.clone(), "lumen");
        let controller = PlaybackController::new(
            PlayerConfig::default(),
            Box::new(sink.clone()),
            Box::new(engines.clone()),
            capabilities,
            preferences,
        );
        Rig {
            sink,
            engines,
            store,
            controller,
        }
    }

    fn rig() -> Rig {
        rig_with(Capabilities::all())
    }

    fn movie() -> PlayableItem {
        VideoItem::movie("m1", "Neon Horizon", "https://cdn.example.com/neon.mp4")
            .with_subtitles(vec![
                SubtitleTrack::new("English", "https://cdn.example.com/neon.en.vtt", "en"),
                SubtitleTrack::new("Bangla", "https://cdn.example.com/neon.bn.vtt", "bn"),
            ])
            .into()
    }

    fn channel() -> PlayableItem {
        ChannelItem::new("c1", "News 24", "https://tv.example.com/news/index.m3u8").into()
    }

    fn series() -> PlayableItem {
        let episodes = vec![Episode {
            id: "e1".into(),
            title: "Pilot".into(),
            description: String::new(),
            source_url: "https://cdn.example.com/s1/e1.mp4".into(),
            subtitles: Vec::new(),
        }];
        VideoItem::series("s1", "Cyber Chronicles", episodes).into()
    }

    #[test]
    fn test_load_native_autoplays() {
        let mut rig = rig();
        let plan = rig.controller.load(&movie(), 0.0);
        assert!(matches!(plan, AttachPlan::Native { .. }));
        assert!(rig.controller.state().is_playing);
        assert_eq!(rig.sink.source().as_deref(), Some("https://cdn.example.com/neon.mp4"));
    }

    #[test]
    fn test_rejected_autoplay_leaves_paused() {
        let mut rig = rig();
        rig.sink.reject_play(true);
        rig.controller.load(&movie(), 0.0);
        assert!(!rig.controller.state().is_playing);
    }

    #[test]
    fn test_switch_clears_before_load() {
        let mut rig = rig();
        rig.controller.load(&channel(), 0.0);
        rig.sink.clear_events();
        rig.controller.load(&movie(), 0.0);

        let events = rig.sink.events();
        let clear = events.iter().position(|e| *e == MediaEvent::Clear).unwrap();
        let load = events
            .iter()
            .position(|e| matches!(e, MediaEvent::Load(_)))
            .unwrap();
        assert!(clear < load);
        assert_eq!(rig.engines.attached(), 0);
    }

    #[test]
    fn test_engine_failure_is_unavailable() {
        let mut rig = rig();
        rig.engines.fail_loads(true);
        let plan = rig.controller.load(&channel(), 0.0);
        assert!(!plan.is_available());
        assert!(!rig.controller.state().is_playing);
    }

    #[test]
    fn test_live_ignores_seek() {
        let mut rig = rig();
        rig.controller.load(&channel(), 0.0);
        let before = rig.controller.state().clone();
        rig.controller.seek_to(50.0);
        rig.controller.skip(10.0);
        assert_eq!(rig.controller.state(), &before);
        assert!(!rig.sink.events().iter().any(|e| matches!(e, MediaEvent::Seek(_))));
    }

    #[test]
    fn test_seek_and_skip_clamp() {
        let mut rig = rig();
        rig.controller.load(&movie(), 0.0);
        rig.sink.set_duration(200.0);

        rig.controller.seek_to(50.0);
        assert_eq!(rig.controller.position(), 100.0);
        assert_eq!(rig.controller.state().progress_percent, 50.0);

        rig.controller.skip(-500.0);
        assert_eq!(rig.controller.position(), 0.0);
        rig.controller.skip(500.0);
        assert_eq!(rig.controller.position(), 200.0);
    }

    #[test]
    fn test_start_offset_applied_to_vod_only() {
        let mut rig = rig();
        rig.controller.load(&movie(), 42.0);
        assert!(rig.sink.events().contains(&MediaEvent::Seek(42.0)));

        rig.sink.clear_events();
        rig.controller.load(&channel(), 42.0);
        assert!(!rig.sink.events().iter().any(|e| matches!(e, MediaEvent::Seek(_))));
    }

    #[test]
    fn test_volume_zero_mutes_and_unmute_restores() {
        let mut rig = rig();
        rig.controller.load(&movie(), 0.0);

        rig.controller.set_volume(0.0);
        assert!(rig.controller.state().is_muted);
        assert_eq!(rig.controller.state().volume, 0.0);

        rig.controller.toggle_mute();
        assert!(!rig.controller.state().is_muted);
        assert_eq!(rig.controller.state().volume, 0.5);
        assert!(!rig.sink.is_muted());
    }

    #[test]
    fn test_volume_below_floor_mutes() {
        let mut rig = rig();
        rig.controller.load(&movie(), 0.0);
        rig.controller.set_volume(0.005);
        assert!(rig.controller.state().is_muted);
        rig.controller.set_volume(0.8);
        assert!(!rig.controller.state().is_muted);
        assert_eq!(rig.sink.volume(), 0.8);
    }

    #[test]
    fn test_rate_validated_and_persisted() {
        let mut rig = rig();
        rig.controller.load(&movie(), 0.0);

        assert!(matches!(
            rig.controller.set_playback_rate(0.0),
            Err(Error::InvalidRate(_))
        ));
        rig.controller.set_playback_rate(1.5).unwrap();
        assert_eq!(rig.sink.rate(), 1.5);

        let raw = rig.store.get("lumen.preferences").unwrap();
        assert!(raw.contains("1.5"));

        rig.controller.load(&movie(), 0.0);
        assert_eq!(rig.controller.state().playback_rate, 1.5);
    }

    #[test]
    fn test_select_subtitle() {
        let mut rig = rig();
        rig.controller.load(&movie(), 0.0);

        rig.controller.select_subtitle(Some(1)).unwrap();
        assert_eq!(
            rig.sink.track_modes(),
            vec![TextTrackMode::Hidden, TextTrackMode::Showing]
        );

        let err = rig.controller.select_subtitle(Some(5)).unwrap_err();
        assert!(matches!(err, Error::NoSuchTrack { index: 5, count: 2 }));

        rig.controller.select_subtitle(None).unwrap();
        assert_eq!(
            rig.sink.track_modes(),
            vec![TextTrackMode::Hidden, TextTrackMode::Hidden]
        );
    }

    #[test]
    fn test_stored_subtitle_language_restored() {
        let mut rig = rig();
        rig.controller.load(&movie(), 0.0);
        rig.controller.select_subtitle(Some(1)).unwrap();

        rig.controller.load(&movie(), 0.0);
        assert_eq!(rig.controller.state().active_subtitle, Some(1));
    }

    #[test]
    fn test_time_update_guards_unknown_duration() {
        let mut rig = rig();
        rig.controller.load(&movie(), 0.0);
        rig.sink.set_position(30.0);
        assert!(rig.controller.on_time_update().is_none());

        rig.sink.set_duration(f64::INFINITY);
        assert!(rig.controller.on_time_update().is_none());

        rig.sink.set_duration(120.0);
        let update = rig.controller.on_time_update().unwrap();
        assert_eq!(update.percent, 25.0);
    }

    #[test]
    fn test_skip_intro_window() {
        let mut rig = rig();
        rig.controller.load(&series(), 0.0);
        rig.sink.set_duration(1800.0);

        rig.sink.set_position(3.0);
        rig.controller.on_time_update();
        assert!(!rig.controller.skip_intro_available());

        rig.sink.set_position(30.0);
        rig.controller.on_time_update();
        assert!(rig.controller.skip_intro());
        assert_eq!(rig.controller.position(), 90.0);
        assert!(!rig.controller.skip_intro_available());
    }

    #[test]
    fn test_movies_never_offer_skip_intro() {
        let mut rig = rig();
        rig.controller.load(&movie(), 0.0);
        rig.sink.set_duration(1800.0);
        rig.sink.set_position(30.0);
        rig.controller.on_time_update();
        assert!(!rig.controller.skip_intro_available());
    }

    #[test]
    fn test_embed_has_no_transport() {
        let mut rig = rig();
        let embed: PlayableItem = VideoItem::movie(
            "m2",
            "Trailer",
            r#"<iframe src="https://www.youtube.com/embed/xyz"></iframe>"#,
        )
        .into();
        rig.controller.load(&embed, 0.0);

        rig.controller.play();
        rig.controller.set_volume(0.3);
        rig.controller.set_playback_rate(2.0).unwrap();
        assert!(!rig.controller.state().is_playing);
        assert_eq!(rig.controller.state().volume, 1.0);
        assert!(rig.sink.events().is_empty());
        assert!(rig.store.get("lumen.preferences").is_none());
    }

    #[test]
    fn test_embed_subtitle_off_keeps_stored_language() {
        let mut rig = rig();
        rig.controller.load(&movie(), 0.0);
        rig.controller.select_subtitle(Some(1)).unwrap();

        let embed: PlayableItem = VideoItem::movie(
            "m2",
            "Trailer",
            r#"<iframe src="https://www.youtube.com/embed/xyz"></iframe>"#,
        )
        .into();
        rig.controller.load(&embed, 0.0);
        rig.controller.select_subtitle(None).unwrap();

        let prefs = PreferenceStore::new(rig.store.clone(), "lumen");
        assert_eq!(
            prefs.load().subtitle_language,
            SubtitlePreference::Language("bn".into())
        );
    }

    #[test]
    fn test_backward_seek_updates_derived_state() {
        let mut rig = rig();
        rig.controller.load(&series(), 0.0);
        rig.sink.set_duration(1000.0);
        rig.sink.set_position(200.0);
        rig.controller.on_time_update();
        assert!(!rig.controller.skip_intro_available());
        assert!((rig.controller.state().progress_percent - 20.0).abs() < 1e-9);

        rig.controller.seek_to(3.0);

        assert!((rig.controller.position() - 30.0).abs() < 1e-9);
        assert!((rig.controller.state().progress_percent - 3.0).abs() < 1e-9);
        assert!(rig.controller.skip_intro_available());
    }

    #[test]
    fn test_quality_selection() {
        let mut rig = rig();
        assert!(rig.controller.set_quality(QualitySelection::Level(0)).is_err());

        rig.controller.load(&channel(), 0.0);
        assert_eq!(rig.controller.quality_levels().len(), 3);
        rig.controller.set_quality(QualitySelection::Level(2)).unwrap();
        assert!(rig.controller.set_quality(QualitySelection::Level(9)).is_err());
        assert_eq!(rig.engines.selections(), vec![QualitySelection::Level(2)]);

        rig.controller.load(&channel(), 0.0);
        assert_eq!(rig.controller.quality(), QualitySelection::Auto);
    }

    #[test]
    fn test_native_manifest_fallback() {
        let mut rig = rig_with(Capabilities {
            native_adaptive: true,
            ..Capabilities::none()
        });
        rig.controller.load(&channel(), 0.0);
        assert_eq!(rig.engines.created(), 0);
        assert_eq!(
            rig.sink.source().as_deref(),
            Some("https://tv.example.com/news/index.m3u8")
        );
    }
}
