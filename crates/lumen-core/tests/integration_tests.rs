//! Integration tests for Lumen Core

use lumen_core::source::classify;
use lumen_core::testing::{FakeEngineFactory, FakeMediaSink, FakeSurface, MediaEvent};
use lumen_core::{
    Capabilities, ChannelItem, ControlsState, Episode, KeyValueStore, ManualScheduler, MemoryStore,
    PlayableItem, PlayerConfig, PlayerObserver, PlayerParts, PlayerSession, PreferenceStore,
    PreferenceUpdate, ProgressUpdate, SourceKind, SubtitlePreference, SubtitleTrack, TextTrackMode,
    VideoItem, WatchHistory,
};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

// =============================================================================
// Harness
// =============================================================================

struct Harness {
    scheduler: ManualScheduler,
    sink: FakeMediaSink,
    engines: FakeEngineFactory,
    store: Rc<MemoryStore>,
    session: PlayerSession,
}

impl Harness {
    fn new() -> Self {
        Self::with_observer(Box::new(lumen_core::NoopObserver))
    }

    fn with_observer(observer: Box<dyn PlayerObserver>) -> Self {
        let scheduler = ManualScheduler::new();
        let sink = FakeMediaSink::new();
        let engines = FakeEngineFactory::new().with_heights(&[480, 720]);
        let store = Rc::new(MemoryStore::new());
        let parts = PlayerParts {
            sink: Box::new(sink.clone()),
            engines: Box::new(engines.clone()),
            surface: Box::new(FakeSurface::new()),
            probe: Box::new(Capabilities::all()),
            scheduler: Rc::new(scheduler.clone()),
            store: store.clone(),
        };
        let session = PlayerSession::new(PlayerConfig::default(), parts, observer)
            .expect("default config is valid");
        Self {
            scheduler,
            sink,
            engines,
            store,
            session,
        }
    }

    fn advance(&mut self, ms: u64) {
        for fired in self.scheduler.advance(Duration::from_millis(ms)) {
            self.session.handle_timer(fired);
        }
    }
}

fn channels() -> Vec<ChannelItem> {
    vec![
        ChannelItem::new("news", "News 24", "https://tv.example.com/news/index.m3u8"),
        ChannelItem::new("sports", "Sports HD", "http://10.0.0.5:8000/live/sports.ts"),
        ChannelItem::new("music", "Music", "https://tv.example.com/music/playlist.m3u8?token=x"),
    ]
}

fn movie_with_subtitles() -> PlayableItem {
    VideoItem::movie("m1", "Neon Horizon", "https://cdn.example.com/neon.mp4")
        .with_subtitles(vec![
            SubtitleTrack::new("English", "https://cdn.example.com/neon.en.vtt", "en"),
            SubtitleTrack::new("Bangla", "https://cdn.example.com/neon.bn.vtt", "bn"),
        ])
        .into()
}

fn series() -> VideoItem {
    let episodes = (1..=3)
        .map(|n| Episode {
            id: format!("e{n}"),
            title: format!("Episode {n}"),
            description: String::new(),
            source_url: format!("https://cdn.example.com/cyber/e{n}.mp4"),
            subtitles: Vec::new(),
        })
        .collect();
    VideoItem::series("s1", "Cyber Chronicles", episodes)
}

// =============================================================================
// Source Resolution
// =============================================================================

#[test]
fn test_iframe_always_embed() {
    for raw in [
        r#"<iframe src="https://www.youtube.com/embed/a"></iframe>"#,
        r#"<IFRAME src="https://x.example.com/live.m3u8"></IFRAME>"#,
        "<iframe></iframe>",
    ] {
        assert_eq!(classify(raw, false, None).kind(), SourceKind::Embed, "{raw}");
    }
}

#[test]
fn test_m3u8_always_adaptive() {
    for raw in [
        "https://cdn.example.com/a.m3u8",
        "https://cdn.example.com/a.m3u8?token=1",
        "https://cdn.example.com/path.m3u8/segment",
    ] {
        assert_eq!(classify(raw, false, None).kind(), SourceKind::AdaptiveStream, "{raw}");
    }
}

#[test]
fn test_plain_files_native() {
    for raw in [
        "https://cdn.example.com/movie.mp4",
        "https://cdn.example.com/movie.webm",
        "file:///media/clip.mov",
    ] {
        assert_eq!(classify(raw, false, None).kind(), SourceKind::NativeFile, "{raw}");
    }
}

// =============================================================================
// Channel Switching
// =============================================================================

#[test]
fn test_next_channel_reresolves_and_clears_first() {
    let mut h = Harness::new();
    h.session.set_channels(channels());
    h.session.mount(channels()[0].clone().into(), 0.0);
    h.sink.clear_events();

    assert!(h.session.handle_key("ArrowUp"));
    assert_eq!(h.session.item().map(|i| i.id()), Some("sports"));
    assert_eq!(
        h.session.controller().source().map(|s| s.kind()),
        Some(SourceKind::AdaptiveStream)
    );
    assert_eq!(
        h.engines.loaded().last().map(String::as_str),
        Some("http://10.0.0.5:8000/live/sports.ts")
    );
    assert_eq!(h.sink.events().first(), Some(&MediaEvent::Clear));
}

#[test]
fn test_channel_wraparound() {
    let mut h = Harness::new();
    h.session.set_channels(channels());

    h.session.mount(channels()[2].clone().into(), 0.0);
    assert!(h.session.advance());
    assert_eq!(h.session.item().map(|i| i.id()), Some("news"));

    assert!(h.session.retreat());
    assert_eq!(h.session.item().map(|i| i.id()), Some("music"));
}

#[test]
fn test_rapid_switches_keep_one_session() {
    let mut h = Harness::new();
    h.session.set_channels(channels());
    h.session.mount(channels()[0].clone().into(), 0.0);
    for _ in 0..10 {
        h.session.handle_key("ChannelUp");
        h.session.handle_key("PageDown");
        h.session.handle_key("ArrowUp");
    }
    assert_eq!(h.engines.attached(), 1);
    assert_eq!(h.engines.max_attached(), 1);
}

#[test]
fn test_channel_keys_ignored_on_vod() {
    let mut h = Harness::new();
    h.session.set_channels(channels());
    h.session.mount(movie_with_subtitles(), 0.0);
    assert!(!h.session.handle_key("ArrowUp"));
    assert_eq!(h.session.item().map(|i| i.id()), Some("m1"));
}

// =============================================================================
// Transport
// =============================================================================

#[test]
fn test_live_seek_is_noop() {
    let mut h = Harness::new();
    h.session.mount(channels()[0].clone().into(), 0.0);
    let before = h.session.playback_state().clone();
    h.session.seek_to(75.0);
    h.session.skip_forward();
    h.session.skip_back();
    assert_eq!(h.session.playback_state(), &before);
}

#[test]
fn test_volume_zero_mutes_and_unmute_restores() {
    let mut h = Harness::new();
    h.session.mount(movie_with_subtitles(), 0.0);
    h.session.set_volume(0.0);
    assert!(h.session.playback_state().is_muted);

    h.session.toggle_mute();
    assert!(!h.session.playback_state().is_muted);
    assert!(h.session.playback_state().volume > 0.0);
}

#[test]
fn test_subtitle_selection_scenario() {
    let mut h = Harness::new();
    h.session.mount(movie_with_subtitles(), 0.0);

    h.session.select_subtitle(Some(1)).unwrap();
    assert_eq!(
        h.sink.track_modes(),
        vec![TextTrackMode::Hidden, TextTrackMode::Showing]
    );

    h.session.select_subtitle(None).unwrap();
    assert_eq!(
        h.sink.track_modes(),
        vec![TextTrackMode::Hidden, TextTrackMode::Hidden]
    );

    let prefs = PreferenceStore::new(h.store.clone(), "lumen").load();
    assert_eq!(prefs.subtitle_language, SubtitlePreference::Off);
}

// =============================================================================
// Control Visibility
// =============================================================================

#[test]
fn test_idle_hide_never_while_paused() {
    let mut h = Harness::new();
    h.session.mount(movie_with_subtitles(), 0.0);
    h.session.pause();
    for _ in 0..10 {
        h.advance(5_000);
        assert_eq!(h.session.controls().state(), ControlsState::Visible);
    }
}

#[test]
fn test_idle_hide_resets_on_activity() {
    let mut h = Harness::new();
    h.session.mount(movie_with_subtitles(), 0.0);
    h.advance(2_000);
    h.session.pointer_activity();
    h.advance(2_000);
    assert_eq!(h.session.controls().state(), ControlsState::Visible);
    h.advance(1_000);
    assert_eq!(h.session.controls().state(), ControlsState::Hidden);
}

// =============================================================================
// Series
// =============================================================================

#[test]
fn test_next_episode_offer_and_advance() {
    let mut h = Harness::new();
    h.session.mount(series().into(), 0.0);
    assert!(!h.session.next_episode_available());
    h.advance(5_000);
    assert!(h.session.next_episode_available());

    assert!(h.session.advance());
    assert_eq!(
        h.session.item().map(|i| i.title()),
        Some("Cyber Chronicles: Episode 2")
    );
    assert!(!h.session.next_episode_available());
    assert_eq!(h.sink.source().as_deref(), Some("https://cdn.example.com/cyber/e2.mp4"));
}

#[test]
fn test_last_episode_has_no_next() {
    let mut h = Harness::new();
    let show = series();
    let last = show.on_episode(&show.episodes[2]);
    h.session.mount(last.into(), 0.0);
    h.advance(10_000);
    assert!(!h.session.next_episode_available());
    assert!(!h.session.advance());
}

// =============================================================================
// Preferences and History
// =============================================================================

#[test]
fn test_preference_round_trip_and_corruption() {
    let store = Rc::new(MemoryStore::new());
    let prefs = PreferenceStore::new(store.clone(), "lumen");
    prefs.save(PreferenceUpdate {
        playback_rate: Some(1.5),
        subtitle_language: Some(SubtitlePreference::Language("bn".into())),
    });
    let record = prefs.load();
    assert_eq!(record.playback_rate, 1.5);
    assert_eq!(record.subtitle_language, SubtitlePreference::Language("bn".into()));

    store.set("lumen.preferences", "\u{0}garbage").unwrap();
    let record = prefs.load();
    assert_eq!(record.playback_rate, 1.0);
    assert_eq!(record.subtitle_language, SubtitlePreference::Off);
}

#[test]
fn test_history_receives_progress_through_observer() {
    let store = Rc::new(MemoryStore::new());
    let history = WatchHistory::new(store, "lumen");
    let mut h = Harness::with_observer(Box::new(history.clone()));

    let movie = movie_with_subtitles();
    h.session.mount(movie.clone(), 0.0);
    h.sink.set_duration(400.0);
    h.sink.set_position(100.0);
    h.session.on_time_update();

    assert_eq!(history.resume_position(&movie), 100.0);
    assert_eq!(history.continue_watching().len(), 1);
}

#[derive(Default)]
struct Recorder {
    progress: RefCell<Vec<ProgressUpdate>>,
    closes: RefCell<usize>,
}

impl PlayerObserver for Recorder {
    fn on_progress(&self, _item: &PlayableItem, progress: &ProgressUpdate) {
        self.progress.borrow_mut().push(*progress);
    }

    fn on_close(&self) {
        *self.closes.borrow_mut() += 1;
    }
}

#[test]
fn test_unknown_duration_reports_nothing() {
    let recorder = Rc::new(Recorder::default());
    let mut h = Harness::with_observer(Box::new(recorder.clone()));
    h.session.mount(channels()[0].clone().into(), 0.0);
    h.sink.set_duration(f64::INFINITY);
    h.sink.set_position(12.0);
    h.session.on_time_update();
    assert!(recorder.progress.borrow().is_empty());
}

// =============================================================================
// Downloads and Close
// =============================================================================

#[test]
fn test_download_completes_and_persists() {
    let mut h = Harness::new();
    h.session.mount(movie_with_subtitles(), 0.0);
    assert!(h.session.start_download());
    assert!(!h.session.start_download());

    h.advance(5_000);
    assert!(h.session.downloads().is_downloaded("m1"));
    assert!(h.store.get("lumen.downloads").is_some());
}

#[test]
fn test_close_cancels_everything() {
    let recorder = Rc::new(Recorder::default());
    let mut h = Harness::with_observer(Box::new(recorder.clone()));
    h.session.set_channels(channels());
    h.session.mount(series().into(), 0.0);
    h.session.start_download();

    h.session.close();
    assert!(h.scheduler.pending().is_empty());
    assert_eq!(h.engines.attached(), 0);
    h.advance(60_000);
    h.session.close();
    assert_eq!(*recorder.closes.borrow(), 1);
    assert!(!h.session.downloads().is_downloaded("s1"));
}
