//! Headless player walkthrough
//!
//! Drives a player session with the in-memory fakes and virtual time:
//! channel surfing with the banner, then a series with skip intro and
//! the next-episode prompt.
//!
//! Run with: cargo run -p lumen-core --example channel_surf

use lumen_core::testing::{FakeEngineFactory, FakeMediaSink, FakeSurface};
use lumen_core::{
    Capabilities, ChannelItem, Episode, ManualScheduler, MemoryStore, PlayableItem, PlayerConfig,
    PlayerObserver, PlayerParts, PlayerSession, ProgressUpdate, StreamType, VideoItem,
};
use std::rc::Rc;
use std::time::Duration;

struct Printer;

impl PlayerObserver for Printer {
    fn on_item_changed(&self, item: &PlayableItem) {
        println!("  -> now playing: {}", item.title());
    }

    fn on_progress(&self, _item: &PlayableItem, progress: &ProgressUpdate) {
        println!("  progress {:.1}%", progress.percent);
    }

    fn on_unavailable(&self, item: &PlayableItem, reason: &str) {
        println!("  !! {} unavailable: {}", item.title(), reason);
    }
}

fn episode(n: u32) -> Episode {
    Episode {
        id: format!("s1e{n}"),
        title: format!("Episode {n}"),
        description: String::new(),
        source_url: format!("https://cdn.example.com/shows/orbit/s1e{n}.mp4"),
        subtitles: Vec::new(),
    }
}

fn main() -> lumen_core::Result<()> {
    lumen_core::init();

    println!("Lumen Core - Headless Player Example");
    println!("====================================\n");

    let scheduler = ManualScheduler::new();
    let sink = FakeMediaSink::new();
    let parts = PlayerParts {
        sink: Box::new(sink.clone()),
        engines: Box::new(FakeEngineFactory::new().with_heights(&[360, 720, 1080])),
        surface: Box::new(FakeSurface::new()),
        probe: Box::new(Capabilities::all()),
        scheduler: Rc::new(scheduler.clone()),
        store: Rc::new(MemoryStore::new()),
    };
    let mut player = PlayerSession::new(PlayerConfig::default(), parts, Box::new(Printer))?;

    let tick = |player: &mut PlayerSession, ms: u64| {
        scheduler.advance_with(Duration::from_millis(ms), |fired| player.handle_timer(fired));
    };

    // Live TV
    println!("Channels:");
    let channels = vec![
        ChannelItem::new("news", "News 24", "https://tv.example.com/news/index.m3u8"),
        ChannelItem::new("film", "Film Four", "https://tv.example.com/film/stream.mp4"),
        ChannelItem::new(
            "music",
            "Music Live",
            r#"<iframe src="https://www.youtube.com/embed/live123" allowfullscreen></iframe>"#,
        )
        .with_stream_type(StreamType::Youtube),
    ];
    player.set_channels(channels.clone());
    let plan = player.mount(channels[0].clone().into(), 0.0);
    println!("  plan: {plan:?}");
    println!("  banner visible: {}", player.osd_visible());

    for key in ["ArrowUp", "ArrowUp", "ArrowUp", "PageDown"] {
        player.handle_key(key);
        println!("  [{key}] plan: {:?}", player.controller().plan());
    }
    tick(&mut player, 4_000);
    println!("  banner visible after 4s: {}", player.osd_visible());
    println!("  engine levels: {:?}", player.quality_levels().len());

    // Series
    println!("\nSeries:");
    let show = VideoItem::series("orbit", "Orbit", (1..=3).map(episode).collect());
    player.mount(show.into(), 0.0);
    sink.set_duration(1_800.0);

    sink.set_position(30.0);
    player.on_time_update();
    println!("  skip intro offered at 30s: {}", player.skip_intro_available());
    player.skip_intro();
    println!("  position after skip: {:.0}s", player.controller().position());

    tick(&mut player, 5_000);
    println!("  next episode offered: {}", player.next_episode_available());
    player.advance();

    tick(&mut player, 3_000);
    println!("  controls visible after 3s idle: {}", player.controls().is_visible());

    player.close();
    println!("\nClosed: {}", player.is_closed());
    Ok(())
}
