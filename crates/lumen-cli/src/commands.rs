//! CLI command implementations

use crate::headless::{LoggingEngine, LoggingSink};
use crate::output::{print_json, print_rows, OutputFormat};
use chrono::{DateTime, Utc};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use lumen_core::source::{classify, plan};
use lumen_core::{
    AttachPlan, Capabilities, ChannelItem, DownloadSimulator, HlsProbe, JsonFileStore,
    KeyValueStore, ManifestProbe, ManualScheduler, NoSurface, PlayableItem, PlayerConfig,
    PlayerObserver, PlayerParts, PlayerSession, PreferenceStore, PreferenceUpdate, StreamType,
    SubtitlePreference, TokioScheduler, WatchHistory,
};
use serde::Serialize;
use std::cell::RefCell;
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;
use tabled::Tabled;
use url::Url;

fn open_store(path: &Path) -> anyhow::Result<Rc<dyn KeyValueStore>> {
    Ok(Rc::new(JsonFileStore::open(path)?))
}

fn plan_summary(plan: &AttachPlan) -> (String, String) {
    match plan {
        AttachPlan::Native { url } => ("native".into(), url.clone()),
        AttachPlan::Engine { manifest_url } => ("engine".into(), manifest_url.clone()),
        AttachPlan::NativeAdaptive { manifest_url } => ("native adaptive".into(), manifest_url.clone()),
        AttachPlan::Frame { src } => ("frame".into(), src.clone()),
        AttachPlan::Unavailable { reason, .. } => ("unavailable".into(), reason.clone()),
    }
}

fn format_secs(secs: f64) -> String {
    let total = secs.max(0.0) as u64;
    format!("{}:{:02}:{:02}", total / 3600, (total / 60) % 60, total % 60)
}

fn format_time(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M").to_string()
}

// ============================================================================
// resolve / probe
// ============================================================================

#[derive(Serialize)]
struct ResolveReport {
    input: String,
    source: lumen_core::ResolvedSource,
    plan: AttachPlan,
}

/// Classify a source and show how it would be attached
pub fn resolve(
    source: &str,
    stream_type: Option<StreamType>,
    no_engine: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let marked_embed = matches!(stream_type, Some(StreamType::Embed | StreamType::Youtube));
    let resolved = classify(source, marked_embed, stream_type);

    let capabilities = Capabilities {
        adaptive_engine: !no_engine,
        native_adaptive: false,
        ..Capabilities::all()
    };
    let attach = plan(&resolved, &capabilities);

    if format == OutputFormat::Json {
        return print_json(&ResolveReport {
            input: source.to_string(),
            source: resolved,
            plan: attach,
        });
    }

    let (how, target) = plan_summary(&attach);
    let how = if attach.is_available() {
        style(how).green()
    } else {
        style(how).red()
    };
    println!("{} {}", style("Kind:").bold(), resolved.kind());
    println!("{} {}", style("URL: ").bold(), resolved.url());
    println!("{} {} {}", style("Plan:").bold(), how, style(target).dim());
    Ok(())
}

#[derive(Tabled, Serialize)]
struct LevelRow {
    #[tabled(rename = "#")]
    index: usize,
    label: String,
    #[tabled(rename = "bandwidth (bps)")]
    bandwidth: u64,
    #[tabled(display_with = "display_height")]
    height: Option<u32>,
}

fn display_height(height: &Option<u32>) -> String {
    height.map(|h| h.to_string()).unwrap_or_else(|| "-".into())
}

/// Fetch a manifest and print what it advertises
pub async fn probe(manifest: &str, timeout: u64, format: OutputFormat) -> anyhow::Result<()> {
    let url = Url::parse(manifest)?;
    let prober = HlsProbe::try_new(Duration::from_secs(timeout))?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_message(format!("Fetching {url}"));
    spinner.enable_steady_tick(Duration::from_millis(100));
    let info = prober.probe(&url).await;
    spinner.finish_and_clear();
    let info = info?;

    if format == OutputFormat::Json {
        return print_json(&info);
    }

    let kind = if info.is_live { "live" } else { "vod" };
    println!("{} {}", style("Stream:").bold(), info.url);
    println!("{} {}", style("Type:  ").bold(), kind);
    if let Some(duration) = info.duration_secs {
        println!("{} {}", style("Length:").bold(), format_secs(duration));
    }

    let rows: Vec<LevelRow> = info
        .levels
        .into_iter()
        .map(|l| LevelRow {
            index: l.index,
            label: l.label,
            bandwidth: l.bandwidth,
            height: l.height,
        })
        .collect();
    print_rows(&rows, format, "Single rendition (no variants)")
}

// ============================================================================
// prefs / history
// ============================================================================

/// Print the stored preference record
pub fn prefs_show(store: &Path, config: &PlayerConfig, format: OutputFormat) -> anyhow::Result<()> {
    let prefs = PreferenceStore::new(open_store(store)?, &config.storage_namespace);
    let record = prefs.load();

    if format == OutputFormat::Json {
        return print_json(&record);
    }
    println!("{} {}x", style("Playback rate:").bold(), record.playback_rate);
    println!(
        "{} {}",
        style("Subtitles:    ").bold(),
        String::from(record.subtitle_language)
    );
    Ok(())
}

/// Merge new values into the stored preference record
pub fn prefs_set(
    store: &Path,
    config: &PlayerConfig,
    rate: Option<f64>,
    subtitles: Option<String>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    if let Some(rate) = rate {
        if !config.playback_rates.contains(&rate) {
            anyhow::bail!(
                "rate {rate} is not offered; choose one of {:?}",
                config.playback_rates
            );
        }
    }

    let prefs = PreferenceStore::new(open_store(store)?, &config.storage_namespace);
    prefs.save(PreferenceUpdate {
        playback_rate: rate,
        subtitle_language: subtitles.map(SubtitlePreference::from),
    });
    prefs_show(store, config, format)
}

#[derive(Tabled, Serialize)]
struct HistoryRow {
    content: String,
    #[tabled(display_with = "display_episode")]
    episode: Option<String>,
    #[tabled(display_with = "display_percent")]
    progress: f64,
    position: String,
    watched: String,
}

fn display_episode(episode: &Option<String>) -> String {
    episode.clone().unwrap_or_else(|| "-".into())
}

fn display_percent(percent: &f64) -> String {
    format!("{percent:.0}%")
}

/// List or clear watch history
pub fn history(store: &Path, config: &PlayerConfig, clear: bool, format: OutputFormat) -> anyhow::Result<()> {
    let history = WatchHistory::new(open_store(store)?, &config.storage_namespace);

    if clear {
        history.clear()?;
        println!("{}", style("History cleared").green());
        return Ok(());
    }

    let rows: Vec<HistoryRow> = history
        .continue_watching()
        .into_iter()
        .map(|e| HistoryRow {
            content: e.content_id,
            episode: e.episode_id,
            progress: e.progress_percent,
            position: format_secs(e.position_secs),
            watched: format_time(&e.last_watched),
        })
        .collect();
    print_rows(&rows, format, "No watch history")
}

// ============================================================================
// downloads
// ============================================================================

/// Run a simulated download to completion
pub async fn download(store: &Path, config: &PlayerConfig, id: &str, format: OutputFormat) -> anyhow::Result<()> {
    let mut simulator = DownloadSimulator::new(open_store(store)?, config);
    let (scheduler, mut fired) = TokioScheduler::new();

    if !simulator.start(&scheduler, id) {
        anyhow::bail!("'{id}' is already downloaded or in progress");
    }

    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{msg} [{bar:40.cyan/blue}] {pos:>3}%")?.progress_chars("=> "),
    );
    bar.set_message(id.to_string());

    while let Some(timer) = fired.recv().await {
        let Some(progress) = simulator.on_tick(&scheduler, &timer) else {
            continue;
        };
        bar.set_position(u64::from(progress.percent));
        if progress.is_complete() {
            break;
        }
    }
    bar.finish_and_clear();

    match simulator.downloads().into_iter().find(|r| r.id == id) {
        Some(record) if format == OutputFormat::Json => print_json(&record),
        Some(record) => {
            println!(
                "{} {} at {}",
                style("Downloaded").green(),
                record.id,
                format_time(&record.downloaded_at)
            );
            Ok(())
        }
        None => anyhow::bail!("download of '{id}' did not complete"),
    }
}

#[derive(Tabled, Serialize)]
struct DownloadRow {
    id: String,
    downloaded: String,
}

/// List finished downloads, or remove one
pub fn downloads(
    store: &Path,
    config: &PlayerConfig,
    remove: Option<&str>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let simulator = DownloadSimulator::new(open_store(store)?, config);

    if let Some(id) = remove {
        if simulator.remove(id)? {
            println!("{} {id}", style("Removed").green());
        } else {
            println!("{} {id}", style("Not downloaded:").yellow());
        }
        return Ok(());
    }

    let rows: Vec<DownloadRow> = simulator
        .downloads()
        .into_iter()
        .map(|r| DownloadRow {
            downloaded: format_time(&r.downloaded_at),
            id: r.id,
        })
        .collect();
    print_rows(&rows, format, "No downloads")
}

// ============================================================================
// channels
// ============================================================================

#[derive(Tabled, Serialize)]
struct ChannelRow {
    step: String,
    channel: String,
    name: String,
    plan: String,
    target: String,
}

/// Collects mounted items so each step can report what ended up on screen
#[derive(Default)]
struct Recorder {
    mounted: RefCell<Vec<PlayableItem>>,
    unavailable: RefCell<Vec<String>>,
}

impl PlayerObserver for Recorder {
    fn on_item_changed(&self, item: &PlayableItem) {
        self.mounted.borrow_mut().push(item.clone());
    }

    fn on_unavailable(&self, item: &PlayableItem, reason: &str) {
        self.unavailable
            .borrow_mut()
            .push(format!("{}: {reason}", item.id()));
    }
}

/// Walk a channel list through a headless session
pub fn channels(
    store: &Path,
    config: PlayerConfig,
    list: &Path,
    start: Option<&str>,
    steps: &[String],
    format: OutputFormat,
) -> anyhow::Result<()> {
    let channels: Vec<ChannelItem> = serde_json::from_str(&std::fs::read_to_string(list)?)?;
    let first = match start {
        Some(id) => channels
            .iter()
            .find(|c| c.id == id)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no channel with id '{id}'"))?,
        None => channels
            .first()
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("channel list is empty"))?,
    };

    let osd = config.osd_duration();
    let scheduler = ManualScheduler::new();
    let recorder = Rc::new(Recorder::default());
    let parts = PlayerParts {
        sink: Box::new(LoggingSink::new()),
        engines: Box::new(LoggingEngine),
        surface: Box::new(NoSurface),
        probe: Box::new(Capabilities {
            native_adaptive: false,
            ..Capabilities::all()
        }),
        scheduler: Rc::new(scheduler.clone()),
        store: open_store(store)?,
    };
    let mut session = PlayerSession::new(config, parts, Box::new(Rc::clone(&recorder)))?;
    session.set_channels(channels);

    let mut rows = Vec::with_capacity(steps.len() + 1);
    let mut record = |step: &str, session: &PlayerSession| {
        let Some(PlayableItem::Channel(channel)) = session.item() else {
            return;
        };
        let (how, target) = session
            .controller()
            .plan()
            .map(plan_summary)
            .unwrap_or_default();
        rows.push(ChannelRow {
            step: step.to_string(),
            channel: channel.id.clone(),
            name: channel.name.clone(),
            plan: how,
            target,
        });
    };

    session.mount(first.into(), 0.0);
    record("start", &session);

    for step in steps {
        let moved = match step.to_ascii_lowercase().as_str() {
            "next" => session.advance(),
            "prev" | "previous" => session.retreat(),
            _ => session.handle_key(step),
        };
        if !moved {
            tracing::warn!(step = %step, "Step did not change channel");
        }
        // Let the banner expire before the next step
        scheduler.advance_with(osd, |fired| session.handle_timer(fired));
        record(step, &session);
    }

    session.close();

    for reason in recorder.unavailable.borrow().iter() {
        tracing::warn!(reason = %reason, "Channel unavailable");
    }
    tracing::debug!(mounted = recorder.mounted.borrow().len(), "Walk finished");

    print_rows(&rows, format, "No channels visited")
}
