//! Core types for Lumen

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for one mounted player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

// =============================================================================
// Catalog Items
// =============================================================================

/// Subtitle track attached to a video
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubtitleTrack {
    /// Human-readable label (e.g., "English")
    pub label: String,
    /// URL to the caption file
    pub src: String,
    /// BCP-47 language code (e.g., "en", "bn")
    #[serde(rename = "lang")]
    pub language: String,
}

impl SubtitleTrack {
    pub fn new(label: impl Into<String>, src: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            src: src.into(),
            language: language.into(),
        }
    }
}

/// Movie or series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentType {
    Movie,
    Series,
}

/// One episode of a series
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Episode {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub source_url: String,
    #[serde(default)]
    pub subtitles: Vec<SubtitleTrack>,
}

/// On-demand video: a movie, or a series positioned on one episode
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoItem {
    pub id: String,
    pub title: String,
    pub source_url: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub subtitles: Vec<SubtitleTrack>,
    #[serde(default)]
    pub episodes: Vec<Episode>,
    #[serde(default)]
    pub current_episode_id: Option<String>,
    /// Catalog series name; episode titles are built from it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series_title: Option<String>,
}

impl VideoItem {
    /// Create a movie item
    pub fn movie(id: impl Into<String>, title: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            source_url: source_url.into(),
            content_type: ContentType::Movie,
            subtitles: Vec::new(),
            episodes: Vec::new(),
            current_episode_id: None,
            series_title: None,
        }
    }

    /// Create a series item positioned on its first episode
    pub fn series(id: impl Into<String>, title: impl Into<String>, episodes: Vec<Episode>) -> Self {
        let title = title.into();
        let mut item = Self {
            id: id.into(),
            title: title.clone(),
            source_url: String::new(),
            content_type: ContentType::Series,
            subtitles: Vec::new(),
            episodes,
            current_episode_id: None,
            series_title: Some(title),
        };
        if let Some(first) = item.episodes.first().cloned() {
            item = item.on_episode(&first);
        }
        item
    }

    /// Attach subtitle tracks
    pub fn with_subtitles(mut self, subtitles: Vec<SubtitleTrack>) -> Self {
        self.subtitles = subtitles;
        self
    }

    /// Series name; items without one fall back to the text before the first ':'
    pub fn series_title(&self) -> &str {
        match &self.series_title {
            Some(title) => title,
            None => self.title.split(':').next().unwrap_or(&self.title).trim(),
        }
    }

    /// Index of the current episode in the episode list
    pub fn current_episode_index(&self) -> Option<usize> {
        let current = self.current_episode_id.as_deref()?;
        self.episodes.iter().position(|e| e.id == current)
    }

    /// The same series positioned on `episode`
    pub fn on_episode(&self, episode: &Episode) -> Self {
        Self {
            id: self.id.clone(),
            title: format!("{}: {}", self.series_title(), episode.title),
            source_url: episode.source_url.clone(),
            content_type: self.content_type,
            subtitles: episode.subtitles.clone(),
            episodes: self.episodes.clone(),
            current_episode_id: Some(episode.id.clone()),
            series_title: Some(self.series_title().to_string()),
        }
    }
}

/// Channel stream discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamType {
    Video,
    M3u8,
    Embed,
    Youtube,
}

/// Live TV channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelItem {
    pub id: String,
    pub name: String,
    pub source_url: String,
    #[serde(default)]
    pub stream_type: Option<StreamType>,
    #[serde(default)]
    pub current_program: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

impl ChannelItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, source_url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            source_url: source_url.into(),
            stream_type: None,
            current_program: None,
            category: None,
        }
    }

    pub fn with_stream_type(mut self, stream_type: StreamType) -> Self {
        self.stream_type = Some(stream_type);
        self
    }
}

/// Anything the player can mount
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlayableItem {
    Video(VideoItem),
    Channel(ChannelItem),
}

impl PlayableItem {
    pub fn id(&self) -> &str {
        match self {
            PlayableItem::Video(v) => &v.id,
            PlayableItem::Channel(c) => &c.id,
        }
    }

    /// Display title (channel name for channels)
    pub fn title(&self) -> &str {
        match self {
            PlayableItem::Video(v) => &v.title,
            PlayableItem::Channel(c) => &c.name,
        }
    }

    /// Raw source string: a URL or an `<iframe>` snippet
    pub fn source_url(&self) -> &str {
        match self {
            PlayableItem::Video(v) => &v.source_url,
            PlayableItem::Channel(c) => &c.source_url,
        }
    }

    pub fn subtitles(&self) -> &[SubtitleTrack] {
        match self {
            PlayableItem::Video(v) => &v.subtitles,
            PlayableItem::Channel(_) => &[],
        }
    }

    /// Live channels have no seekable timeline
    pub fn is_live(&self) -> bool {
        matches!(self, PlayableItem::Channel(_))
    }

    /// Series content (skip intro, next episode)
    pub fn is_episodic(&self) -> bool {
        matches!(self, PlayableItem::Video(v) if v.content_type == ContentType::Series)
    }

    /// Explicitly flagged as a third-party embed
    pub fn marked_embed(&self) -> bool {
        matches!(
            self,
            PlayableItem::Channel(ChannelItem {
                stream_type: Some(StreamType::Embed | StreamType::Youtube),
                ..
            })
        )
    }

    /// Explicit stream type, channels only
    pub fn stream_type(&self) -> Option<StreamType> {
        match self {
            PlayableItem::Channel(c) => c.stream_type,
            PlayableItem::Video(_) => None,
        }
    }

    /// Episode id when positioned inside a series
    pub fn episode_id(&self) -> Option<&str> {
        match self {
            PlayableItem::Video(v) => v.current_episode_id.as_deref(),
            PlayableItem::Channel(_) => None,
        }
    }
}

impl From<VideoItem> for PlayableItem {
    fn from(item: VideoItem) -> Self {
        PlayableItem::Video(item)
    }
}

impl From<ChannelItem> for PlayableItem {
    fn from(item: ChannelItem) -> Self {
        PlayableItem::Channel(item)
    }
}

// =============================================================================
// Playback Types
// =============================================================================

/// How a source is played
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Progressive file assigned directly to the media element
    NativeFile,
    /// Manifest needing a segmented-loading session
    AdaptiveStream,
    /// Third-party player rendered in an isolated frame
    Embed,
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::NativeFile => write!(f, "native"),
            SourceKind::AdaptiveStream => write!(f, "adaptive"),
            SourceKind::Embed => write!(f, "embed"),
        }
    }
}

/// Transport state owned by the playback controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackState {
    pub is_playing: bool,
    pub is_muted: bool,
    /// 0.0 - 1.0
    pub volume: f64,
    /// 0.0 - 100.0
    pub progress_percent: f64,
    pub playback_rate: f64,
    pub active_subtitle: Option<usize>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            is_playing: false,
            is_muted: false,
            volume: 1.0,
            progress_percent: 0.0,
            playback_rate: 1.0,
            active_subtitle: None,
        }
    }
}

/// Full-surface or floating mini player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Presentation {
    #[default]
    Full,
    Minimized,
}

/// Progress reported on each time update
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProgressUpdate {
    pub position_secs: f64,
    pub duration_secs: f64,
    pub percent: f64,
}

/// One selectable quality of an adaptive stream
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityLevel {
    pub index: usize,
    pub label: String,
    /// Bits per second
    pub bandwidth: u64,
    pub height: Option<u32>,
}

/// Requested quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualitySelection {
    #[default]
    Auto,
    Level(usize),
}

/// Quality tier name for a picture height
pub fn quality_name(height: u32) -> &'static str {
    match height {
        0..=240 => "240p",
        241..=360 => "360p",
        361..=480 => "480p",
        481..=720 => "720p",
        721..=1080 => "1080p",
        1081..=1440 => "1440p",
        _ => "4K",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn episodes() -> Vec<Episode> {
        (1..=3)
            .map(|n| Episode {
                id: format!("e{n}"),
                title: format!("Episode {n}"),
                description: String::new(),
                source_url: format!("https://cdn.example.com/s1/e{n}.mp4"),
                subtitles: Vec::new(),
            })
            .collect()
    }

    #[test]
    fn test_series_starts_on_first_episode() {
        let series = VideoItem::series("s1", "Cyber Chronicles", episodes());
        assert_eq!(series.title, "Cyber Chronicles: Episode 1");
        assert_eq!(series.current_episode_id.as_deref(), Some("e1"));
        assert_eq!(series.source_url, "https://cdn.example.com/s1/e1.mp4");
        assert_eq!(series.current_episode_index(), Some(0));
    }

    #[test]
    fn test_on_episode_keeps_series_title() {
        let series = VideoItem::series("s1", "Cyber Chronicles", episodes());
        let third = series.on_episode(&series.episodes[2]);
        assert_eq!(third.title, "Cyber Chronicles: Episode 3");
        assert_eq!(third.series_title(), "Cyber Chronicles");
    }

    #[test]
    fn test_series_title_with_colon_survives_episodes() {
        let series = VideoItem::series("s2", "Star Wars: Andor", episodes());
        assert_eq!(series.title, "Star Wars: Andor: Episode 1");

        let second = series.on_episode(&series.episodes[1]);
        assert_eq!(second.title, "Star Wars: Andor: Episode 2");
        assert_eq!(second.series_title(), "Star Wars: Andor");
    }

    #[test]
    fn test_series_title_falls_back_to_title_prefix() {
        let json = r#"{"id":"s3","title":"Orbit: Pilot","source_url":"https://x/p.mp4","content_type":"series"}"#;
        let item: VideoItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.series_title(), "Orbit");
    }

    #[test]
    fn test_item_flags() {
        let channel: PlayableItem = ChannelItem::new("c1", "News", "https://x/live.m3u8")
            .with_stream_type(StreamType::Youtube)
            .into();
        assert!(channel.is_live());
        assert!(channel.marked_embed());
        assert!(!channel.is_episodic());

        let series: PlayableItem = VideoItem::series("s1", "Show", episodes()).into();
        assert!(series.is_episodic());
        assert_eq!(series.episode_id(), Some("e1"));
    }

    #[test]
    fn test_item_json_shape() {
        let json = r#"{"kind":"channel","id":"c1","name":"Sports","source_url":"https://x/a.m3u8","stream_type":"m3u8"}"#;
        let item: PlayableItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.title(), "Sports");
        assert_eq!(item.stream_type(), Some(StreamType::M3u8));
    }

    #[test]
    fn test_quality_name() {
        assert_eq!(quality_name(480), "480p");
        assert_eq!(quality_name(720), "720p");
        assert_eq!(quality_name(1080), "1080p");
        assert_eq!(quality_name(2160), "4K");
    }
}
