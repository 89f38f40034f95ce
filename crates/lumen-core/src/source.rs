//! Source resolution
//!
//! Decides how a catalog item is played:
//! - `<iframe>` snippets and items flagged as embeds play in a frame
//! - manifest URLs (`.m3u8`, `.m3u`, `.ts`, manifest query endpoints) need
//!   a segmented-loading session
//! - everything else is handed to the media element as a progressive file
//!
//! [`plan`] then maps the resolved source onto what the runtime can
//! actually do, falling back to native manifest playback when no
//! segmented-loading engine exists.

use crate::media::Capabilities;
use crate::types::{PlayableItem, SourceKind, StreamType};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Path suffixes that mark a manifest or a bare transport-stream segment
const ADAPTIVE_SUFFIXES: [&str; 3] = [".m3u8", ".m3u", ".ts"];

/// Query values that mark a manifest endpoint (`?format=m3u8`, `?type=hls`)
const MANIFEST_QUERY_VALUES: [&str; 3] = ["m3u8", "m3u", "hls"];

/// Classified source for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "url", rename_all = "snake_case")]
pub enum ResolvedSource {
    NativeFile(String),
    AdaptiveStream(String),
    Embed(String),
}

impl ResolvedSource {
    pub fn kind(&self) -> SourceKind {
        match self {
            ResolvedSource::NativeFile(_) => SourceKind::NativeFile,
            ResolvedSource::AdaptiveStream(_) => SourceKind::AdaptiveStream,
            ResolvedSource::Embed(_) => SourceKind::Embed,
        }
    }

    pub fn url(&self) -> &str {
        match self {
            ResolvedSource::NativeFile(url)
            | ResolvedSource::AdaptiveStream(url)
            | ResolvedSource::Embed(url) => url,
        }
    }
}

/// How a resolved source gets attached on this runtime
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "plan", rename_all = "snake_case")]
pub enum AttachPlan {
    /// Assign the URL to the media element
    Native { url: String },
    /// Attach a segmented-loading session to the media element
    Engine { manifest_url: String },
    /// Platform plays manifests itself; assign directly
    NativeAdaptive { manifest_url: String },
    /// Render in an isolated frame
    Frame { src: String },
    /// Nothing on this runtime can play it
    Unavailable { kind: SourceKind, reason: String },
}

impl AttachPlan {
    /// True when the local media element is in use
    pub fn uses_media_element(&self) -> bool {
        matches!(
            self,
            AttachPlan::Native { .. } | AttachPlan::Engine { .. } | AttachPlan::NativeAdaptive { .. }
        )
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, AttachPlan::Unavailable { .. })
    }
}

/// Resolve an item's source
pub fn resolve(item: &PlayableItem) -> ResolvedSource {
    classify(item.source_url(), item.marked_embed(), item.stream_type())
}

/// Classify a raw source string
///
/// `marked_embed` and `stream_type` are the explicit discriminators a
/// channel record may carry; they are consulted after the iframe check.
pub fn classify(raw: &str, marked_embed: bool, stream_type: Option<StreamType>) -> ResolvedSource {
    let trimmed = raw.trim();

    if is_iframe_snippet(trimmed) {
        return ResolvedSource::Embed(extract_iframe_src(trimmed).unwrap_or_default());
    }

    if marked_embed {
        return ResolvedSource::Embed(trimmed.to_string());
    }

    if stream_type == Some(StreamType::M3u8) || is_adaptive_url(trimmed) {
        return ResolvedSource::AdaptiveStream(trimmed.to_string());
    }

    ResolvedSource::NativeFile(trimmed.to_string())
}

/// Does the string open with an `<iframe` tag
pub fn is_iframe_snippet(raw: &str) -> bool {
    raw.get(..7)
        .map(|head| head.eq_ignore_ascii_case("<iframe"))
        .unwrap_or(false)
}

fn iframe_src_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r#"(?is)<iframe\b[^>]*?\ssrc\s*=\s*(?:"([^"]*)"|'([^']*)'|([^\s>]+))"#)
            .expect("iframe src pattern is valid")
    })
}

/// Pull the `src` attribute out of an `<iframe ...>` snippet
pub fn extract_iframe_src(snippet: &str) -> Option<String> {
    let captures = iframe_src_pattern().captures(snippet)?;
    let src = captures
        .get(1)
        .or_else(|| captures.get(2))
        .or_else(|| captures.get(3))?
        .as_str()
        .trim()
        .replace("&amp;", "&");

    if src.is_empty() {
        None
    } else {
        Some(src)
    }
}

/// Does the URL point at a manifest or segment
pub fn is_adaptive_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    if lower.contains(".m3u8") {
        return true;
    }

    let (before_fragment, _) = lower.split_once('#').unwrap_or((&lower, ""));
    let (path, query) = before_fragment
        .split_once('?')
        .unwrap_or((before_fragment, ""));

    if ADAPTIVE_SUFFIXES.iter().any(|suffix| path.ends_with(suffix)) {
        return true;
    }

    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .any(|(_, value)| MANIFEST_QUERY_VALUES.contains(&value))
}

/// Map a resolved source onto the runtime's capabilities
pub fn plan(source: &ResolvedSource, capabilities: &Capabilities) -> AttachPlan {
    match source {
        ResolvedSource::NativeFile(url) if url.is_empty() => AttachPlan::Unavailable {
            kind: SourceKind::NativeFile,
            reason: "item has no source URL".to_string(),
        },
        ResolvedSource::NativeFile(url) => AttachPlan::Native { url: url.clone() },
        ResolvedSource::Embed(src) if src.is_empty() => AttachPlan::Unavailable {
            kind: SourceKind::Embed,
            reason: "iframe snippet has no src attribute".to_string(),
        },
        ResolvedSource::Embed(src) => AttachPlan::Frame { src: src.clone() },
        ResolvedSource::AdaptiveStream(url) => {
            if capabilities.adaptive_engine {
                AttachPlan::Engine {
                    manifest_url: url.clone(),
                }
            } else if capabilities.native_adaptive {
                AttachPlan::NativeAdaptive {
                    manifest_url: url.clone(),
                }
            } else {
                AttachPlan::Unavailable {
                    kind: SourceKind::AdaptiveStream,
                    reason: "no adaptive streaming support on this platform".to_string(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ChannelItem, VideoItem};

    #[test]
    fn test_iframe_snippet_is_embed() {
        let snippet = r#"<iframe width="560" height="315" src="https://www.youtube.com/embed/abc123?autoplay=1&amp;mute=1" allowfullscreen></iframe>"#;
        let resolved = classify(snippet, false, None);
        assert_eq!(
            resolved,
            ResolvedSource::Embed("https://www.youtube.com/embed/abc123?autoplay=1&mute=1".to_string())
        );
    }

    #[test]
    fn test_iframe_single_quotes_and_case() {
        let snippet = "  <IFRAME SRC='https://player.example.com/e/9'></IFRAME>";
        assert_eq!(
            classify(snippet, false, None),
            ResolvedSource::Embed("https://player.example.com/e/9".to_string())
        );
    }

    #[test]
    fn test_iframe_without_src() {
        let resolved = classify("<iframe allowfullscreen></iframe>", false, None);
        assert_eq!(resolved, ResolvedSource::Embed(String::new()));
        let plan = plan(&resolved, &Capabilities::all());
        assert!(matches!(plan, AttachPlan::Unavailable { kind: SourceKind::Embed, .. }));
    }

    #[test]
    fn test_empty_url_plans_unavailable() {
        let movie: PlayableItem = VideoItem::movie("m0", "Missing", "").into();
        let plan = plan(&resolve(&movie), &Capabilities::all());
        assert!(matches!(plan, AttachPlan::Unavailable { kind: SourceKind::NativeFile, .. }));
    }

    #[test]
    fn test_iframe_wins_over_manifest_marker() {
        let snippet = r#"<iframe src="https://x.example.com/live.m3u8"></iframe>"#;
        assert_eq!(classify(snippet, false, None).kind(), SourceKind::Embed);
    }

    #[test]
    fn test_marked_embed_verbatim() {
        let channel: PlayableItem = ChannelItem::new("c1", "Music", "https://www.youtube.com/embed/live_stream?channel=X")
            .with_stream_type(StreamType::Youtube)
            .into();
        assert_eq!(
            resolve(&channel),
            ResolvedSource::Embed("https://www.youtube.com/embed/live_stream?channel=X".to_string())
        );
    }

    #[test]
    fn test_adaptive_markers() {
        assert!(is_adaptive_url("https://cdn.example.com/live/index.m3u8"));
        assert!(is_adaptive_url("https://cdn.example.com/live/index.m3u8?token=abc"));
        assert!(is_adaptive_url("https://cdn.example.com/radio/playlist.M3U"));
        assert!(is_adaptive_url("http://10.0.0.5:8000/stream/channel.ts"));
        assert!(is_adaptive_url("https://tv.example.com/get.php?id=4&output=m3u8"));
        assert!(is_adaptive_url("https://tv.example.com/play?format=hls"));
    }

    #[test]
    fn test_native_urls() {
        assert!(!is_adaptive_url("https://cdn.tsunami.example.com/movie.mp4"));
        assert!(!is_adaptive_url("https://cdn.example.com/movie.webm?ts=1700000000"));
        assert!(!is_adaptive_url("https://cdn.example.com/docs.tsx.mp4"));
        let movie: PlayableItem = VideoItem::movie("m1", "Movie", "https://cdn.example.com/movie.mp4").into();
        assert_eq!(
            resolve(&movie),
            ResolvedSource::NativeFile("https://cdn.example.com/movie.mp4".to_string())
        );
    }

    #[test]
    fn test_explicit_m3u8_stream_type() {
        let channel: PlayableItem = ChannelItem::new("c2", "News", "https://tv.example.com/live/news")
            .with_stream_type(StreamType::M3u8)
            .into();
        assert_eq!(resolve(&channel).kind(), SourceKind::AdaptiveStream);
    }

    #[test]
    fn test_plan_falls_back_to_native_manifest() {
        let source = ResolvedSource::AdaptiveStream("https://x/a.m3u8".to_string());
        let caps = Capabilities {
            adaptive_engine: false,
            native_adaptive: true,
            ..Capabilities::none()
        };
        assert_eq!(
            plan(&source, &caps),
            AttachPlan::NativeAdaptive {
                manifest_url: "https://x/a.m3u8".to_string()
            }
        );
    }

    #[test]
    fn test_plan_unavailable_without_support() {
        let source = ResolvedSource::AdaptiveStream("https://x/a.m3u8".to_string());
        let plan = plan(&source, &Capabilities::none());
        assert!(!plan.is_available());
        assert!(!plan.uses_media_element());
    }

    #[test]
    fn test_plan_prefers_engine() {
        let source = ResolvedSource::AdaptiveStream("https://x/a.m3u8".to_string());
        assert!(matches!(plan(&source, &Capabilities::all()), AttachPlan::Engine { .. }));
    }
}
