//! Channel and episode navigation

use crate::types::{ChannelItem, VideoItem};
use serde::{Deserialize, Serialize};

/// Direction of a navigation request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NavAction {
    Next,
    Previous,
}

/// Map a remote-control key name to a navigation action
pub fn key_action(key: &str) -> Option<NavAction> {
    match key {
        "ArrowUp" | "PageUp" | "ChannelUp" => Some(NavAction::Next),
        "ArrowDown" | "PageDown" | "ChannelDown" => Some(NavAction::Previous),
        _ => None,
    }
}

/// Ordered channel list with wrap-around stepping
#[derive(Debug, Clone, Default)]
pub struct ChannelNavigator {
    channels: Vec<ChannelItem>,
}

impl ChannelNavigator {
    pub fn new(channels: Vec<ChannelItem>) -> Self {
        Self { channels }
    }

    pub fn channels(&self) -> &[ChannelItem] {
        &self.channels
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.channels.iter().position(|c| c.id == id)
    }

    /// Channel after `current_id`; the last wraps to the first
    pub fn next(&self, current_id: &str) -> Option<&ChannelItem> {
        let index = self.index_of(current_id)?;
        self.channels.get((index + 1) % self.channels.len())
    }

    /// Channel before `current_id`; the first wraps to the last
    pub fn previous(&self, current_id: &str) -> Option<&ChannelItem> {
        let index = self.index_of(current_id)?;
        let len = self.channels.len();
        self.channels.get((index + len - 1) % len)
    }

    pub fn step(&self, current_id: &str, action: NavAction) -> Option<&ChannelItem> {
        match action {
            NavAction::Next => self.next(current_id),
            NavAction::Previous => self.previous(current_id),
        }
    }
}

/// The same series positioned on the following episode
///
/// Returns `None` for movies, unknown positions and the final episode.
pub fn next_episode(video: &VideoItem) -> Option<VideoItem> {
    let index = video.current_episode_index()?;
    let episode = video.episodes.get(index + 1)?;
    Some(video.on_episode(episode))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Episode;

    fn navigator() -> ChannelNavigator {
        ChannelNavigator::new(
            ["c0", "c1", "c2"]
                .iter()
                .map(|id| ChannelItem::new(*id, id.to_uppercase(), format!("https://tv.example.com/{id}.m3u8")))
                .collect(),
        )
    }

    #[test]
    fn test_next_wraps() {
        let nav = navigator();
        assert_eq!(nav.next("c0").map(|c| c.id.as_str()), Some("c1"));
        assert_eq!(nav.next("c2").map(|c| c.id.as_str()), Some("c0"));
    }

    #[test]
    fn test_previous_wraps() {
        let nav = navigator();
        assert_eq!(nav.previous("c0").map(|c| c.id.as_str()), Some("c2"));
        assert_eq!(nav.previous("c2").map(|c| c.id.as_str()), Some("c1"));
    }

    #[test]
    fn test_unknown_or_empty() {
        assert!(navigator().next("missing").is_none());
        assert!(ChannelNavigator::default().previous("c0").is_none());
    }

    #[test]
    fn test_single_channel_steps_to_itself() {
        let nav = ChannelNavigator::new(vec![ChannelItem::new("only", "Only", "https://x/a.m3u8")]);
        assert_eq!(nav.next("only").map(|c| c.id.as_str()), Some("only"));
        assert_eq!(nav.previous("only").map(|c| c.id.as_str()), Some("only"));
    }

    #[test]
    fn test_key_bindings() {
        assert_eq!(key_action("ArrowUp"), Some(NavAction::Next));
        assert_eq!(key_action("ChannelDown"), Some(NavAction::Previous));
        assert_eq!(key_action("Enter"), None);
    }

    #[test]
    fn test_next_episode() {
        let episodes = (1..=2)
            .map(|n| Episode {
                id: format!("e{n}"),
                title: format!("Chapter {n}"),
                description: String::new(),
                source_url: format!("https://cdn.example.com/e{n}.mp4"),
                subtitles: Vec::new(),
            })
            .collect();
        let series = VideoItem::series("s1", "Dhaka Nights", episodes);

        let second = next_episode(&series).unwrap();
        assert_eq!(second.title, "Dhaka Nights: Chapter 2");
        assert_eq!(second.source_url, "https://cdn.example.com/e2.mp4");
        assert!(next_episode(&second).is_none());

        let movie = VideoItem::movie("m1", "Film", "https://x/f.mp4");
        assert!(next_episode(&movie).is_none());
    }

    #[test]
    fn test_next_episode_keeps_colon_in_series_name() {
        let episodes = (1..=2)
            .map(|n| Episode {
                id: format!("e{n}"),
                title: format!("Ep {n}"),
                description: String::new(),
                source_url: format!("https://cdn.example.com/e{n}.mp4"),
                subtitles: Vec::new(),
            })
            .collect();
        let series = VideoItem::series("s1", "Star Wars: Andor", episodes);
        assert_eq!(series.title, "Star Wars: Andor: Ep 1");

        let second = next_episode(&series).unwrap();
        assert_eq!(second.title, "Star Wars: Andor: Ep 2");
    }
}
