//! Lumen Core - headless playback core for the Lumen storefront player
//!
//! This crate provides the platform-independent half of the player:
//! - Source resolution (progressive file, HLS manifest, embedded frame)
//! - Transport control, volume, rate and subtitle selection
//! - Idle-driven control chrome visibility
//! - Live channel and series episode navigation
//! - Persisted preferences, watch history and simulated downloads
//! - HLS manifest probing (feature `hls`)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Lumen Core                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                                                                 │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────┐           │
//! │  │    Source    │  │   Control    │  │   Channel    │           │
//! │  │   Resolver   │  │  Visibility  │  │  Navigator   │           │
//! │  └──────┬───────┘  └──────┬───────┘  └──────┬───────┘           │
//! │         │                 │                 │                   │
//! │  ┌──────┴───────┐         │                 │                   │
//! │  │   Playback   │─────────┼─────────────────┘                   │
//! │  │  Controller  │         │                                     │
//! │  └──────┬───────┘  ┌──────┴──────┐                              │
//! │         └──────────│   Player    │                              │
//! │                    │   Session   │                              │
//! │                    └──────┬──────┘                              │
//! │                           │                                     │
//! │  ┌──────────────┐  ┌──────┴──────┐  ┌──────────────┐            │
//! │  │ Preferences  │  │  Scheduler  │  │  Downloads / │            │
//! │  │    Store     │  │  (injected) │  │   History    │            │
//! │  └──────────────┘  └─────────────┘  └──────────────┘            │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Hosts plug in a [`MediaSink`], an [`EngineFactory`], a
//! [`PresentationSurface`], a [`CapabilityProbe`], a [`Scheduler`] and a
//! [`KeyValueStore`]; [`testing`] has in-memory versions of each.

pub mod error;
pub mod types;
pub mod config;
pub mod source;
pub mod media;
pub mod scheduler;
pub mod preferences;
pub mod controller;
pub mod visibility;
pub mod navigator;
pub mod downloads;
pub mod history;
pub mod player;
pub mod testing;
#[cfg(feature = "hls")]
pub mod hls;

pub use error::{Error, Result};
pub use types::*;
pub use config::{PlayerConfig, SkipIntroWindow};
pub use source::{resolve, AttachPlan, ResolvedSource};
pub use media::{
    AdaptiveSession, Capabilities, CapabilityProbe, EngineFactory, MediaSink, NoEngine, NoSurface,
    PresentationSurface, TextTrackMode,
};
pub use scheduler::{FiredTimer, ManualScheduler, Scheduler, TimerId, TimerKind};
#[cfg(feature = "runtime")]
pub use scheduler::TokioScheduler;
pub use preferences::{
    JsonFileStore, KeyValueStore, MemoryStore, PreferenceRecord, PreferenceStore, PreferenceUpdate,
    SubtitlePreference,
};
pub use controller::PlaybackController;
pub use visibility::{ActivityContext, ControlMenu, ControlVisibility, ControlsState, TapOutcome};
pub use navigator::{key_action, next_episode, ChannelNavigator, NavAction};
pub use downloads::{DownloadProgress, DownloadRecord, DownloadSimulator};
pub use history::{HistoryEntry, WatchHistory};
pub use player::{NoopObserver, PlayerObserver, PlayerParts, PlayerSession};
#[cfg(feature = "hls")]
pub use hls::{HlsProbe, ManifestProbe, StreamInfo};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the player library
pub fn init() {
    tracing::info!(version = VERSION, "Lumen Core initialized");
}
