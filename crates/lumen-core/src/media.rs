//! Host seams for the media element and the platform
//!
//! The controller never touches a platform API directly. Hosts implement:
//! - [`MediaSink`] over their media element
//! - [`EngineFactory`] / [`AdaptiveSession`] over their segmented-loading library
//! - [`CapabilityProbe`] for runtime feature detection
//! - [`PresentationSurface`] for fullscreen and Picture-in-Picture

use crate::types::{QualityLevel, QualitySelection, SubtitleTrack};
use crate::Result;
use serde::{Deserialize, Serialize};

/// Display mode of a text track
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextTrackMode {
    Showing,
    Hidden,
    Disabled,
}

/// Narrow view of a platform media element
pub trait MediaSink {
    /// Assign a source URL
    fn load_source(&mut self, url: &str);

    /// Detach the current source and stop loading
    fn clear_source(&mut self);

    /// Start playback; hosts return `Err` when the platform refuses (autoplay policy)
    fn play(&mut self) -> Result<()>;

    fn pause(&mut self);

    /// Seek to an absolute position in seconds
    fn seek(&mut self, position_secs: f64);

    fn set_rate(&mut self, rate: f64);

    fn set_volume(&mut self, volume: f64);

    fn set_muted(&mut self, muted: bool);

    /// Current position in seconds
    fn current_time(&self) -> f64;

    /// Duration in seconds; NaN or infinite while unknown or live
    fn duration(&self) -> f64;

    /// Replace the element's subtitle tracks
    fn set_text_tracks(&mut self, tracks: &[SubtitleTrack]);

    fn text_track_count(&self) -> usize;

    fn set_text_track_mode(&mut self, index: usize, mode: TextTrackMode);
}

/// One segmented-loading session attached to the media element
pub trait AdaptiveSession {
    /// Load a manifest and attach to the media element
    fn load(&mut self, manifest_url: &str) -> Result<()>;

    /// Qualities advertised by the manifest
    fn levels(&self) -> Vec<QualityLevel>;

    fn select_level(&mut self, selection: QualitySelection);

    /// Stop loading and release the media element
    fn destroy(&mut self);
}

/// Creates segmented-loading sessions
pub trait EngineFactory {
    fn create(&self) -> Box<dyn AdaptiveSession>;
}

/// Runtime capabilities, queried once per player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Capabilities {
    /// A segmented-loading library is present
    pub adaptive_engine: bool,
    /// The media element plays manifests natively
    pub native_adaptive: bool,
    pub picture_in_picture: bool,
    pub fullscreen: bool,
}

impl Capabilities {
    pub fn all() -> Self {
        Self {
            adaptive_engine: true,
            native_adaptive: true,
            picture_in_picture: true,
            fullscreen: true,
        }
    }

    pub fn none() -> Self {
        Self::default()
    }
}

/// Runtime feature detection
pub trait CapabilityProbe {
    fn probe(&self) -> Capabilities;
}

impl CapabilityProbe for Capabilities {
    fn probe(&self) -> Capabilities {
        *self
    }
}

/// Fullscreen, Picture-in-Picture and orientation control
pub trait PresentationSurface {
    fn is_fullscreen(&self) -> bool;

    fn request_fullscreen(&mut self) -> Result<()>;

    fn exit_fullscreen(&mut self) -> Result<()>;

    /// Lock to landscape while fullscreen
    fn lock_landscape(&mut self) -> Result<()>;

    fn is_picture_in_picture(&self) -> bool;

    fn request_picture_in_picture(&mut self) -> Result<()>;

    fn exit_picture_in_picture(&mut self) -> Result<()>;
}

/// Surface for hosts without fullscreen or Picture-in-Picture
#[derive(Debug, Default, Clone, Copy)]
pub struct NoSurface;

impl PresentationSurface for NoSurface {
    fn is_fullscreen(&self) -> bool {
        false
    }

    fn request_fullscreen(&mut self) -> Result<()> {
        Err(crate::Error::capability("fullscreen", "not supported by host"))
    }

    fn exit_fullscreen(&mut self) -> Result<()> {
        Ok(())
    }

    fn lock_landscape(&mut self) -> Result<()> {
        Err(crate::Error::capability("orientation lock", "not supported by host"))
    }

    fn is_picture_in_picture(&self) -> bool {
        false
    }

    fn request_picture_in_picture(&mut self) -> Result<()> {
        Err(crate::Error::capability("Picture-in-Picture", "not supported by host"))
    }

    fn exit_picture_in_picture(&mut self) -> Result<()> {
        Ok(())
    }
}

/// Factory for hosts without a segmented-loading library
#[derive(Debug, Default, Clone, Copy)]
pub struct NoEngine;

impl EngineFactory for NoEngine {
    fn create(&self) -> Box<dyn AdaptiveSession> {
        Box::new(NoEngine)
    }
}

impl AdaptiveSession for NoEngine {
    fn load(&mut self, manifest_url: &str) -> Result<()> {
        Err(crate::Error::EngineLoad {
            url: manifest_url.to_string(),
            reason: "no adaptive engine available".to_string(),
        })
    }

    fn levels(&self) -> Vec<QualityLevel> {
        Vec::new()
    }

    fn select_level(&mut self, _selection: QualitySelection) {}

    fn destroy(&mut self) {}
}
