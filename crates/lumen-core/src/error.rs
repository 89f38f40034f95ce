//! Error types for Lumen Core

use thiserror::Error;

/// Result type alias for player operations
pub type Result<T> = std::result::Result<T, Error>;

/// Player error types
#[derive(Error, Debug)]
pub enum Error {
    // Playback errors
    #[error("Media element rejected playback: {0}")]
    PlaybackRejected(String),

    #[error("Adaptive engine failed to load {url}: {reason}")]
    EngineLoad { url: String, reason: String },

    // Manifest errors
    #[error("Failed to fetch manifest: {0}")]
    ManifestFetch(String),

    #[error("Failed to parse manifest: {0}")]
    ManifestParse(String),

    // Control errors
    #[error("No subtitle track at index {index} ({count} available)")]
    NoSuchTrack { index: usize, count: usize },

    #[error("Invalid playback rate: {0}")]
    InvalidRate(f64),

    #[error("{capability} unavailable: {reason}")]
    Capability {
        capability: &'static str,
        reason: String,
    },

    // Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Network errors
    #[cfg(feature = "hls")]
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    // Configuration errors
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a capability error
    pub fn capability(capability: &'static str, reason: impl Into<String>) -> Self {
        Error::Capability {
            capability,
            reason: reason.into(),
        }
    }

    /// Returns true if this error is recoverable
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::PlaybackRejected(_)
            | Error::ManifestFetch(_)
            | Error::Capability { .. }
            | Error::Storage(_) => true,
            #[cfg(feature = "hls")]
            Error::Network(_) => true,
            _ => false,
        }
    }

    /// Returns the error code for logs and host callbacks
    pub fn error_code(&self) -> &'static str {
        match self {
            Error::PlaybackRejected(_) => "PLAYBACK_REJECTED",
            Error::EngineLoad { .. } => "ENGINE_LOAD",
            Error::ManifestFetch(_) => "MANIFEST_FETCH",
            Error::ManifestParse(_) => "MANIFEST_PARSE",
            Error::NoSuchTrack { .. } => "NO_SUCH_TRACK",
            Error::InvalidRate(_) => "INVALID_RATE",
            Error::Capability { .. } => "CAPABILITY",
            Error::Storage(_) => "STORAGE",
            Error::Serialization(_) => "SERIALIZATION",
            #[cfg(feature = "hls")]
            Error::Network(_) => "NETWORK",
            Error::InvalidConfig(_) => "INVALID_CONFIG",
            Error::Io(_) => "IO",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::InvalidRate(0.0).error_code(), "INVALID_RATE");
        assert_eq!(
            Error::NoSuchTrack { index: 3, count: 2 }.error_code(),
            "NO_SUCH_TRACK"
        );
    }

    #[test]
    fn test_recoverable() {
        assert!(Error::capability("Picture-in-Picture", "denied").is_recoverable());
        assert!(!Error::InvalidConfig("bad".into()).is_recoverable());
    }

    #[test]
    fn test_display() {
        let err = Error::NoSuchTrack { index: 3, count: 2 };
        assert_eq!(err.to_string(), "No subtitle track at index 3 (2 available)");
    }
}
