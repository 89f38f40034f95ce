//! HLS manifest probing
//!
//! Fetches a manifest ahead of playback to learn whether it is live, how
//! long it runs, and which quality levels it advertises. Master playlists
//! are followed one hop into their first variant to settle live vs VOD.

use crate::types::{quality_name, QualityLevel};
use crate::{Error, Result};
use async_trait::async_trait;
use m3u8_rs::Playlist;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

/// What a probe learned about a stream
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamInfo {
    pub url: Url,
    pub is_live: bool,
    /// Total duration for VOD, `None` for live
    pub duration_secs: Option<f64>,
    pub levels: Vec<QualityLevel>,
}

/// A parsed playlist
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedManifest {
    /// Multivariant playlist: levels sorted by bandwidth, with their playlist URLs
    Master { levels: Vec<(QualityLevel, Url)> },
    /// Segment playlist
    Media {
        is_live: bool,
        duration_secs: Option<f64>,
    },
}

/// Fetches and inspects manifests
#[async_trait]
pub trait ManifestProbe: Send + Sync {
    async fn probe(&self, url: &Url) -> Result<StreamInfo>;
}

/// Parse manifest text; relative URIs resolve against `base_url`
pub fn parse_manifest(content: &str, base_url: &Url) -> Result<ParsedManifest> {
    let playlist = m3u8_rs::parse_playlist_res(content.as_bytes())
        .map_err(|e| Error::ManifestParse(format!("Invalid HLS playlist: {:?}", e)))?;

    match playlist {
        Playlist::MasterPlaylist(master) => {
            let mut variants = Vec::with_capacity(master.variants.len());
            for variant in master.variants.iter().filter(|v| !v.is_i_frame) {
                let uri = base_url.join(&variant.uri).map_err(|e| {
                    Error::ManifestParse(format!("Invalid variant URI '{}': {}", variant.uri, e))
                })?;
                let height = variant.resolution.map(|r| r.height as u32);
                variants.push((variant.bandwidth, height, uri));
            }
            variants.sort_by_key(|(bandwidth, _, _)| *bandwidth);

            let levels = variants
                .into_iter()
                .enumerate()
                .map(|(index, (bandwidth, height, uri))| {
                    let label = match height {
                        Some(h) => quality_name(h).to_string(),
                        None => format!("{} kbps", bandwidth / 1000),
                    };
                    (
                        QualityLevel {
                            index,
                            label,
                            bandwidth,
                            height,
                        },
                        uri,
                    )
                })
                .collect();

            Ok(ParsedManifest::Master { levels })
        }
        Playlist::MediaPlaylist(media) => {
            let is_live = !media.end_list;
            let duration_secs = (!is_live).then(|| {
                media
                    .segments
                    .iter()
                    .map(|s| f64::from(s.duration))
                    .sum::<f64>()
            });
            Ok(ParsedManifest::Media {
                is_live,
                duration_secs,
            })
        }
    }
}

/// Manifest probe over HTTP
pub struct HlsProbe {
    client: Client,
}

impl HlsProbe {
    pub fn try_new(timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self { client })
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    async fn fetch(&self, url: &Url) -> Result<String> {
        debug!(%url, "Fetching manifest");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| Error::ManifestFetch(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(Error::ManifestFetch(format!("{url} returned {status}")));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl ManifestProbe for HlsProbe {
    #[instrument(skip(self))]
    async fn probe(&self, url: &Url) -> Result<StreamInfo> {
        let content = self.fetch(url).await?;

        match parse_manifest(&content, url)? {
            ParsedManifest::Media {
                is_live,
                duration_secs,
            } => Ok(StreamInfo {
                url: url.clone(),
                is_live,
                duration_secs,
                levels: vec![QualityLevel {
                    index: 0,
                    label: "Source".to_string(),
                    bandwidth: 0,
                    height: None,
                }],
            }),
            ParsedManifest::Master { levels } => {
                let (is_live, duration_secs) = match levels.first() {
                    Some((_, variant_url)) => {
                        let variant = self.fetch(variant_url).await?;
                        match parse_manifest(&variant, variant_url)? {
                            ParsedManifest::Media {
                                is_live,
                                duration_secs,
                            } => (is_live, duration_secs),
                            ParsedManifest::Master { .. } => {
                                return Err(Error::ManifestParse(
                                    "variant points at another master playlist".to_string(),
                                ))
                            }
                        }
                    }
                    None => return Err(Error::ManifestParse("master playlist has no variants".to_string())),
                };

                Ok(StreamInfo {
                    url: url.clone(),
                    is_live,
                    duration_secs,
                    levels: levels.into_iter().map(|(level, _)| level).collect(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "#EXTM3U
#EXT-X-STREAM-INF:BANDWIDTH=2800000,RESOLUTION=1280x720
720p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=800000,RESOLUTION=640x360
360p/index.m3u8
#EXT-X-STREAM-INF:BANDWIDTH=5000000,RESOLUTION=1920x1080
1080p/index.m3u8
";

    const VOD: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:10
#EXT-X-MEDIA-SEQUENCE:0
#EXTINF:10.0,
seg0.ts
#EXTINF:10.0,
seg1.ts
#EXTINF:5.0,
seg2.ts
#EXT-X-ENDLIST
";

    const LIVE: &str = "#EXTM3U
#EXT-X-VERSION:3
#EXT-X-TARGETDURATION:6
#EXT-X-MEDIA-SEQUENCE:1042
#EXTINF:6.0,
seg1042.ts
#EXTINF:6.0,
seg1043.ts
";

    fn base() -> Url {
        Url::parse("https://cdn.example.com/show/master.m3u8").unwrap()
    }

    #[test]
    fn test_master_levels_sorted() {
        let ParsedManifest::Master { levels } = parse_manifest(MASTER, &base()).unwrap() else {
            panic!("expected master playlist");
        };
        let labels: Vec<_> = levels.iter().map(|(l, _)| l.label.as_str()).collect();
        assert_eq!(labels, vec!["360p", "720p", "1080p"]);
        assert_eq!(levels[0].0.index, 0);
        assert_eq!(
            levels[0].1.as_str(),
            "https://cdn.example.com/show/360p/index.m3u8"
        );
    }

    #[test]
    fn test_vod_media_playlist() {
        let parsed = parse_manifest(VOD, &base()).unwrap();
        assert_eq!(
            parsed,
            ParsedManifest::Media {
                is_live: false,
                duration_secs: Some(25.0)
            }
        );
    }

    #[test]
    fn test_live_media_playlist() {
        let parsed = parse_manifest(LIVE, &base()).unwrap();
        assert_eq!(
            parsed,
            ParsedManifest::Media {
                is_live: true,
                duration_secs: None
            }
        );
    }

    #[test]
    fn test_garbage_is_parse_error() {
        let err = parse_manifest("<html>not a playlist</html>", &base()).unwrap_err();
        assert!(matches!(err, Error::ManifestParse(_)));
    }
}
