//! Browser implementations of the core's host seams
//!
//! - [`WebMediaSink`] drives an `HTMLVideoElement`
//! - [`HlsJsFactory`] wraps the page's global `Hls` (hls.js)
//! - [`BrowserCapabilities`] probes the runtime once
//! - [`BrowserSurface`] handles fullscreen, Picture-in-Picture and orientation

use crate::storage::js_message;
use js_sys::{Function, Promise, Reflect};
use lumen_core::{
    AdaptiveSession, Capabilities, CapabilityProbe, EngineFactory, Error, MediaSink,
    PresentationSurface, QualityLevel, QualitySelection, Result, SubtitleTrack, TextTrackMode,
};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlMediaElement, HtmlTrackElement, HtmlVideoElement};

const HLS_MIME: &str = "application/vnd.apple.mpegurl";

/// Property lookup that never throws
fn get(target: &JsValue, key: &str) -> JsValue {
    Reflect::get(target, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

/// Call a method by name; missing methods are reported as unsupported
fn call_method(target: &JsValue, name: &'static str) -> std::result::Result<JsValue, JsValue> {
    let method = get(target, name)
        .dyn_into::<Function>()
        .map_err(|_| JsValue::from_str(&format!("{name} is not supported")))?;
    method.call0(target)
}

/// Log a rejected promise instead of leaving it unhandled
fn watch_promise(value: JsValue, what: &'static str) {
    let Ok(promise) = value.dyn_into::<Promise>() else {
        return;
    };
    wasm_bindgen_futures::spawn_local(async move {
        if let Err(err) = wasm_bindgen_futures::JsFuture::from(promise).await {
            tracing::warn!(action = what, error = %js_message(&err), "Browser rejected request");
        }
    });
}

fn document() -> Option<web_sys::Document> {
    web_sys::window().and_then(|w| w.document())
}

// ============================================================================
// Media element
// ============================================================================

/// [`MediaSink`] over a video element
pub struct WebMediaSink {
    video: HtmlVideoElement,
}

impl WebMediaSink {
    pub fn new(video: HtmlVideoElement) -> Self {
        Self { video }
    }

    fn media(&self) -> &HtmlMediaElement {
        &self.video
    }

    fn remove_tracks(&self) {
        let Ok(tracks) = self.video.query_selector_all("track") else {
            return;
        };
        for i in 0..tracks.length() {
            if let Some(node) = tracks.item(i) {
                let _ = self.video.remove_child(&node);
            }
        }
    }
}

impl MediaSink for WebMediaSink {
    fn load_source(&mut self, url: &str) {
        self.media().set_src(url);
    }

    fn clear_source(&mut self) {
        let media = self.media();
        let _ = media.pause();
        let _ = media.remove_attribute("src");
        media.load();
        self.remove_tracks();
    }

    fn play(&mut self) -> Result<()> {
        // Autoplay refusals arrive later through the promise
        let promise = self
            .media()
            .play()
            .map_err(|err| Error::PlaybackRejected(js_message(&err)))?;
        watch_promise(promise.into(), "play");
        Ok(())
    }

    fn pause(&mut self) {
        if let Err(err) = self.media().pause() {
            tracing::warn!(error = %js_message(&err), "pause() threw");
        }
    }

    fn seek(&mut self, position_secs: f64) {
        self.media().set_current_time(position_secs);
    }

    fn set_rate(&mut self, rate: f64) {
        self.media().set_playback_rate(rate);
    }

    fn set_volume(&mut self, volume: f64) {
        self.media().set_volume(volume);
    }

    fn set_muted(&mut self, muted: bool) {
        self.media().set_muted(muted);
    }

    fn current_time(&self) -> f64 {
        self.media().current_time()
    }

    fn duration(&self) -> f64 {
        self.media().duration()
    }

    fn set_text_tracks(&mut self, tracks: &[SubtitleTrack]) {
        self.remove_tracks();
        let Some(document) = document() else {
            return;
        };
        for track in tracks {
            let Ok(element) = document.create_element("track") else {
                continue;
            };
            let Ok(element) = element.dyn_into::<HtmlTrackElement>() else {
                continue;
            };
            element.set_kind("subtitles");
            element.set_src(&track.src);
            element.set_srclang(&track.language);
            element.set_label(&track.label);
            if let Err(err) = self.video.append_child(&element) {
                tracing::warn!(label = %track.label, error = %js_message(&err), "Failed to attach subtitle track");
            }
        }
    }

    fn text_track_count(&self) -> usize {
        self.media()
            .text_tracks()
            .map(|list| list.length() as usize)
            .unwrap_or(0)
    }

    fn set_text_track_mode(&mut self, index: usize, mode: TextTrackMode) {
        let Some(track) = self
            .media()
            .text_tracks()
            .and_then(|list| list.get(index as u32))
        else {
            return;
        };
        track.set_mode(match mode {
            TextTrackMode::Showing => web_sys::TextTrackMode::Showing,
            TextTrackMode::Hidden => web_sys::TextTrackMode::Hidden,
            TextTrackMode::Disabled => web_sys::TextTrackMode::Disabled,
        });
    }
}

// ============================================================================
// hls.js
// ============================================================================

#[wasm_bindgen]
extern "C" {
    /// hls.js instance
    #[wasm_bindgen(js_name = Hls)]
    type Hls;

    #[wasm_bindgen(constructor, catch, js_class = "Hls")]
    fn new() -> std::result::Result<Hls, JsValue>;

    #[wasm_bindgen(static_method_of = Hls, js_class = "Hls", js_name = isSupported, catch)]
    fn is_supported() -> std::result::Result<bool, JsValue>;

    #[wasm_bindgen(method, js_name = loadSource, catch)]
    fn load_source(this: &Hls, url: &str) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(method, js_name = attachMedia, catch)]
    fn attach_media(this: &Hls, media: &HtmlMediaElement) -> std::result::Result<(), JsValue>;

    #[wasm_bindgen(method)]
    fn destroy(this: &Hls);

    #[wasm_bindgen(method, getter)]
    fn levels(this: &Hls) -> JsValue;

    #[wasm_bindgen(method, setter, js_name = currentLevel)]
    fn set_current_level(this: &Hls, level: i32);
}

/// Is a working hls.js loaded on the page
fn hls_js_available() -> bool {
    let loaded = Reflect::has(&js_sys::global(), &JsValue::from_str("Hls")).unwrap_or(false);
    loaded && Hls::is_supported().unwrap_or(false)
}

/// Creates hls.js sessions bound to one video element
pub struct HlsJsFactory {
    video: HtmlVideoElement,
}

impl HlsJsFactory {
    pub fn new(video: HtmlVideoElement) -> Self {
        Self { video }
    }
}

impl EngineFactory for HlsJsFactory {
    fn create(&self) -> Box<dyn AdaptiveSession> {
        Box::new(HlsJsSession {
            video: self.video.clone(),
            hls: None,
        })
    }
}

struct HlsJsSession {
    video: HtmlVideoElement,
    hls: Option<Hls>,
}

impl AdaptiveSession for HlsJsSession {
    fn load(&mut self, manifest_url: &str) -> Result<()> {
        let engine_error = |err: JsValue| Error::EngineLoad {
            url: manifest_url.to_string(),
            reason: js_message(&err),
        };
        let hls = Hls::new().map_err(engine_error)?;
        hls.load_source(manifest_url).map_err(engine_error)?;
        hls.attach_media(&self.video).map_err(engine_error)?;
        self.hls = Some(hls);
        Ok(())
    }

    fn levels(&self) -> Vec<QualityLevel> {
        let Some(hls) = &self.hls else {
            return Vec::new();
        };
        let Ok(levels) = hls.levels().dyn_into::<js_sys::Array>() else {
            return Vec::new();
        };

        levels
            .iter()
            .enumerate()
            .map(|(index, level)| {
                let height = get(&level, "height").as_f64().map(|h| h as u32).filter(|h| *h > 0);
                let bandwidth = get(&level, "bitrate").as_f64().unwrap_or(0.0) as u64;
                let label = match height {
                    Some(h) => lumen_core::quality_name(h).to_string(),
                    None => format!("{} kbps", bandwidth / 1000),
                };
                QualityLevel {
                    index,
                    label,
                    bandwidth,
                    height,
                }
            })
            .collect()
    }

    fn select_level(&mut self, selection: QualitySelection) {
        if let Some(hls) = &self.hls {
            hls.set_current_level(match selection {
                QualitySelection::Auto => -1,
                QualitySelection::Level(index) => index as i32,
            });
        }
    }

    fn destroy(&mut self) {
        if let Some(hls) = self.hls.take() {
            hls.destroy();
        }
    }
}

// ============================================================================
// Capabilities and presentation
// ============================================================================

/// Runtime feature detection against a video element
pub struct BrowserCapabilities {
    video: HtmlVideoElement,
}

impl BrowserCapabilities {
    pub fn new(video: HtmlVideoElement) -> Self {
        Self { video }
    }
}

impl CapabilityProbe for BrowserCapabilities {
    fn probe(&self) -> Capabilities {
        let document = document();
        let doc_flag = |name: &str| {
            document
                .as_ref()
                .map(|d| get(d, name).as_bool().unwrap_or(false))
                .unwrap_or(false)
        };

        Capabilities {
            adaptive_engine: hls_js_available(),
            native_adaptive: !self.video.can_play_type(HLS_MIME).is_empty(),
            picture_in_picture: doc_flag("pictureInPictureEnabled"),
            fullscreen: doc_flag("fullscreenEnabled"),
        }
    }
}

/// Fullscreen on the player container, Picture-in-Picture on the video
pub struct BrowserSurface {
    container: Element,
    video: HtmlVideoElement,
}

impl BrowserSurface {
    pub fn new(container: Element, video: HtmlVideoElement) -> Self {
        Self { container, video }
    }
}

fn surface_error(capability: &'static str, err: JsValue) -> Error {
    Error::capability(capability, js_message(&err))
}

impl PresentationSurface for BrowserSurface {
    fn is_fullscreen(&self) -> bool {
        document()
            .and_then(|d| d.fullscreen_element())
            .is_some()
    }

    fn request_fullscreen(&mut self) -> Result<()> {
        self.container
            .request_fullscreen()
            .map_err(|err| surface_error("fullscreen", err))
    }

    fn exit_fullscreen(&mut self) -> Result<()> {
        if let Some(document) = document() {
            document.exit_fullscreen();
        }
        Ok(())
    }

    fn lock_landscape(&mut self) -> Result<()> {
        let window = web_sys::window().ok_or_else(|| Error::capability("orientation lock", "no window"))?;
        let orientation = get(&get(&window, "screen"), "orientation");
        let lock = get(&orientation, "lock")
            .dyn_into::<Function>()
            .map_err(|_| Error::capability("orientation lock", "not supported by browser"))?;
        let promise = lock
            .call1(&orientation, &JsValue::from_str("landscape"))
            .map_err(|err| surface_error("orientation lock", err))?;
        watch_promise(promise, "orientation lock");
        Ok(())
    }

    fn is_picture_in_picture(&self) -> bool {
        document()
            .map(|d| {
                let element = get(&d, "pictureInPictureElement");
                !(element.is_null() || element.is_undefined())
            })
            .unwrap_or(false)
    }

    fn request_picture_in_picture(&mut self) -> Result<()> {
        let promise = call_method(&self.video, "requestPictureInPicture")
            .map_err(|err| surface_error("Picture-in-Picture", err))?;
        watch_promise(promise, "Picture-in-Picture");
        Ok(())
    }

    fn exit_picture_in_picture(&mut self) -> Result<()> {
        let Some(document) = document() else {
            return Ok(());
        };
        let promise = call_method(&document, "exitPictureInPicture")
            .map_err(|err| surface_error("Picture-in-Picture", err))?;
        watch_promise(promise, "exit Picture-in-Picture");
        Ok(())
    }
}
