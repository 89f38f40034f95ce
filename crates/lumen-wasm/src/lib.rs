//! Lumen WASM - browser bindings for the Lumen playback core
//!
//! Wires a [`lumen_core::PlayerSession`] to a real page:
//! - `<video>` element as the media sink
//! - hls.js (when loaded) as the segmented-loading engine
//! - `localStorage` for preferences, history and downloads
//! - `setTimeout` for the idle, banner and download timers
//!
//! ## Usage
//!
//! ```javascript
//! import init, { LumenPlayer } from '@lumen/wasm';
//!
//! await init();
//! const player = new LumenPlayer(video, container, {}, {
//!   onItemChanged: (item) => render(item),
//!   onClose: () => unmount(),
//! });
//! player.mount({ kind: 'channel', id: 'news', name: 'News', source_url: 'https://…/index.m3u8' });
//! video.addEventListener('timeupdate', () => player.onTimeUpdate());
//! ```

use lumen_core::{
    ChannelItem, ControlMenu, DownloadProgress, FiredTimer, PlayableItem, PlayerConfig,
    PlayerObserver, PlayerParts, PlayerSession, ProgressUpdate, QualitySelection, TapOutcome,
    WatchHistory,
};
use serde::Serialize;
use std::cell::RefCell;
use std::rc::{Rc, Weak};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::{Element, HtmlVideoElement};

mod media;
mod storage;
mod timers;

pub use media::{BrowserCapabilities, BrowserSurface, HlsJsFactory, WebMediaSink};
pub use storage::LocalStorageStore;
pub use timers::BrowserScheduler;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    tracing_wasm::set_as_global_default();
    lumen_core::init();
}

/// Library version
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

fn to_js(err: impl std::fmt::Display) -> JsValue {
    JsError::new(&err.to_string()).into()
}

fn from_js<T: serde::de::DeserializeOwned>(value: JsValue) -> Result<T, JsValue> {
    serde_wasm_bindgen::from_value(value).map_err(to_js)
}

fn to_value<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(to_js)
}

fn config_from_js(config: JsValue) -> Result<PlayerConfig, JsValue> {
    if config.is_null() || config.is_undefined() {
        return Ok(PlayerConfig::default());
    }
    let config: PlayerConfig = from_js(config)?;
    config.validate().map_err(to_js)?;
    Ok(config)
}

// ============================================================================
// Host callbacks
// ============================================================================

/// Forwards player events to optional JS callbacks and records watch history
struct JsObserver {
    history: WatchHistory,
    on_item_changed: Option<js_sys::Function>,
    on_progress: Option<js_sys::Function>,
    on_unavailable: Option<js_sys::Function>,
    on_download_progress: Option<js_sys::Function>,
    on_close: Option<js_sys::Function>,
}

impl JsObserver {
    fn new(callbacks: &JsValue, history: WatchHistory) -> Self {
        let callback = |name: &str| {
            js_sys::Reflect::get(callbacks, &JsValue::from_str(name))
                .ok()
                .and_then(|f| f.dyn_into::<js_sys::Function>().ok())
        };
        Self {
            history,
            on_item_changed: callback("onItemChanged"),
            on_progress: callback("onProgress"),
            on_unavailable: callback("onUnavailable"),
            on_download_progress: callback("onDownloadProgress"),
            on_close: callback("onClose"),
        }
    }

    fn call(callback: &Option<js_sys::Function>, name: &str, args: &[JsValue]) {
        let Some(f) = callback else {
            return;
        };
        let result = match args {
            [] => f.call0(&JsValue::NULL),
            [a] => f.call1(&JsValue::NULL, a),
            [a, b] => f.call2(&JsValue::NULL, a, b),
            _ => f.apply(&JsValue::NULL, &args.iter().collect()),
        };
        if let Err(err) = result {
            tracing::warn!(callback = name, error = %storage::js_message(&err), "Host callback threw");
        }
    }
}

impl PlayerObserver for JsObserver {
    fn on_item_changed(&self, item: &PlayableItem) {
        if let Ok(item) = to_value(item) {
            Self::call(&self.on_item_changed, "onItemChanged", &[item]);
        }
    }

    fn on_progress(&self, item: &PlayableItem, progress: &ProgressUpdate) {
        self.history.on_progress(item, progress);
        if let Ok(progress) = to_value(progress) {
            Self::call(&self.on_progress, "onProgress", &[progress]);
        }
    }

    fn on_unavailable(&self, item: &PlayableItem, reason: &str) {
        let item = to_value(item).unwrap_or(JsValue::NULL);
        Self::call(
            &self.on_unavailable,
            "onUnavailable",
            &[item, JsValue::from_str(reason)],
        );
    }

    fn on_download_progress(&self, progress: &DownloadProgress) {
        Self::call(
            &self.on_download_progress,
            "onDownloadProgress",
            &[
                JsValue::from_str(&progress.id),
                JsValue::from(progress.percent),
            ],
        );
    }

    fn on_close(&self) {
        Self::call(&self.on_close, "onClose", &[]);
    }
}

// ============================================================================
// Player facade
// ============================================================================

/// What a UI needs to render the chrome
#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Snapshot<'a> {
    item: Option<&'a PlayableItem>,
    playback: &'a lumen_core::PlaybackState,
    presentation: lumen_core::Presentation,
    controls_visible: bool,
    open_menu: Option<ControlMenu>,
    osd_visible: bool,
    live: bool,
    skip_intro: bool,
    next_episode: bool,
    fullscreen: bool,
    picture_in_picture: bool,
    plan: Option<&'a lumen_core::AttachPlan>,
}

/// A mounted player bound to one video element
#[wasm_bindgen]
pub struct LumenPlayer {
    session: Rc<RefCell<PlayerSession>>,
    scheduler: BrowserScheduler,
    history: WatchHistory,
}

impl LumenPlayer {
    fn with<T>(&self, f: impl FnOnce(&mut PlayerSession) -> T) -> Result<T, JsValue> {
        let mut session = self
            .session
            .try_borrow_mut()
            .map_err(|_| to_js("player is busy; call back outside event callbacks"))?;
        Ok(f(&mut session))
    }
}

#[wasm_bindgen]
impl LumenPlayer {
    /// Create a player over `video`; `container` is what goes fullscreen
    #[wasm_bindgen(constructor)]
    pub fn new(
        video: HtmlVideoElement,
        container: Element,
        config: JsValue,
        callbacks: JsValue,
    ) -> Result<LumenPlayer, JsValue> {
        let config = config_from_js(config)?;
        let store: Rc<dyn lumen_core::KeyValueStore> =
            Rc::new(LocalStorageStore::open().map_err(to_js)?);
        let history = WatchHistory::new(Rc::clone(&store), &config.storage_namespace);
        let scheduler = BrowserScheduler::new();

        let parts = PlayerParts {
            sink: Box::new(WebMediaSink::new(video.clone())),
            engines: Box::new(HlsJsFactory::new(video.clone())),
            surface: Box::new(BrowserSurface::new(container, video.clone())),
            probe: Box::new(BrowserCapabilities::new(video)),
            scheduler: Rc::new(scheduler.clone()),
            store,
        };
        let observer = JsObserver::new(&callbacks, history.clone());
        let session = PlayerSession::new(config, parts, Box::new(observer)).map_err(to_js)?;
        let session = Rc::new(RefCell::new(session));

        let weak: Weak<RefCell<PlayerSession>> = Rc::downgrade(&session);
        scheduler.set_dispatch(move |fired: FiredTimer| {
            let Some(session) = weak.upgrade() else {
                return;
            };
            match session.try_borrow_mut() {
                Ok(mut session) => session.handle_timer(fired),
                Err(_) => tracing::warn!(timer = %fired.id, "Timer fired while player busy, dropped"),
            };
        });

        Ok(LumenPlayer {
            session,
            scheduler,
            history,
        })
    }

    /// Mount an item; `startOffset` defaults to the stored resume position
    pub fn mount(&self, item: JsValue, start_offset: Option<f64>) -> Result<JsValue, JsValue> {
        let item: PlayableItem = from_js(item)?;
        let offset = start_offset.unwrap_or_else(|| self.history.resume_position(&item));
        let plan = self.with(|s| s.mount(item, offset))?;
        to_value(&plan)
    }

    #[wasm_bindgen(js_name = setChannels)]
    pub fn set_channels(&self, channels: JsValue) -> Result<(), JsValue> {
        let channels: Vec<ChannelItem> = from_js(channels)?;
        self.with(|s| s.set_channels(channels))
    }

    /// Next channel or episode
    pub fn next(&self) -> Result<bool, JsValue> {
        self.with(|s| s.advance())
    }

    pub fn previous(&self) -> Result<bool, JsValue> {
        self.with(|s| s.retreat())
    }

    /// Feed a `KeyboardEvent.key`; true when it changed channel
    #[wasm_bindgen(js_name = handleKey)]
    pub fn handle_key(&self, key: &str) -> Result<bool, JsValue> {
        self.with(|s| s.handle_key(key))
    }

    #[wasm_bindgen(js_name = pointerActivity)]
    pub fn pointer_activity(&self) -> Result<(), JsValue> {
        self.with(|s| s.pointer_activity())
    }

    /// True when the tap toggled playback rather than revealing controls
    #[wasm_bindgen(js_name = surfaceTap)]
    pub fn surface_tap(&self) -> Result<bool, JsValue> {
        self.with(|s| s.surface_tap() == TapOutcome::TogglePlayback)
    }

    /// `"speed"`, `"subtitles"`, `"quality"` or `"download"`
    #[wasm_bindgen(js_name = toggleMenu)]
    pub fn toggle_menu(&self, menu: JsValue) -> Result<(), JsValue> {
        let menu: ControlMenu = from_js(menu)?;
        self.with(|s| s.toggle_menu(menu))
    }

    pub fn play(&self) -> Result<(), JsValue> {
        self.with(|s| s.play())
    }

    pub fn pause(&self) -> Result<(), JsValue> {
        self.with(|s| s.pause())
    }

    pub fn toggle(&self) -> Result<(), JsValue> {
        self.with(|s| s.toggle())
    }

    /// Seek to a percentage of the duration
    #[wasm_bindgen(js_name = seekTo)]
    pub fn seek_to(&self, percent: f64) -> Result<(), JsValue> {
        self.with(|s| s.seek_to(percent))
    }

    #[wasm_bindgen(js_name = skipForward)]
    pub fn skip_forward(&self) -> Result<(), JsValue> {
        self.with(|s| s.skip_forward())
    }

    #[wasm_bindgen(js_name = skipBack)]
    pub fn skip_back(&self) -> Result<(), JsValue> {
        self.with(|s| s.skip_back())
    }

    #[wasm_bindgen(js_name = setVolume)]
    pub fn set_volume(&self, volume: f64) -> Result<(), JsValue> {
        self.with(|s| s.set_volume(volume))
    }

    #[wasm_bindgen(js_name = toggleMute)]
    pub fn toggle_mute(&self) -> Result<(), JsValue> {
        self.with(|s| s.toggle_mute())
    }

    #[wasm_bindgen(js_name = setPlaybackRate)]
    pub fn set_playback_rate(&self, rate: f64) -> Result<(), JsValue> {
        self.with(|s| s.set_playback_rate(rate))?.map_err(to_js)
    }

    /// Track index, or `undefined` for off
    #[wasm_bindgen(js_name = selectSubtitle)]
    pub fn select_subtitle(&self, index: Option<u32>) -> Result<(), JsValue> {
        self.with(|s| s.select_subtitle(index.map(|i| i as usize)))?
            .map_err(to_js)
    }

    #[wasm_bindgen(js_name = qualityLevels)]
    pub fn quality_levels(&self) -> Result<JsValue, JsValue> {
        let levels = self.with(|s| s.quality_levels())?;
        to_value(&levels)
    }

    /// Level index, or `undefined` for automatic
    #[wasm_bindgen(js_name = setQuality)]
    pub fn set_quality(&self, level: Option<u32>) -> Result<(), JsValue> {
        let selection = match level {
            Some(index) => QualitySelection::Level(index as usize),
            None => QualitySelection::Auto,
        };
        self.with(|s| s.set_quality(selection))?.map_err(to_js)
    }

    #[wasm_bindgen(js_name = skipIntro)]
    pub fn skip_intro(&self) -> Result<bool, JsValue> {
        self.with(|s| s.skip_intro())
    }

    #[wasm_bindgen(js_name = toggleFullscreen)]
    pub fn toggle_fullscreen(&self) -> Result<(), JsValue> {
        self.with(|s| s.toggle_fullscreen())
    }

    #[wasm_bindgen(js_name = togglePictureInPicture)]
    pub fn toggle_picture_in_picture(&self) -> Result<(), JsValue> {
        self.with(|s| s.toggle_picture_in_picture())
    }

    /// Wire to the video's `enterpictureinpicture` / `leavepictureinpicture` events
    #[wasm_bindgen(js_name = onPictureInPictureChanged)]
    pub fn on_picture_in_picture_changed(&self, active: bool) -> Result<(), JsValue> {
        self.with(|s| s.on_picture_in_picture_changed(active))
    }

    pub fn minimize(&self) -> Result<(), JsValue> {
        self.with(|s| s.minimize())
    }

    pub fn restore(&self) -> Result<(), JsValue> {
        self.with(|s| s.restore())
    }

    #[wasm_bindgen(js_name = onTimeUpdate)]
    pub fn on_time_update(&self) -> Result<(), JsValue> {
        self.with(|s| s.on_time_update())
    }

    #[wasm_bindgen(js_name = onEnded)]
    pub fn on_ended(&self) -> Result<(), JsValue> {
        self.with(|s| s.on_ended())
    }

    /// Start a simulated download of the current item
    #[wasm_bindgen(js_name = startDownload)]
    pub fn start_download(&self) -> Result<bool, JsValue> {
        self.with(|s| s.start_download())
    }

    /// Everything the chrome renders from
    pub fn snapshot(&self) -> Result<JsValue, JsValue> {
        let session = self
            .session
            .try_borrow()
            .map_err(|_| to_js("player is busy"))?;
        let snapshot = Snapshot {
            item: session.item(),
            playback: session.playback_state(),
            presentation: session.presentation(),
            controls_visible: session.controls().is_visible(),
            open_menu: session.controls().open_menu(),
            osd_visible: session.osd_visible(),
            live: session.controller().is_live(),
            skip_intro: session.skip_intro_available(),
            next_episode: session.next_episode_available(),
            fullscreen: session.is_fullscreen(),
            picture_in_picture: session.is_picture_in_picture(),
            plan: session.controller().plan(),
        };
        to_value(&snapshot)
    }

    /// Stop timers, release the video element and fire `onClose`
    pub fn close(&self) -> Result<(), JsValue> {
        self.with(|s| s.close())?;
        self.scheduler.shutdown();
        Ok(())
    }
}

/// "Continue watching" rail for a storage namespace, newest first
#[wasm_bindgen(js_name = continueWatching)]
pub fn continue_watching(namespace: Option<String>) -> Result<JsValue, JsValue> {
    let namespace = namespace.unwrap_or_else(|| PlayerConfig::default().storage_namespace);
    let store = Rc::new(LocalStorageStore::open().map_err(to_js)?);
    to_value(&WatchHistory::new(store, &namespace).continue_watching())
}
