//! Player session - orchestrator for one mounted player
//!
//! Coordinates:
//! - Source loading and teardown through the playback controller
//! - Control chrome visibility and the idle timer
//! - Channel and episode navigation
//! - Channel banner (OSD) and "next episode" timers
//! - Presentation mode, fullscreen and Picture-in-Picture
//! - Simulated downloads
//!
//! All timers come from the injected [`Scheduler`]; the host delivers each
//! [`FiredTimer`] back through [`PlayerSession::handle_timer`].

use crate::config::PlayerConfig;
use crate::controller::PlaybackController;
use crate::downloads::{DownloadProgress, DownloadSimulator};
use crate::media::{Capabilities, CapabilityProbe, EngineFactory, MediaSink, PresentationSurface};
use crate::navigator::{self, key_action, ChannelNavigator, NavAction};
use crate::preferences::{KeyValueStore, PreferenceStore};
use crate::scheduler::{FiredTimer, Scheduler, TimerId, TimerKind};
use crate::source::AttachPlan;
use crate::types::*;
use crate::visibility::{ActivityContext, ControlMenu, ControlVisibility, TapOutcome};
use crate::Result;
use std::rc::Rc;
use tracing::{debug, info, instrument, warn};

/// Callbacks a host receives from the player; all default to no-ops
pub trait PlayerObserver {
    /// A new item was mounted (switch, next channel, next episode)
    fn on_item_changed(&self, _item: &PlayableItem) {}

    /// Playback progressed on an item with a known duration
    fn on_progress(&self, _item: &PlayableItem, _progress: &ProgressUpdate) {}

    /// Nothing on this runtime can play the item
    fn on_unavailable(&self, _item: &PlayableItem, _reason: &str) {}

    fn on_download_progress(&self, _progress: &DownloadProgress) {}

    /// The player was closed
    fn on_close(&self) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl PlayerObserver for NoopObserver {}

impl<T: PlayerObserver + ?Sized> PlayerObserver for Rc<T> {
    fn on_item_changed(&self, item: &PlayableItem) {
        (**self).on_item_changed(item)
    }

    fn on_progress(&self, item: &PlayableItem, progress: &ProgressUpdate) {
        (**self).on_progress(item, progress)
    }

    fn on_unavailable(&self, item: &PlayableItem, reason: &str) {
        (**self).on_unavailable(item, reason)
    }

    fn on_download_progress(&self, progress: &DownloadProgress) {
        (**self).on_download_progress(progress)
    }

    fn on_close(&self) {
        (**self).on_close()
    }
}

/// Host-provided services for a session
pub struct PlayerParts {
    pub sink: Box<dyn MediaSink>,
    pub engines: Box<dyn EngineFactory>,
    pub surface: Box<dyn PresentationSurface>,
    pub probe: Box<dyn CapabilityProbe>,
    pub scheduler: Rc<dyn Scheduler>,
    pub store: Rc<dyn KeyValueStore>,
}

/// One mounted player
pub struct PlayerSession {
    /// Unique session ID
    id: SessionId,
    config: PlayerConfig,
    controller: PlaybackController,
    visibility: ControlVisibility,
    navigator: ChannelNavigator,
    downloads: DownloadSimulator,
    surface: Box<dyn PresentationSurface>,
    scheduler: Rc<dyn Scheduler>,
    observer: Box<dyn PlayerObserver>,
    capabilities: Capabilities,
    item: Option<PlayableItem>,
    presentation: Presentation,
    /// Pending channel banner timer; the banner shows while this is set
    osd: Option<TimerId>,
    next_episode_timer: Option<TimerId>,
    next_episode_ready: bool,
    picture_in_picture: bool,
    closed: bool,
}

impl PlayerSession {
    /// Create a session; capabilities are probed once here
    pub fn new(config: PlayerConfig, parts: PlayerParts, observer: Box<dyn PlayerObserver>) -> Result<Self> {
        config.validate()?;

        let capabilities = parts.probe.probe();
        let preferences = PreferenceStore::new(Rc::clone(&parts.store), &config.storage_namespace);
        let controller = PlaybackController::new(
            config.clone(),
            parts.sink,
            parts.engines,
            capabilities,
            preferences,
        );
        let downloads = DownloadSimulator::new(Rc::clone(&parts.store), &config);
        let id = SessionId::new();

        info!(session = %id, ?capabilities, "Player session created");

        Ok(Self {
            id,
            visibility: ControlVisibility::new(config.idle_timeout()),
            config,
            controller,
            navigator: ChannelNavigator::default(),
            downloads,
            surface: parts.surface,
            scheduler: parts.scheduler,
            observer,
            capabilities,
            item: None,
            presentation: Presentation::Full,
            osd: None,
            next_episode_timer: None,
            next_episode_ready: false,
            picture_in_picture: false,
            closed: false,
        })
    }

    fn ctx(&self) -> ActivityContext {
        ActivityContext {
            playing: self.controller.state().is_playing,
            presentation: self.presentation,
        }
    }

    fn wake(&mut self) {
        let ctx = self.ctx();
        self.visibility.activity(&*self.scheduler, ctx);
    }

    // =========================================================================
    // Content
    // =========================================================================

    /// Mount an item, starting `start_offset` seconds in (ignored for live)
    #[instrument(skip_all, fields(session = %self.id, item = %item.id()))]
    pub fn mount(&mut self, item: PlayableItem, start_offset: f64) -> AttachPlan {
        self.cancel_content_timers();
        self.visibility.force_visible(&*self.scheduler);
        self.visibility.close_menus();
        self.next_episode_ready = false;
        self.closed = false;

        let plan = self.controller.load(&item, start_offset);
        if let AttachPlan::Unavailable { reason, .. } = &plan {
            self.observer.on_unavailable(&item, reason);
        }

        if item.is_live() && self.presentation == Presentation::Full {
            self.osd = Some(self.scheduler.after(self.config.osd_duration(), TimerKind::ChannelOsd));
        }

        if let PlayableItem::Video(video) = &item {
            if navigator::next_episode(video).is_some() {
                self.next_episode_timer = Some(
                    self.scheduler
                        .after(self.config.next_episode_dwell(), TimerKind::NextEpisode),
                );
            }
        }

        info!(title = %item.title(), live = item.is_live(), "Item mounted");
        self.observer.on_item_changed(&item);
        self.item = Some(item);
        self.wake();
        plan
    }

    /// Replace the current item from the start
    pub fn switch_to(&mut self, item: PlayableItem) -> AttachPlan {
        self.mount(item, 0.0)
    }

    /// Next channel (wrapping) or next episode; false when there is none
    pub fn advance(&mut self) -> bool {
        let next = match &self.item {
            Some(PlayableItem::Channel(channel)) => self
                .navigator
                .next(&channel.id)
                .cloned()
                .map(PlayableItem::Channel),
            Some(PlayableItem::Video(video)) => navigator::next_episode(video).map(PlayableItem::Video),
            None => None,
        };
        match next {
            Some(item) => {
                self.switch_to(item);
                true
            }
            None => false,
        }
    }

    /// Previous channel (wrapping); channels only
    pub fn retreat(&mut self) -> bool {
        let previous = match &self.item {
            Some(PlayableItem::Channel(channel)) => self.navigator.previous(&channel.id).cloned(),
            _ => None,
        };
        match previous {
            Some(channel) => {
                self.switch_to(channel.into());
                true
            }
            None => false,
        }
    }

    /// Replace the channel list used for stepping
    pub fn set_channels(&mut self, channels: Vec<ChannelItem>) {
        debug!(count = channels.len(), "Channel list updated");
        self.navigator = ChannelNavigator::new(channels);
    }

    // =========================================================================
    // Presentation
    // =========================================================================

    pub fn minimize(&mut self) {
        if self.presentation == Presentation::Minimized {
            return;
        }
        self.presentation = Presentation::Minimized;
        self.visibility.force_visible(&*self.scheduler);
        self.visibility.close_menus();
        self.hide_osd();
        info!(session = %self.id, "Player minimized");
    }

    pub fn restore(&mut self) {
        if self.presentation == Presentation::Full {
            return;
        }
        self.presentation = Presentation::Full;
        self.wake();
        info!(session = %self.id, "Player restored");
    }

    pub fn toggle_minimize(&mut self) {
        match self.presentation {
            Presentation::Full => self.minimize(),
            Presentation::Minimized => self.restore(),
        }
    }

    /// Keyboard or remote key; returns true if it changed channel
    pub fn handle_key(&mut self, key: &str) -> bool {
        self.wake();
        if self.presentation != Presentation::Full || !self.controller.is_live() {
            return false;
        }
        match key_action(key) {
            Some(NavAction::Next) => self.advance(),
            Some(NavAction::Previous) => self.retreat(),
            None => false,
        }
    }

    pub fn pointer_activity(&mut self) {
        self.wake();
    }

    /// Tap on the video surface
    pub fn surface_tap(&mut self) -> TapOutcome {
        let ctx = self.ctx();
        let outcome = self.visibility.surface_tap(&*self.scheduler, ctx);
        if outcome == TapOutcome::TogglePlayback {
            self.toggle();
        }
        outcome
    }

    pub fn toggle_menu(&mut self, menu: ControlMenu) {
        self.wake();
        self.visibility.toggle_menu(menu);
    }

    pub fn toggle_fullscreen(&mut self) {
        self.wake();
        if !self.capabilities.fullscreen {
            warn!("Fullscreen not supported");
            return;
        }
        if self.surface.is_fullscreen() {
            if let Err(e) = self.surface.exit_fullscreen() {
                warn!(error = %e, "Exit fullscreen failed");
            }
            return;
        }
        match self.surface.request_fullscreen() {
            Ok(()) => {
                if let Err(e) = self.surface.lock_landscape() {
                    debug!(error = %e, "Orientation lock unavailable");
                }
            }
            Err(e) => warn!(error = %e, "Fullscreen request rejected"),
        }
    }

    /// Enter or leave Picture-in-Picture; media-element sources only
    pub fn toggle_picture_in_picture(&mut self) {
        self.wake();
        if !self.capabilities.picture_in_picture || !self.controller.has_transport() {
            debug!("Picture-in-Picture not available for this source");
            return;
        }
        let result = if self.surface.is_picture_in_picture() {
            self.surface.exit_picture_in_picture()
        } else {
            self.surface.request_picture_in_picture()
        };
        match result {
            Ok(()) => self.picture_in_picture = self.surface.is_picture_in_picture(),
            Err(e) => warn!(error = %e, "Picture-in-Picture request failed"),
        }
    }

    /// The platform entered or left Picture-in-Picture on its own
    pub fn on_picture_in_picture_changed(&mut self, active: bool) {
        debug!(active, "Picture-in-Picture changed");
        self.picture_in_picture = active;
    }

    // =========================================================================
    // Transport
    // =========================================================================

    pub fn play(&mut self) {
        self.controller.play();
        self.wake();
    }

    pub fn pause(&mut self) {
        self.controller.pause();
        self.visibility.force_visible(&*self.scheduler);
    }

    pub fn toggle(&mut self) {
        if self.controller.state().is_playing {
            self.pause();
        } else {
            self.play();
        }
    }

    pub fn seek_to(&mut self, percent: f64) {
        self.controller.seek_to(percent);
        self.wake();
    }

    pub fn skip(&mut self, delta_secs: f64) {
        self.controller.skip(delta_secs);
        self.wake();
    }

    pub fn skip_forward(&mut self) {
        self.skip(self.config.skip_step_secs);
    }

    pub fn skip_back(&mut self) {
        self.skip(-self.config.skip_step_secs);
    }

    pub fn set_volume(&mut self, volume: f64) {
        self.controller.set_volume(volume);
        self.wake();
    }

    pub fn toggle_mute(&mut self) {
        self.controller.toggle_mute();
        self.wake();
    }

    pub fn set_playback_rate(&mut self, rate: f64) -> Result<()> {
        self.controller.set_playback_rate(rate)?;
        self.visibility.close_menus();
        self.wake();
        Ok(())
    }

    pub fn select_subtitle(&mut self, index: Option<usize>) -> Result<()> {
        self.controller.select_subtitle(index)?;
        self.visibility.close_menus();
        self.wake();
        Ok(())
    }

    pub fn quality_levels(&self) -> Vec<QualityLevel> {
        self.controller.quality_levels()
    }

    pub fn set_quality(&mut self, selection: QualitySelection) -> Result<()> {
        self.controller.set_quality(selection)?;
        self.visibility.close_menus();
        self.wake();
        Ok(())
    }

    pub fn skip_intro_available(&self) -> bool {
        self.controller.skip_intro_available()
    }

    pub fn skip_intro(&mut self) -> bool {
        let skipped = self.controller.skip_intro();
        self.wake();
        skipped
    }

    /// The "next episode" button is offered
    pub fn next_episode_available(&self) -> bool {
        self.next_episode_ready
            && matches!(&self.item, Some(PlayableItem::Video(v)) if navigator::next_episode(v).is_some())
    }

    // =========================================================================
    // Media events
    // =========================================================================

    pub fn on_time_update(&mut self) {
        let Some(update) = self.controller.on_time_update() else {
            return;
        };
        if let Some(item) = &self.item {
            self.observer.on_progress(item, &update);
        }
    }

    pub fn on_ended(&mut self) {
        self.controller.on_ended();
        self.visibility.force_visible(&*self.scheduler);
    }

    /// Deliver an elapsed timer
    pub fn handle_timer(&mut self, fired: FiredTimer) {
        if self.closed {
            debug!(timer = %fired.id, "Timer after close ignored");
            return;
        }
        match &fired.kind {
            TimerKind::ControlsIdle => {
                let ctx = self.ctx();
                self.visibility.on_idle_elapsed(fired.id, ctx);
            }
            TimerKind::ChannelOsd => {
                if self.osd == Some(fired.id) {
                    self.osd = None;
                }
            }
            TimerKind::NextEpisode => {
                if self.next_episode_timer == Some(fired.id) {
                    self.next_episode_timer = None;
                    self.next_episode_ready = true;
                    debug!("Next episode offered");
                }
            }
            TimerKind::DownloadTick(_) => {
                if let Some(progress) = self.downloads.on_tick(&*self.scheduler, &fired) {
                    self.observer.on_download_progress(&progress);
                }
            }
        }
    }

    /// Start a simulated download of the current on-demand item
    pub fn start_download(&mut self) -> bool {
        let id = match &self.item {
            Some(item) if !item.is_live() => item.id().to_string(),
            _ => return false,
        };
        self.visibility.close_menus();
        self.downloads.start(&*self.scheduler, &id)
    }

    /// Stop all timers, release the source and notify the host once
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.release();
        info!(session = %self.id, "Player closed");
        self.observer.on_close();
    }

    fn release(&mut self) {
        self.cancel_content_timers();
        self.visibility.disarm(&*self.scheduler);
        self.downloads.cancel_all(&*self.scheduler);
        self.controller.teardown();
        self.closed = true;
        self.item = None;
    }

    fn hide_osd(&mut self) {
        if let Some(id) = self.osd.take() {
            self.scheduler.cancel(id);
        }
    }

    fn cancel_content_timers(&mut self) {
        self.hide_osd();
        if let Some(id) = self.next_episode_timer.take() {
            self.scheduler.cancel(id);
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn item(&self) -> Option<&PlayableItem> {
        self.item.as_ref()
    }

    pub fn presentation(&self) -> Presentation {
        self.presentation
    }

    pub fn playback_state(&self) -> &PlaybackState {
        self.controller.state()
    }

    pub fn controller(&self) -> &PlaybackController {
        &self.controller
    }

    pub fn controls(&self) -> &ControlVisibility {
        &self.visibility
    }

    /// Channel banner is showing
    pub fn osd_visible(&self) -> bool {
        self.osd.is_some()
    }

    pub fn navigator(&self) -> &ChannelNavigator {
        &self.navigator
    }

    pub fn downloads(&self) -> &DownloadSimulator {
        &self.downloads
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn is_fullscreen(&self) -> bool {
        self.surface.is_fullscreen()
    }

    pub fn is_picture_in_picture(&self) -> bool {
        self.picture_in_picture
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }
}

impl Drop for PlayerSession {
    fn drop(&mut self) {
        if !self.closed {
            self.release();
        }
    }
}
