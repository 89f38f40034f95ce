//! Control chrome visibility
//!
//! Controls are `Visible` until the player has been idle for the configured
//! timeout while playing in full presentation. Any activity brings them back
//! and re-arms the idle timer.

use crate::scheduler::{Scheduler, TimerId, TimerKind};
use crate::types::Presentation;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Chrome visibility state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlsState {
    #[default]
    Visible,
    Hidden,
}

/// Popup menus; at most one is open
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlMenu {
    Speed,
    Subtitles,
    Quality,
    Download,
}

/// What a tap on the video surface should do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TapOutcome {
    /// Controls were hidden; the tap only reveals them
    Wake,
    /// Controls were showing; toggle play/pause
    TogglePlayback,
}

/// Player facts the idle rule depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivityContext {
    pub playing: bool,
    pub presentation: Presentation,
}

impl ActivityContext {
    fn may_hide(&self) -> bool {
        self.playing && self.presentation == Presentation::Full
    }
}

/// Idle-timer driven visibility of the control chrome
#[derive(Debug)]
pub struct ControlVisibility {
    state: ControlsState,
    open_menu: Option<ControlMenu>,
    idle: Option<TimerId>,
    last_activity: Duration,
    timeout: Duration,
}

impl ControlVisibility {
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: ControlsState::Visible,
            open_menu: None,
            idle: None,
            last_activity: Duration::ZERO,
            timeout,
        }
    }

    /// Pointer, touch, key or explicit toggle
    pub fn activity(&mut self, scheduler: &dyn Scheduler, ctx: ActivityContext) {
        self.state = ControlsState::Visible;
        self.last_activity = scheduler.now();
        self.disarm(scheduler);
        if ctx.may_hide() {
            self.idle = Some(scheduler.after(self.timeout, TimerKind::ControlsIdle));
        }
    }

    /// Idle timer fired; returns true if the controls were hidden
    pub fn on_idle_elapsed(&mut self, id: TimerId, ctx: ActivityContext) -> bool {
        if self.idle != Some(id) {
            debug!(timer = %id, "Stale idle timer ignored");
            return false;
        }
        self.idle = None;
        if !ctx.may_hide() {
            return false;
        }
        self.state = ControlsState::Hidden;
        self.open_menu = None;
        debug!("Controls hidden after inactivity");
        true
    }

    /// Classify a tap; a tap on hidden controls only wakes them
    pub fn surface_tap(&mut self, scheduler: &dyn Scheduler, ctx: ActivityContext) -> TapOutcome {
        match self.state {
            ControlsState::Hidden => {
                self.activity(scheduler, ctx);
                TapOutcome::Wake
            }
            ControlsState::Visible => TapOutcome::TogglePlayback,
        }
    }

    /// Show controls and stop the idle timer (pause, content switch, minimize)
    pub fn force_visible(&mut self, scheduler: &dyn Scheduler) {
        self.disarm(scheduler);
        self.state = ControlsState::Visible;
    }

    /// Open `menu`, or close it if it is already open
    pub fn toggle_menu(&mut self, menu: ControlMenu) {
        self.open_menu = if self.open_menu == Some(menu) {
            None
        } else {
            Some(menu)
        };
    }

    pub fn close_menus(&mut self) {
        self.open_menu = None;
    }

    /// Cancel the idle timer
    pub fn disarm(&mut self, scheduler: &dyn Scheduler) {
        if let Some(id) = self.idle.take() {
            scheduler.cancel(id);
        }
    }

    pub fn state(&self) -> ControlsState {
        self.state
    }

    pub fn is_visible(&self) -> bool {
        self.state == ControlsState::Visible
    }

    pub fn open_menu(&self) -> Option<ControlMenu> {
        self.open_menu
    }

    pub fn last_activity(&self) -> Duration {
        self.last_activity
    }

    pub fn idle_timer(&self) -> Option<TimerId> {
        self.idle
    }
}
