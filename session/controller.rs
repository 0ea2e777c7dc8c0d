use std::time::Duration;

use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::mode::{self, AppMode, Transition};
use super::SessionEvent;

/// Owns the active [`AppMode`] and the menu tab that goes with it.
///
/// The splash screen is left automatically once the deferred splash timer
/// fires, unless some other transition happened first.
#[derive(Debug, Default)]
pub struct ModeController {
    mode: AppMode,
    active_tab: usize,
    splash: Option<CancellationToken>,
}

impl ModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> AppMode {
        self.mode
    }

    pub fn active_tab(&self) -> usize {
        self.active_tab
    }

    pub fn menu_visible(&self) -> bool {
        self.mode != AppMode::Splash
    }

    pub fn splash_pending(&self) -> bool {
        self.splash.is_some()
    }

    /// Schedules the one-shot move from `Splash` to `Welcome`.
    pub fn arm_splash(&mut self, delay: Duration, events: UnboundedSender<SessionEvent>) {
        self.cancel_splash();
        if self.mode != AppMode::Splash {
            return;
        }

        let token = CancellationToken::new();
        let cancelled = token.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancelled.cancelled() => {}
                _ = tokio::time::sleep(delay) => {
                    events.send(SessionEvent::SplashElapsed).ok();
                }
            }
        });
        self.splash = Some(token);
    }

    pub fn cancel_splash(&mut self) {
        if let Some(token) = self.splash.take() {
            token.cancel();
        }
    }

    /// Called when the splash timer fired. A timer that was cancelled after
    /// its event had already been queued is ignored here.
    pub fn complete_splash(&mut self) -> Option<Transition> {
        if self.splash.take().is_none() {
            debug!("ignoring stale splash timer");
            return None;
        }
        self.set_mode(AppMode::Welcome)
    }

    /// Switches to `mode`. Returns `None` if it is already active.
    pub fn set_mode(&mut self, mode: AppMode) -> Option<Transition> {
        if mode == self.mode {
            return None;
        }
        self.cancel_splash();
        self.mode = mode;
        if let Some(tab) = mode.tab() {
            self.active_tab = tab;
        }
        Some(Transition {
            mode,
            tab: self.active_tab,
        })
    }

    /// Activates the menu tab at `position`.
    pub fn navigate(&mut self, position: usize) -> Option<Transition> {
        match mode::navigate(position) {
            Some(target) => self.set_mode(target.mode),
            None => {
                warn!("ignoring navigation to unknown tab {position}");
                None
            }
        }
    }

    /// Switches to the mode named `name`; unknown names are ignored.
    pub fn request(&mut self, name: &str) -> Option<Transition> {
        match name.parse::<AppMode>() {
            Ok(mode) => self.set_mode(mode),
            Err(err) => {
                warn!("{err}");
                None
            }
        }
    }
}

impl Drop for ModeController {
    fn drop(&mut self) {
        self.cancel_splash();
    }
}
