use async_channel::Sender;
use color_eyre::eyre::Result;
use eeg2bids::session::{AppMode, Change, ConnectionState, Session};
use ratatui::{prelude::*, widgets::*};

use super::{
    configuration::Configuration, converter::Converter, credentials::Credentials, menu::Menu,
    splash::Splash, validator::Validator, welcome::Welcome, Component,
};
use crate::styles::{ERROR_COLOR, MUTED_COLOR, SUCCESS_COLOR};
use crate::{
    action::Action,
    config::Config,
    tui::{Event, Frame},
};

/// Owns every mounted component and shows exactly the screen bound to the
/// current mode.
pub struct ScreenHost {
    menu: Menu,
    screens: Vec<Box<dyn Component>>,
    credentials: Credentials,
    last_error: Option<String>,
}

impl Default for ScreenHost {
    fn default() -> Self {
        Self::new()
    }
}

impl ScreenHost {
    pub fn new() -> Self {
        let mut host = Self {
            menu: Menu::new(),
            screens: vec![
                Box::new(Splash::new()),
                Box::new(Welcome::new()),
                Box::new(Configuration::new()),
                Box::new(Converter::new()),
                Box::new(Validator::new()),
            ],
            credentials: Credentials::new(),
            last_error: None,
        };
        host.show(AppMode::default());
        host
    }

    /// Makes the screen for `mode` the only visible one.
    pub fn show(&mut self, mode: AppMode) {
        for screen in self.screens.iter_mut() {
            screen.set_visible(screen.screen() == Some(mode));
        }
        self.menu.set_visible(mode != AppMode::Splash);
    }

    pub fn visible_screens(&self) -> Vec<AppMode> {
        self.screens
            .iter()
            .filter(|screen| screen.is_visible())
            .filter_map(|screen| screen.screen())
            .collect()
    }

    pub fn menu_visible(&self) -> bool {
        self.menu.is_visible()
    }

    /// Visits the menu, every screen and the dialog, in that order.
    fn each(&mut self, mut f: impl FnMut(&mut dyn Component) -> Result<()>) -> Result<()> {
        f(&mut self.menu)?;
        for screen in self.screens.iter_mut() {
            f(screen.as_mut())?;
        }
        f(&mut self.credentials)
    }

    pub fn register_action_handler(&mut self, tx: Sender<Action>) -> Result<()> {
        self.each(|component| component.register_action_handler(tx.clone()))
    }

    pub fn register_config_handler(&mut self, config: Config) -> Result<()> {
        self.each(|component| component.register_config_handler(config.clone()))
    }

    pub fn register_session_handler(&mut self, session: &mut Session) -> Result<()> {
        self.each(|component| component.register_session_handler(session))?;
        self.show(session.mode());
        Ok(())
    }

    /// Whether a key bound `action` may fire. Navigation waits while the
    /// credentials dialog is open.
    pub fn allows(&self, action: &Action) -> bool {
        !(self.credentials.is_visible() && action.is_navigation())
    }

    /// Routes an input event: an open dialog takes everything, then the menu
    /// gets mouse clicks, then the visible screen.
    pub fn handle_events(
        &mut self,
        event: Option<Event>,
        session: &mut Session,
    ) -> Result<Option<Action>> {
        if self.credentials.is_visible() {
            return self.credentials.handle_events(event, session);
        }
        if let Some(action) = self.menu.handle_events(event.clone(), session)? {
            return Ok(Some(action));
        }
        for screen in self.screens.iter_mut().filter(|screen| screen.is_visible()) {
            if let Some(action) = screen.handle_events(event.clone(), session)? {
                return Ok(Some(action));
            }
        }
        Ok(None)
    }

    pub fn update(&mut self, action: Action, session: &mut Session) -> Result<Vec<Action>> {
        match &action {
            Action::Changed(Change::Mode(transition)) => self.show(transition.mode),
            Action::Error(message) => self.last_error = Some(message.clone()),
            _ => {}
        }

        let mut follow_ups = Vec::new();
        self.each(|component| {
            if let Some(next) = component.update(action.clone(), session)? {
                follow_ups.push(next);
            }
            Ok(())
        })?;
        Ok(follow_ups)
    }

    pub fn draw(&mut self, f: &mut Frame<'_>, rect: Rect, session: &Session) -> Result<()> {
        let menu_height = if self.menu.is_visible() { 3 } else { 0 };
        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints(vec![
                Constraint::Length(menu_height),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(rect);

        self.menu.draw(f, layout[0], session)?;
        for screen in self.screens.iter_mut().filter(|screen| screen.is_visible()) {
            screen.draw(f, layout[1], session)?;
        }
        self.draw_status(f, layout[2], session);
        self.credentials.draw(f, rect, session)?;
        Ok(())
    }

    fn draw_status(&self, f: &mut Frame<'_>, rect: Rect, session: &Session) {
        let state = session.connection_state();
        let color = match state {
            ConnectionState::Connected => SUCCESS_COLOR,
            ConnectionState::Errored => ERROR_COLOR,
            _ => MUTED_COLOR,
        };
        let mut spans = vec![Span::styled(format!(" backend {state} "), Style::default().fg(color))];

        let error = self
            .last_error
            .as_deref()
            .or_else(|| session.connection().last_error());
        if let Some(error) = error {
            spans.push(Span::styled(format!("| {error}"), Style::default().fg(ERROR_COLOR)));
        }
        f.render_widget(Paragraph::new(Line::from(spans)), rect);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use eeg2bids::session::MENU_TABS;
    use pretty_assertions::assert_eq;
    use strum::IntoEnumIterator;

    #[test]
    fn starts_on_the_splash_screen() {
        let host = ScreenHost::new();
        assert_eq!(host.visible_screens(), vec![AppMode::Splash]);
        assert!(!host.menu_visible());
    }

    #[test]
    fn exactly_one_screen_per_mode() {
        let mut host = ScreenHost::new();
        for mode in AppMode::iter() {
            host.show(mode);
            assert_eq!(host.visible_screens(), vec![mode]);
            assert_eq!(host.menu_visible(), mode != AppMode::Splash);
        }
    }

    #[test]
    fn mode_changes_swap_the_screen() {
        let mut host = ScreenHost::new();
        let mut session = Session::new();
        assert!(session.navigate(MENU_TABS.len() - 1));
        for change in session.drain_changes() {
            host.update(Action::Changed(change), &mut session).unwrap();
        }
        assert_eq!(host.visible_screens(), vec![AppMode::Validator]);
        assert!(host.menu_visible());
    }

    #[test]
    fn toggling_credentials_opens_the_dialog() {
        let mut host = ScreenHost::new();
        let mut session = Session::new();
        host.update(Action::ToggleCredentials, &mut session).unwrap();
        assert!(host.credentials.is_visible());
        // the underlying screen stays put
        assert_eq!(host.visible_screens(), vec![AppMode::Splash]);
    }

    #[test]
    fn open_dialog_holds_back_navigation() {
        let mut host = ScreenHost::new();
        let mut session = Session::new();
        assert!(host.allows(&Action::Navigate(2)));

        host.update(Action::ToggleCredentials, &mut session).unwrap();
        assert!(!host.allows(&Action::Navigate(2)));
        assert!(!host.allows(&Action::NextTab));
        assert!(!host.allows(&Action::PreviousTab));
        assert!(!host.allows(&Action::SwitchMode(AppMode::Validator)));
        assert!(host.allows(&Action::Quit));
        assert!(host.allows(&Action::ToggleCredentials));
    }

    #[test]
    fn errors_are_kept_for_the_status_line() {
        let mut host = ScreenHost::new();
        let mut session = Session::new();
        host.update(Action::Error("draw failed".to_string()), &mut session)
            .unwrap();
        assert_eq!(host.last_error.as_deref(), Some("draw failed"));
    }
}
