use async_channel::Sender;
use color_eyre::eyre::Result;
use crossterm::event::{KeyEvent, MouseEvent};
use eeg2bids::session::{AppMode, Session};
use ratatui::layout::Rect;

use crate::{
    action::Action,
    config::Config,
    tui::{Event, Frame},
};

pub mod configuration;
pub mod converter;
pub mod credentials;
pub mod form;
pub mod host;
pub mod menu;
pub mod splash;
pub mod validator;
pub mod welcome;

/// A piece of the interface mounted in the [`host::ScreenHost`].
///
/// Every hook receives the [`Session`] so a component can read and write the
/// task record, switch modes and talk to the backend.
pub trait Component {
    #[allow(unused_variables)]
    fn register_action_handler(&mut self, tx: Sender<Action>) -> Result<()> {
        Ok(())
    }

    #[allow(unused_variables)]
    fn register_config_handler(&mut self, config: Config) -> Result<()> {
        Ok(())
    }

    /// Subscribe to backend events here.
    #[allow(unused_variables)]
    fn register_session_handler(&mut self, session: &mut Session) -> Result<()> {
        Ok(())
    }

    /// The mode this component is the screen for, if any.
    fn screen(&self) -> Option<AppMode> {
        None
    }

    #[allow(unused_variables)]
    fn set_visible(&mut self, visible: bool) {}

    fn is_visible(&self) -> bool {
        true
    }

    fn handle_events(&mut self, event: Option<Event>, session: &mut Session) -> Result<Option<Action>> {
        let r = match event {
            Some(Event::Key(key_event)) => self.handle_key_events(key_event, session)?,
            Some(Event::Mouse(mouse_event)) => self.handle_mouse_events(mouse_event)?,
            _ => None,
        };
        Ok(r)
    }

    #[allow(unused_variables)]
    fn handle_key_events(&mut self, key: KeyEvent, session: &mut Session) -> Result<Option<Action>> {
        Ok(None)
    }

    #[allow(unused_variables)]
    fn handle_mouse_events(&mut self, mouse: MouseEvent) -> Result<Option<Action>> {
        Ok(None)
    }

    #[allow(unused_variables)]
    fn update(&mut self, action: Action, session: &mut Session) -> Result<Option<Action>> {
        Ok(None)
    }

    fn draw(&mut self, f: &mut Frame<'_>, rect: Rect, session: &Session) -> Result<()>;
}
